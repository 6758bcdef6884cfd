//! Integration tests for the `tessera` binary.
//!
//! Every test points the binary at a temp config so the real home
//! directory is never touched.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// A temp workspace with a global config naming a temp store.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = dir.child("state/store.json");
        dir.child("config.toml")
            .write_str(&format!("[store]\npath = '{}'\n", store.path().display()))
            .unwrap();
        Self { dir }
    }

    /// Add a project config reading the wiring documents from disk.
    fn with_manifest(self, imports: &str) -> Self {
        let manifest = self.dir.child("imports.json");
        manifest.write_str(imports).unwrap();
        let styles = self.dir.child("stylesheets.json");
        styles.write_str("[]").unwrap();
        self.dir
            .child("tessera.toml")
            .write_str(&format!(
                "[manifest]\npath = '{}'\n\n[stylesheets]\npath = '{}'\n",
                manifest.path().display(),
                styles.path().display()
            ))
            .unwrap();
        self
    }

    fn tessera(&self) -> Command {
        let mut cmd = Command::cargo_bin("tessera").unwrap();
        cmd.arg("--config")
            .arg(self.dir.child("config.toml").path())
            .arg("--cwd")
            .arg(self.dir.path())
            .env_remove("TESSERA_CONFIG");
        cmd
    }
}

#[test]
fn help_flag_works() {
    Command::cargo_bin("tessera")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("overrides"));
}

#[test]
fn overrides_round_trip_through_the_store() {
    let ws = Workspace::new();

    ws.tessera()
        .args(["overrides", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No overrides."));

    ws.tessera()
        .args(["overrides", "set", "@shop/cart", "http://localhost:8080/cart.js"])
        .assert()
        .success();

    ws.dir
        .child("state/store.json")
        .assert(predicate::str::contains("importMapOverrides"));

    ws.tessera()
        .args(["overrides", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "@shop/cart = http://localhost:8080/cart.js",
        ));

    ws.tessera()
        .args(["overrides", "remove", "@shop/cart"])
        .assert()
        .success();

    ws.tessera()
        .args(["overrides", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No overrides."));
}

#[test]
fn relative_override_is_rejected() {
    let ws = Workspace::new();

    ws.tessera()
        .args(["overrides", "set", "@shop/cart", "./cart.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn resolve_layers_overrides_over_manifest() {
    let ws = Workspace::new()
        .with_manifest(r#"{"imports": {"@shop/cart": "https://cdn.example.com/cart.js"}}"#);

    ws.tessera()
        .args(["resolve", "@shop/cart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://cdn.example.com/cart.js (base)"));

    ws.tessera()
        .args(["overrides", "set", "@shop/cart", "http://localhost:8080/cart.js"])
        .assert()
        .success();

    ws.tessera()
        .args(["resolve", "@shop/cart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:8080/cart.js (override)"));

    ws.tessera()
        .args(["resolve", "@shop/unknown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@shop/unknown (unmapped)"));
}

#[test]
fn routes_lists_mounted_fragments() {
    let ws = Workspace::new();
    let layout = ws.dir.child("index.html");
    layout
        .write_str(
            r#"<tessera-layout>
                 <tessera-fragment name="nav"></tessera-fragment>
                 <tessera-fragment name="dashboard" route="/dashboard"></tessera-fragment>
                 <tessera-fragment name="not-found" default></tessera-fragment>
               </tessera-layout>"#,
        )
        .unwrap();

    ws.tessera()
        .arg("routes")
        .arg(layout.path())
        .arg("/Dashboard/settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("nav\ndashboard"))
        .stdout(predicate::str::contains("not-found").not());

    ws.tessera()
        .arg("routes")
        .arg(layout.path())
        .arg("/elsewhere")
        .assert()
        .success()
        .stdout(predicate::str::contains("not-found"));
}

#[test]
fn routes_rejects_layout_without_container() {
    let ws = Workspace::new();
    let layout = ws.dir.child("broken.html");
    layout.write_str("<div></div>").unwrap();

    ws.tessera()
        .arg("routes")
        .arg(layout.path())
        .arg("/")
        .assert()
        .failure();
}

#[test]
fn devtools_toggle_persists() {
    let ws = Workspace::new();

    ws.tessera()
        .args(["devtools", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("off"));

    ws.tessera()
        .args(["devtools", "toggle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("on"));

    ws.tessera()
        .args(["devtools", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("on"));
}

#[test]
fn debug_reports_which_config_files_were_read() {
    let ws = Workspace::new().with_manifest(r#"{"imports": {}}"#);
    let global = ws.dir.child("config.toml");
    let project = ws.dir.child("tessera.toml");

    ws.tessera()
        .args(["--debug", "overrides", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains(format!(
            "global config: {}",
            global.path().display()
        )))
        .stderr(predicate::str::contains(format!(
            "project config: {}",
            project.path().display()
        )));
}
