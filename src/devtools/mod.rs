//! devtools
//!
//! The privileged diagnostics surface.
//!
//! # Responsibilities
//!
//! - The overlay flag, persisted under [`DEVTOOLS_KEY`] and toggled with
//!   `Ctrl+Shift+D`; flips publish `DevtoolsActivated`/`DevtoolsDeactivated`
//! - Override editing with the `Devtools` call site
//! - A serializable diagnostics snapshot of the loader
//!
//! Rendering the overlay is left to the host.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::events::{Event, EventBus};
use crate::loader::{CallSite, LoadStatus, LoaderLog, ModuleLoader};
use crate::resolution::{Origin, ResolutionError};
use crate::store::{KvStore, StoreError, DEVTOOLS_KEY};

/// Errors from devtools operations.
#[derive(Debug, Error)]
pub enum DevtoolsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// A key press as the host reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// `Ctrl+Shift+D`, no other modifiers. The key is case-insensitive since
    /// Shift usually reports it upper-cased.
    pub fn is_toggle_shortcut(&self) -> bool {
        self.ctrl && self.shift && !self.alt && !self.meta && self.key.eq_ignore_ascii_case("d")
    }
}

/// The persisted overlay flag.
#[derive(Clone)]
pub struct DevtoolsFlag {
    store: Arc<dyn KvStore>,
    bus: Arc<EventBus>,
}

impl DevtoolsFlag {
    pub fn new(store: Arc<dyn KvStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Whether the overlay is on. Anything but `"true"` reads as off.
    pub fn is_active(&self) -> Result<bool, StoreError> {
        match self.store.get(DEVTOOLS_KEY)?.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => {
                warn!(value = other, "unrecognized devtools flag, treating as off");
                Ok(false)
            }
        }
    }

    /// Persist the flag and publish the change. Setting the current value
    /// again publishes nothing.
    pub fn set_active(&self, active: bool) -> Result<(), StoreError> {
        if self.is_active()? == active && self.store.exists(DEVTOOLS_KEY)? {
            return Ok(());
        }
        self.store
            .set(DEVTOOLS_KEY, if active { "true" } else { "false" })?;
        info!(active, "devtools toggled");
        self.bus.emit(if active {
            Event::DevtoolsActivated
        } else {
            Event::DevtoolsDeactivated
        });
        Ok(())
    }

    /// Flip the flag. Returns the new value.
    pub fn toggle(&self) -> Result<bool, StoreError> {
        let next = !self.is_active()?;
        self.set_active(next)?;
        Ok(next)
    }

    /// Toggle on the shortcut. Returns the new value if the key was the
    /// shortcut, `None` otherwise.
    pub fn handle_key(&self, key: &KeyEvent) -> Result<Option<bool>, StoreError> {
        if !key.is_toggle_shortcut() {
            return Ok(None);
        }
        self.toggle().map(Some)
    }
}

impl std::fmt::Debug for DevtoolsFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevtoolsFlag").finish_non_exhaustive()
    }
}

/// One row of the module table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDiagnostics {
    pub specifier: String,
    pub location: String,
    pub origin: Origin,
    pub status: LoadStatus,
}

/// Everything the overlay shows, at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub active: bool,
    pub modules: Vec<ModuleDiagnostics>,
    pub load_times: BTreeMap<String, f64>,
    pub errors: Vec<String>,
    pub overrides: BTreeMap<String, String>,
    pub logs: Vec<LoaderLog>,
}

/// The diagnostics surface over a live loader.
#[derive(Debug, Clone)]
pub struct Devtools {
    flag: DevtoolsFlag,
    loader: ModuleLoader,
}

impl Devtools {
    /// The flag publishes on the loader's bus.
    pub fn new(loader: ModuleLoader, store: Arc<dyn KvStore>) -> Self {
        let flag = DevtoolsFlag::new(store, loader.bus().clone());
        Self { flag, loader }
    }

    pub fn flag(&self) -> &DevtoolsFlag {
        &self.flag
    }

    pub fn handle_key(&self, key: &KeyEvent) -> Result<Option<bool>, DevtoolsError> {
        Ok(self.flag.handle_key(key)?)
    }

    pub fn set_override(&self, specifier: &str, location: &str) -> Result<(), DevtoolsError> {
        self.loader
            .set_override(&CallSite::Devtools, specifier, location)?;
        self.loader.push_log(
            LoaderLog::info(format!("override set for {}", specifier))
                .with_specifier(specifier)
                .with_override_url(Some(location.to_string())),
        );
        Ok(())
    }

    pub fn remove_override(&self, specifier: &str) -> Result<bool, DevtoolsError> {
        Ok(self
            .loader
            .remove_override(&CallSite::Devtools, specifier)?)
    }

    pub fn reset_overrides(&self) -> Result<(), DevtoolsError> {
        Ok(self.loader.reset_overrides(&CallSite::Devtools)?)
    }

    /// Snapshot the loader. Modules listed are the union of the tables and
    /// whatever the loader has seen.
    pub fn snapshot(&self) -> Result<DiagnosticsSnapshot, DevtoolsError> {
        let mut specifiers: Vec<String> = self
            .loader
            .base_table()
            .into_keys()
            .chain(self.loader.overrides().into_keys())
            .chain(self.loader.known_specifiers())
            .collect();
        specifiers.sort();
        specifiers.dedup();

        let modules = specifiers
            .into_iter()
            .map(|specifier| {
                let resolution = self.loader.resolve(&specifier);
                ModuleDiagnostics {
                    status: self.loader.status(&specifier),
                    location: resolution.location,
                    origin: resolution.origin,
                    specifier,
                }
            })
            .collect();

        Ok(DiagnosticsSnapshot {
            active: self.flag.is_active()?,
            modules,
            load_times: self.loader.load_times(),
            errors: self.loader.error_modules(),
            overrides: self.loader.overrides(),
            logs: self.loader.logs(),
        })
    }
}
