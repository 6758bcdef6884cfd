//! layout::reconciler
//!
//! Route-driven mount/unmount of declared slots.
//!
//! # Design
//!
//! The reconciler owns the declared slots and the live-instance registry
//! (`SlotId → LiveInstance`). A pass:
//!
//! 1. plans the set of slots that should be mounted (the group key)
//! 2. if the key is unchanged, only tells live fragments about the new path
//! 3. otherwise unmounts stale instances, then mounts new ones, both in
//!    declaration order
//!
//! One pass runs at a time. A navigation that arrives while a pass is
//! running (typically started by a fragment from inside its own `mount`) is
//! recorded and picked up by that pass before it returns, so nothing awaits
//! the pass re-entrantly. A failed mount is logged to the loader's retained
//! log and does not stop sibling slots; the slot is retried on the next key
//! change.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::slot::{plan, DeclaredSlot, SlotCapabilities};
use super::template::LayoutTemplate;
use crate::core::route::MatchOptions;
use crate::core::types::SlotId;
use crate::loader::{
    Fragment, FragmentError, LoaderError, LoaderLog, ModuleLoader, MountHandle, MountProps,
};
use crate::navigation::{NavigationListener, NavigationState};

/// Why a slot failed to mount.
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("module for '{name}' did not load")]
    Load {
        name: String,
        #[source]
        source: LoaderError,
    },

    #[error("fragment '{name}' failed")]
    Fragment {
        name: String,
        #[source]
        source: FragmentError,
    },
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub mounted: Vec<String>,
    pub unmounted: Vec<String>,
    /// Live fragments told about a new path.
    pub updated: Vec<String>,
    pub failed: Vec<String>,
    /// The group key was unchanged; no mount or unmount was attempted.
    pub skipped: bool,
    /// Another pass was running; it picks this navigation up when it ends.
    pub deferred: bool,
}

impl ReconcileReport {
    /// True if the pass added or removed anything from the surface.
    pub fn changed_surface(&self) -> bool {
        !self.mounted.is_empty() || !self.unmounted.is_empty()
    }

    /// Fold a later pass into this report.
    pub fn absorb(&mut self, later: ReconcileReport) {
        self.mounted.extend(later.mounted);
        self.unmounted.extend(later.unmounted);
        self.updated.extend(later.updated);
        self.failed.extend(later.failed);
        self.skipped = self.skipped && later.skipped;
        self.deferred = self.deferred && later.deferred;
    }
}

/// A mounted fragment.
pub struct LiveInstance {
    fragment: Arc<dyn Fragment>,
    handle: MountHandle,
    props: MountProps,
}

impl LiveInstance {
    pub fn props(&self) -> &MountProps {
        &self.props
    }
}

/// Observes passes that change the surface.
#[async_trait]
pub trait ReconcileObserver: Send + Sync {
    /// Called before the first mount or unmount of a pass.
    async fn before_update(&self);

    /// Called after such a pass completes.
    async fn updated(&self, report: &ReconcileReport);
}

/// Non-owning handle to the reconciler's readiness signal.
#[derive(Debug, Clone)]
pub struct Readiness(watch::Receiver<bool>);

impl Readiness {
    /// True once the first pass has completed.
    pub fn is_ready(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait for the first pass. Returns immediately if it already ran.
    pub async fn wait(&mut self) {
        // The reconciler owns the sender; if it is gone there is nothing to wait for.
        let _ = self.0.wait_for(|ready| *ready).await;
    }
}

/// The layout reconciler. Clones share state.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    loader: ModuleLoader,
    options: MatchOptions,
    pass: tokio::sync::Mutex<PassState>,
    ready: watch::Sender<bool>,
    observer: Mutex<Option<Arc<dyn ReconcileObserver>>>,
    queue: Mutex<PassQueue>,
}

#[derive(Default)]
struct PassQueue {
    running: bool,
    pending: Option<NavigationState>,
}

/// Releases the queue if a running pass is dropped before it finishes.
struct PassTicket<'a> {
    queue: &'a Mutex<PassQueue>,
    finished: bool,
}

impl Drop for PassTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
            queue.running = false;
            queue.pending = None;
        }
    }
}

struct Transitions {
    desired: Vec<SlotId>,
    unmount: Vec<usize>,
    mount: Vec<usize>,
    unchanged: bool,
}

struct PassState {
    slots: Vec<SlotState>,
    live: HashMap<SlotId, LiveInstance>,
    group_key: Option<Vec<SlotId>>,
}

struct SlotState {
    declared: DeclaredSlot,
    bootstrapped: bool,
}

impl Reconciler {
    /// Declare the slots of `template`, applying capabilities keyed by name.
    pub fn new(
        loader: ModuleLoader,
        template: &LayoutTemplate,
        capabilities: &HashMap<String, SlotCapabilities>,
        options: MatchOptions,
    ) -> Self {
        let slots = DeclaredSlot::declare_all(template.slots(), capabilities)
            .into_iter()
            .map(|declared| SlotState {
                declared,
                bootstrapped: false,
            })
            .collect();
        let (ready, _) = watch::channel(false);

        Self {
            inner: Arc::new(ReconcilerInner {
                loader,
                options,
                pass: tokio::sync::Mutex::new(PassState {
                    slots,
                    live: HashMap::new(),
                    group_key: None,
                }),
                ready,
                observer: Mutex::new(None),
                queue: Mutex::new(PassQueue::default()),
            }),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn ReconcileObserver>) {
        *self
            .inner
            .observer
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(observer);
    }

    pub fn readiness(&self) -> Readiness {
        Readiness(self.inner.ready.subscribe())
    }

    fn observer(&self) -> Option<Arc<dyn ReconcileObserver>> {
        self.inner
            .observer
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn queue(&self) -> MutexGuard<'_, PassQueue> {
        self.inner.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bring the surface in line with `state`.
    ///
    /// A call made while a pass is running (a fragment navigating from its
    /// `mount`, a hook reacting to an update) records `state` and returns a
    /// `deferred` report at once. The running pass then reconciles against
    /// the newest recorded state before it returns.
    pub async fn reconcile(&self, state: &NavigationState) -> ReconcileReport {
        {
            let mut queue = self.queue();
            if queue.running {
                debug!(path = %state.path, "pass in progress, deferring");
                queue.pending = Some(state.clone());
                return ReconcileReport {
                    deferred: true,
                    ..Default::default()
                };
            }
            queue.running = true;
        }
        let mut ticket = PassTicket {
            queue: &self.inner.queue,
            finished: false,
        };

        let mut report = self.run_pass(state).await;
        loop {
            let next = {
                let mut queue = self.queue();
                let next = queue.pending.take();
                if next.is_none() {
                    queue.running = false;
                    ticket.finished = true;
                }
                next
            };
            let Some(next) = next else {
                break;
            };
            debug!(path = %next.path, "running deferred pass");
            report.absorb(self.run_pass(&next).await);
        }

        self.inner.ready.send_replace(true);
        report
    }

    /// Unmount the live fragments named in `names` and mount them again.
    ///
    /// Used after their modules were replaced underneath a live page. The
    /// remounted slots bootstrap again since the module is new.
    pub async fn refresh(&self, names: &[String], state: &NavigationState) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        {
            let mut pass = self.inner.pass.lock().await;
            let stale: Vec<usize> = (0..pass.slots.len())
                .filter(|&i| {
                    let slot = &pass.slots[i].declared;
                    names.iter().any(|n| n == slot.name()) && pass.live.contains_key(&slot.id())
                })
                .collect();
            for i in stale {
                self.unmount_slot(&mut pass, i, &mut report).await;
                pass.slots[i].bootstrapped = false;
            }
            if !report.unmounted.is_empty() {
                pass.group_key = None;
            }
        }
        let later = self.reconcile(state).await;
        if report.unmounted.is_empty() {
            return later;
        }
        info!(refreshed = report.unmounted.len(), "stale fragments remounted");
        report.absorb(later);
        report
    }

    fn transitions(&self, pass: &PassState, state: &NavigationState) -> Transitions {
        let declared: Vec<DeclaredSlot> = pass.slots.iter().map(|s| s.declared.clone()).collect();
        let desired = plan(&declared, state, self.inner.options);

        let unmount = (0..pass.slots.len())
            .filter(|&i| {
                let id = pass.slots[i].declared.id();
                pass.live.contains_key(&id) && !desired.contains(&id)
            })
            .collect();
        let mount = (0..pass.slots.len())
            .filter(|&i| {
                let id = pass.slots[i].declared.id();
                desired.contains(&id) && !pass.live.contains_key(&id)
            })
            .collect();
        let unchanged = pass.group_key.as_ref() == Some(&desired);

        Transitions {
            desired,
            unmount,
            mount,
            unchanged,
        }
    }

    async fn run_pass(&self, state: &NavigationState) -> ReconcileReport {
        // The observer runs without the pass lock so it may inspect the layout.
        let observer = {
            let pass = self.inner.pass.lock().await;
            let planned = self.transitions(&pass, state);
            if planned.unchanged || (planned.unmount.is_empty() && planned.mount.is_empty()) {
                None
            } else {
                self.observer()
            }
        };
        if let Some(observer) = &observer {
            observer.before_update().await;
        }

        let mut pass = self.inner.pass.lock().await;
        let planned = self.transitions(&pass, state);
        let mut report = ReconcileReport::default();

        if planned.unchanged {
            report.skipped = true;
            self.update_live(&mut pass, state, &mut report).await;
        } else {
            debug!(
                path = %state.path,
                unmount = planned.unmount.len(),
                mount = planned.mount.len(),
                "reconciling layout"
            );
            for i in planned.unmount {
                self.unmount_slot(&mut pass, i, &mut report).await;
            }
            self.update_live(&mut pass, state, &mut report).await;
            for i in planned.mount {
                self.mount_slot(&mut pass, i, state, &mut report).await;
            }
            pass.group_key = Some(planned.desired);
        }
        drop(pass);

        if let Some(observer) = &observer {
            observer.updated(&report).await;
        }
        report
    }

    async fn mount_slot(
        &self,
        pass: &mut PassState,
        index: usize,
        state: &NavigationState,
        report: &mut ReconcileReport,
    ) {
        let declared = pass.slots[index].declared.clone();
        let name = declared.name().to_string();

        match self.start_instance(pass, index, &declared, state).await {
            Ok(instance) => {
                info!(slot = %declared.id(), fragment = %name, "fragment mounted");
                pass.live.insert(declared.id(), instance);
                report.mounted.push(name);
            }
            Err(err) => {
                error!(slot = %declared.id(), fragment = %name, error = %err, "fragment mount failed");
                self.inner.loader.push_log(
                    LoaderLog::error(format!("failed to mount {}", name))
                        .with_specifier(name.clone())
                        .with_trace(&err),
                );
                report.failed.push(name);
            }
        }
    }

    async fn start_instance(
        &self,
        pass: &mut PassState,
        index: usize,
        declared: &DeclaredSlot,
        state: &NavigationState,
    ) -> Result<LiveInstance, SlotError> {
        let name = declared.name().to_string();
        let fragment = self
            .inner
            .loader
            .load(&name)
            .await
            .map_err(|source| SlotError::Load {
                name: name.clone(),
                source,
            })?;

        let wrap = |source| SlotError::Fragment {
            name: name.clone(),
            source,
        };

        if !pass.slots[index].bootstrapped {
            fragment.bootstrap().await.map_err(wrap)?;
            pass.slots[index].bootstrapped = true;
        }

        let props = MountProps {
            name: name.clone(),
            route: declared.route.clone(),
            path: state.path.clone(),
            anchor: declared.template.anchor.clone(),
        };
        let handle = fragment.mount(props.clone()).await.map_err(wrap)?;
        Ok(LiveInstance {
            fragment,
            handle,
            props,
        })
    }

    async fn unmount_slot(&self, pass: &mut PassState, index: usize, report: &mut ReconcileReport) {
        let declared = pass.slots[index].declared.clone();
        let Some(instance) = pass.live.remove(&declared.id()) else {
            return;
        };
        let name = declared.name().to_string();

        if let Err(err) = instance.fragment.unmount(instance.handle).await {
            let err = SlotError::Fragment {
                name: name.clone(),
                source: err,
            };
            warn!(fragment = %name, error = %err, "fragment unmount failed");
            self.inner.loader.push_log(
                LoaderLog::warn(format!("failed to unmount {}", name))
                    .with_specifier(name.clone())
                    .with_trace(&err),
            );
        }
        info!(slot = %declared.id(), fragment = %name, "fragment unmounted");

        // Another live slot may still be using the same module.
        let still_used = pass.slots.iter().any(|s| {
            s.declared.name() == name && pass.live.contains_key(&s.declared.id())
        });
        if declared.is_routed() && !still_used {
            self.inner.loader.unload(&name);
        }
        report.unmounted.push(name);
    }

    async fn update_live(
        &self,
        pass: &mut PassState,
        state: &NavigationState,
        report: &mut ReconcileReport,
    ) {
        let order: Vec<SlotId> = pass.slots.iter().map(|s| s.declared.id()).collect();
        for id in order {
            let Some(instance) = pass.live.get_mut(&id) else {
                continue;
            };
            if instance.props.path == state.path {
                continue;
            }
            instance.props.path = state.path.clone();
            let props = instance.props.clone();
            if let Err(err) = instance.fragment.update(&instance.handle, props).await {
                warn!(fragment = %instance.props.name, error = %err, "fragment update failed");
                self.inner.loader.push_log(
                    LoaderLog::warn(format!("failed to update {}", instance.props.name))
                        .with_specifier(instance.props.name.clone())
                        .with_trace(&err),
                );
            }
            report.updated.push(instance.props.name.clone());
        }
    }

    /// Unmount every live instance and forget all slots.
    pub async fn teardown(&self) -> ReconcileReport {
        let mut pass = self.inner.pass.lock().await;
        let mut report = ReconcileReport::default();
        for i in 0..pass.slots.len() {
            self.unmount_slot(&mut pass, i, &mut report).await;
        }
        pass.slots.clear();
        pass.live.clear();
        pass.group_key = None;
        info!(unmounted = report.unmounted.len(), "layout torn down");
        report
    }

    /// Names of mounted fragments, in declaration order.
    pub async fn mounted(&self) -> Vec<String> {
        let pass = self.inner.pass.lock().await;
        pass.slots
            .iter()
            .filter(|s| pass.live.contains_key(&s.declared.id()))
            .map(|s| s.declared.name().to_string())
            .collect()
    }

    /// Mount props of every live instance, in declaration order.
    pub async fn live_props(&self) -> Vec<MountProps> {
        let pass = self.inner.pass.lock().await;
        pass.slots
            .iter()
            .filter_map(|s| pass.live.get(&s.declared.id()))
            .map(|l| l.props.clone())
            .collect()
    }

    /// Declared slots, in declaration order.
    pub async fn slots(&self) -> Vec<DeclaredSlot> {
        let pass = self.inner.pass.lock().await;
        pass.slots.iter().map(|s| s.declared.clone()).collect()
    }
}

#[async_trait]
impl NavigationListener for Reconciler {
    async fn navigated(&self, state: &NavigationState) {
        let report = self.reconcile(state).await;
        debug!(
            path = %state.path,
            mounted = report.mounted.len(),
            unmounted = report.unmounted.len(),
            skipped = report.skipped,
            "navigation reconciled"
        );
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::EventBus;
    use crate::loader::mock::{MockFetcher, MockFragment};
    use crate::loader::{LoadStatus, LogKind};
    use crate::resolution::{ImportMap, ResolutionTable};
    use crate::store::MemoryStore;

    const TEMPLATE: &str = r#"
        <tessera-layout>
          <nav><tessera-fragment name="nav"></tessera-fragment></nav>
          <main>
            <tessera-fragment name="dashboard" route="/dashboard"></tessera-fragment>
            <tessera-fragment name="settings" route="/dashboard/settings"></tessera-fragment>
            <tessera-fragment name="not-found" default></tessera-fragment>
          </main>
        </tessera-layout>
    "#;

    struct Fixture {
        fetcher: MockFetcher,
        loader: ModuleLoader,
        fragments: HashMap<&'static str, MockFragment>,
    }

    impl Fixture {
        fn new() -> Self {
            let fetcher = MockFetcher::new();
            let mut pairs = Vec::new();
            let mut fragments = HashMap::new();
            for name in ["nav", "dashboard", "settings", "not-found"] {
                let url = format!("https://cdn.example.com/{}.js", name);
                let fragment = MockFragment::new(name);
                fetcher.add_module(&url, Arc::new(fragment.clone()));
                fragments.insert(name, fragment);
                pairs.push((name.to_string(), url));
            }
            let table = ResolutionTable::new(
                ImportMap::from_pairs(pairs),
                Arc::new(MemoryStore::new()),
            )
            .unwrap();
            let loader = ModuleLoader::builder(Arc::new(fetcher.clone()), table)
                .bus(Arc::new(EventBus::new()))
                .build();
            Self {
                fetcher,
                loader,
                fragments,
            }
        }

        fn reconciler(&self) -> Reconciler {
            self.reconciler_with(HashMap::new())
        }

        fn reconciler_with(&self, caps: HashMap<String, SlotCapabilities>) -> Reconciler {
            let template = LayoutTemplate::parse(TEMPLATE).unwrap();
            Reconciler::new(self.loader.clone(), &template, &caps, MatchOptions::default())
        }

        fn fragment(&self, name: &str) -> &MockFragment {
            &self.fragments[name]
        }
    }

    fn at(path: &str) -> NavigationState {
        NavigationState::from_path(path).unwrap()
    }

    #[tokio::test]
    async fn nested_route_mounts_both_routed_slots() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        let report = reconciler.reconcile(&at("/dashboard/settings")).await;

        assert_eq!(report.mounted, vec!["nav", "dashboard", "settings"]);
        assert!(!fx.fragment("not-found").is_mounted());
    }

    #[tokio::test]
    async fn unknown_path_mounts_default_only() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/unknown")).await;
        assert_eq!(reconciler.mounted().await, vec!["nav", "not-found"]);
    }

    #[tokio::test]
    async fn default_is_unmounted_when_a_route_matches() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/unknown")).await;
        let report = reconciler.reconcile(&at("/dashboard")).await;

        assert_eq!(report.unmounted, vec!["not-found"]);
        assert_eq!(report.mounted, vec!["dashboard"]);
        assert_eq!(fx.fragment("nav").mount_count(), 1);
    }

    #[tokio::test]
    async fn in_group_navigation_only_updates() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/dashboard/a")).await;
        let report = reconciler.reconcile(&at("/dashboard/b")).await;

        assert!(report.skipped);
        assert!(!report.changed_surface());
        assert_eq!(fx.fragment("dashboard").mount_count(), 1);
        assert_eq!(fx.fragment("dashboard").unmount_count(), 0);
        assert_eq!(fx.fragment("dashboard").update_count(), 1);
    }

    #[tokio::test]
    async fn repeat_pass_does_nothing() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/dashboard")).await;
        let calls_before = fx.fragment("dashboard").calls().len();
        let report = reconciler.reconcile(&at("/dashboard")).await;

        assert!(report.skipped);
        assert!(report.updated.is_empty());
        assert_eq!(fx.fragment("dashboard").calls().len(), calls_before);
    }

    #[tokio::test]
    async fn routed_unmount_unloads_module() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/dashboard")).await;
        assert!(matches!(
            fx.loader.status("dashboard"),
            LoadStatus::Loaded { .. }
        ));

        reconciler.reconcile(&at("/elsewhere")).await;
        assert_eq!(fx.loader.status("dashboard"), LoadStatus::Idle);
        assert!(
            matches!(fx.loader.status("nav"), LoadStatus::Loaded { .. }),
            "persistent slot stays loaded"
        );
    }

    #[tokio::test]
    async fn bootstrap_runs_once_per_slot() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        reconciler.reconcile(&at("/dashboard")).await;
        reconciler.reconcile(&at("/x")).await;
        reconciler.reconcile(&at("/dashboard")).await;

        let dashboard = fx.fragment("dashboard");
        assert_eq!(dashboard.bootstrap_count(), 1);
        assert_eq!(dashboard.mount_count(), 2);
    }

    #[tokio::test]
    async fn failed_mount_does_not_block_siblings() {
        let fx = Fixture::new();
        fx.fragment("dashboard").fail_mount("render exploded");
        let reconciler = fx.reconciler();

        let report = reconciler.reconcile(&at("/dashboard/settings")).await;

        assert_eq!(report.failed, vec!["dashboard"]);
        assert_eq!(report.mounted, vec!["nav", "settings"]);
        let last_error = fx
            .loader
            .logs()
            .into_iter()
            .rev()
            .find(|l| l.kind == LogKind::Error)
            .unwrap();
        assert!(last_error.trace.unwrap().contains("render exploded"));
    }

    #[tokio::test]
    async fn failed_mount_retries_on_next_key_change() {
        let fx = Fixture::new();
        fx.fragment("dashboard").fail_mount("flaky");
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        fx.fragment("dashboard").heal();
        reconciler.reconcile(&at("/dashboard/settings")).await;

        assert!(fx.fragment("dashboard").is_mounted());
    }

    #[tokio::test]
    async fn load_failure_is_reported_as_failed() {
        let fx = Fixture::new();
        fx.fetcher.fail(
            "https://cdn.example.com/dashboard.js",
            crate::loader::FetchError::Network("offline".into()),
        );
        let reconciler = fx.reconciler();

        let report = reconciler.reconcile(&at("/dashboard")).await;
        assert_eq!(report.failed, vec!["dashboard"]);
        assert_eq!(fx.loader.status("dashboard"), LoadStatus::Error);
    }

    #[tokio::test]
    async fn should_mount_capability_is_applied() {
        let fx = Fixture::new();
        let mut caps = HashMap::new();
        caps.insert(
            "nav".to_string(),
            SlotCapabilities::new().should_mount(|s| !s.path.starts_with("/print")),
        );
        let reconciler = fx.reconciler_with(caps);

        reconciler.reconcile(&at("/print/invoice")).await;
        assert!(!fx.fragment("nav").is_mounted());
    }

    #[tokio::test]
    async fn readiness_is_set_after_first_pass() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let mut readiness = reconciler.readiness();
        assert!(!readiness.is_ready());

        let r = reconciler.clone();
        tokio::spawn(async move {
            r.reconcile(&at("/")).await;
        });
        readiness.wait().await;
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn teardown_unmounts_everything() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        let report = reconciler.teardown().await;

        assert_eq!(report.unmounted, vec!["nav", "dashboard"]);
        assert!(reconciler.mounted().await.is_empty());
        assert!(reconciler.slots().await.is_empty());
    }

    #[tokio::test]
    async fn mounts_receive_anchor_and_route() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        let props = reconciler.live_props().await;
        let dashboard = props.iter().find(|p| p.name == "dashboard").unwrap();
        assert_eq!(dashboard.route.as_deref(), Some("/dashboard"));
        assert_eq!(dashboard.anchor.parent, "tessera-layout > main[1]");
        assert_eq!(dashboard.path, "/dashboard");
    }

    #[derive(Default)]
    struct CountingObserver {
        before: Mutex<usize>,
        after: Mutex<usize>,
    }

    #[async_trait]
    impl ReconcileObserver for CountingObserver {
        async fn before_update(&self) {
            *self.before.lock().unwrap() += 1;
        }
        async fn updated(&self, _report: &ReconcileReport) {
            *self.after.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn observer_sees_only_surface_changes() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let observer = Arc::new(CountingObserver::default());
        reconciler.set_observer(observer.clone());

        reconciler.reconcile(&at("/dashboard")).await;
        reconciler.reconcile(&at("/dashboard/x")).await;

        assert_eq!(*observer.before.lock().unwrap(), 1);
        assert_eq!(*observer.after.lock().unwrap(), 1);
    }

    /// Navigates somewhere else from inside its own mount.
    #[derive(Clone)]
    struct Redirector {
        target: &'static str,
        reconciler: Arc<Mutex<Option<Reconciler>>>,
        deferred: Arc<Mutex<Vec<bool>>>,
    }

    #[async_trait]
    impl Fragment for Redirector {
        async fn mount(&self, _props: MountProps) -> Result<MountHandle, FragmentError> {
            let reconciler = self.reconciler.lock().unwrap().clone();
            if let Some(reconciler) = reconciler {
                let report = reconciler.reconcile(&at(self.target)).await;
                self.deferred.lock().unwrap().push(report.deferred);
            }
            Ok(MountHandle::empty())
        }

        async fn unmount(&self, _handle: MountHandle) -> Result<(), FragmentError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn navigation_from_inside_mount_runs_after_the_pass() {
        let fx = Fixture::new();
        let slot = Arc::new(Mutex::new(None));
        let redirector = Redirector {
            target: "/elsewhere",
            reconciler: slot.clone(),
            deferred: Arc::new(Mutex::new(Vec::new())),
        };
        fx.fetcher.add_module(
            "https://cdn.example.com/dashboard.js",
            Arc::new(redirector.clone()),
        );
        let reconciler = fx.reconciler();
        *slot.lock().unwrap() = Some(reconciler.clone());

        let report = tokio::time::timeout(
            Duration::from_secs(3),
            reconciler.reconcile(&at("/dashboard")),
        )
        .await
        .expect("pass did not finish");

        assert_eq!(*redirector.deferred.lock().unwrap(), vec![true]);
        assert_eq!(report.mounted, vec!["nav", "dashboard", "not-found"]);
        assert_eq!(report.unmounted, vec!["dashboard"]);
        assert!(!report.deferred);
        assert_eq!(reconciler.mounted().await, vec!["nav", "not-found"]);
    }

    struct Inspector {
        reconciler: Reconciler,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ReconcileObserver for Inspector {
        async fn before_update(&self) {
            let mounted = self.reconciler.mounted().await;
            self.seen.lock().unwrap().push(mounted);
        }
        async fn updated(&self, _report: &ReconcileReport) {}
    }

    #[tokio::test]
    async fn observer_can_inspect_layout_before_update() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        let inspector = Arc::new(Inspector {
            reconciler: reconciler.clone(),
            seen: Mutex::new(Vec::new()),
        });
        reconciler.set_observer(inspector.clone());

        tokio::time::timeout(Duration::from_secs(3), reconciler.reconcile(&at("/elsewhere")))
            .await
            .expect("pass did not finish");

        assert_eq!(
            *inspector.seen.lock().unwrap(),
            vec![vec!["nav".to_string(), "dashboard".to_string()]]
        );
    }

    #[tokio::test]
    async fn refresh_remounts_named_fragments_only() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        let report = reconciler
            .refresh(&["nav".to_string()], &at("/dashboard"))
            .await;

        assert_eq!(report.unmounted, vec!["nav"]);
        assert_eq!(report.mounted, vec!["nav"]);
        assert_eq!(fx.fragment("nav").mount_count(), 2);
        assert_eq!(fx.fragment("nav").bootstrap_count(), 2);
        assert_eq!(fx.fragment("dashboard").mount_count(), 1);
        assert_eq!(reconciler.mounted().await, vec!["nav", "dashboard"]);
    }

    #[tokio::test]
    async fn refresh_of_unmounted_name_changes_nothing() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.reconcile(&at("/dashboard")).await;

        let report = reconciler
            .refresh(&["settings".to_string()], &at("/dashboard"))
            .await;

        assert!(report.skipped);
        assert!(!report.changed_surface());
    }
}
