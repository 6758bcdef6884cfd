//! navigation::interceptor
//!
//! The single choke point every navigation goes through.
//!
//! # Design
//!
//! [`Navigator`] owns the raw [`History`] primitives. With nothing installed
//! it forwards straight to them. [`Navigator::install`] arms an interceptor
//! (a middleware chain plus an optional listener) and returns an
//! [`InterceptorGuard`]. While the guard lives:
//!
//! - `push`/`replace` run the chain first; a denied navigation never
//!   touches the primitive, so the displayed path is unchanged
//! - a pop (back/forward, reported by the host after the fact) that is
//!   denied is undone by replacing the current entry with the last
//!   known-good one
//! - accepted navigations are published and handed to the listener
//!
//! Dropping the guard restores the unwrapped primitives, so restoration
//! happens even if `disconnect` is never called.

use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::history::{History, HistoryEntry};
use super::middleware::{ChainVerdict, MiddlewareChain, NavigationKind, NavigationTarget};
use super::{NavigationError, NavigationListener, NavigationState};
use crate::events::{Event, EventBus};

/// Result of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The primitive was called.
    Committed,
    /// Middleware rejected the navigation.
    Denied { by: String },
    /// Handed to the host as a full-page navigation.
    External,
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, NavigationOutcome::Committed | NavigationOutcome::External)
    }
}

/// History wrapper with an installable interceptor. Clones share state.
#[derive(Clone)]
pub struct Navigator {
    shared: Arc<NavigatorShared>,
}

struct NavigatorShared {
    history: Arc<dyn History>,
    bus: Arc<EventBus>,
    armed: RwLock<Option<Arc<Armed>>>,
    generation: Mutex<u64>,
}

struct Armed {
    generation: u64,
    chain: MiddlewareChain,
    listener: Option<Arc<dyn NavigationListener>>,
    last_good: Mutex<HistoryEntry>,
}

/// Keeps the interceptor installed. Dropping it restores the primitives.
#[must_use = "the interceptor is removed when the guard is dropped"]
pub struct InterceptorGuard {
    shared: Weak<NavigatorShared>,
    generation: u64,
}

impl InterceptorGuard {
    /// Restore the unwrapped primitives now.
    pub fn disconnect(self) {
        // Drop does the work.
    }
}

impl Drop for InterceptorGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut armed = shared.armed.write().unwrap_or_else(|p| p.into_inner());
            // A newer install owns the slot; leave it alone.
            if armed.as_ref().map(|a| a.generation) == Some(self.generation) {
                *armed = None;
                debug!("navigation interceptor removed");
            }
        }
    }
}

impl Navigator {
    pub fn new(history: Arc<dyn History>, bus: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(NavigatorShared {
                history,
                bus,
                armed: RwLock::new(None),
                generation: Mutex::new(0),
            }),
        }
    }

    /// Arm the interceptor. Replaces any interceptor already installed.
    pub fn install(
        &self,
        chain: MiddlewareChain,
        listener: Option<Arc<dyn NavigationListener>>,
    ) -> InterceptorGuard {
        let generation = {
            let mut g = self
                .shared
                .generation
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            *g += 1;
            *g
        };
        let armed = Arc::new(Armed {
            generation,
            chain,
            listener,
            last_good: Mutex::new(self.shared.history.current()),
        });
        *self
            .shared
            .armed
            .write()
            .unwrap_or_else(|p| p.into_inner()) = Some(armed);
        debug!(generation, "navigation interceptor installed");

        InterceptorGuard {
            shared: Arc::downgrade(&self.shared),
            generation,
        }
    }

    /// True while an interceptor is installed.
    pub fn is_intercepted(&self) -> bool {
        self.armed().is_some()
    }

    fn armed(&self) -> Option<Arc<Armed>> {
        self.shared
            .armed
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The entry currently displayed.
    pub fn current(&self) -> HistoryEntry {
        self.shared.history.current()
    }

    /// Current navigation state.
    pub fn state(&self) -> NavigationState {
        NavigationState::from_url(&self.current().url)
    }

    /// Push a new entry.
    pub async fn push(&self, url: &Url, state: Option<Value>) -> NavigationOutcome {
        self.navigate(NavigationKind::Push, url, state).await
    }

    /// Replace the current entry.
    pub async fn replace(&self, url: &Url, state: Option<Value>) -> NavigationOutcome {
        self.navigate(NavigationKind::Replace, url, state).await
    }

    async fn navigate(
        &self,
        kind: NavigationKind,
        url: &Url,
        state: Option<Value>,
    ) -> NavigationOutcome {
        let Some(armed) = self.armed() else {
            self.apply(kind, state, url);
            return NavigationOutcome::Committed;
        };

        let from = self.current().url;
        let target = NavigationTarget {
            from,
            to: url.clone(),
            kind,
        };
        if let Some(denied) = self.gate(&armed, &target).await {
            return denied;
        }

        self.apply(kind, state.clone(), url);
        self.commit(&armed, &target, state).await;
        NavigationOutcome::Committed
    }

    /// Report a back/forward step that has already changed the current entry.
    ///
    /// If middleware rejects it, the current entry is replaced with the last
    /// known-good one.
    pub async fn handle_pop(&self) -> NavigationOutcome {
        let Some(armed) = self.armed() else {
            return NavigationOutcome::Committed;
        };

        let last_good = armed
            .last_good
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let current = self.current();
        let target = NavigationTarget {
            from: last_good.url.clone(),
            to: current.url.clone(),
            kind: NavigationKind::Pop,
        };

        if let Some(denied) = self.gate(&armed, &target).await {
            self.shared
                .history
                .replace_state(last_good.state, &last_good.url);
            return denied;
        }

        self.commit(&armed, &target, current.state).await;
        NavigationOutcome::Committed
    }

    /// Navigate to `target`, resolved against the current URL.
    ///
    /// - hash-only or same path+query: `replace` (only the fragment changes)
    /// - another origin: full-page navigation after the gate
    /// - anything else: `push`
    pub async fn navigate_to_url(&self, target: &str) -> Result<NavigationOutcome, NavigationError> {
        let current = self.current().url;
        let destination = current
            .join(target)
            .map_err(|e| NavigationError::InvalidTarget {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if destination.origin() != current.origin() {
            return Ok(self.external(current, destination).await);
        }

        let same_document = target.starts_with('#')
            || (destination.path() == current.path() && destination.query() == current.query());
        if same_document {
            Ok(self.replace(&destination, None).await)
        } else {
            Ok(self.push(&destination, None).await)
        }
    }

    async fn external(&self, from: Url, to: Url) -> NavigationOutcome {
        if let Some(armed) = self.armed() {
            let target = NavigationTarget {
                from,
                to: to.clone(),
                kind: NavigationKind::External,
            };
            if let Some(denied) = self.gate(&armed, &target).await {
                return denied;
            }
        }
        debug!(url = %to, "leaving for another origin");
        self.shared.history.assign(&to);
        NavigationOutcome::External
    }

    /// Publish the request and run the chain. `Some` means denied.
    async fn gate(&self, armed: &Armed, target: &NavigationTarget) -> Option<NavigationOutcome> {
        self.shared.bus.emit(Event::NavigationRequested {
            from: target.from.to_string(),
            to: target.to.to_string(),
        });

        match armed.chain.check(target).await {
            ChainVerdict::Allow => None,
            ChainVerdict::Deny { by } => {
                warn!(
                    from = %target.from,
                    to = %target.to,
                    middleware = %by,
                    "navigation denied"
                );
                self.shared.bus.emit(Event::NavigationDenied {
                    from: target.from.to_string(),
                    to: target.to.to_string(),
                });
                Some(NavigationOutcome::Denied { by })
            }
        }
    }

    async fn commit(&self, armed: &Armed, target: &NavigationTarget, state: Option<Value>) {
        *armed.last_good.lock().unwrap_or_else(|p| p.into_inner()) = HistoryEntry {
            url: target.to.clone(),
            state,
        };
        self.shared.bus.emit(Event::NavigationCommitted {
            from: target.from.to_string(),
            to: target.to.to_string(),
        });
        if let Some(listener) = &armed.listener {
            listener
                .navigated(&NavigationState::from_url(&target.to))
                .await;
        }
    }

    fn apply(&self, kind: NavigationKind, state: Option<Value>, url: &Url) {
        match kind {
            NavigationKind::Replace => self.shared.history.replace_state(state, url),
            _ => self.shared.history.push_state(state, url),
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::navigation::history::MemoryHistory;
    use crate::navigation::middleware::middleware_fn;
    use async_trait::async_trait;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn setup() -> (MemoryHistory, Navigator, Arc<EventBus>) {
        let history = MemoryHistory::new(url("http://app/home"));
        let bus = Arc::new(EventBus::new());
        let navigator = Navigator::new(Arc::new(history.clone()), bus.clone());
        (history, navigator, bus)
    }

    fn no_admin() -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(middleware_fn("no-admin", |t| {
            !t.path().starts_with("/admin")
        })));
        chain
    }

    #[derive(Default)]
    struct RecordingListener {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NavigationListener for RecordingListener {
        async fn navigated(&self, state: &NavigationState) {
            self.paths.lock().unwrap().push(state.path.clone());
        }
    }

    #[tokio::test]
    async fn unarmed_navigator_forwards_directly() {
        let (history, navigator, _bus) = setup();
        let outcome = navigator.push(&url("http://app/admin"), None).await;

        assert_eq!(outcome, NavigationOutcome::Committed);
        assert_eq!(history.path(), "/admin");
    }

    #[tokio::test]
    async fn denied_push_leaves_path_unchanged() {
        let (history, navigator, bus) = setup();
        let denied = Arc::new(Mutex::new(0));
        let d = denied.clone();
        bus.on(Topic::NavigationDenied, move |_| *d.lock().unwrap() += 1);

        let _guard = navigator.install(no_admin(), None);
        let outcome = navigator.push(&url("http://app/admin"), None).await;

        assert!(matches!(outcome, NavigationOutcome::Denied { .. }));
        assert_eq!(history.path(), "/home");
        assert_eq!(history.push_count(), 0);
        assert_eq!(*denied.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn allowed_push_reaches_listener() {
        let (history, navigator, _bus) = setup();
        let listener = Arc::new(RecordingListener::default());
        let _guard = navigator.install(no_admin(), Some(listener.clone()));

        navigator.push(&url("http://app/dashboard"), None).await;

        assert_eq!(history.path(), "/dashboard");
        assert_eq!(listener.paths.lock().unwrap().as_slice(), &["/dashboard"]);
    }

    #[tokio::test]
    async fn denied_pop_restores_last_good_entry() {
        let (history, navigator, _bus) = setup();
        history.push_state(None, &url("http://app/admin"));
        history.push_state(None, &url("http://app/reports"));

        let _guard = navigator.install(no_admin(), None);
        history.back();
        assert_eq!(history.path(), "/admin");

        let outcome = navigator.handle_pop().await;
        assert!(matches!(outcome, NavigationOutcome::Denied { .. }));
        assert_eq!(history.path(), "/reports");
    }

    #[tokio::test]
    async fn dropping_guard_restores_primitives() {
        let (history, navigator, _bus) = setup();
        {
            let _guard = navigator.install(no_admin(), None);
            assert!(navigator.is_intercepted());
        }
        assert!(!navigator.is_intercepted());

        navigator.push(&url("http://app/admin"), None).await;
        assert_eq!(history.path(), "/admin");
    }

    #[tokio::test]
    async fn stale_guard_does_not_remove_newer_install() {
        let (_history, navigator, _bus) = setup();
        let first = navigator.install(MiddlewareChain::new(), None);
        let _second = navigator.install(no_admin(), None);

        first.disconnect();
        assert!(navigator.is_intercepted());
    }

    #[tokio::test]
    async fn hash_only_target_replaces() {
        let (history, navigator, _bus) = setup();
        let _guard = navigator.install(MiddlewareChain::new(), None);

        navigator.navigate_to_url("#section").await.unwrap();

        assert_eq!(history.replace_count(), 1);
        assert_eq!(history.push_count(), 0);
        assert_eq!(history.current().url.fragment(), Some("section"));
    }

    #[tokio::test]
    async fn other_path_pushes() {
        let (history, navigator, _bus) = setup();
        navigator.navigate_to_url("/settings?tab=1").await.unwrap();
        assert_eq!(history.push_count(), 1);
        assert_eq!(history.path(), "/settings");
    }

    #[tokio::test]
    async fn other_origin_is_assigned_after_gate() {
        let (history, navigator, _bus) = setup();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(middleware_fn("stay", |t| {
            t.kind != NavigationKind::External || t.to.host_str() == Some("docs.example.com")
        })));
        let _guard = navigator.install(chain, None);

        let denied = navigator
            .navigate_to_url("https://evil.example.com/")
            .await
            .unwrap();
        assert!(matches!(denied, NavigationOutcome::Denied { .. }));
        assert!(history.assigned().is_empty());

        let outcome = navigator
            .navigate_to_url("https://docs.example.com/guide")
            .await
            .unwrap();
        assert_eq!(outcome, NavigationOutcome::External);
        assert_eq!(history.assigned().len(), 1);
        assert_eq!(history.path(), "/home");
    }

    #[tokio::test]
    async fn committed_navigation_is_published() {
        let (_history, navigator, bus) = setup();
        let topics = Arc::new(Mutex::new(Vec::new()));
        let t = topics.clone();
        bus.on_any(move |e| t.lock().unwrap().push(e.topic()));

        let _guard = navigator.install(MiddlewareChain::new(), None);
        navigator.push(&url("http://app/a"), None).await;

        assert_eq!(
            topics.lock().unwrap().as_slice(),
            &[Topic::NavigationRequested, Topic::NavigationCommitted]
        );
    }
}
