//! engine::lifecycle
//!
//! Lifecycle hooks of the root app.
//!
//! Hooks are registered per [`LifecycleEvent`] and run concurrently when
//! the event fires; the trigger resolves once every hook has settled.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::debug;

use crate::layout::{ReconcileObserver, ReconcileReport};

/// Points in the root app's life that hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// After readiness, before the surface is attached.
    BeforeLaunch,
    /// The app is live.
    Launch,
    /// Before a reconciliation pass changes the surface.
    BeforeUpdate,
    /// After such a pass.
    Update,
    /// Before shutdown tears anything down.
    BeforeDestroy,
    /// After shutdown.
    Destroy,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::BeforeLaunch => "before-launch",
            LifecycleEvent::Launch => "launch",
            LifecycleEvent::BeforeUpdate => "before-update",
            LifecycleEvent::Update => "update",
            LifecycleEvent::BeforeDestroy => "before-destroy",
            LifecycleEvent::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// A registered hook.
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Hook registry.
#[derive(Default)]
pub struct LifecycleHooks {
    hooks: Mutex<HashMap<LifecycleEvent, Vec<LifecycleHook>>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `event`.
    pub fn on<F, Fut>(&self, event: LifecycleEvent, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: LifecycleHook = Arc::new(move || hook().boxed());
        self.hooks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(event)
            .or_default()
            .push(hook);
    }

    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Run every hook for `event` concurrently and wait for all of them.
    pub async fn trigger(&self, event: LifecycleEvent) {
        let hooks: Vec<LifecycleHook> = self
            .hooks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&event)
            .cloned()
            .unwrap_or_default();
        if hooks.is_empty() {
            return;
        }

        debug!(event = %event, count = hooks.len(), "running lifecycle hooks");
        join_all(hooks.iter().map(|hook| hook())).await;
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.lock().unwrap_or_else(|p| p.into_inner());
        let counts: HashMap<_, _> = hooks.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("LifecycleHooks")
            .field("hooks", &counts)
            .finish()
    }
}

#[async_trait]
impl ReconcileObserver for LifecycleHooks {
    async fn before_update(&self) {
        self.trigger(LifecycleEvent::BeforeUpdate).await;
    }

    async fn updated(&self, _report: &ReconcileReport) {
        self.trigger(LifecycleEvent::Update).await;
    }
}
