//! engine::root
//!
//! The root lifecycle controller.
//!
//! # State machine
//!
//! ```text
//! Uninitialized -> EngineStarting -> EngineReady -> Launching -> Live
//!                                                                  |
//!                                                               Destroyed
//! ```
//!
//! - `start_engine` wires the resolution table, injects stylesheets and
//!   registers the layout tags concurrently, then starts the first
//!   reconciliation pass in the background. Calling it again warns and
//!   does nothing.
//! - `launch` requires `EngineReady`. It waits for the first pass, runs
//!   before-launch hooks, attaches the surface, arms the navigation
//!   interceptor with the middleware chain and goes live. Launching twice
//!   warns and does nothing.
//! - `shutdown` restores the navigation primitives first, then tears the
//!   layout down.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::host::{Host, HostError};
use super::lifecycle::{LifecycleEvent, LifecycleHooks};
use super::wiring::{ManifestSource, WiringError};
use crate::core::config::DEFAULT_BASE_URL;
use crate::core::route::MatchOptions;
use crate::events::{Event, SubscriptionId, Topic};
use crate::layout::{
    LayoutTemplate, Readiness, ReconcileReport, Reconciler, SlotCapabilities, SlotTemplate,
    TemplateError, FRAGMENT_TAG, LAYOUT_TAG,
};
use crate::loader::{LoaderLog, ModuleLoader};
use crate::navigation::{InterceptorGuard, MiddlewareChain, Navigator, RouteMiddleware};

/// Where the root app is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Uninitialized,
    EngineStarting,
    EngineReady,
    Launching,
    Live,
    Destroyed,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Uninitialized => "uninitialized",
            AppState::EngineStarting => "engine starting",
            AppState::EngineReady => "engine ready",
            AppState::Launching => "launching",
            AppState::Live => "live",
            AppState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Errors from the root app.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid layout: {0}")]
    Template(#[from] TemplateError),

    #[error("engine wiring failed: {0}")]
    Wiring(#[from] WiringError),

    #[error(transparent)]
    Host(#[from] HostError),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while the app is {state}")]
    NotReady {
        operation: &'static str,
        state: AppState,
    },
}

/// The root app.
pub struct RootApp {
    template: LayoutTemplate,
    loader: ModuleLoader,
    host: Arc<dyn Host>,
    navigator: Navigator,
    manifest: Arc<dyn ManifestSource>,
    options: MatchOptions,
    hooks: Arc<LifecycleHooks>,
    middleware: Mutex<MiddlewareChain>,
    capabilities: Mutex<HashMap<String, SlotCapabilities>>,
    state: Mutex<AppState>,
    reconciler: Mutex<Option<Reconciler>>,
    guard: Mutex<Option<InterceptorGuard>>,
    denied_subscription: Mutex<Option<SubscriptionId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl RootApp {
    /// Create the app from a layout template.
    ///
    /// The template is scanned here; a missing layout container or a
    /// nameless placeholder fails construction.
    pub fn new(
        layout: &str,
        loader: ModuleLoader,
        host: Arc<dyn Host>,
        navigator: Navigator,
        manifest: Arc<dyn ManifestSource>,
    ) -> Result<Self, EngineError> {
        let template = LayoutTemplate::parse(layout)?;
        info!(fragments = template.slots().len(), "layout scanned");
        Ok(Self {
            template,
            loader,
            host,
            navigator,
            manifest,
            options: MatchOptions::default(),
            hooks: Arc::new(LifecycleHooks::new()),
            middleware: Mutex::new(MiddlewareChain::new()),
            capabilities: Mutex::new(HashMap::new()),
            state: Mutex::new(AppState::Uninitialized),
            reconciler: Mutex::new(None),
            guard: Mutex::new(None),
            denied_subscription: Mutex::new(None),
        })
    }

    /// Route matching options for the reconciler.
    pub fn with_match_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> AppState {
        *lock(&self.state)
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// The reconciler, once the engine has started.
    pub fn reconciler(&self) -> Option<Reconciler> {
        lock(&self.reconciler).clone()
    }

    /// Handle to the reconciler's first-pass signal, once the engine has started.
    pub fn readiness(&self) -> Option<Readiness> {
        lock(&self.reconciler).as_ref().map(Reconciler::readiness)
    }

    /// Placeholders declared by the layout, in document order.
    pub fn registered_fragments(&self) -> &[SlotTemplate] {
        self.template.slots()
    }

    /// Register a lifecycle hook.
    pub fn on<F, Fut>(&self, event: LifecycleEvent, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.on(event, hook);
    }

    /// Append a navigation middleware. Middleware run in registration order.
    ///
    /// Takes effect at the next `launch`.
    pub fn use_route_middleware(&self, middleware: Arc<dyn RouteMiddleware>) {
        lock(&self.middleware).push(middleware);
    }

    /// Supply capabilities for the fragment called `name`.
    ///
    /// Only allowed before `start_engine`.
    pub fn configure_fragment(
        &self,
        name: &str,
        capabilities: SlotCapabilities,
    ) -> Result<(), EngineError> {
        let state = self.state();
        if state != AppState::Uninitialized {
            return Err(EngineError::NotReady {
                operation: "configure fragments",
                state,
            });
        }
        if !self.template.slots().iter().any(|s| s.name == name) {
            warn!(fragment = name, "configuring a fragment the layout does not declare");
            self.loader.push_log(
                LoaderLog::warn(format!("{} is not declared in the layout", name))
                    .with_specifier(name),
            );
        }
        lock(&self.capabilities).insert(name.to_string(), capabilities);
        Ok(())
    }

    /// Start the engine.
    pub async fn start_engine(&self) -> Result<(), EngineError> {
        {
            let mut state = lock(&self.state);
            if *state != AppState::Uninitialized {
                warn!(state = %*state, "engine already started");
                drop(state);
                self.loader.push_log(LoaderLog::warn("engine already started"));
                return Ok(());
            }
            *state = AppState::EngineStarting;
        }
        info!("starting engine");

        let started = tokio::try_join!(self.wire(), self.gear_up(), self.register_tags());
        if let Err(err) = started {
            *lock(&self.state) = AppState::Uninitialized;
            self.loader
                .push_log(LoaderLog::error("engine start failed").with_trace(&err));
            return Err(err);
        }

        let capabilities = lock(&self.capabilities).clone();
        let reconciler = Reconciler::new(
            self.loader.clone(),
            &self.template,
            &capabilities,
            self.options,
        );
        *lock(&self.reconciler) = Some(reconciler.clone());
        *lock(&self.state) = AppState::EngineReady;

        let initial = self.navigator.state();
        tokio::spawn(async move {
            let report = reconciler.reconcile(&initial).await;
            debug!(mounted = report.mounted.len(), "initial layout pass done");
        });

        info!("engine started");
        Ok(())
    }

    async fn wire(&self) -> Result<(), EngineError> {
        let map = self.manifest.import_map().await?;
        self.loader.install_base_table(map.clone());
        self.host.inject_resolution_directive(&map).await?;
        info!(entries = map.imports.len(), "engine wired");
        Ok(())
    }

    async fn gear_up(&self) -> Result<(), EngineError> {
        let hrefs = match self.manifest.stylesheets().await {
            Ok(hrefs) => hrefs,
            Err(err @ WiringError::Stylesheets { .. }) => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "stylesheet list unavailable");
                self.loader
                    .push_log(LoaderLog::warn("stylesheet list unavailable").with_trace(&err));
                Vec::new()
            }
        };

        if hrefs.is_empty() {
            warn!("no stylesheets provided");
            self.loader.push_log(LoaderLog::warn("no stylesheets provided"));
            return Ok(());
        }

        let base = self
            .loader
            .base_url()
            .cloned()
            .or_else(|| Url::parse(DEFAULT_BASE_URL).ok());
        let mut seen = HashSet::new();
        for href in hrefs {
            if !seen.insert(href.clone()) {
                continue;
            }
            let url = match base.as_ref().map(|b| b.join(&href)) {
                Some(Ok(url)) => url,
                _ => {
                    warn!(href = %href, "skipping invalid stylesheet href");
                    self.loader
                        .push_log(LoaderLog::warn(format!("invalid stylesheet href {}", href)));
                    continue;
                }
            };
            if let Err(err) = self.host.inject_stylesheet(&url).await {
                warn!(href = %url, error = %err, "stylesheet injection failed");
                self.loader.push_log(
                    LoaderLog::warn(format!("stylesheet {} not injected", url)).with_trace(&err),
                );
                continue;
            }
            debug!(href = %url, "stylesheet injected");
        }
        Ok(())
    }

    async fn register_tags(&self) -> Result<(), EngineError> {
        self.host.register_tags(&[LAYOUT_TAG, FRAGMENT_TAG]).await?;
        Ok(())
    }

    /// Launch the app.
    pub async fn launch(&self) -> Result<(), EngineError> {
        let reconciler = {
            let mut state = lock(&self.state);
            match *state {
                AppState::EngineReady => {}
                AppState::Launching | AppState::Live => {
                    warn!("app already launched");
                    drop(state);
                    self.loader.push_log(LoaderLog::warn("app already launched"));
                    return Ok(());
                }
                other => {
                    return Err(EngineError::NotReady {
                        operation: "launch",
                        state: other,
                    })
                }
            }
            let Some(reconciler) = lock(&self.reconciler).clone() else {
                return Err(EngineError::NotReady {
                    operation: "launch",
                    state: *state,
                });
            };
            *state = AppState::Launching;
            reconciler
        };
        info!("launching");

        reconciler.readiness().wait().await;
        self.hooks.trigger(LifecycleEvent::BeforeLaunch).await;

        if let Err(err) = self.host.attach_surface().await {
            *lock(&self.state) = AppState::EngineReady;
            return Err(err.into());
        }

        self.arm(&reconciler);
        // Pick up any navigation that happened while launching.
        reconciler.reconcile(&self.navigator.state()).await;
        reconciler.set_observer(self.hooks.clone());

        *lock(&self.state) = AppState::Live;
        self.hooks.trigger(LifecycleEvent::Launch).await;
        info!("app is live");
        Ok(())
    }

    fn arm(&self, reconciler: &Reconciler) {
        let chain = lock(&self.middleware).clone();
        let guard = self
            .navigator
            .install(chain, Some(Arc::new(reconciler.clone())));
        *lock(&self.guard) = Some(guard);

        let loader = self.loader.clone();
        let subscription = self.loader.bus().on(Topic::NavigationDenied, move |event| {
            if let Event::NavigationDenied { to, .. } = event {
                loader.push_log(LoaderLog::warn(format!("navigation to {} denied", to)));
            }
        });
        *lock(&self.denied_subscription) = Some(subscription);
    }

    /// Re-read the resolution table and bring the layout up to date.
    ///
    /// Used when the table is updated behind a live page. Loaded modules
    /// whose location moved (re-wired table or a new override) are unloaded,
    /// and their live slots are unmounted and mounted again from the new
    /// location.
    pub async fn relaunch(&self) -> Result<ReconcileReport, EngineError> {
        let state = self.state();
        if !matches!(state, AppState::EngineReady | AppState::Live) {
            return Err(EngineError::NotReady {
                operation: "relaunch",
                state,
            });
        }
        self.wire().await?;

        let stale = self.loader.stale_specifiers();
        for specifier in &stale {
            self.loader.unload(specifier);
        }
        if !stale.is_empty() {
            info!(fragments = ?stale, "relaunching moved fragments");
        }

        match self.reconciler() {
            Some(reconciler) => Ok(reconciler.refresh(&stale, &self.navigator.state()).await),
            None => Ok(ReconcileReport::default()),
        }
    }

    /// Tear the app down.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        {
            let state = lock(&self.state);
            if *state == AppState::Destroyed {
                warn!("app already destroyed");
                return Ok(());
            }
        }

        self.hooks.trigger(LifecycleEvent::BeforeDestroy).await;

        // Give the primitives back before anything else is torn down.
        if let Some(guard) = lock(&self.guard).take() {
            guard.disconnect();
        }
        if let Some(id) = lock(&self.denied_subscription).take() {
            self.loader.bus().off(id);
        }

        if let Some(reconciler) = lock(&self.reconciler).take() {
            reconciler.teardown().await;
        }

        *lock(&self.state) = AppState::Destroyed;
        self.hooks.trigger(LifecycleEvent::Destroy).await;
        info!("app destroyed");
        Ok(())
    }
}

impl fmt::Debug for RootApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootApp")
            .field("state", &self.state())
            .field("fragments", &self.template.names())
            .finish_non_exhaustive()
    }
}
