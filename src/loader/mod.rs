//! loader
//!
//! Dynamic module loading with resolution, coalescing and telemetry.
//!
//! # Architecture
//!
//! [`ModuleLoader`] owns the [`ResolutionTable`] and the per-specifier load
//! records. A load goes through these steps:
//!
//! 1. **Resolve**: a location specifier (`./x.js`, `/x.js`) is joined to the
//!    base URL and skips the table; anything else goes through
//!    override → base → itself.
//! 2. **Coalesce**: if the specifier is already in flight to the same URL,
//!    the caller awaits the same shared future. One fetch per specifier at a
//!    time.
//! 3. **Fetch**: through the [`ModuleFetcher`] seam, timed.
//! 4. **Record**: load time (table specifiers only), error set, retained
//!    log, and bus events (`load-requested`, `module-loaded`, `load-error`).
//!
//! Loaded fragments are cached together with the URL they came from until
//! [`ModuleLoader::unload`]. Every load resolves first, so a cached module
//! whose specifier now resolves elsewhere (a new override, a re-wired table,
//! another base URL) is dropped and fetched again.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::events::EventBus;
//! use tessera::loader::mock::{MockFetcher, MockFragment};
//! use tessera::loader::{LoadStatus, ModuleLoader};
//! use tessera::resolution::{ImportMap, ResolutionTable};
//! use tessera::store::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let fetcher = MockFetcher::new();
//! fetcher.add_module("https://cdn.example.com/cart.js", Arc::new(MockFragment::new("cart")));
//!
//! let map = ImportMap::from_pairs([("@shop/cart", "https://cdn.example.com/cart.js")]);
//! let table = ResolutionTable::new(map, Arc::new(MemoryStore::new())).unwrap();
//! let loader = ModuleLoader::builder(Arc::new(fetcher), table)
//!     .bus(Arc::new(EventBus::new()))
//!     .build();
//!
//! loader.load("@shop/cart").await.unwrap();
//! assert!(matches!(loader.status("@shop/cart"), LoadStatus::Loaded { .. }));
//!
//! loader.unload("@shop/cart");
//! assert_eq!(loader.status("@shop/cart"), LoadStatus::Idle);
//! # });
//! ```

mod fetcher;
mod fragment;
mod log;
pub mod mock;

pub use fetcher::{FetchError, ModuleFetcher, RegistryFetcher};
pub use fragment::{Fragment, FragmentError, MountHandle, MountProps};
pub use log::{render_chain, LoaderLog, LogKind};

pub use crate::resolution::CallSite;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::config::DEFAULT_BASE_URL;
use crate::core::types::Specifier;
use crate::events::{Event, EventBus};
use crate::resolution::{ImportMap, Origin, Resolution, ResolutionError, ResolutionTable};
use crate::store::KvStore;

/// Oldest records are dropped past this many retained log entries.
const MAX_RETAINED_LOGS: usize = 1000;

/// Errors from loading a module.
///
/// `Clone` because coalesced callers all receive the same outcome.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// The specifier could not be turned into a fetchable URL.
    #[error("cannot resolve '{specifier}': {reason}")]
    Resolution { specifier: String, reason: String },

    /// The fetch or evaluation failed.
    #[error("failed to load '{specifier}' from {url}")]
    Fetch {
        specifier: String,
        url: String,
        #[source]
        source: FetchError,
    },
}

impl LoaderError {
    pub fn specifier(&self) -> &str {
        match self {
            LoaderError::Resolution { specifier, .. } | LoaderError::Fetch { specifier, .. } => {
                specifier
            }
        }
    }
}

/// Load state of one specifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    /// `load_time_ms` is present only for table-originated specifiers.
    Loaded { load_time_ms: Option<f64> },
    Error,
}

type LoadResult = Result<Arc<dyn Fragment>, LoaderError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// The module loader. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn ModuleFetcher>,
    bus: Arc<EventBus>,
    base_url: Option<Url>,
    table: RwLock<ResolutionTable>,
    state: Mutex<LoadState>,
}

#[derive(Default)]
struct LoadState {
    in_flight: HashMap<String, InFlight>,
    modules: HashMap<String, LoadedModule>,
    load_times: BTreeMap<String, f64>,
    errors: Vec<String>,
    logs: VecDeque<LoaderLog>,
}

struct InFlight {
    url: Url,
    load: SharedLoad,
}

struct LoadedModule {
    url: Url,
    /// Resolved through the table rather than joined to a base.
    via_table: bool,
    module: Arc<dyn Fragment>,
}

/// Builder for [`ModuleLoader`].
pub struct LoaderBuilder {
    fetcher: Arc<dyn ModuleFetcher>,
    table: ResolutionTable,
    bus: Option<Arc<EventBus>>,
    base_url: Option<Url>,
}

impl LoaderBuilder {
    /// Publish on `bus` instead of the process-wide bus.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Base URL that location specifiers resolve against.
    ///
    /// Defaults to `http://localhost/`.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn build(self) -> ModuleLoader {
        ModuleLoader {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                bus: self.bus.unwrap_or_else(EventBus::global),
                base_url: self.base_url,
                table: RwLock::new(self.table),
                state: Mutex::new(LoadState::default()),
            }),
        }
    }
}

enum Start {
    Ready(Arc<dyn Fragment>),
    Await(SharedLoad),
}

impl ModuleLoader {
    pub fn builder(fetcher: Arc<dyn ModuleFetcher>, table: ResolutionTable) -> LoaderBuilder {
        LoaderBuilder {
            fetcher,
            table,
            bus: None,
            base_url: None,
        }
    }

    /// Build a loader from an inline resolution directive.
    ///
    /// `None` (no directive in the document) is a configuration error.
    pub fn from_directive(
        directive: Option<&str>,
        fetcher: Arc<dyn ModuleFetcher>,
        store: Arc<dyn KvStore>,
    ) -> Result<Self, ResolutionError> {
        let map = ImportMap::from_directive(directive)?;
        let table = ResolutionTable::new(map, store)?;
        Ok(Self::builder(fetcher, table).build())
    }

    /// Load `specifier`, resolving location specifiers against the base URL.
    pub async fn load(&self, specifier: &str) -> LoadResult {
        self.load_from(specifier, None).await
    }

    /// Load `specifier`, resolving location specifiers against `base`.
    pub async fn load_from(&self, specifier: &str, base: Option<&Url>) -> LoadResult {
        let (url, resolution) = match self.resolve_url(specifier, base) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.inner.record_failure(&err);
                return Err(err);
            }
        };

        let start = {
            let mut state = self.inner.state();
            let moved = state
                .modules
                .get(specifier)
                .filter(|loaded| loaded.url != url)
                .map(|loaded| loaded.url.clone());
            if let Some(previous) = moved {
                debug!(specifier, from = %previous, to = %url, "resolution changed, refetching");
                state.modules.remove(specifier);
                state.load_times.remove(specifier);
            }

            if let Some(loaded) = state.modules.get(specifier) {
                Start::Ready(loaded.module.clone())
            } else if let Some(pending) = state.in_flight.get(specifier).filter(|p| p.url == url) {
                debug!(specifier, "joining in-flight load");
                Start::Await(pending.load.clone())
            } else {
                let load = run_load(
                    self.inner.clone(),
                    specifier.to_string(),
                    url.clone(),
                    resolution,
                )
                .boxed()
                .shared();
                state.in_flight.insert(
                    specifier.to_string(),
                    InFlight {
                        url,
                        load: load.clone(),
                    },
                );
                Start::Await(load)
            }
        };

        match start {
            Start::Ready(module) => Ok(module),
            Start::Await(pending) => pending.await,
        }
    }

    fn resolve_url(
        &self,
        specifier: &str,
        base: Option<&Url>,
    ) -> Result<(Url, Option<Resolution>), LoaderError> {
        let spec = Specifier::new(specifier).map_err(|e| LoaderError::Resolution {
            specifier: specifier.to_string(),
            reason: e.to_string(),
        })?;
        let fallback;
        let base = match base.or(self.inner.base_url.as_ref()) {
            Some(base) => base,
            None => {
                fallback = Url::parse(DEFAULT_BASE_URL).map_err(|e| LoaderError::Resolution {
                    specifier: specifier.to_string(),
                    reason: format!("invalid default base url: {}", e),
                })?;
                &fallback
            }
        };

        if spec.is_location() {
            let url = base.join(specifier).map_err(|e| LoaderError::Resolution {
                specifier: specifier.to_string(),
                reason: format!("cannot join to {}: {}", base, e),
            })?;
            return Ok((url, None));
        }

        let resolution = self.inner.table().resolve(specifier);
        let location = resolution.location.as_str();
        let parsed = if location.starts_with('/') || location.starts_with('.') {
            base.join(location)
        } else {
            Url::parse(location)
        };
        let url = parsed.map_err(|e| LoaderError::Resolution {
            specifier: specifier.to_string(),
            reason: format!("'{}' is not a valid url: {}", location, e),
        })?;
        Ok((url, Some(resolution)))
    }

    /// Loaded table specifiers whose resolution now points at another URL.
    ///
    /// These are refetched on their next load; a live page remounts them.
    pub fn stale_specifiers(&self) -> Vec<String> {
        let loaded: Vec<(String, Url)> = self
            .inner
            .state()
            .modules
            .iter()
            .filter(|(_, loaded)| loaded.via_table)
            .map(|(specifier, loaded)| (specifier.clone(), loaded.url.clone()))
            .collect();

        let mut stale: Vec<String> = loaded
            .into_iter()
            .filter(|(specifier, url)| match self.resolve_url(specifier, None) {
                Ok((current, _)) => &current != url,
                Err(_) => true,
            })
            .map(|(specifier, _)| specifier)
            .collect();
        stale.sort();
        stale
    }

    /// Resolve through the table without loading.
    pub fn resolve(&self, specifier: &str) -> Resolution {
        self.inner.table().resolve(specifier)
    }

    /// Forget a loaded or failed module. Idempotent.
    ///
    /// An in-flight load is left alone and settles normally.
    pub fn unload(&self, specifier: &str) {
        let mut state = self.inner.state();
        let had_module = state.modules.remove(specifier).is_some();
        state.load_times.remove(specifier);
        state.errors.retain(|s| s != specifier);
        if had_module {
            debug!(specifier, "module unloaded");
        }
    }

    pub fn status(&self, specifier: &str) -> LoadStatus {
        let state = self.inner.state();
        if state.in_flight.contains_key(specifier) {
            LoadStatus::Loading
        } else if state.errors.iter().any(|s| s == specifier) {
            LoadStatus::Error
        } else if state.modules.contains_key(specifier) {
            LoadStatus::Loaded {
                load_time_ms: state.load_times.get(specifier).copied(),
            }
        } else {
            LoadStatus::Idle
        }
    }

    /// Recorded load times in milliseconds, by specifier.
    pub fn load_times(&self) -> BTreeMap<String, f64> {
        self.inner.state().load_times.clone()
    }

    /// Specifiers whose last load failed, in failure order.
    pub fn error_modules(&self) -> Vec<String> {
        self.inner.state().errors.clone()
    }

    /// Every specifier the loader currently knows about, in any state.
    pub fn known_specifiers(&self) -> Vec<String> {
        let state = self.inner.state();
        let mut all: Vec<String> = state
            .modules
            .keys()
            .chain(state.in_flight.keys())
            .chain(state.errors.iter())
            .cloned()
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// The retained log, oldest first.
    pub fn logs(&self) -> Vec<LoaderLog> {
        self.inner.state().logs.iter().cloned().collect()
    }

    /// Append a record to the retained log and publish it.
    pub fn push_log(&self, record: LoaderLog) {
        self.inner.push_log(record);
    }

    /// Configured base URL, if one was set on the builder.
    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn base_table(&self) -> BTreeMap<String, String> {
        self.inner.table().base().clone()
    }

    pub fn overrides(&self) -> BTreeMap<String, String> {
        self.inner.table().overrides().entries().clone()
    }

    /// Replace the base table with a fetched manifest.
    pub fn install_base_table(&self, map: ImportMap) {
        let count = map.imports.len();
        self.inner.table_mut().set_base(map);
        info!(count, "resolution table installed");
    }

    /// Set an override. Only privileged call sites succeed.
    pub fn set_override(
        &self,
        caller: &CallSite,
        specifier: &str,
        location: &str,
    ) -> Result<(), ResolutionError> {
        let result = self
            .inner
            .table_mut()
            .overrides_mut()
            .set(caller, specifier, location);
        self.note_override_result(caller, &result);
        result
    }

    /// Merge several overrides at once.
    pub fn merge_overrides(
        &self,
        caller: &CallSite,
        updates: BTreeMap<String, String>,
    ) -> Result<(), ResolutionError> {
        let result = self.inner.table_mut().overrides_mut().merge(caller, updates);
        self.note_override_result(caller, &result);
        result
    }

    pub fn remove_override(
        &self,
        caller: &CallSite,
        specifier: &str,
    ) -> Result<bool, ResolutionError> {
        let result = self
            .inner
            .table_mut()
            .overrides_mut()
            .remove(caller, specifier);
        self.note_override_result(caller, &result);
        result
    }

    pub fn reset_overrides(&self, caller: &CallSite) -> Result<(), ResolutionError> {
        let result = self.inner.table_mut().overrides_mut().reset(caller);
        self.note_override_result(caller, &result);
        result
    }

    fn note_override_result<T>(&self, caller: &CallSite, result: &Result<T, ResolutionError>) {
        if let Err(err) = result {
            warn!(caller = %caller, error = %err, "override write rejected");
            self.push_log(LoaderLog::warn(err.to_string()).with_trace(err));
        }
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("base_url", &self.inner.base_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn table(&self) -> RwLockReadGuard<'_, ResolutionTable> {
        self.table.read().unwrap_or_else(|p| p.into_inner())
    }

    fn table_mut(&self) -> RwLockWriteGuard<'_, ResolutionTable> {
        self.table.write().unwrap_or_else(|p| p.into_inner())
    }

    fn push_log(&self, record: LoaderLog) {
        {
            let mut state = self.state();
            if state.logs.len() >= MAX_RETAINED_LOGS {
                state.logs.pop_front();
            }
            state.logs.push_back(record.clone());
        }
        self.bus.emit(Event::NewLog(record));
    }

    fn record_failure(&self, err: &LoaderError) {
        let specifier = err.specifier().to_string();
        {
            let mut state = self.state();
            if !state.errors.contains(&specifier) {
                state.errors.push(specifier.clone());
            }
        }
        error!(specifier = %specifier, error = %err, "module load failed");
        self.bus.emit(Event::LoadError {
            specifier: specifier.clone(),
            error: render_chain(err),
        });
        self.push_log(
            LoaderLog::error(format!("failed to load {}", specifier))
                .with_specifier(specifier)
                .with_trace(err),
        );
    }
}

async fn run_load(
    inner: Arc<Inner>,
    specifier: String,
    url: Url,
    resolution: Option<Resolution>,
) -> LoadResult {
    let override_url = resolution
        .as_ref()
        .filter(|r| r.origin == Origin::Override)
        .map(|_| url.to_string());
    let from_table = resolution.as_ref().is_some_and(Resolution::from_table);

    debug!(specifier = %specifier, url = %url, "load requested");
    inner.bus.emit(Event::LoadRequested {
        specifier: specifier.clone(),
        url: url.to_string(),
    });
    inner.push_log(
        LoaderLog::info(format!("loading {} from {}", specifier, url))
            .with_specifier(specifier.clone())
            .with_override_url(override_url.clone()),
    );

    let started = Instant::now();
    let fetched = inner.fetcher.fetch(&url).await;

    // A load superseded by one to a newer URL settles for its own callers only.
    let current = {
        let mut state = inner.state();
        let current = state
            .in_flight
            .get(&specifier)
            .is_some_and(|pending| pending.url == url);
        if current {
            state.in_flight.remove(&specifier);
        }
        current
    };

    match fetched {
        Ok(module) => {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            if current {
                let mut state = inner.state();
                state.errors.retain(|s| s != &specifier);
                state.modules.insert(
                    specifier.clone(),
                    LoadedModule {
                        url: url.clone(),
                        via_table: resolution.is_some(),
                        module: module.clone(),
                    },
                );
                if from_table {
                    state.load_times.insert(specifier.clone(), elapsed_ms);
                }
            }
            info!(specifier = %specifier, load_time_ms = elapsed_ms, "module loaded");
            inner.bus.emit(Event::ModuleLoaded {
                specifier: specifier.clone(),
                load_time_ms: elapsed_ms,
            });
            inner.push_log(
                LoaderLog::load(format!("loaded {} in {:.1}ms", specifier, elapsed_ms))
                    .with_specifier(specifier)
                    .with_override_url(override_url),
            );
            Ok(module)
        }
        Err(source) => {
            let err = LoaderError::Fetch {
                specifier,
                url: url.to_string(),
                source,
            };
            inner.record_failure(&err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::loader::mock::{MockFetcher, MockFragment};
    use crate::store::MemoryStore;

    const CART_URL: &str = "https://cdn.example.com/cart.js";

    fn setup(pairs: &[(&str, &str)]) -> (MockFetcher, ModuleLoader, Arc<EventBus>) {
        let fetcher = MockFetcher::new();
        let table = ResolutionTable::new(
            ImportMap::from_pairs(pairs.iter().copied()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let bus = Arc::new(EventBus::new());
        let loader = ModuleLoader::builder(Arc::new(fetcher.clone()), table)
            .bus(bus.clone())
            .build();
        (fetcher, loader, bus)
    }

    #[tokio::test]
    async fn table_specifier_records_load_time() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));

        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        match loader.status("@shop/cart") {
            LoadStatus::Loaded { load_time_ms } => assert!(load_time_ms.is_some()),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(loader.load_times().contains_key("@shop/cart"));
    }

    #[tokio::test]
    async fn location_specifier_joins_base_and_skips_timing() {
        let (fetcher, loader, _bus) = setup(&[]);
        fetcher.add_module("http://localhost/apps/local.js", Arc::new(MockFragment::new("l")));

        loader.load("/apps/local.js").await.map(|_| ()).unwrap();

        assert_eq!(
            loader.status("/apps/local.js"),
            LoadStatus::Loaded { load_time_ms: None }
        );
        assert!(loader.load_times().is_empty());
    }

    #[tokio::test]
    async fn explicit_base_is_used_for_locations() {
        let (fetcher, loader, _bus) = setup(&[]);
        fetcher.add_module("https://apps.example.com/v2/nav.js", Arc::new(MockFragment::new("n")));

        let base = Url::parse("https://apps.example.com/v2/").unwrap();
        assert!(loader.load_from("./nav.js", Some(&base)).await.is_ok());
        assert_eq!(fetcher.fetches(), vec!["https://apps.example.com/v2/nav.js"]);
    }

    #[tokio::test]
    async fn cached_module_is_not_refetched() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));

        loader.load("@shop/cart").await.map(|_| ()).unwrap();
        loader.load("@shop/cart").await.map(|_| ()).unwrap();
        assert_eq!(fetcher.fetch_count(CART_URL), 1);

        loader.unload("@shop/cart");
        loader.load("@shop/cart").await.map(|_| ()).unwrap();
        assert_eq!(fetcher.fetch_count(CART_URL), 2);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));
        fetcher.hold();

        let loads: Vec<_> = (0..5)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load("@shop/cart").await.is_ok() })
            })
            .collect();

        while fetcher.fetch_count(CART_URL) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(loader.status("@shop/cart"), LoadStatus::Loading);
        fetcher.release();

        for load in loads {
            assert!(load.await.unwrap());
        }
        assert_eq!(fetcher.fetch_count(CART_URL), 1);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_reraised() {
        let (fetcher, loader, bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.fail(CART_URL, FetchError::Network("offline".into()));

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        bus.on(Topic::LoadError, move |e| sink.lock().unwrap().push(e.clone()));

        let err = loader.load("@shop/cart").await.err().unwrap();
        assert!(matches!(err, LoaderError::Fetch { .. }));
        assert_eq!(loader.status("@shop/cart"), LoadStatus::Error);
        assert_eq!(loader.error_modules(), vec!["@shop/cart"]);
        assert_eq!(errors.lock().unwrap().len(), 1);

        let last = loader.logs().pop().unwrap();
        assert_eq!(last.kind, LogKind::Error);
        assert!(last.trace.unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn retry_after_failure_clears_error() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));
        fetcher.fail(CART_URL, FetchError::Network("offline".into()));
        assert!(loader.load("@shop/cart").await.is_err());

        fetcher.clear_failure(CART_URL);
        assert!(loader.load("@shop/cart").await.is_ok());
        assert!(loader.error_modules().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_specifier_fails_before_fetch() {
        let (fetcher, loader, _bus) = setup(&[]);

        let err = loader.load("@shop/unknown").await.err().unwrap();
        assert!(matches!(err, LoaderError::Resolution { .. }));
        assert!(fetcher.fetches().is_empty());
        assert_eq!(loader.status("@shop/unknown"), LoadStatus::Error);
    }

    #[tokio::test]
    async fn unload_is_idempotent() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));
        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        loader.unload("@shop/cart");
        loader.unload("@shop/cart");
        loader.unload("@never/loaded");
        assert_eq!(loader.status("@shop/cart"), LoadStatus::Idle);
        assert!(loader.load_times().is_empty());
    }

    #[tokio::test]
    async fn events_are_emitted_in_order() {
        let (fetcher, loader, bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));

        let topics = Arc::new(Mutex::new(Vec::new()));
        let sink = topics.clone();
        bus.on_any(move |e| sink.lock().unwrap().push(e.topic()));

        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        assert_eq!(
            topics.lock().unwrap().as_slice(),
            &[
                Topic::LoadRequested,
                Topic::NewLog,
                Topic::ModuleLoaded,
                Topic::NewLog
            ]
        );
    }

    #[tokio::test]
    async fn override_redirects_load_and_is_logged() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module("http://localhost:5173/cart.js", Arc::new(MockFragment::new("dev")));

        loader
            .set_override(&CallSite::Devtools, "@shop/cart", "http://localhost:5173/cart.js")
            .unwrap();
        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        assert_eq!(fetcher.fetches(), vec!["http://localhost:5173/cart.js"]);
        let loaded = loader
            .logs()
            .into_iter()
            .find(|l| l.kind == LogKind::Load)
            .unwrap();
        assert_eq!(
            loaded.override_url.as_deref(),
            Some("http://localhost:5173/cart.js")
        );
    }

    #[test]
    fn fragment_caller_cannot_override() {
        let (_fetcher, loader, _bus) = setup(&[]);
        let err = loader
            .set_override(
                &CallSite::Fragment("@shop/cart".into()),
                "@shop/cart",
                "http://evil/cart.js",
            )
            .unwrap_err();

        assert!(matches!(err, ResolutionError::PrivilegeDenied { .. }));
        assert!(loader.overrides().is_empty());
        assert_eq!(loader.logs().last().map(|l| l.kind), Some(LogKind::Warn));
    }

    #[test]
    fn missing_directive_is_rejected() {
        let result = ModuleLoader::from_directive(
            None,
            Arc::new(MockFetcher::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(ResolutionError::MissingDirective)));
    }

    #[test]
    fn install_base_table_replaces_mappings() {
        let (_fetcher, loader, _bus) = setup(&[("a", "https://x/a.js")]);
        loader.install_base_table(ImportMap::from_pairs([("b", "https://x/b.js")]));
        assert!(loader.base_table().contains_key("b"));
        assert!(!loader.base_table().contains_key("a"));
    }

    #[tokio::test]
    async fn override_set_after_load_wins_on_next_load() {
        const DEV_URL: &str = "http://localhost:5173/cart.js";
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("prod")));
        fetcher.add_module(DEV_URL, Arc::new(MockFragment::new("dev")));
        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        loader
            .set_override(&CallSite::Devtools, "@shop/cart", DEV_URL)
            .unwrap();
        assert_eq!(loader.stale_specifiers(), vec!["@shop/cart"]);
        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        assert_eq!(fetcher.fetches(), vec![CART_URL, DEV_URL]);
        assert!(loader.stale_specifiers().is_empty());

        loader
            .remove_override(&CallSite::Devtools, "@shop/cart")
            .unwrap();
        loader.load("@shop/cart").await.map(|_| ()).unwrap();
        assert_eq!(fetcher.fetch_count(CART_URL), 2);
    }

    #[tokio::test]
    async fn relative_specifier_is_fetched_per_base() {
        let (fetcher, loader, _bus) = setup(&[]);
        fetcher.add_module("https://a.example.com/v1/nav.js", Arc::new(MockFragment::new("a")));
        fetcher.add_module("https://b.example.com/v2/nav.js", Arc::new(MockFragment::new("b")));
        let a = Url::parse("https://a.example.com/v1/").unwrap();
        let b = Url::parse("https://b.example.com/v2/").unwrap();

        loader.load_from("./nav.js", Some(&a)).await.map(|_| ()).unwrap();
        loader.load_from("./nav.js", Some(&b)).await.map(|_| ()).unwrap();
        loader.load_from("./nav.js", Some(&b)).await.map(|_| ()).unwrap();

        assert_eq!(
            fetcher.fetches(),
            vec![
                "https://a.example.com/v1/nav.js",
                "https://b.example.com/v2/nav.js"
            ]
        );
        assert!(loader.stale_specifiers().is_empty(), "locations never go stale");
    }

    #[tokio::test]
    async fn rewired_table_marks_loaded_module_stale() {
        let (fetcher, loader, _bus) = setup(&[("@shop/cart", CART_URL)]);
        fetcher.add_module(CART_URL, Arc::new(MockFragment::new("cart")));
        loader.load("@shop/cart").await.map(|_| ()).unwrap();

        loader.install_base_table(ImportMap::from_pairs([("@shop/cart", CART_URL)]));
        assert!(loader.stale_specifiers().is_empty());

        loader.install_base_table(ImportMap::from_pairs([(
            "@shop/cart",
            "https://cdn.example.com/cart.v2.js",
        )]));
        assert_eq!(loader.stale_specifiers(), vec!["@shop/cart"]);
    }

    #[test]
    fn retained_log_drops_oldest_past_cap() {
        let (_fetcher, loader, _bus) = setup(&[]);
        for i in 0..MAX_RETAINED_LOGS + 5 {
            loader.push_log(LoaderLog::info(format!("entry {}", i)));
        }

        let logs = loader.logs();
        assert_eq!(logs.len(), MAX_RETAINED_LOGS);
        assert_eq!(logs[0].message, "entry 5");
    }
}
