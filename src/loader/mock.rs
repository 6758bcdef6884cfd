//! loader::mock
//!
//! Deterministic fetcher and fragment doubles for tests.
//!
//! # Design
//!
//! [`MockFetcher`] serves fragments from memory, counts every fetch it
//! receives and can hold fetches in flight until released, which is how
//! coalescing of concurrent loads is observed. [`MockFragment`] records its
//! lifecycle calls. Both are `Clone` with shared state, so a test keeps one
//! clone for assertions while the runtime owns another.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::loader::mock::{MockFetcher, MockFragment};
//! use tessera::loader::ModuleFetcher;
//! use url::Url;
//!
//! # tokio_test::block_on(async {
//! let url = Url::parse("https://cdn.example.com/cart.js").unwrap();
//! let fetcher = MockFetcher::new();
//! fetcher.add_module(url.as_str(), Arc::new(MockFragment::new("cart")));
//!
//! assert!(fetcher.fetch(&url).await.is_ok());
//! assert_eq!(fetcher.fetch_count(url.as_str()), 1);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use url::Url;

use super::fetcher::{FetchError, ModuleFetcher};
use super::fragment::{Fragment, FragmentError, MountHandle, MountProps};

/// Mock module fetcher.
#[derive(Clone)]
pub struct MockFetcher {
    inner: Arc<Mutex<MockFetcherInner>>,
}

struct MockFetcherInner {
    modules: HashMap<String, Arc<dyn Fragment>>,
    failures: HashMap<String, FetchError>,
    fetches: Vec<String>,
    gate: Option<(watch::Sender<bool>, watch::Receiver<bool>)>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockFetcherInner {
                modules: HashMap::new(),
                failures: HashMap::new(),
                fetches: Vec::new(),
                gate: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockFetcherInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Serve `fragment` at `url`.
    pub fn add_module(&self, url: &str, fragment: Arc<dyn Fragment>) {
        self.lock().modules.insert(url.to_string(), fragment);
    }

    /// Make fetches of `url` fail with `error`.
    pub fn fail(&self, url: &str, error: FetchError) {
        self.lock().failures.insert(url.to_string(), error);
    }

    /// Stop failing fetches of `url`.
    pub fn clear_failure(&self, url: &str) {
        self.lock().failures.remove(url);
    }

    /// Hold every subsequent fetch in flight until [`release`](Self::release).
    pub fn hold(&self) {
        self.lock().gate = Some(watch::channel(false));
    }

    /// Let held fetches complete.
    pub fn release(&self) {
        if let Some((tx, _)) = self.lock().gate.take() {
            let _ = tx.send(true);
        }
    }

    /// Number of fetches issued for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.lock().fetches.iter().filter(|u| *u == url).count()
    }

    /// Every fetched URL, in order.
    pub fn fetches(&self) -> Vec<String> {
        self.lock().fetches.clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<Arc<dyn Fragment>, FetchError> {
        let gate = {
            let mut inner = self.lock();
            inner.fetches.push(url.as_str().to_string());
            inner.gate.as_ref().map(|(_, rx)| rx.clone())
        };

        if let Some(mut rx) = gate {
            // A dropped sender also releases.
            let _ = rx.wait_for(|open| *open).await;
        }

        let inner = self.lock();
        if let Some(err) = inner.failures.get(url.as_str()) {
            return Err(err.clone());
        }
        inner
            .modules
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// A lifecycle call recorded by [`MockFragment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentCall {
    Bootstrap,
    Mount { path: String },
    Unmount,
    Update { path: String },
}

/// Mock fragment that records its lifecycle.
#[derive(Debug, Clone)]
pub struct MockFragment {
    name: String,
    inner: Arc<Mutex<MockFragmentInner>>,
}

#[derive(Debug, Default)]
struct MockFragmentInner {
    calls: Vec<FragmentCall>,
    mounted: bool,
    fail_mount: Option<String>,
}

impl MockFragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(MockFragmentInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockFragmentInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make subsequent mounts fail with `message`.
    pub fn fail_mount(&self, message: impl Into<String>) {
        self.lock().fail_mount = Some(message.into());
    }

    /// Let mounts succeed again.
    pub fn heal(&self) {
        self.lock().fail_mount = None;
    }

    pub fn calls(&self) -> Vec<FragmentCall> {
        self.lock().calls.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    pub fn mount_count(&self) -> usize {
        self.count(|c| matches!(c, FragmentCall::Mount { .. }))
    }

    pub fn unmount_count(&self) -> usize {
        self.count(|c| matches!(c, FragmentCall::Unmount))
    }

    pub fn bootstrap_count(&self) -> usize {
        self.count(|c| matches!(c, FragmentCall::Bootstrap))
    }

    pub fn update_count(&self) -> usize {
        self.count(|c| matches!(c, FragmentCall::Update { .. }))
    }

    fn count(&self, pred: impl Fn(&FragmentCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl Fragment for MockFragment {
    async fn bootstrap(&self) -> Result<(), FragmentError> {
        self.lock().calls.push(FragmentCall::Bootstrap);
        Ok(())
    }

    async fn mount(&self, props: MountProps) -> Result<MountHandle, FragmentError> {
        let mut inner = self.lock();
        if let Some(message) = &inner.fail_mount {
            return Err(FragmentError::Mount(message.clone()));
        }
        inner.calls.push(FragmentCall::Mount { path: props.path });
        inner.mounted = true;
        Ok(MountHandle::new(self.name.clone()))
    }

    async fn unmount(&self, _handle: MountHandle) -> Result<(), FragmentError> {
        let mut inner = self.lock();
        inner.calls.push(FragmentCall::Unmount);
        inner.mounted = false;
        Ok(())
    }

    async fn update(&self, _handle: &MountHandle, props: MountProps) -> Result<(), FragmentError> {
        self.lock().calls.push(FragmentCall::Update { path: props.path });
        Ok(())
    }
}
