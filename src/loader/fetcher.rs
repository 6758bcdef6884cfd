//! loader::fetcher
//!
//! The seam between the loader and whatever actually produces module code.
//!
//! In a browser shell this is dynamic `import()`; in a desktop or test host
//! it is usually a [`RegistryFetcher`] with fragments linked into the binary
//! and addressed by URL.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::fragment::Fragment;

/// Errors from fetching a module.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Nothing is served at the URL.
    #[error("no module at {0}")]
    NotFound(String),

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The module was fetched but failed to evaluate.
    #[error("module evaluation failed: {0}")]
    Evaluation(String),
}

/// Fetches and instantiates a module.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Arc<dyn Fragment>, FetchError>;
}

/// Serves fragments registered in-process, keyed by URL.
#[derive(Default)]
pub struct RegistryFetcher {
    modules: RwLock<HashMap<String, Arc<dyn Fragment>>>,
}

impl RegistryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fragment` to be served at `url`.
    pub fn register(&self, url: &Url, fragment: Arc<dyn Fragment>) {
        let mut modules = self
            .modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        modules.insert(url.as_str().to_string(), fragment);
    }

    /// Remove a registration. Returns whether one existed.
    pub fn unregister(&self, url: &Url) -> bool {
        let mut modules = self
            .modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        modules.remove(url.as_str()).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ModuleFetcher for RegistryFetcher {
    async fn fetch(&self, url: &Url) -> Result<Arc<dyn Fragment>, FetchError> {
        let modules = self
            .modules
            .read()
            .map_err(|_| FetchError::Network("registry lock poisoned".into()))?;
        modules
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::mock::MockFragment;

    #[tokio::test]
    async fn serves_registered_fragments() {
        let fetcher = RegistryFetcher::new();
        let url = Url::parse("https://cdn.example.com/cart.js").unwrap();
        fetcher.register(&url, Arc::new(MockFragment::new("cart")));

        assert!(fetcher.fetch(&url).await.is_ok());
        assert_eq!(fetcher.len(), 1);
    }

    #[tokio::test]
    async fn unknown_url_is_not_found() {
        let fetcher = RegistryFetcher::new();
        let url = Url::parse("https://cdn.example.com/missing.js").unwrap();

        let err = fetcher.fetch(&url).await.err().unwrap();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn unregister_removes() {
        let fetcher = RegistryFetcher::new();
        let url = Url::parse("https://cdn.example.com/nav.js").unwrap();
        fetcher.register(&url, Arc::new(MockFragment::new("nav")));

        assert!(fetcher.unregister(&url));
        assert!(!fetcher.unregister(&url));
        assert!(fetcher.is_empty());
    }
}
