//! navigation
//!
//! History interception and navigation gating.
//!
//! # Architecture
//!
//! - [`History`]: the raw primitives (push, replace, assign, current entry)
//! - [`MiddlewareChain`]: ordered gates, first deny wins
//! - [`Navigator`]: the choke point; [`Navigator::install`] arms the
//!   interceptor and returns an RAII [`InterceptorGuard`]
//! - [`NavigationListener`]: told about every accepted navigation (the
//!   layout reconciler is the usual listener)

mod history;
mod interceptor;
mod middleware;

pub use history::{History, HistoryEntry, MemoryHistory};
pub use interceptor::{InterceptorGuard, NavigationOutcome, Navigator};
pub use middleware::{
    async_middleware, middleware_fn, AsyncFnMiddleware, ChainVerdict, FnMiddleware,
    MiddlewareChain, NavigationKind, NavigationTarget, RouteMiddleware, Verdict,
};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Errors from navigation requests.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("invalid navigation target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// What the layout sees of the current navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub url: Url,
    /// URL path (`/dashboard/settings`).
    pub path: String,
}

impl NavigationState {
    pub fn from_url(url: &Url) -> Self {
        Self {
            url: url.clone(),
            path: url.path().to_string(),
        }
    }

    /// State for a bare path, placed on `http://localhost/`.
    pub fn from_path(path: &str) -> Result<Self, NavigationError> {
        Url::parse("http://localhost/")
            .and_then(|base| base.join(path))
            .map(|url| Self::from_url(&url))
            .map_err(|e| NavigationError::InvalidTarget {
                target: path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Receives every accepted navigation.
#[async_trait]
pub trait NavigationListener: Send + Sync {
    async fn navigated(&self, state: &NavigationState);
}
