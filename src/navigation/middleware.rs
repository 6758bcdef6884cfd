//! navigation::middleware
//!
//! Ordered navigation gates.
//!
//! Each middleware inspects a [`NavigationTarget`] and returns a
//! [`Verdict`]. The chain runs them in registration order and stops at the
//! first `Deny`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use url::Url;

/// How a navigation was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    /// Back/forward.
    Pop,
    /// Full-page navigation to another origin.
    External,
}

/// A navigation under consideration.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTarget {
    pub from: Url,
    pub to: Url,
    pub kind: NavigationKind,
}

impl NavigationTarget {
    /// Destination path.
    pub fn path(&self) -> &str {
        self.to.path()
    }
}

/// Outcome of a middleware check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl From<bool> for Verdict {
    fn from(allow: bool) -> Self {
        if allow {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

/// A navigation gate.
#[async_trait]
pub trait RouteMiddleware: Send + Sync {
    /// Name used in logs when this middleware denies.
    fn name(&self) -> &str {
        "middleware"
    }

    async fn check(&self, target: &NavigationTarget) -> Verdict;
}

/// Middleware from a synchronous predicate (`true` allows).
pub struct FnMiddleware<F> {
    name: String,
    predicate: F,
}

/// Wrap a synchronous predicate.
pub fn middleware_fn<F>(name: impl Into<String>, predicate: F) -> FnMiddleware<F>
where
    F: Fn(&NavigationTarget) -> bool + Send + Sync,
{
    FnMiddleware {
        name: name.into(),
        predicate,
    }
}

#[async_trait]
impl<F> RouteMiddleware for FnMiddleware<F>
where
    F: Fn(&NavigationTarget) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, target: &NavigationTarget) -> Verdict {
        (self.predicate)(target).into()
    }
}

/// Middleware from an async closure (`true` allows).
pub struct AsyncFnMiddleware<F> {
    name: String,
    check: F,
}

/// Wrap an async check, for gates that need to suspend (a confirm dialog,
/// an auth refresh).
pub fn async_middleware<F>(name: impl Into<String>, check: F) -> AsyncFnMiddleware<F>
where
    F: Fn(NavigationTarget) -> BoxFuture<'static, bool> + Send + Sync,
{
    AsyncFnMiddleware {
        name: name.into(),
        check,
    }
}

#[async_trait]
impl<F> RouteMiddleware for AsyncFnMiddleware<F>
where
    F: Fn(NavigationTarget) -> BoxFuture<'static, bool> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, target: &NavigationTarget) -> Verdict {
        (self.check)(target.clone()).await.into()
    }
}

/// Result of running a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerdict {
    Allow,
    /// Denied by the named middleware.
    Deny { by: String },
}

impl ChainVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ChainVerdict::Allow)
    }
}

/// An ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<Arc<dyn RouteMiddleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs after those already registered.
    pub fn push(&mut self, middleware: Arc<dyn RouteMiddleware>) {
        self.entries.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the chain; the first `Deny` wins and later middleware never run.
    pub async fn check(&self, target: &NavigationTarget) -> ChainVerdict {
        for middleware in &self.entries {
            if middleware.check(target).await == Verdict::Deny {
                return ChainVerdict::Deny {
                    by: middleware.name().to_string(),
                };
            }
        }
        ChainVerdict::Allow
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|m| m.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn target(path: &str) -> NavigationTarget {
        NavigationTarget {
            from: Url::parse("http://app/").unwrap(),
            to: Url::parse("http://app/").unwrap().join(path).unwrap(),
            kind: NavigationKind::Push,
        }
    }

    #[tokio::test]
    async fn empty_chain_allows() {
        assert!(MiddlewareChain::new().check(&target("/x")).await.is_allowed());
    }

    #[tokio::test]
    async fn first_deny_short_circuits() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();

        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(middleware_fn("no-admin", |t| {
            !t.path().starts_with("/admin")
        })));
        chain.push(Arc::new(middleware_fn("counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })));

        let verdict = chain.check(&target("/admin")).await;
        assert_eq!(
            verdict,
            ChainVerdict::Deny {
                by: "no-admin".into()
            }
        );
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);

        assert!(chain.check(&target("/home")).await.is_allowed());
        assert_eq!(later_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_middleware_can_suspend() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(async_middleware("slow", |t: NavigationTarget| {
            async move {
                tokio::task::yield_now().await;
                t.kind != NavigationKind::External
            }
            .boxed()
        })));

        assert!(chain.check(&target("/x")).await.is_allowed());

        let mut external = target("/x");
        external.kind = NavigationKind::External;
        assert!(!chain.check(&external).await.is_allowed());
    }
}
