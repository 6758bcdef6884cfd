//! engine::host
//!
//! The page shell the engine drives.
//!
//! Everything the engine does to the host document goes through [`Host`]:
//! handing over the resolution directive, adding stylesheets, registering
//! the layout tags and attaching the rendered surface. [`RecordingHost`]
//! records those calls for tests and for headless runs.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::resolution::ImportMap;

/// Errors reported by the host.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("host rejected {operation}: {message}")]
    Rejected { operation: String, message: String },
}

/// The host document.
#[async_trait]
pub trait Host: Send + Sync {
    /// Publish the resolution directive before any fragment loads.
    async fn inject_resolution_directive(&self, map: &ImportMap) -> Result<(), HostError>;

    /// Add a stylesheet link. Called at most once per href.
    async fn inject_stylesheet(&self, href: &Url) -> Result<(), HostError>;

    /// Make the layout and placeholder tags known to the document.
    async fn register_tags(&self, tags: &[&str]) -> Result<(), HostError>;

    /// Attach the rendered surface to the render target.
    async fn attach_surface(&self) -> Result<(), HostError>;
}

/// A call recorded by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    ResolutionDirective(ImportMap),
    Stylesheet(Url),
    RegisterTags(Vec<String>),
    AttachSurface,
}

/// Host that records calls. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    inner: Arc<Mutex<RecordingHostInner>>,
}

#[derive(Debug, Default)]
struct RecordingHostInner {
    calls: Vec<HostCall>,
    fail_stylesheets: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingHostInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Make stylesheet injection fail.
    pub fn fail_stylesheets(&self) {
        self.lock().fail_stylesheets = true;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    pub fn stylesheets(&self) -> Vec<Url> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Stylesheet(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn directive(&self) -> Option<ImportMap> {
        self.calls().into_iter().find_map(|c| match c {
            HostCall::ResolutionDirective(map) => Some(map),
            _ => None,
        })
    }

    pub fn surface_attached(&self) -> bool {
        self.calls().contains(&HostCall::AttachSurface)
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn inject_resolution_directive(&self, map: &ImportMap) -> Result<(), HostError> {
        self.lock()
            .calls
            .push(HostCall::ResolutionDirective(map.clone()));
        Ok(())
    }

    async fn inject_stylesheet(&self, href: &Url) -> Result<(), HostError> {
        let mut inner = self.lock();
        if inner.fail_stylesheets {
            return Err(HostError::Rejected {
                operation: "stylesheet".into(),
                message: format!("cannot add {}", href),
            });
        }
        inner.calls.push(HostCall::Stylesheet(href.clone()));
        Ok(())
    }

    async fn register_tags(&self, tags: &[&str]) -> Result<(), HostError> {
        self.lock().calls.push(HostCall::RegisterTags(
            tags.iter().map(|t| t.to_string()).collect(),
        ));
        Ok(())
    }

    async fn attach_surface(&self) -> Result<(), HostError> {
        self.lock().calls.push(HostCall::AttachSurface);
        Ok(())
    }
}
