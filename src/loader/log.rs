//! loader::log
//!
//! Retained diagnostics log.
//!
//! Every load request, completion and failure appends a [`LoaderLog`]
//! record. The reconciler and the engine append their own warnings through
//! [`ModuleLoader::push_log`](super::ModuleLoader::push_log), so the
//! devtools snapshot shows one ordered history of what happened on the page.

use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity/category of a retained log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warn,
    /// A module finished loading.
    Load,
    Error,
}

/// One retained log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderLog {
    pub kind: LogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    /// Set when the module came from the override table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_url: Option<String>,
    /// Rendered error chain, outermost first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LoaderLog {
    fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            specifier: None,
            override_url: None,
            trace: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warn, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(LogKind::Load, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifier = Some(specifier.into());
        self
    }

    pub fn with_override_url(mut self, url: Option<String>) -> Self {
        self.override_url = url;
        self
    }

    /// Attach the rendered source chain of `err`.
    pub fn with_trace(mut self, err: &(dyn StdError + 'static)) -> Self {
        self.trace = Some(render_chain(err));
        self
    }
}

/// Render an error and its sources as `outer: caused by: inner`.
pub fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
