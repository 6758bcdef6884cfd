//! resolution::overrides
//!
//! Persistent, privilege-checked override layer.
//!
//! Overrides let an operator point a specifier at another build (a local dev
//! server, a canary) without redeploying the page. They are merged into
//! durable storage under [`OVERRIDES_KEY`] on every mutation and read back
//! when the table is constructed.
//!
//! Writes carry a [`CallSite`]. Only the devtools surface and the override
//! command-line tool may write; anything else, fragment code in particular,
//! gets [`ResolutionError::PrivilegeDenied`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use super::ResolutionError;
use crate::store::{KvStore, StoreError, OVERRIDES_KEY};

/// Who is asking to mutate overrides.
///
/// This is a caller-identity check, not a capability system: its purpose is
/// to stop a fragment from silently rewriting its own resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSite {
    /// The diagnostics overlay.
    Devtools,
    /// The `tessera overrides` command.
    OverrideTool,
    /// The page shell itself.
    Host,
    /// Code running inside a mounted fragment.
    Fragment(String),
}

impl CallSite {
    /// Whether this call site may write overrides.
    pub fn is_privileged(&self) -> bool {
        matches!(self, CallSite::Devtools | CallSite::OverrideTool)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSite::Devtools => write!(f, "devtools"),
            CallSite::OverrideTool => write!(f, "override-tool"),
            CallSite::Host => write!(f, "host"),
            CallSite::Fragment(name) => write!(f, "fragment {}", name),
        }
    }
}

/// The override layer of the resolution table.
pub struct OverrideTable {
    entries: BTreeMap<String, String>,
    store: Arc<dyn KvStore>,
}

impl OverrideTable {
    /// Read overrides from durable storage.
    ///
    /// A missing key means no overrides. A value that is not a JSON object of
    /// strings is reported as corrupt rather than silently dropped.
    pub fn load(store: Arc<dyn KvStore>) -> Result<Self, ResolutionError> {
        let entries = match store.get(OVERRIDES_KEY)? {
            None => BTreeMap::new(),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: OVERRIDES_KEY.to_string(),
                message: e.to_string(),
            })?,
        };
        debug!(count = entries.len(), "loaded import map overrides");
        Ok(Self { entries, store })
    }

    /// Look up an override.
    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.entries.get(specifier).map(String::as_str)
    }

    /// All overrides, ordered by specifier.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `updates` into the overrides and persist.
    ///
    /// # Errors
    ///
    /// - `PrivilegeDenied` if `caller` may not write overrides
    /// - `InvalidOverride` if a location is not an absolute URL
    /// - `Store` if persisting fails (in-memory state is left unchanged)
    pub fn merge(
        &mut self,
        caller: &CallSite,
        updates: BTreeMap<String, String>,
    ) -> Result<(), ResolutionError> {
        Self::authorize(caller)?;
        for (specifier, location) in &updates {
            validate_location(specifier, location)?;
        }

        let mut next = self.entries.clone();
        next.extend(updates);
        self.persist(&next)?;

        info!(caller = %caller, count = next.len(), "import map overrides updated");
        self.entries = next;
        Ok(())
    }

    /// Set a single override.
    pub fn set(
        &mut self,
        caller: &CallSite,
        specifier: &str,
        location: &str,
    ) -> Result<(), ResolutionError> {
        let mut updates = BTreeMap::new();
        updates.insert(specifier.to_string(), location.to_string());
        self.merge(caller, updates)
    }

    /// Remove a single override. Returns whether it existed.
    pub fn remove(&mut self, caller: &CallSite, specifier: &str) -> Result<bool, ResolutionError> {
        Self::authorize(caller)?;
        if !self.entries.contains_key(specifier) {
            return Ok(false);
        }

        let mut next = self.entries.clone();
        next.remove(specifier);
        self.persist(&next)?;

        info!(caller = %caller, specifier, "import map override removed");
        self.entries = next;
        Ok(true)
    }

    /// Remove all overrides.
    pub fn reset(&mut self, caller: &CallSite) -> Result<(), ResolutionError> {
        Self::authorize(caller)?;
        self.store.delete(OVERRIDES_KEY)?;
        info!(caller = %caller, "import map overrides reset");
        self.entries.clear();
        Ok(())
    }

    fn authorize(caller: &CallSite) -> Result<(), ResolutionError> {
        if caller.is_privileged() {
            Ok(())
        } else {
            Err(ResolutionError::PrivilegeDenied {
                caller: caller.to_string(),
            })
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ResolutionError> {
        let encoded = serde_json::to_string(entries).map_err(|e| StoreError::WriteError(e.to_string()))?;
        self.store.set(OVERRIDES_KEY, &encoded)?;
        Ok(())
    }
}

fn validate_location(specifier: &str, location: &str) -> Result<(), ResolutionError> {
    Url::parse(location)
        .map(|_| ())
        .map_err(|e| ResolutionError::InvalidOverride {
            specifier: specifier.to_string(),
            reason: format!("'{}' is not an absolute url: {}", location, e),
        })
}

impl fmt::Debug for OverrideTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideTable")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
