//! resolution
//!
//! Layered mapping from module specifier to load location.
//!
//! # Architecture
//!
//! The table has two layers:
//!
//! - **base**: the import map shipped with the page (`{"imports": {...}}`)
//! - **overrides**: a higher-priority map persisted in durable storage and
//!   writable only from a privileged call site (see [`CallSite`])
//!
//! # Invariants
//!
//! - `resolve(s) = override[s] ?? base[s] ?? s`
//! - An unknown specifier is returned unchanged and treated as an already
//!   resolved location
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::resolution::{ImportMap, ResolutionTable, Origin};
//! use tessera::store::MemoryStore;
//!
//! let map = ImportMap::from_json(r#"{"imports": {"@shop/cart": "https://cdn.example.com/cart.js"}}"#).unwrap();
//! let table = ResolutionTable::new(map, Arc::new(MemoryStore::new())).unwrap();
//!
//! let hit = table.resolve("@shop/cart");
//! assert_eq!(hit.location, "https://cdn.example.com/cart.js");
//! assert_eq!(hit.origin, Origin::Base);
//!
//! let miss = table.resolve("https://elsewhere.example.com/x.js");
//! assert_eq!(miss.origin, Origin::Passthrough);
//! ```

mod overrides;

pub use overrides::{CallSite, OverrideTable};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{KvStore, StoreError};

/// Errors from resolution table operations.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The resolution directive is missing from the host document.
    #[error(
        "no resolution directive found: the page must provide an import map \
         ({{\"imports\": {{...}}}}) before fragments can be loaded"
    )]
    MissingDirective,

    /// The resolution directive could not be parsed.
    #[error("invalid resolution directive: {0}")]
    InvalidDirective(String),

    /// An override was written from a call site that may not write overrides.
    #[error("import map overrides can only be set through devtools (caller: {caller})")]
    PrivilegeDenied { caller: String },

    /// An override value is not a usable location.
    #[error("invalid override for '{specifier}': {reason}")]
    InvalidOverride { specifier: String, reason: String },

    /// Persisting or reading overrides failed.
    #[error("override storage failed: {0}")]
    Store(#[from] StoreError),
}

/// The import map document: one recognized field, `imports`.
///
/// Other fields (such as `scopes`) are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    /// Parse an import map from JSON text.
    ///
    /// Empty or whitespace-only text yields an empty map.
    pub fn from_json(text: &str) -> Result<Self, ResolutionError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| ResolutionError::InvalidDirective(e.to_string()))
    }

    /// Parse an inline directive as found in the host document.
    ///
    /// `None` means the document has no directive at all, which is a
    /// configuration error.
    pub fn from_directive(text: Option<&str>) -> Result<Self, ResolutionError> {
        match text {
            Some(text) => Self::from_json(text),
            None => Err(ResolutionError::MissingDirective),
        }
    }

    /// Serialize back to pretty JSON (the form injected into the host).
    pub fn to_json_pretty(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{\"imports\":{}}"))
    }

    /// Build from `(specifier, location)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            imports: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Which layer produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Override,
    Base,
    /// Not in any table; the specifier is its own location.
    Passthrough,
}

/// The outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub location: String,
    pub origin: Origin,
}

impl Resolution {
    /// True if a table (base or override) supplied the location.
    pub fn from_table(&self) -> bool {
        self.origin != Origin::Passthrough
    }
}

/// The layered resolution table.
#[derive(Debug)]
pub struct ResolutionTable {
    base: BTreeMap<String, String>,
    overrides: OverrideTable,
}

impl ResolutionTable {
    /// Create a table from a base import map, reading overrides from `store`.
    pub fn new(base: ImportMap, store: Arc<dyn KvStore>) -> Result<Self, ResolutionError> {
        Ok(Self {
            base: base.imports,
            overrides: OverrideTable::load(store)?,
        })
    }

    /// Resolve a specifier: override, then base, then the specifier itself.
    pub fn resolve(&self, specifier: &str) -> Resolution {
        if let Some(location) = self.overrides.get(specifier) {
            return Resolution {
                location: location.to_string(),
                origin: Origin::Override,
            };
        }
        if let Some(location) = self.base.get(specifier) {
            return Resolution {
                location: location.clone(),
                origin: Origin::Base,
            };
        }
        Resolution {
            location: specifier.to_string(),
            origin: Origin::Passthrough,
        }
    }

    /// True if either layer knows the specifier.
    pub fn contains(&self, specifier: &str) -> bool {
        self.overrides.get(specifier).is_some() || self.base.contains_key(specifier)
    }

    /// The base layer.
    pub fn base(&self) -> &BTreeMap<String, String> {
        &self.base
    }

    /// Replace the base layer (engine wiring installs the fetched manifest).
    pub fn set_base(&mut self, base: ImportMap) {
        self.base = base.imports;
    }

    /// The override layer.
    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// Mutable access to the override layer. Writes are still caller-checked.
    pub fn overrides_mut(&mut self) -> &mut OverrideTable {
        &mut self.overrides
    }
}
