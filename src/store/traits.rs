//! store::traits
//!
//! Durable key-value storage trait definition.
//!
//! # Design
//!
//! The `KvStore` trait is the page's durable client storage: a flat map of
//! string keys to string values that survives reloads. Tessera keeps two
//! entries in it, the import map overrides and the devtools flag.
//!
//! # Example
//!
//! ```
//! use tessera::store::{KvStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("tessera-devtools", "true").unwrap();
//! assert_eq!(store.get("tessera-devtools").unwrap().as_deref(), Some("true"));
//!
//! store.delete("tessera-devtools").unwrap();
//! assert!(!store.exists("tessera-devtools").unwrap());
//! ```

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read from storage.
    #[error("failed to read store: {0}")]
    ReadError(String),

    /// Failed to write to storage.
    #[error("failed to write store: {0}")]
    WriteError(String),

    /// Stored value could not be decoded.
    #[error("corrupt value for key '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Trait for durable key-value storage.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait KvStore: Send + Sync {
    /// Get a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, overwriting any existing one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value.
    ///
    /// Returns `Ok(())` even if the key did not exist, so delete is
    /// idempotent.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}
