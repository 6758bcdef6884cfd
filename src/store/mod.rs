//! store
//!
//! Durable key-value storage for state that must survive reloads.
//!
//! # Architecture
//!
//! Storage goes through the [`KvStore`] trait, which has two
//! implementations:
//!
//! - [`FileStore`]: JSON object file at `~/.tessera/store.json` (default)
//! - [`MemoryStore`]: process-local map for tests and embedding
//!
//! # Keys
//!
//! - [`OVERRIDES_KEY`]: JSON-encoded import map overrides
//! - [`DEVTOOLS_KEY`]: `"true"`/`"false"` diagnostics overlay flag

mod file_store;
mod memory_store;
mod traits;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{KvStore, StoreError};

/// Key under which import map overrides are persisted.
pub const OVERRIDES_KEY: &str = "importMapOverrides";

/// Key under which the devtools overlay flag is persisted.
pub const DEVTOOLS_KEY: &str = "tessera-devtools";
