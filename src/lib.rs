//! Tessera - a micro-frontend orchestration runtime
//!
//! Tessera loads independently built fragments into a shared page shell,
//! decides which fragments belong on the page for the current path, and
//! drives their mount/unmount lifecycle while every navigation passes
//! through one interceptor.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - [`store`] - Durable key-value storage (overrides, devtools flag)
//! - [`resolution`] - Layered specifier -> location table with overrides
//! - [`events`] - Process-wide event bus
//! - [`loader`] - Deduplicating module loader with load telemetry
//! - [`navigation`] - History interception and middleware gating
//! - [`layout`] - Template scanning and route-driven reconciliation
//! - [`engine`] - Root lifecycle controller
//! - [`devtools`] - Privileged diagnostics surface
//! - [`core`] - Configuration, validated types and route matching
//! - [`cli`] / [`ui`] - The `tessera` operator binary
//!
//! # Invariants
//!
//! 1. An override always wins over the base table
//! 2. Concurrent loads of one specifier share a single fetch
//! 3. A reconciliation pass with an unchanged mounted set touches nothing
//! 4. A denied navigation leaves the displayed path unchanged

pub mod cli;
pub mod core;
pub mod devtools;
pub mod engine;
pub mod events;
pub mod layout;
pub mod loader;
pub mod navigation;
pub mod resolution;
pub mod store;
pub mod ui;
