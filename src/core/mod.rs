//! core
//!
//! Core domain types and configuration for Tessera.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Specifier, SlotId
//! - [`route`] - Route normalization and matching
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Route matching is pure and deterministic

pub mod config;
pub mod route;
pub mod types;
