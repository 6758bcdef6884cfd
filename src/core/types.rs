//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Specifier`] - Validated module specifier (bare, relative or absolute)
//! - [`SlotId`] - Stable identity of a declared fragment slot
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so the loader and reconciler never see an empty
//! or whitespace-bearing specifier.
//!
//! # Examples
//!
//! ```
//! use tessera::core::types::{Specifier, SlotId};
//!
//! let spec = Specifier::new("@shop/navbar").unwrap();
//! assert!(spec.is_bare());
//!
//! let relative = Specifier::new("./local.js").unwrap();
//! assert!(relative.is_location());
//!
//! assert!(Specifier::new("").is_err());
//! assert!(Specifier::new("has space").is_err());
//!
//! let a = SlotId::generate();
//! let b = SlotId::generate();
//! assert_ne!(a, b);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid specifier: {0}")]
    InvalidSpecifier(String),
}

/// A validated module specifier.
///
/// A specifier is either a *bare* name looked up in the resolution table
/// (`@shop/navbar`, `react`) or a *location* that bypasses the table: a
/// relative path starting with `.` or an absolute path starting with `/`.
///
/// Rules:
/// - Cannot be empty
/// - Cannot contain whitespace or ASCII control characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Specifier(String);

impl Specifier {
    /// Create a new validated specifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidSpecifier` if the value is empty or contains
    /// whitespace/control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    fn validate(value: &str) -> Result<(), TypeError> {
        if value.is_empty() {
            return Err(TypeError::InvalidSpecifier(
                "specifier cannot be empty".into(),
            ));
        }

        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidSpecifier(format!(
                "specifier '{}' cannot contain whitespace or control characters",
                value.escape_debug()
            )));
        }

        Ok(())
    }

    /// True for relative (`./x`, `../x`) and absolute-path (`/x`) specifiers.
    ///
    /// These are resolved against a base location and never consult the
    /// resolution table.
    pub fn is_location(&self) -> bool {
        self.0.starts_with('.') || self.0.starts_with('/')
    }

    /// True for specifiers that go through the resolution table.
    pub fn is_bare(&self) -> bool {
        !self.is_location()
    }

    /// Get the specifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Specifier {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Specifier {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Specifier> for String {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Specifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a declared fragment slot.
///
/// Assigned once when the layout template is scanned and never reassigned,
/// so it survives any number of reconciliation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(Uuid);

impl SlotId {
    /// Generate a fresh random slot id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell slots apart in logs.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}
