//! core::route
//!
//! Route matching for fragment slots.
//!
//! # Matching Behavior
//!
//! Both the declared route and the current path are normalized before
//! comparison:
//!
//! - lower-cased, unless case-sensitive matching is requested
//! - the declared route gets a leading `/` if it lacks one
//! - trailing slashes are stripped from both
//!
//! An exact match requires the normalized strings to be equal. The default
//! (prefix) match also accepts any path nested below the route, so
//! `dashboard` matches `/dashboard` and `/dashboard/settings` but not
//! `/dashboard-2`.
//!
//! # Example
//!
//! ```
//! use tessera::core::route::{route_matches, MatchOptions};
//!
//! let opts = MatchOptions::default();
//! assert!(route_matches("dashboard", "/dashboard/settings", opts));
//! assert!(route_matches("/Dashboard/", "/dashboard", opts));
//! assert!(!route_matches("dashboard", "/dashboard-2", opts));
//! ```

use serde::{Deserialize, Serialize};

/// Options controlling how a route is compared to a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Require the path to equal the route instead of nesting under it.
    pub exact: bool,
    /// Compare without lower-casing.
    pub case_sensitive: bool,
}

impl MatchOptions {
    /// Prefix matching, case-sensitive.
    pub fn case_sensitive() -> Self {
        Self {
            exact: false,
            case_sensitive: true,
        }
    }

    /// Exact matching, case-insensitive.
    pub fn exact() -> Self {
        Self {
            exact: true,
            case_sensitive: false,
        }
    }
}

/// Normalize a declared route: case fold, leading slash, no trailing slash.
///
/// The root route `/` normalizes to the empty string, which the prefix rule
/// then treats as matching every path.
pub fn normalize_route(route: &str, case_sensitive: bool) -> String {
    let mut route = if case_sensitive {
        route.to_string()
    } else {
        route.to_lowercase()
    };

    if !route.starts_with('/') {
        route.insert(0, '/');
    }

    strip_trailing_slashes(&route).to_string()
}

/// Normalize a navigation path: case fold and no trailing slash.
pub fn normalize_path(path: &str, case_sensitive: bool) -> String {
    let path = if case_sensitive {
        path.to_string()
    } else {
        path.to_lowercase()
    };

    strip_trailing_slashes(&path).to_string()
}

fn strip_trailing_slashes(value: &str) -> &str {
    value.trim_end_matches('/')
}

/// Check whether `route` matches the navigation `path`.
pub fn route_matches(route: &str, path: &str, options: MatchOptions) -> bool {
    let route = normalize_route(route, options.case_sensitive);
    let path = normalize_path(path, options.case_sensitive);

    if options.exact {
        return path == route;
    }

    path == route || path.starts_with(&format!("{}/", route))
}
