//! Property-based tests for resolution and route matching.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use tessera::core::route::{normalize_route, route_matches, MatchOptions};
use tessera::resolution::{ImportMap, Origin, ResolutionTable};
use tessera::store::{MemoryStore, OVERRIDES_KEY};

/// Strategy for bare specifiers like `@shop/cart`.
fn specifier() -> impl Strategy<Value = String> {
    ("[a-z]{1,6}", "[a-z]{1,8}").prop_map(|(scope, name)| format!("@{}/{}", scope, name))
}

/// Strategy for a route segment.
fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,7}"
}

fn segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..4)
}

fn table(base: &BTreeMap<String, String>, overrides: &BTreeMap<String, String>) -> ResolutionTable {
    let store = MemoryStore::with_entries([(
        OVERRIDES_KEY,
        serde_json::to_string(overrides).unwrap(),
    )]);
    ResolutionTable::new(
        ImportMap {
            imports: base.clone(),
        },
        Arc::new(store),
    )
    .unwrap()
}

proptest! {
    /// resolve(s) == override[s] ?? base[s] ?? s
    #[test]
    fn resolution_layers(
        base_keys in prop::collection::btree_set(specifier(), 0..6),
        override_keys in prop::collection::btree_set(specifier(), 0..6),
        probe in specifier(),
    ) {
        let base: BTreeMap<String, String> = base_keys
            .iter()
            .map(|k| (k.clone(), format!("https://cdn.example.com/{}.js", k.replace('@', ""))))
            .collect();
        let overrides: BTreeMap<String, String> = override_keys
            .iter()
            .map(|k| (k.clone(), format!("http://localhost:8080/{}.js", k.replace('@', ""))))
            .collect();
        let table = table(&base, &overrides);

        let mut probes: Vec<String> = base.keys().chain(overrides.keys()).cloned().collect();
        probes.push(probe);

        for s in probes {
            let expected = overrides
                .get(&s)
                .or_else(|| base.get(&s))
                .cloned()
                .unwrap_or_else(|| s.clone());
            let resolution = table.resolve(&s);
            prop_assert_eq!(&resolution.location, &expected);

            let origin = if overrides.contains_key(&s) {
                Origin::Override
            } else if base.contains_key(&s) {
                Origin::Base
            } else {
                Origin::Passthrough
            };
            prop_assert_eq!(resolution.origin, origin);
        }
    }

    /// `/Seg/`, `seg` and `/seg` are the same route.
    #[test]
    fn route_spellings_match_alike(route in segments(), path in segments()) {
        let joined = route.join("/");
        let spellings = [
            format!("/{}", joined),
            joined.clone(),
            format!("/{}/", joined.to_uppercase()),
        ];
        let path = format!("/{}", path.join("/"));
        let opts = MatchOptions::default();

        let expected = route_matches(&spellings[0], &path, opts);
        for spelling in &spellings {
            prop_assert_eq!(route_matches(spelling, &path, opts), expected);
            prop_assert_eq!(normalize_route(spelling, false), spellings[0].clone());
        }
    }

    /// A route matches every path nested below it.
    #[test]
    fn nested_paths_match(route in segments(), rest in segments()) {
        let route = format!("/{}", route.join("/"));
        let nested = format!("{}/{}", route, rest.join("/"));
        prop_assert!(route_matches(&route, &nested, MatchOptions::default()));
        prop_assert!(!route_matches(&route, &nested, MatchOptions::exact()));
        let slashed = format!("{}/", route);
        prop_assert!(route_matches(&route, &slashed, MatchOptions::exact()));
    }

    /// Appending characters to the last segment never produces a match.
    #[test]
    fn sibling_prefix_does_not_match(route in segments(), suffix in "[a-z0-9]{1,4}") {
        let route = format!("/{}", route.join("/"));
        let sibling = format!("{}{}", route, suffix);
        prop_assert!(!route_matches(&route, &sibling, MatchOptions::default()));
    }
}
