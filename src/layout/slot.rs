//! layout::slot
//!
//! Declared fragment slots and the pure mount plan.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::route::{route_matches, MatchOptions};
use crate::core::types::SlotId;
use crate::navigation::NavigationState;

/// Tag name of the layout container.
pub const LAYOUT_TAG: &str = "tessera-layout";

/// Tag name of a fragment placeholder.
pub const FRAGMENT_TAG: &str = "tessera-fragment";

/// Where a slot renders: its parent element and position among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Anchor {
    /// Element path from the layout container, e.g.
    /// `tessera-layout > main[1]`.
    pub parent: String,
    /// Index of the placeholder among the parent's element children.
    pub index: usize,
}

impl Anchor {
    /// An anchor directly under the layout container.
    pub fn root(index: usize) -> Self {
        Self {
            parent: LAYOUT_TAG.to_string(),
            index,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.parent, self.index)
    }
}

/// A placeholder as found in the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotTemplate {
    pub id: SlotId,
    pub name: String,
    pub route: Option<String>,
    pub is_default: bool,
    pub anchor: Anchor,
    /// Position in document order.
    pub order: usize,
}

/// Predicate deciding whether a slot may mount for a navigation.
pub type ShouldMount = Arc<dyn Fn(&NavigationState) -> bool + Send + Sync>;

/// Capabilities supplied for a fragment at registration time.
///
/// Anything left unset falls back to what the template declares.
#[derive(Clone, Default)]
pub struct SlotCapabilities {
    pub route: Option<String>,
    pub is_default: Option<bool>,
    pub should_mount: Option<ShouldMount>,
}

impl SlotCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn default_slot(mut self) -> Self {
        self.is_default = Some(true);
        self
    }

    pub fn should_mount<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NavigationState) -> bool + Send + Sync + 'static,
    {
        self.should_mount = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for SlotCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotCapabilities")
            .field("route", &self.route)
            .field("is_default", &self.is_default)
            .field("should_mount", &self.should_mount.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A slot with capabilities applied.
#[derive(Clone)]
pub struct DeclaredSlot {
    pub template: SlotTemplate,
    /// Effective route. `None` is persistent.
    pub route: Option<String>,
    pub is_default: bool,
    should_mount: Option<ShouldMount>,
}

impl DeclaredSlot {
    /// Apply `caps` on top of `template`.
    pub fn new(template: SlotTemplate, caps: Option<&SlotCapabilities>) -> Self {
        let route = caps
            .and_then(|c| c.route.clone())
            .or_else(|| template.route.clone());
        let is_default = caps
            .and_then(|c| c.is_default)
            .unwrap_or(template.is_default);
        Self {
            route,
            is_default,
            should_mount: caps.and_then(|c| c.should_mount.clone()),
            template,
        }
    }

    /// Apply capabilities keyed by fragment name to every template.
    pub fn declare_all(
        templates: &[SlotTemplate],
        caps: &HashMap<String, SlotCapabilities>,
    ) -> Vec<Self> {
        templates
            .iter()
            .map(|t| Self::new(t.clone(), caps.get(&t.name)))
            .collect()
    }

    pub fn id(&self) -> SlotId {
        self.template.id
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Routed: has a route and is not a default slot.
    pub fn is_routed(&self) -> bool {
        self.route.is_some() && !self.is_default
    }

    fn allows(&self, state: &NavigationState) -> bool {
        self.should_mount.as_ref().map_or(true, |f| f(state))
    }

    fn route_allows(&self, state: &NavigationState, options: MatchOptions) -> bool {
        match &self.route {
            Some(route) => route_matches(route, &state.path, options),
            None => true,
        }
    }
}

impl fmt::Debug for DeclaredSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredSlot")
            .field("id", &self.template.id)
            .field("name", &self.template.name)
            .field("route", &self.route)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

/// Slots that should be mounted for `state`, in declaration order.
///
/// - routed slot: route matches and `should_mount` passes
/// - persistent slot: `should_mount` passes
/// - default slots: only when no routed slot would mount, and then only the
///   first default (declaration order) whose `should_mount` passes; a default
///   slot's own route is not consulted
pub fn plan(slots: &[DeclaredSlot], state: &NavigationState, options: MatchOptions) -> Vec<SlotId> {
    let routed_match = slots
        .iter()
        .filter(|s| s.is_routed())
        .any(|s| s.route_allows(state, options) && s.allows(state));

    let chosen_default = if routed_match {
        None
    } else {
        slots
            .iter()
            .find(|s| s.is_default && s.allows(state))
            .map(DeclaredSlot::id)
    };

    slots
        .iter()
        .filter(|s| {
            if s.is_default {
                Some(s.id()) == chosen_default
            } else {
                s.route_allows(state, options) && s.allows(state)
            }
        })
        .map(DeclaredSlot::id)
        .collect()
}
