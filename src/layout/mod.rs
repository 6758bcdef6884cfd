//! layout
//!
//! Declared fragment slots and the route-driven reconciler.
//!
//! # Architecture
//!
//! - [`LayoutTemplate`]: scans the page template once for placeholders
//! - [`DeclaredSlot`] / [`plan`]: applies registration-time capabilities and
//!   decides, purely, which slots belong on the surface for a path
//! - [`Reconciler`]: owns the live-instance registry and performs the
//!   mounts and unmounts the plan calls for
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use tessera::core::route::MatchOptions;
//! use tessera::layout::{plan, DeclaredSlot, LayoutTemplate};
//! use tessera::navigation::NavigationState;
//!
//! let template = LayoutTemplate::parse(r#"
//!     <tessera-layout>
//!       <tessera-fragment name="@shop/nav"></tessera-fragment>
//!       <tessera-fragment name="@shop/cart" route="/cart"></tessera-fragment>
//!       <tessera-fragment name="@shop/home" default></tessera-fragment>
//!     </tessera-layout>
//! "#).unwrap();
//!
//! let slots = DeclaredSlot::declare_all(template.slots(), &HashMap::new());
//! let state = NavigationState::from_path("/cart/items").unwrap();
//! let mounted = plan(&slots, &state, MatchOptions::default());
//! assert_eq!(mounted.len(), 2);
//! ```

mod reconciler;
mod slot;
mod template;

pub use reconciler::{
    LiveInstance, Readiness, ReconcileObserver, ReconcileReport, Reconciler, SlotError,
};
pub use slot::{
    plan, Anchor, DeclaredSlot, ShouldMount, SlotCapabilities, SlotTemplate, FRAGMENT_TAG,
    LAYOUT_TAG,
};
pub use template::{LayoutTemplate, TemplateError};
