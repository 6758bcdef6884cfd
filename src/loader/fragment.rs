//! loader::fragment
//!
//! The lifecycle contract every loadable fragment implements.
//!
//! A fragment is whatever a module load produces: something the layout can
//! `mount` at an anchor, later `unmount`, and optionally `update` when the
//! path changes without the fragment leaving the surface. `bootstrap` runs
//! once per slot before the first mount.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::layout::Anchor;

/// Errors raised by fragment lifecycle methods.
#[derive(Debug, Clone, Error)]
pub enum FragmentError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("mount failed: {0}")]
    Mount(String),

    #[error("unmount failed: {0}")]
    Unmount(String),

    #[error("update failed: {0}")]
    Update(String),
}

/// Properties handed to a fragment on mount and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountProps {
    /// Fragment name (its module specifier).
    pub name: String,
    /// Route the slot is scoped to, if any.
    pub route: Option<String>,
    /// Current navigation path.
    pub path: String,
    /// Where in the surface the fragment renders.
    pub anchor: Anchor,
}

/// Opaque per-mount state returned by [`Fragment::mount`].
///
/// The reconciler stores it in the live-instance registry and gives it back
/// on `update` and `unmount`. Fragments downcast it to their own type.
pub struct MountHandle(Box<dyn Any + Send + Sync>);

impl MountHandle {
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self(Box::new(state))
    }

    /// A handle carrying no state.
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MountHandle(..)")
    }
}

/// A mountable application fragment.
#[async_trait]
pub trait Fragment: Send + Sync {
    /// One-time initialization before the first mount of a slot.
    async fn bootstrap(&self) -> Result<(), FragmentError> {
        Ok(())
    }

    /// Render into the surface at `props.anchor`.
    async fn mount(&self, props: MountProps) -> Result<MountHandle, FragmentError>;

    /// Remove from the surface.
    async fn unmount(&self, handle: MountHandle) -> Result<(), FragmentError>;

    /// The path changed while the fragment stayed mounted.
    async fn update(&self, _handle: &MountHandle, _props: MountProps) -> Result<(), FragmentError> {
        Ok(())
    }
}
