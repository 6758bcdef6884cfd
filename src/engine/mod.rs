//! engine
//!
//! The root app: engine start, launch and shutdown.
//!
//! # Architecture
//!
//! - [`RootApp`]: the lifecycle state machine that ties the loader, the
//!   layout reconciler and the navigator together
//! - [`ManifestSource`]: where the resolution table and stylesheet list
//!   come from ([`FileManifest`], [`HttpManifest`])
//! - [`Host`]: the page shell the engine writes into
//! - [`LifecycleHooks`]: async hooks run at lifecycle points
//!
//! # Lifecycle
//!
//! ```text
//! start_engine: wire table || inject stylesheets || register tags
//!               -> EngineReady -> first reconciliation (background)
//! launch:       wait for first pass -> before-launch hooks -> attach surface
//!               -> arm interceptor -> Live -> launch hooks
//! ```
//!
//! # Example
//!
//! ```ignore
//! let app = RootApp::new(LAYOUT, loader, host, navigator, manifest)?;
//! app.use_route_middleware(Arc::new(middleware_fn("auth", |t| t.path() != "/admin")));
//! app.start_engine().await?;
//! app.launch().await?;
//! ```

mod host;
mod lifecycle;
mod root;
mod wiring;

pub use host::{Host, HostCall, HostError, RecordingHost};
pub use lifecycle::{LifecycleEvent, LifecycleHook, LifecycleHooks};
pub use root::{AppState, EngineError, RootApp};
pub use wiring::{
    source_from_config, FileManifest, HttpManifest, ManifestSource, StaticManifest,
    WiringError,
};
