//! Workspace entry crate.
//!
//! Host applications (the web handlers that render albums, playlists and
//! favorites) depend on `ordering-workspace` and get the ordering service and
//! the engine types through a single dependency. The `service` feature is on
//! by default.

#[cfg(feature = "service")]
pub use core_ordering as ordering;
#[cfg(feature = "service")]
pub use core_service::{bootstrap, CoreError, OrderingService};
#[cfg(feature = "service")]
pub use core_runtime::config::CoreConfig;
