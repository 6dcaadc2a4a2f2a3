//! Runtime shim for the ordering core.
//!
//! Every `core-*` crate depends on this crate instead of on Tokio. It
//! re-exports the small slice of the executor the engine and its tests use:
//!
//! - `runtime`: `block_on` for synchronous entry points and tests
//! - `task`: spawning concurrent work
//! - `time`: sleeping between retries
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! core_async::runtime::block_on(async {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! });
//! ```

// Lets the attribute macros expand to `core_async::...` inside this crate too.
extern crate self as core_async;

pub use core_async_macros::{main, test};

pub mod runtime;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
