//! # Ordered-Collection Engine
//!
//! The components that keep a parent's collection uniquely ordered:
//!
//! - [`allocator`]: tail position for appended items
//! - [`writer`]: two-phase, collision-free rewrite of a whole scope
//! - [`reorder`]: reconciliation of a client ordering with the stored scope
//! - [`compactor`]: renumbering to `0..n-1` after removals
//! - [`scope`]: scope lock and the shared row-level queries
//!
//! All functions take a `&mut SqliteConnection` and expect the caller to own
//! the surrounding transaction. [`OrderedCollection`](crate::OrderedCollection)
//! is the usual entry point.

pub mod allocator;
pub mod compactor;
pub mod reorder;
pub mod scope;
pub mod writer;

pub use allocator::next_position;
pub use compactor::{compact, Compacted};
pub use reorder::{apply_reorder, merge_order, MergedOrder, ReorderOutcome};
pub use writer::write_positions;
