//! # Core Ordering
//!
//! Keeps user-reorderable collections (uploaded tracks, albums in a library,
//! tracks in an album, items in a playlist, favorites) uniquely and densely
//! ordered under a storage-level `UNIQUE (parent, position)` constraint.
//!
//! ## Overview
//!
//! - [`OrderedCollection`] is the entry point: append, insert, reorder, move,
//!   remove and compact, each in its own scope-locked transaction.
//! - [`ordering`] holds the engine components the collection drives.
//! - [`models`] defines the six concrete collections; [`repositories`] adds
//!   the entity-specific operations built on top of them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_ordering::{db, models::*, OrderedCollection};
//!
//! let pool = db::create_pool(db::DatabaseConfig::new("library.db")).await?;
//! let favorites = OrderedCollection::<Favorite>::new(pool);
//!
//! let owner = UserId::new();
//! let first = favorites.append_item(owner, &TrackId::new()).await?;
//! let second = favorites.append_item(owner, &TrackId::new()).await?;
//! favorites.reorder(owner, &[second.id, first.id]).await?;
//! ```

pub mod collection;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod models;
pub mod ordering;
pub mod repositories;
pub mod request;

pub use collection::OrderedCollection;
pub use config::{ForeignIdPolicy, OrderingConfig};
pub use entity::{OrderedItem, OrderedTable, Position, ScopeKey};
pub use error::{OrderingError, Result};
pub use ordering::ReorderOutcome;
pub use request::ReorderRequest;
