//! Entity-specific operations on top of [`OrderedCollection`](crate::OrderedCollection).
//!
//! Each repository is an async trait plus a SQLite implementation, so callers
//! can hold `Arc<dyn ...Repository>` and swap in a fake for handler tests.

pub mod album_track;
pub mod favorite;

pub use album_track::{AlbumTrackRepository, Attached, SqliteAlbumTrackRepository};
pub use favorite::{FavoriteRepository, SqliteFavoriteRepository};
