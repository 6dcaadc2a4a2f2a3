//! Capabilities an entity needs to live in an ordered collection.
//!
//! [`OrderedItem`] is what the engine reads and writes on a row: its id, the
//! parent that scopes it, and its position. [`OrderedTable`] adds the storage
//! mapping the SQL layer needs (table and column names, payload binding).

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Decode, Encode, FromRow, Sqlite, Type};
use std::fmt;
use std::hash::Hash;

/// Position of an item inside its parent's collection.
pub type Position = i64;

/// Query type produced by `sqlx::query` against SQLite.
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// An opaque identifier that can be bound to and decoded from SQLite.
///
/// Implemented for every id newtype in [`models`](crate::models); parents and
/// items are both keyed by values of this kind.
pub trait ScopeKey:
    for<'q> Encode<'q, Sqlite>
    + for<'r> Decode<'r, Sqlite>
    + Type<Sqlite>
    + Copy
    + Eq
    + Hash
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + Unpin
    + 'static
{
}

impl<T> ScopeKey for T where
    T: for<'q> Encode<'q, Sqlite>
        + for<'r> Decode<'r, Sqlite>
        + Type<Sqlite>
        + Copy
        + Eq
        + Hash
        + fmt::Debug
        + fmt::Display
        + Send
        + Sync
        + Unpin
        + 'static
{
}

/// A member of a parent-scoped, user-ordered collection.
pub trait OrderedItem {
    type Id: ScopeKey;
    type ParentId: ScopeKey;

    fn id(&self) -> Self::Id;

    fn parent_id(&self) -> Self::ParentId;

    fn position(&self) -> Position;

    fn set_position(&mut self, position: Position);
}

/// Storage mapping for an [`OrderedItem`] kept in its own SQLite table.
///
/// The table must have an `INTEGER PRIMARY KEY` column named `id`, the parent
/// column, `position`, `created_at`, and the payload columns, with
/// `UNIQUE (parent, position)`.
pub trait OrderedTable:
    OrderedItem + for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static
{
    /// Caller-supplied fields written on insert.
    type Payload: Send + Sync;

    const TABLE: &'static str;

    const PARENT_COLUMN: &'static str;

    /// Payload columns, in the order `bind_payload` binds them.
    const PAYLOAD_COLUMNS: &'static [&'static str];

    /// Human-readable entity name for errors and logs.
    const ENTITY: &'static str;

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q Self::Payload) -> SqliteQuery<'q>;

    /// Rejects a payload before any storage access.
    fn validate_payload(_payload: &Self::Payload) -> Result<(), String> {
        Ok(())
    }
}
