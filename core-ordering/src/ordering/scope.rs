//! Scope-level storage primitives shared by the ordering components.
//!
//! Everything here runs on a caller-owned connection, normally the inside of
//! a transaction opened by [`OrderedCollection`](crate::OrderedCollection).

use crate::entity::{OrderedTable, Position};
use crate::error::Result;
use sqlx::{query, query_as, query_scalar, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

/// Ids per statement when a scope operation binds an id list.
pub(crate) const ID_CHUNK: usize = 400;

/// Takes the write lock for `parent`'s scope and returns the scope's new version.
///
/// Must be the first statement of the transaction: SQLite grants the write
/// lock on the first write, and taking it before any read means no other
/// writer can change the scope between this transaction's reads and writes.
pub async fn lock_scope<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<i64> {
    let version: i64 = query_scalar(
        r#"
        INSERT INTO ordering_scope_locks (scope_table, parent_id, version, updated_at)
        VALUES (?, ?, 1, ?)
        ON CONFLICT (scope_table, parent_id)
        DO UPDATE SET version = version + 1, updated_at = excluded.updated_at
        RETURNING version
        "#,
    )
    .bind(T::TABLE)
    .bind(parent)
    .bind(chrono::Utc::now().timestamp())
    .fetch_one(&mut *conn)
    .await?;

    debug!(table = T::TABLE, parent = %parent, version, "Scope locked");
    Ok(version)
}

/// Loads `(id, position)` for every item in the scope, in iteration order.
pub async fn load_positions<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<Vec<(T::Id, Position)>> {
    let sql = format!(
        "SELECT id, position FROM {} WHERE {} = ? ORDER BY position ASC, id ASC",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let rows = query_as::<_, (T::Id, Position)>(&sql)
        .bind(parent)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

/// Loads every row in the scope, in iteration order.
pub async fn load_items<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ? ORDER BY position ASC, id ASC",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let items = query_as::<_, T>(&sql)
        .bind(parent)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

/// Loads one row by id, only if it belongs to `parent`.
pub async fn find_item<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    id: T::Id,
) -> Result<Option<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE id = ? AND {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let item = query_as::<_, T>(&sql)
        .bind(id)
        .bind(parent)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(item)
}

/// Inserts a row at `position` and returns it as stored.
pub async fn insert_item<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    position: Position,
    payload: &T::Payload,
) -> Result<T> {
    let mut columns = vec![T::PARENT_COLUMN, "position", "created_at"];
    columns.extend_from_slice(T::PAYLOAD_COLUMNS);
    let placeholders = vec!["?"; columns.len()].join(", ");

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        T::TABLE,
        columns.join(", "),
        placeholders
    );

    let statement = query(&sql)
        .bind(parent)
        .bind(position)
        .bind(chrono::Utc::now().timestamp());
    let row = T::bind_payload(statement, payload)
        .fetch_one(&mut *conn)
        .await?;

    let item = T::from_row(&row)?;
    Ok(item)
}

/// Deletes the given ids from the scope and returns the ids actually removed.
///
/// Ids outside the scope are left alone.
pub async fn delete_items<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    ids: &[T::Id],
) -> Result<Vec<T::Id>> {
    let mut removed = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE ", T::TABLE));
        builder.push(T::PARENT_COLUMN).push(" = ").push_bind(parent);
        builder.push(" AND id IN (");
        {
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
        }
        builder.push(") RETURNING id");

        let deleted: Vec<T::Id> = builder
            .build_query_scalar()
            .fetch_all(&mut *conn)
            .await?;
        removed.extend(deleted);
    }

    Ok(removed)
}

/// Counts the items in the scope.
pub async fn count_items<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let count: i64 = query_scalar(&sql)
        .bind(parent)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}
