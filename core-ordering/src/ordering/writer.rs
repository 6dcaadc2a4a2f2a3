//! Collision-free bulk position rewrite.
//!
//! SQLite checks `UNIQUE (parent, position)` row by row while an `UPDATE`
//! runs, so rewriting positions in place can fail halfway even when the final
//! assignment is valid. The writer avoids that in two phases:
//!
//! 1. Shift every row of the scope by an offset larger than the current
//!    maximum position. Each row lands above every unshifted value, and the
//!    target range `0..n` is left empty.
//! 2. Write the final positions with one `CASE` update per chunk of ids.
//!
//! Both phases run on the caller's transaction; any failure rolls back to the
//! previous ordering.

use crate::entity::{OrderedTable, Position};
use crate::error::{OrderingError, Result};
use crate::ordering::scope::ID_CHUNK;
use sqlx::{query, query_as, query_scalar, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;
use tracing::{debug, info};

/// Offset for phase one: at least `base`, and always above `max_position`.
pub fn shift_offset(base: Position, max_position: Option<Position>) -> Position {
    match max_position {
        Some(max) => base.max(max + 1),
        None => base,
    }
}

/// Rewrites the scope so that `order[i]` holds position `i`.
///
/// `order` must list every item of the scope exactly once; anything else is
/// reported as `ConstraintConflict` and nothing is committed.
pub async fn write_positions<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    order: &[T::Id],
    base_offset: Position,
) -> Result<()> {
    let mut seen = HashSet::with_capacity(order.len());
    if let Some(duplicate) = order.iter().find(|id| !seen.insert(**id)) {
        return Err(OrderingError::ConstraintConflict {
            message: format!(
                "{} {} appears twice in the target ordering",
                T::ENTITY,
                duplicate
            ),
        });
    }

    // Phase 1: move the whole scope out of the way.
    let max_sql = format!(
        "SELECT MAX(position) FROM {} WHERE {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );
    let max: Option<Position> = query_scalar(&max_sql)
        .bind(parent)
        .fetch_one(&mut *conn)
        .await?;
    let offset = shift_offset(base_offset, max);

    let shift_sql = format!(
        "UPDATE {} SET position = position + ? WHERE {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );
    let shifted = query(&shift_sql)
        .bind(offset)
        .bind(parent)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    debug!(table = T::TABLE, parent = %parent, offset, shifted, "Phase 1 shift complete");

    // Phase 2: final positions, keyed by id.
    let mut written = 0u64;
    for (chunk_index, chunk) in order.chunks(ID_CHUNK).enumerate() {
        let first_position = (chunk_index * ID_CHUNK) as Position;

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET position = CASE id", T::TABLE));
        for (i, id) in chunk.iter().enumerate() {
            builder
                .push(" WHEN ")
                .push_bind(*id)
                .push(" THEN ")
                .push_bind(first_position + i as Position);
        }
        builder
            .push(" END WHERE ")
            .push(T::PARENT_COLUMN)
            .push(" = ")
            .push_bind(parent)
            .push(" AND id IN (");
        {
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
        }
        builder.push(")");

        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    verify_dense::<T>(conn, parent, order.len(), shifted, written).await?;

    info!(
        table = T::TABLE,
        parent = %parent,
        items = order.len(),
        "Positions rewritten"
    );
    Ok(())
}

/// Checks that the scope now holds exactly positions `0..expected`.
async fn verify_dense<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    expected: usize,
    shifted: u64,
    written: u64,
) -> Result<()> {
    let sql = format!(
        "SELECT COUNT(*), MIN(position), MAX(position) FROM {} WHERE {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );
    let (count, min, max): (i64, Option<Position>, Option<Position>) = query_as(&sql)
        .bind(parent)
        .fetch_one(&mut *conn)
        .await?;

    let expected_max = (expected as Position).checked_sub(1).filter(|m| *m >= 0);
    let dense = count as usize == expected
        && shifted as usize == expected
        && written as usize == expected
        && min == expected_max.map(|_| 0)
        && max == expected_max;

    if !dense {
        return Err(OrderingError::ConstraintConflict {
            message: format!(
                "{} scope {} not dense after rewrite: expected {} items, found {} \
                 (shifted {}, written {}, min {:?}, max {:?})",
                T::TABLE,
                parent,
                expected,
                count,
                shifted,
                written,
                min,
                max
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Favorite, FavoriteId, TrackId, UserId};
    use crate::ordering::scope;

    #[test]
    fn test_shift_offset_clears_existing_positions() {
        assert_eq!(shift_offset(1_000_000, None), 1_000_000);
        assert_eq!(shift_offset(1_000_000, Some(3)), 1_000_000);
        assert_eq!(shift_offset(1_000_000, Some(2_500_000)), 2_500_001);
        assert_eq!(shift_offset(1, Some(4)), 5);
    }

    async fn seed(conn: &mut SqliteConnection, owner: UserId, positions: &[Position]) -> Vec<FavoriteId> {
        let mut ids = Vec::new();
        for position in positions {
            let item = scope::insert_item::<Favorite>(conn, owner, *position, &TrackId::new())
                .await
                .unwrap();
            ids.push(item.id);
        }
        ids
    }

    #[core_async::test]
    async fn test_rewrite_onto_occupied_positions() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = UserId::new();
        let ids = seed(&mut conn, owner, &[0, 1, 2]).await;

        // Every target slot is currently held by a different item.
        write_positions::<Favorite>(&mut conn, owner, &[ids[2], ids[0], ids[1]], 1_000_000)
            .await
            .unwrap();

        let positions = scope::load_positions::<Favorite>(&mut conn, owner)
            .await
            .unwrap();
        assert_eq!(positions, vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]);
    }

    #[core_async::test]
    async fn test_small_offset_still_collision_free() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = UserId::new();
        let ids = seed(&mut conn, owner, &[0, 3, 4]).await;

        // A base offset of 1 would collide; the writer raises it above the max.
        write_positions::<Favorite>(&mut conn, owner, &[ids[1], ids[2], ids[0]], 1)
            .await
            .unwrap();

        let positions = scope::load_positions::<Favorite>(&mut conn, owner)
            .await
            .unwrap();
        assert_eq!(positions, vec![(ids[1], 0), (ids[2], 1), (ids[0], 2)]);
    }

    #[core_async::test]
    async fn test_partial_mapping_is_rejected_and_rolled_back() {
        let pool = create_test_pool().await.unwrap();
        let owner = UserId::new();

        let ids = {
            let mut conn = pool.acquire().await.unwrap();
            seed(&mut conn, owner, &[0, 1, 2]).await
        };

        let mut tx = pool.begin().await.unwrap();
        let result = write_positions::<Favorite>(&mut tx, owner, &[ids[1], ids[0]], 1_000_000).await;
        assert!(matches!(
            result,
            Err(OrderingError::ConstraintConflict { .. })
        ));
        drop(tx);

        let mut conn = pool.acquire().await.unwrap();
        let positions = scope::load_positions::<Favorite>(&mut conn, owner)
            .await
            .unwrap();
        assert_eq!(positions, vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]);
    }

    #[core_async::test]
    async fn test_duplicate_ids_rejected_before_writing() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = UserId::new();
        let ids = seed(&mut conn, owner, &[0, 1]).await;

        let result =
            write_positions::<Favorite>(&mut conn, owner, &[ids[0], ids[0]], 1_000_000).await;
        assert!(matches!(
            result,
            Err(OrderingError::ConstraintConflict { .. })
        ));

        let positions = scope::load_positions::<Favorite>(&mut conn, owner)
            .await
            .unwrap();
        assert_eq!(positions, vec![(ids[0], 0), (ids[1], 1)]);
    }

    #[core_async::test]
    async fn test_empty_scope_empty_order() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        write_positions::<Favorite>(&mut conn, UserId::new(), &[], 1_000_000)
            .await
            .unwrap();
    }
}
