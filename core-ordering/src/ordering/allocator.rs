//! Position allocation for appended items.

use crate::entity::{OrderedTable, Position};
use crate::error::Result;
use sqlx::{query_scalar, SqliteConnection};
use tracing::debug;

/// Position that follows `max`, or `0` for an empty scope.
pub fn position_after(max: Option<Position>) -> Position {
    max.map_or(0, |max| max + 1)
}

/// Returns the tail position for a new item in `parent`'s scope.
///
/// Must run in the same transaction as the insert, after the scope lock, so
/// no other appender can take the same slot; `UNIQUE (parent, position)`
/// still rejects the insert if that is ever violated.
pub async fn next_position<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<Position> {
    let sql = format!(
        "SELECT MAX(position) FROM {} WHERE {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let max: Option<Position> = query_scalar(&sql)
        .bind(parent)
        .fetch_one(&mut *conn)
        .await?;

    let position = position_after(max);
    debug!(table = T::TABLE, parent = %parent, ?max, position, "Allocated position");
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Favorite, TrackId, UserId};
    use crate::ordering::scope;

    #[test]
    fn test_position_after() {
        assert_eq!(position_after(None), 0);
        assert_eq!(position_after(Some(0)), 1);
        assert_eq!(position_after(Some(5)), 6);
    }

    #[core_async::test]
    async fn test_next_position_empty_scope_is_zero() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let position = next_position::<Favorite>(&mut conn, UserId::new())
            .await
            .unwrap();
        assert_eq!(position, 0);
    }

    #[core_async::test]
    async fn test_next_position_follows_max_not_count() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = UserId::new();

        scope::insert_item::<Favorite>(&mut conn, owner, 1, &TrackId::new())
            .await
            .unwrap();
        scope::insert_item::<Favorite>(&mut conn, owner, 5, &TrackId::new())
            .await
            .unwrap();

        let position = next_position::<Favorite>(&mut conn, owner).await.unwrap();
        assert_eq!(position, 6);

        // Other scopes are unaffected.
        let other = next_position::<Favorite>(&mut conn, UserId::new())
            .await
            .unwrap();
        assert_eq!(other, 0);
    }
}
