//! Post-removal renumbering.

use crate::entity::{OrderedTable, Position};
use crate::error::Result;
use crate::ordering::scope;
use sqlx::{query, SqliteConnection};
use tracing::{debug, info};

/// A scope after compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compacted<T> {
    /// Remaining items, in order, with their new positions.
    pub items: Vec<T>,
    /// Number of rows whose position changed.
    pub changed: usize,
}

/// Renumbers `parent`'s scope to `0..n-1`, keeping the current order.
///
/// Rows are updated one at a time from the lowest position up. With unique
/// non-negative positions sorted ascending, the i-th row always sits at or
/// above `i`, and every slot below it is already final, so each move lands on
/// a free slot. Rows already in place are not written, which makes a second
/// run a no-op.
pub async fn compact<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
) -> Result<Compacted<T>> {
    let mut items = scope::load_items::<T>(conn, parent).await?;

    let sql = format!(
        "UPDATE {} SET position = ? WHERE id = ? AND {} = ?",
        T::TABLE,
        T::PARENT_COLUMN
    );

    let mut changed = 0;
    for (index, item) in items.iter_mut().enumerate() {
        let target = index as Position;
        if item.position() == target {
            continue;
        }

        query(&sql)
            .bind(target)
            .bind(item.id())
            .bind(parent)
            .execute(&mut *conn)
            .await?;
        item.set_position(target);
        changed += 1;
    }

    if changed > 0 {
        info!(
            table = T::TABLE,
            parent = %parent,
            items = items.len(),
            changed,
            "Scope compacted"
        );
    } else {
        debug!(table = T::TABLE, parent = %parent, "Scope already dense");
    }

    Ok(Compacted { items, changed })
}
