//! Reorder coordination.
//!
//! A reorder request comes from a client view of the collection that may be
//! partial or stale. The coordinator reconciles it with the stored scope:
//!
//! - requested ids that are members keep the caller's relative order;
//! - ids that are not members, and repeats, are dropped;
//! - members the caller left out follow, in their current relative order.
//!
//! The merged order always covers the whole scope exactly once, so a reorder
//! changes where items sit but never which items are there.

use crate::config::{ForeignIdPolicy, OrderingConfig};
use crate::entity::{OrderedTable, Position, ScopeKey};
use crate::error::{OrderingError, Result};
use crate::ordering::{scope, writer};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of merging a requested order into the current membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedOrder<Id> {
    /// Final order, every member exactly once.
    pub order: Vec<Id>,
    /// Requested ids that are not members of the scope.
    pub foreign: Vec<Id>,
    /// Requested ids that appeared more than once (each reported once).
    pub duplicates: Vec<Id>,
}

/// Merges `requested` into `current` (the scope in iteration order).
pub fn merge_order<Id: ScopeKey>(current: &[Id], requested: &[Id]) -> MergedOrder<Id> {
    let members: HashSet<Id> = current.iter().copied().collect();
    let mut kept: HashSet<Id> = HashSet::with_capacity(requested.len().min(current.len()));
    let mut order = Vec::with_capacity(current.len());
    let mut reported: HashSet<Id> = HashSet::new();
    let mut foreign = Vec::new();
    let mut duplicates = Vec::new();

    for id in requested {
        if !members.contains(id) {
            if reported.insert(*id) {
                foreign.push(*id);
            }
        } else if kept.insert(*id) {
            order.push(*id);
        } else if reported.insert(*id) {
            duplicates.push(*id);
        }
    }

    order.extend(current.iter().filter(|id| !kept.contains(*id)).copied());

    MergedOrder {
        order,
        foreign,
        duplicates,
    }
}

/// Outcome of a reorder call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderOutcome<Id> {
    /// The confirmed final ordering of the scope.
    pub order: Vec<Id>,
    /// Requested ids ignored: non-members first, then repeats.
    pub dropped: Vec<Id>,
    /// Whether any position was written.
    pub changed: bool,
}

/// True when `current` already stores `order` at positions `0..n-1`.
fn already_in_place<Id: ScopeKey>(current: &[(Id, Position)], order: &[Id]) -> bool {
    current.len() == order.len()
        && current
            .iter()
            .zip(order)
            .enumerate()
            .all(|(index, ((id, position), wanted))| {
                id == wanted && *position == index as Position
            })
}

/// Reconciles `requested` with the scope and persists the merged order.
///
/// The caller must hold the scope lock on `conn`'s transaction.
pub async fn apply_reorder<T: OrderedTable>(
    conn: &mut SqliteConnection,
    parent: T::ParentId,
    requested: &[T::Id],
    config: &OrderingConfig,
) -> Result<ReorderOutcome<T::Id>> {
    let current = scope::load_positions::<T>(conn, parent).await?;
    let current_ids: Vec<T::Id> = current.iter().map(|(id, _)| *id).collect();

    let merged = merge_order(&current_ids, requested);

    if !merged.foreign.is_empty() {
        match config.foreign_id_policy {
            ForeignIdPolicy::Reject => {
                return Err(OrderingError::ScopeViolation {
                    scope: format!("{}:{}", T::TABLE, parent),
                    item_id: merged.foreign[0].to_string(),
                });
            }
            ForeignIdPolicy::Drop => {
                warn!(
                    table = T::TABLE,
                    parent = %parent,
                    dropped = merged.foreign.len(),
                    first = %merged.foreign[0],
                    "Ignoring ids outside the scope"
                );
            }
        }
    }

    if !merged.duplicates.is_empty() {
        debug!(
            table = T::TABLE,
            parent = %parent,
            duplicates = merged.duplicates.len(),
            "Ignoring repeated ids"
        );
    }

    let changed = !already_in_place(&current, &merged.order);
    if changed {
        writer::write_positions::<T>(conn, parent, &merged.order, config.shift_offset).await?;
    } else {
        debug!(table = T::TABLE, parent = %parent, "Order unchanged, nothing written");
    }

    let mut dropped = merged.foreign;
    dropped.extend(merged.duplicates);

    Ok(ReorderOutcome {
        order: merged.order,
        dropped,
        changed,
    })
}

/// Builds the requested order that moves `id` to `index` (clamped to the tail).
pub fn order_with_move<Id: ScopeKey>(current: &[Id], id: Id, index: usize) -> Vec<Id> {
    let mut order: Vec<Id> = current.iter().copied().filter(|other| *other != id).collect();
    let index = index.min(order.len());
    order.insert(index, id);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FavoriteId;

    fn ids(raw: &[i64]) -> Vec<FavoriteId> {
        raw.iter().copied().map(FavoriteId).collect()
    }

    #[test]
    fn test_partial_request_keeps_omitted_items_after() {
        // [A,B,C,D] with request [C,A] -> [C,A,B,D]
        let merged = merge_order(&ids(&[1, 2, 3, 4]), &ids(&[3, 1]));
        assert_eq!(merged.order, ids(&[3, 1, 2, 4]));
        assert!(merged.foreign.is_empty());
        assert!(merged.duplicates.is_empty());
    }

    #[test]
    fn test_foreign_ids_are_dropped() {
        let merged = merge_order(&ids(&[1, 2]), &ids(&[99]));
        assert_eq!(merged.order, ids(&[1, 2]));
        assert_eq!(merged.foreign, ids(&[99]));
    }

    #[test]
    fn test_foreign_ids_do_not_block_valid_ones() {
        let merged = merge_order(&ids(&[1, 2, 3]), &ids(&[99, 3, 42, 1]));
        assert_eq!(merged.order, ids(&[3, 1, 2]));
        assert_eq!(merged.foreign, ids(&[99, 42]));
    }

    #[test]
    fn test_repeated_ids_keep_first_occurrence() {
        let merged = merge_order(&ids(&[1, 2, 3]), &ids(&[2, 3, 2, 2]));
        assert_eq!(merged.order, ids(&[2, 3, 1]));
        assert_eq!(merged.duplicates, ids(&[2]));
    }

    #[test]
    fn test_empty_request_keeps_current_order() {
        let merged = merge_order(&ids(&[4, 2, 9]), &[]);
        assert_eq!(merged.order, ids(&[4, 2, 9]));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let current = ids(&[1, 2, 3, 4, 5]);
        let request = ids(&[5, 3, 77]);
        let first = merge_order(&current, &request);
        let second = merge_order(&first.order, &request);
        assert_eq!(first.order, second.order);
    }

    #[test]
    fn test_already_in_place() {
        let current = vec![(FavoriteId(1), 0), (FavoriteId(2), 1)];
        assert!(already_in_place(&current, &ids(&[1, 2])));
        assert!(!already_in_place(&current, &ids(&[2, 1])));

        // Same order but with a gap still needs a rewrite.
        let gapped = vec![(FavoriteId(1), 0), (FavoriteId(2), 5)];
        assert!(!already_in_place(&gapped, &ids(&[1, 2])));
    }

    #[test]
    fn test_order_with_move() {
        let current = ids(&[1, 2, 3, 4]);
        assert_eq!(order_with_move(&current, FavoriteId(4), 0), ids(&[4, 1, 2, 3]));
        assert_eq!(order_with_move(&current, FavoriteId(1), 2), ids(&[2, 3, 1, 4]));
        assert_eq!(order_with_move(&current, FavoriteId(2), 99), ids(&[1, 3, 4, 2]));
    }
}
