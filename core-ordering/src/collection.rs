//! Generic ordered-collection service.
//!
//! [`OrderedCollection<T>`] is what request handlers call. Each mutating
//! operation runs as one transaction that starts by locking the parent's
//! scope, so operations on the same scope are serialized and operations on
//! different scopes are not. Lock contention that outlasts the busy timeout is
//! retried with a linear backoff before it is returned to the caller.

use crate::config::{ForeignIdPolicy, OrderingConfig};
use crate::entity::{OrderedTable, Position, ScopeKey};
use crate::error::{OrderingError, Result};
use crate::ordering::reorder::{self, ReorderOutcome};
use crate::ordering::{allocator, compactor, scope};
use crate::request::ReorderRequest;
use core_async::time::sleep;
use sqlx::{query_as, SqlitePool};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};

/// Ordered collection of `T` rows, scoped by `T::ParentId`.
pub struct OrderedCollection<T: OrderedTable> {
    pool: SqlitePool,
    config: OrderingConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T: OrderedTable> Clone for OrderedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: OrderedTable> OrderedCollection<T> {
    /// Create a collection over `pool` with default settings
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_config(pool, OrderingConfig::default())
    }

    /// Create a collection with explicit settings
    pub fn with_config(pool: SqlitePool, config: OrderingConfig) -> Self {
        Self {
            pool,
            config,
            _entity: PhantomData,
        }
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a new item at the tail of `parent`'s collection.
    ///
    /// # Returns
    /// The stored row, carrying its storage-assigned id and position.
    #[instrument(level = "debug", skip(self, payload), fields(table = T::TABLE, parent = %parent))]
    pub async fn append_item(&self, parent: T::ParentId, payload: &T::Payload) -> Result<T> {
        validate::<T>(payload)?;
        self.with_retry("append_item", || self.try_append(parent, payload))
            .await
    }

    async fn try_append(&self, parent: T::ParentId, payload: &T::Payload) -> Result<T> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let position = allocator::next_position::<T>(&mut tx, parent).await?;
        let item = scope::insert_item::<T>(&mut tx, parent, position, payload).await?;

        tx.commit().await?;

        info!(table = T::TABLE, parent = %parent, id = %item.id(), position, "Item appended");
        Ok(item)
    }

    /// Append an item unless one with `member_column = member` is already in
    /// the scope.
    ///
    /// # Returns
    /// `(item, created)`: the existing row and `false`, or the new row and `true`.
    #[instrument(level = "debug", skip(self, payload), fields(table = T::TABLE, parent = %parent))]
    pub async fn append_unique<K: ScopeKey>(
        &self,
        parent: T::ParentId,
        payload: &T::Payload,
        member_column: &'static str,
        member: K,
    ) -> Result<(T, bool)> {
        validate::<T>(payload)?;
        self.with_retry("append_unique", || {
            self.try_append_unique(parent, payload, member_column, member)
        })
        .await
    }

    async fn try_append_unique<K: ScopeKey>(
        &self,
        parent: T::ParentId,
        payload: &T::Payload,
        member_column: &'static str,
        member: K,
    ) -> Result<(T, bool)> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? AND {} = ?",
            T::TABLE,
            T::PARENT_COLUMN,
            member_column
        );
        let existing = query_as::<_, T>(&sql)
            .bind(parent)
            .bind(member)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(existing) = existing {
            tx.commit().await?;
            debug!(table = T::TABLE, parent = %parent, %member, "Already a member");
            return Ok((existing, false));
        }

        let position = allocator::next_position::<T>(&mut tx, parent).await?;
        let item = scope::insert_item::<T>(&mut tx, parent, position, payload).await?;
        tx.commit().await?;

        info!(table = T::TABLE, parent = %parent, id = %item.id(), position, "Item appended");
        Ok((item, true))
    }

    /// Insert a new item and place it at `index` (clamped to the tail).
    ///
    /// The row is created and the scope rewritten in one transaction, so the
    /// item is never visible at any other position.
    #[instrument(level = "debug", skip(self, payload), fields(table = T::TABLE, parent = %parent))]
    pub async fn insert_at(
        &self,
        parent: T::ParentId,
        payload: &T::Payload,
        index: usize,
    ) -> Result<T> {
        validate::<T>(payload)?;
        self.with_retry("insert_at", || self.try_insert_at(parent, payload, index))
            .await
    }

    async fn try_insert_at(
        &self,
        parent: T::ParentId,
        payload: &T::Payload,
        index: usize,
    ) -> Result<T> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let tail = allocator::next_position::<T>(&mut tx, parent).await?;
        let mut item = scope::insert_item::<T>(&mut tx, parent, tail, payload).await?;

        let current: Vec<T::Id> = scope::load_positions::<T>(&mut tx, parent)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let requested = reorder::order_with_move(&current, item.id(), index);
        let outcome = reorder::apply_reorder::<T>(&mut tx, parent, &requested, &self.config).await?;

        let position = final_position(&outcome.order, item.id())?;
        item.set_position(position);

        tx.commit().await?;

        info!(table = T::TABLE, parent = %parent, id = %item.id(), position, "Item inserted");
        Ok(item)
    }

    /// Reorder `parent`'s collection to follow `ids` as closely as possible.
    ///
    /// Ids that are not members are dropped (or rejected, per
    /// [`ForeignIdPolicy`](crate::ForeignIdPolicy)); members missing from `ids`
    /// keep their relative order after the requested ones.
    ///
    /// # Errors
    /// `MalformedInput` if `ids` is longer than the configured maximum.
    #[instrument(level = "debug", skip(self, ids), fields(table = T::TABLE, parent = %parent, requested = ids.len()))]
    pub async fn reorder(
        &self,
        parent: T::ParentId,
        ids: &[T::Id],
    ) -> Result<ReorderOutcome<T::Id>> {
        if ids.len() > self.config.max_reorder_len {
            return Err(OrderingError::malformed(
                "order",
                format!(
                    "{} ids exceeds the maximum of {}",
                    ids.len(),
                    self.config.max_reorder_len
                ),
            ));
        }

        self.with_retry("reorder", || self.try_reorder(parent, ids))
            .await
    }

    async fn try_reorder(
        &self,
        parent: T::ParentId,
        ids: &[T::Id],
    ) -> Result<ReorderOutcome<T::Id>> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let outcome = reorder::apply_reorder::<T>(&mut tx, parent, ids, &self.config).await?;
        tx.commit().await?;

        info!(
            table = T::TABLE,
            parent = %parent,
            items = outcome.order.len(),
            dropped = outcome.dropped.len(),
            changed = outcome.changed,
            "Scope reordered"
        );
        Ok(outcome)
    }

    /// Reorder by a secondary key instead of the row id.
    ///
    /// `key_of` reads the key (for example a catalogue track id) from a row.
    /// Keys are resolved to rows, the order applied and mapped back inside the
    /// same scope-locked transaction, so rows added concurrently still show up
    /// in the returned order. Unknown keys follow the
    /// [`ForeignIdPolicy`](crate::ForeignIdPolicy) like foreign row ids do.
    /// Keys are expected to be unique within the scope.
    ///
    /// # Errors
    /// `MalformedInput` if `keys` is longer than the configured maximum;
    /// `ScopeViolation` for an unknown key under `ForeignIdPolicy::Reject`.
    #[instrument(level = "debug", skip(self, keys, key_of), fields(table = T::TABLE, parent = %parent, requested = keys.len()))]
    pub async fn reorder_by_key<K: ScopeKey>(
        &self,
        parent: T::ParentId,
        keys: &[K],
        key_of: fn(&T) -> K,
    ) -> Result<ReorderOutcome<K>> {
        if keys.len() > self.config.max_reorder_len {
            return Err(OrderingError::malformed(
                "order",
                format!(
                    "{} ids exceeds the maximum of {}",
                    keys.len(),
                    self.config.max_reorder_len
                ),
            ));
        }

        self.with_retry("reorder_by_key", || {
            self.try_reorder_by_key(parent, keys, key_of)
        })
        .await
    }

    async fn try_reorder_by_key<K: ScopeKey>(
        &self,
        parent: T::ParentId,
        keys: &[K],
        key_of: fn(&T) -> K,
    ) -> Result<ReorderOutcome<K>> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let items = scope::load_items::<T>(&mut tx, parent).await?;
        let row_of: HashMap<K, T::Id> = items
            .iter()
            .map(|item| (key_of(item), item.id()))
            .collect();
        let key_of_row: HashMap<T::Id, K> = items
            .iter()
            .map(|item| (item.id(), key_of(item)))
            .collect();

        let mut requested = Vec::with_capacity(keys.len());
        let mut unknown: Vec<K> = Vec::new();
        for key in keys {
            match row_of.get(key) {
                Some(id) => requested.push(*id),
                None if !unknown.contains(key) => unknown.push(*key),
                None => {}
            }
        }

        if let (Some(first), ForeignIdPolicy::Reject) =
            (unknown.first(), self.config.foreign_id_policy)
        {
            return Err(OrderingError::ScopeViolation {
                scope: format!("{}:{}", T::TABLE, parent),
                item_id: first.to_string(),
            });
        }

        let outcome = reorder::apply_reorder::<T>(&mut tx, parent, &requested, &self.config).await?;

        let to_key = |id: &T::Id| {
            key_of_row
                .get(id)
                .copied()
                .ok_or_else(|| OrderingError::ConstraintConflict {
                    message: format!("row {} missing from locked scope", id),
                })
        };
        let order = outcome.order.iter().map(to_key).collect::<Result<Vec<K>>>()?;
        let mut dropped = unknown;
        for id in &outcome.dropped {
            dropped.push(to_key(id)?);
        }

        tx.commit().await?;

        if !dropped.is_empty() {
            warn!(
                table = T::TABLE,
                parent = %parent,
                dropped = dropped.len(),
                "Ignoring unknown or repeated keys"
            );
        }
        info!(
            table = T::TABLE,
            parent = %parent,
            items = order.len(),
            changed = outcome.changed,
            "Scope reordered by key"
        );
        Ok(ReorderOutcome {
            order,
            dropped,
            changed: outcome.changed,
        })
    }

    /// Reorder from a JSON request body (`{"order": [...]}`).
    ///
    /// The body is parsed and bounded before any storage access.
    pub async fn reorder_json(
        &self,
        parent: T::ParentId,
        body: &[u8],
    ) -> Result<ReorderOutcome<T::Id>>
    where
        T::Id: From<i64>,
    {
        let request = ReorderRequest::<T::Id>::from_json(body, self.config.max_reorder_len)?;
        self.reorder(parent, &request.order).await
    }

    /// Move one item to `index` (clamped to the tail).
    ///
    /// # Errors
    /// `ScopeViolation` if `id` is not a member of `parent`'s collection.
    #[instrument(level = "debug", skip(self), fields(table = T::TABLE, parent = %parent, id = %id))]
    pub async fn move_item(
        &self,
        parent: T::ParentId,
        id: T::Id,
        index: usize,
    ) -> Result<ReorderOutcome<T::Id>> {
        self.with_retry("move_item", || self.try_move(parent, id, index))
            .await
    }

    async fn try_move(
        &self,
        parent: T::ParentId,
        id: T::Id,
        index: usize,
    ) -> Result<ReorderOutcome<T::Id>> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let current: Vec<T::Id> = scope::load_positions::<T>(&mut tx, parent)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if !current.contains(&id) {
            return Err(OrderingError::ScopeViolation {
                scope: format!("{}:{}", T::TABLE, parent),
                item_id: id.to_string(),
            });
        }

        let requested = reorder::order_with_move(&current, id, index);
        let outcome = reorder::apply_reorder::<T>(&mut tx, parent, &requested, &self.config).await?;
        tx.commit().await?;

        info!(table = T::TABLE, parent = %parent, %id, index, changed = outcome.changed, "Item moved");
        Ok(outcome)
    }

    /// Remove one item from `parent`'s collection.
    ///
    /// # Returns
    /// - `Ok(true)` if the item was removed
    /// - `Ok(false)` if it is not a member of this scope
    #[instrument(level = "debug", skip(self), fields(table = T::TABLE, parent = %parent, id = %id))]
    pub async fn remove_item(&self, parent: T::ParentId, id: T::Id) -> Result<bool> {
        let ids = [id];
        let removed = self
            .with_retry("remove_item", || self.try_remove(parent, &ids))
            .await?;
        Ok(!removed.is_empty())
    }

    /// Remove several items, compacting once for the whole batch.
    ///
    /// # Returns
    /// The ids actually removed; ids outside the scope are ignored.
    #[instrument(level = "debug", skip(self, ids), fields(table = T::TABLE, parent = %parent, requested = ids.len()))]
    pub async fn bulk_remove(&self, parent: T::ParentId, ids: &[T::Id]) -> Result<Vec<T::Id>> {
        if ids.len() > self.config.max_reorder_len {
            return Err(OrderingError::malformed(
                "ids",
                format!(
                    "{} ids exceeds the maximum of {}",
                    ids.len(),
                    self.config.max_reorder_len
                ),
            ));
        }

        self.with_retry("bulk_remove", || self.try_remove(parent, ids))
            .await
    }

    async fn try_remove(&self, parent: T::ParentId, ids: &[T::Id]) -> Result<Vec<T::Id>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let removed = scope::delete_items::<T>(&mut tx, parent, ids).await?;
        if removed.len() < ids.len() {
            debug!(
                table = T::TABLE,
                parent = %parent,
                ignored = ids.len() - removed.len(),
                "Some ids were not members of the scope"
            );
        }

        if !removed.is_empty() && self.config.compact_on_remove {
            compactor::compact::<T>(&mut tx, parent).await?;
        }

        tx.commit().await?;

        info!(table = T::TABLE, parent = %parent, removed = removed.len(), "Items removed");
        Ok(removed)
    }

    /// Renumber `parent`'s collection to `0..n-1`.
    ///
    /// # Returns
    /// The number of rows whose position changed.
    #[instrument(level = "debug", skip(self), fields(table = T::TABLE, parent = %parent))]
    pub async fn compact(&self, parent: T::ParentId) -> Result<usize> {
        self.with_retry("compact", || self.try_compact(parent)).await
    }

    async fn try_compact(&self, parent: T::ParentId) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        scope::lock_scope::<T>(&mut tx, parent).await?;

        let compacted = compactor::compact::<T>(&mut tx, parent).await?;
        tx.commit().await?;

        Ok(compacted.changed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All items of `parent`'s collection, in order.
    pub async fn list(&self, parent: T::ParentId) -> Result<Vec<T>> {
        let mut conn = self.pool.acquire().await?;
        scope::load_items::<T>(&mut conn, parent).await
    }

    /// Item ids of `parent`'s collection, in order.
    pub async fn ids(&self, parent: T::ParentId) -> Result<Vec<T::Id>> {
        let mut conn = self.pool.acquire().await?;
        let positions = scope::load_positions::<T>(&mut conn, parent).await?;
        Ok(positions.into_iter().map(|(id, _)| id).collect())
    }

    /// Number of items in `parent`'s collection.
    pub async fn count(&self, parent: T::ParentId) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        scope::count_items::<T>(&mut conn, parent).await
    }

    /// Find an item by id, only if it belongs to `parent`.
    pub async fn find(&self, parent: T::ParentId, id: T::Id) -> Result<Option<T>> {
        let mut conn = self.pool.acquire().await?;
        scope::find_item::<T>(&mut conn, parent, id).await
    }

    /// Like [`find`](Self::find), but a missing item is `NotFound`.
    pub async fn get(&self, parent: T::ParentId, id: T::Id) -> Result<T> {
        self.find(parent, id)
            .await?
            .ok_or_else(|| OrderingError::NotFound {
                entity_type: T::ENTITY.to_string(),
                id: id.to_string(),
            })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Runs `attempt`, retrying while the store reports lock contention.
    pub(crate) async fn with_retry<R, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        table = T::TABLE,
                        operation,
                        attempt = retries,
                        error = %err,
                        "Scope busy, retrying"
                    );
                    sleep(self.config.retry_backoff * retries).await;
                }
                result => return result,
            }
        }
    }
}

fn validate<T: OrderedTable>(payload: &T::Payload) -> Result<()> {
    T::validate_payload(payload).map_err(|message| OrderingError::MalformedInput {
        field: T::ENTITY.to_string(),
        message,
    })
}

fn final_position<Id: ScopeKey>(order: &[Id], id: Id) -> Result<Position> {
    order
        .iter()
        .position(|other| *other == id)
        .map(|index| index as Position)
        .ok_or_else(|| OrderingError::ConstraintConflict {
            message: format!("inserted item {} missing from final order", id),
        })
}
