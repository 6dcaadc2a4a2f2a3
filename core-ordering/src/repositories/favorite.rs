//! Favorite repository trait and implementation

use crate::collection::OrderedCollection;
use crate::config::OrderingConfig;
use crate::error::Result;
use crate::models::{Favorite, FavoriteId, TrackId, UserId};
use crate::ordering::{allocator, compactor, scope};
use async_trait::async_trait;
use sqlx::{query_scalar, SqlitePool};
use tracing::{info, instrument};

/// Favorite repository interface
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Flip a track's favorite state for `owner`.
    ///
    /// Favoriting appends at the tail; unfavoriting removes the row and closes
    /// the gap. Both happen under the owner's scope lock, so concurrent toggles
    /// of the same track never leave two rows behind.
    ///
    /// # Returns
    /// The new state: `true` if the track is now a favorite.
    async fn toggle(&self, owner: UserId, track_id: TrackId) -> Result<bool>;

    /// Whether `owner` has favorited the track
    async fn is_favorited(&self, owner: UserId, track_id: TrackId) -> Result<bool>;

    /// Favorites in the owner's order
    async fn favorites(&self, owner: UserId) -> Result<Vec<Favorite>>;
}

/// SQLite implementation of FavoriteRepository
pub struct SqliteFavoriteRepository {
    favorites: OrderedCollection<Favorite>,
}

impl SqliteFavoriteRepository {
    pub fn new(pool: SqlitePool, config: OrderingConfig) -> Self {
        Self {
            favorites: OrderedCollection::with_config(pool, config),
        }
    }

    /// The underlying ordered collection, for reorder and bulk removal.
    pub fn collection(&self) -> &OrderedCollection<Favorite> {
        &self.favorites
    }

    async fn try_toggle(&self, owner: UserId, track_id: TrackId) -> Result<bool> {
        let mut tx = self.favorites.pool().begin().await?;
        scope::lock_scope::<Favorite>(&mut tx, owner).await?;

        let existing: Option<FavoriteId> =
            query_scalar("SELECT id FROM favorites WHERE owner_id = ? AND track_id = ?")
                .bind(owner)
                .bind(track_id)
                .fetch_optional(&mut *tx)
                .await?;

        let favorited = match existing {
            Some(id) => {
                scope::delete_items::<Favorite>(&mut tx, owner, &[id]).await?;
                if self.favorites.config().compact_on_remove {
                    compactor::compact::<Favorite>(&mut tx, owner).await?;
                }
                false
            }
            None => {
                let position = allocator::next_position::<Favorite>(&mut tx, owner).await?;
                scope::insert_item::<Favorite>(&mut tx, owner, position, &track_id).await?;
                true
            }
        };

        tx.commit().await?;

        info!(%owner, %track_id, favorited, "Favorite toggled");
        Ok(favorited)
    }
}

#[async_trait]
impl FavoriteRepository for SqliteFavoriteRepository {
    #[instrument(skip(self))]
    async fn toggle(&self, owner: UserId, track_id: TrackId) -> Result<bool> {
        self.favorites
            .with_retry("toggle", || self.try_toggle(owner, track_id))
            .await
    }

    async fn is_favorited(&self, owner: UserId, track_id: TrackId) -> Result<bool> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM favorites WHERE owner_id = ? AND track_id = ?")
                .bind(owner)
                .bind(track_id)
                .fetch_one(self.favorites.pool())
                .await?;

        Ok(count > 0)
    }

    async fn favorites(&self, owner: UserId) -> Result<Vec<Favorite>> {
        self.favorites.list(owner).await
    }
}
