//! Album track repository trait and implementation

use crate::collection::OrderedCollection;
use crate::config::OrderingConfig;
use crate::error::Result;
use crate::models::{AlbumId, AlbumTrack, AlbumTrackId, NewAlbumTrack, TrackId};
use crate::ordering::ReorderOutcome;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{query_scalar, SqlitePool};
use tracing::debug;

/// Result of attaching a track to an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attached<T> {
    pub item: T,
    /// `false` when the track was already in the album and nothing was written.
    pub created: bool,
}

/// Album track repository interface
#[async_trait]
pub trait AlbumTrackRepository: Send + Sync {
    /// Attach a track at the end of an album.
    ///
    /// A track appears at most once per album; attaching it again returns
    /// the existing row unchanged.
    async fn attach_track(
        &self,
        album_id: AlbumId,
        track: &NewAlbumTrack,
    ) -> Result<Attached<AlbumTrack>>;

    /// Detach a track from an album and close the gap it leaves.
    ///
    /// # Returns
    /// - `Ok(true)` if the track was detached
    /// - `Ok(false)` if it was not in the album
    async fn detach_track(&self, album_id: AlbumId, track_id: TrackId) -> Result<bool>;

    /// Album tracks in order
    async fn tracks(&self, album_id: AlbumId) -> Result<Vec<AlbumTrack>>;

    /// Catalogue track ids in album order
    async fn track_ids(&self, album_id: AlbumId) -> Result<Vec<TrackId>>;

    /// Reorder the album's tracks by their catalogue track ids.
    ///
    /// Track ids not in the album are dropped, or rejected with
    /// `ScopeViolation` under `ForeignIdPolicy::Reject`.
    async fn reorder_tracks(
        &self,
        album_id: AlbumId,
        track_ids: &[TrackId],
    ) -> Result<ReorderOutcome<TrackId>>;
}

/// SQLite implementation of AlbumTrackRepository
pub struct SqliteAlbumTrackRepository {
    tracks: OrderedCollection<AlbumTrack>,
}

impl SqliteAlbumTrackRepository {
    pub fn new(pool: SqlitePool, config: OrderingConfig) -> Self {
        Self {
            tracks: OrderedCollection::with_config(pool, config),
        }
    }

    /// The underlying ordered collection, for row-id based operations.
    pub fn collection(&self) -> &OrderedCollection<AlbumTrack> {
        &self.tracks
    }
}

#[async_trait]
impl AlbumTrackRepository for SqliteAlbumTrackRepository {
    async fn attach_track(
        &self,
        album_id: AlbumId,
        track: &NewAlbumTrack,
    ) -> Result<Attached<AlbumTrack>> {
        let (item, created) = self
            .tracks
            .append_unique(album_id, track, "track_id", track.track_id)
            .await?;

        Ok(Attached { item, created })
    }

    async fn detach_track(&self, album_id: AlbumId, track_id: TrackId) -> Result<bool> {
        let row_id: Option<AlbumTrackId> = query_scalar(
            "SELECT id FROM album_tracks WHERE album_id = ? AND track_id = ?",
        )
        .bind(album_id)
        .bind(track_id)
        .fetch_optional(self.tracks.pool())
        .await?;

        match row_id {
            Some(row_id) => self.tracks.remove_item(album_id, row_id).await,
            None => {
                debug!(%album_id, %track_id, "Track not in album");
                Ok(false)
            }
        }
    }

    async fn tracks(&self, album_id: AlbumId) -> Result<Vec<AlbumTrack>> {
        self.tracks.list(album_id).await
    }

    async fn track_ids(&self, album_id: AlbumId) -> Result<Vec<TrackId>> {
        let items = self.tracks.list(album_id).await?;
        Ok(items.into_iter().map(|item| item.track_id).collect())
    }

    async fn reorder_tracks(
        &self,
        album_id: AlbumId,
        track_ids: &[TrackId],
    ) -> Result<ReorderOutcome<TrackId>> {
        self.tracks
            .reorder_by_key(album_id, track_ids, |item: &AlbumTrack| item.track_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::config::ForeignIdPolicy;
    use crate::error::OrderingError;
    use crate::models::{LibraryAlbum, NewAlbum, UserId};

    async fn setup() -> (SqliteAlbumTrackRepository, AlbumId) {
        let pool = create_test_pool().await.unwrap();
        let albums = OrderedCollection::<LibraryAlbum>::new(pool.clone());
        let album = albums
            .append_item(UserId::new(), &NewAlbum::new("Road trip"))
            .await
            .unwrap();

        (
            SqliteAlbumTrackRepository::new(pool, OrderingConfig::default()),
            album.id,
        )
    }

    #[core_async::test]
    async fn test_attach_appends_in_order() {
        let (repo, album) = setup().await;
        let a = TrackId::new();
        let b = TrackId::new();

        let first = repo.attach_track(album, &NewAlbumTrack::new(a)).await.unwrap();
        let second = repo.attach_track(album, &NewAlbumTrack::new(b)).await.unwrap();

        assert!(first.created && second.created);
        assert_eq!(first.item.position, 0);
        assert_eq!(second.item.position, 1);
        assert_eq!(repo.track_ids(album).await.unwrap(), vec![a, b]);
    }

    #[core_async::test]
    async fn test_attach_existing_track_returns_existing_row() {
        let (repo, album) = setup().await;
        let track = TrackId::new();

        let first = repo
            .attach_track(album, &NewAlbumTrack::new(track))
            .await
            .unwrap();
        let again = repo
            .attach_track(album, &NewAlbumTrack::new(track))
            .await
            .unwrap();

        assert!(!again.created);
        assert_eq!(again.item, first.item);
        assert_eq!(repo.tracks(album).await.unwrap().len(), 1);
    }

    #[core_async::test]
    async fn test_detach_closes_gap() {
        let (repo, album) = setup().await;
        let tracks: Vec<TrackId> = (0..3).map(|_| TrackId::new()).collect();
        for track in &tracks {
            repo.attach_track(album, &NewAlbumTrack::new(*track))
                .await
                .unwrap();
        }

        assert!(repo.detach_track(album, tracks[0]).await.unwrap());
        assert!(!repo.detach_track(album, tracks[0]).await.unwrap());

        let remaining = repo.tracks(album).await.unwrap();
        let positions: Vec<i64> = remaining.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(repo.track_ids(album).await.unwrap(), tracks[1..].to_vec());
    }

    #[core_async::test]
    async fn test_reorder_by_track_id() {
        let (repo, album) = setup().await;
        let tracks: Vec<TrackId> = (0..3).map(|_| TrackId::new()).collect();
        for track in &tracks {
            repo.attach_track(album, &NewAlbumTrack::new(*track))
                .await
                .unwrap();
        }
        let stranger = TrackId::new();

        let outcome = repo
            .reorder_tracks(album, &[tracks[2], stranger, tracks[0]])
            .await
            .unwrap();

        assert_eq!(outcome.order, vec![tracks[2], tracks[0], tracks[1]]);
        assert_eq!(outcome.dropped, vec![stranger]);
        assert!(outcome.changed);
        assert_eq!(repo.track_ids(album).await.unwrap(), outcome.order);
    }

    #[core_async::test]
    async fn test_reorder_rejects_unknown_track_under_reject_policy() {
        let pool = create_test_pool().await.unwrap();
        let album = OrderedCollection::<LibraryAlbum>::new(pool.clone())
            .append_item(UserId::new(), &NewAlbum::new("Strict"))
            .await
            .unwrap()
            .id;
        let repo = SqliteAlbumTrackRepository::new(
            pool,
            OrderingConfig::default().with_foreign_id_policy(ForeignIdPolicy::Reject),
        );
        let tracks: Vec<TrackId> = (0..3).map(|_| TrackId::new()).collect();
        for track in &tracks {
            repo.attach_track(album, &NewAlbumTrack::new(*track))
                .await
                .unwrap();
        }
        let stranger = TrackId::new();

        let result = repo
            .reorder_tracks(album, &[tracks[2], stranger, tracks[0]])
            .await;

        match result {
            Err(OrderingError::ScopeViolation { item_id, .. }) => {
                assert_eq!(item_id, stranger.to_string());
            }
            other => panic!("expected ScopeViolation, got {:?}", other),
        }
        assert_eq!(repo.track_ids(album).await.unwrap(), tracks);
    }

    #[core_async::test]
    async fn test_reorder_from_stale_view_keeps_newer_tracks() {
        let (repo, album) = setup().await;
        for _ in 0..3 {
            repo.attach_track(album, &NewAlbumTrack::new(TrackId::new()))
                .await
                .unwrap();
        }
        let mut stale = repo.track_ids(album).await.unwrap();
        let late = TrackId::new();
        repo.attach_track(album, &NewAlbumTrack::new(late))
            .await
            .unwrap();

        stale.reverse();
        let outcome = repo.reorder_tracks(album, &stale).await.unwrap();

        let mut expected = stale.clone();
        expected.push(late);
        assert_eq!(outcome.order, expected);
        assert!(outcome.dropped.is_empty());
        assert_eq!(repo.track_ids(album).await.unwrap(), expected);
    }

    #[core_async::test]
    async fn test_reorder_reports_repeated_tracks_once() {
        let (repo, album) = setup().await;
        let tracks: Vec<TrackId> = (0..2).map(|_| TrackId::new()).collect();
        for track in &tracks {
            repo.attach_track(album, &NewAlbumTrack::new(*track))
                .await
                .unwrap();
        }

        let outcome = repo
            .reorder_tracks(album, &[tracks[1], tracks[1], tracks[0]])
            .await
            .unwrap();

        assert_eq!(outcome.order, vec![tracks[1], tracks[0]]);
        assert_eq!(outcome.dropped, vec![tracks[1]]);
    }
}
