//! Core service façade and bootstrap helpers.
//!
//! This crate turns a [`CoreConfig`] into a running [`OrderingService`]:
//! logging is installed, the SQLite pool is opened and migrated, and one
//! ordered collection is built per entity type. Request handlers hold a clone
//! of the service and call the collection they need.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::bootstrap;
//!
//! let service = bootstrap(CoreConfig::from_env()?).await?;
//! let outcome = service
//!     .playlist_items()
//!     .reorder_json(playlist_id, request_body)
//!     .await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_ordering::db::{create_pool, DatabaseConfig};
use core_ordering::models::{
    AlbumTrack, Favorite, LibraryAlbum, LibraryPlaylist, LibraryTrack, PlaylistItem,
};
use core_ordering::repositories::{
    AlbumTrackRepository, FavoriteRepository, SqliteAlbumTrackRepository,
    SqliteFavoriteRepository,
};
use core_ordering::OrderedCollection;
use core_runtime::config::{CoreConfig, DatabaseLocation};
use core_runtime::logging::{init_logging, strip_path};
use sqlx::SqlitePool;
use tracing::{info, warn};

struct Collections {
    tracks: OrderedCollection<LibraryTrack>,
    albums: OrderedCollection<LibraryAlbum>,
    album_tracks: OrderedCollection<AlbumTrack>,
    playlists: OrderedCollection<LibraryPlaylist>,
    playlist_items: OrderedCollection<PlaylistItem>,
    favorites: OrderedCollection<Favorite>,
    album_track_repository: Arc<dyn AlbumTrackRepository>,
    favorite_repository: Arc<dyn FavoriteRepository>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct OrderingService {
    pool: SqlitePool,
    config: Arc<CoreConfig>,
    collections: Arc<Collections>,
}

impl OrderingService {
    /// Create a service over an already opened and migrated pool.
    pub fn new(pool: SqlitePool, config: CoreConfig) -> Self {
        let ordering = config.ordering.clone();

        let collections = Collections {
            tracks: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            albums: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            album_tracks: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            playlists: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            playlist_items: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            favorites: OrderedCollection::with_config(pool.clone(), ordering.clone()),
            album_track_repository: Arc::new(SqliteAlbumTrackRepository::new(
                pool.clone(),
                ordering.clone(),
            )),
            favorite_repository: Arc::new(SqliteFavoriteRepository::new(pool.clone(), ordering)),
        };

        Self {
            pool,
            config: Arc::new(config),
            collections: Arc::new(collections),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Tracks a user uploaded, in the order of their track list
    pub fn tracks(&self) -> &OrderedCollection<LibraryTrack> {
        &self.collections.tracks
    }

    /// Albums in a user's library
    pub fn albums(&self) -> &OrderedCollection<LibraryAlbum> {
        &self.collections.albums
    }

    /// Tracks in an album, addressed by membership row id
    pub fn album_tracks(&self) -> &OrderedCollection<AlbumTrack> {
        &self.collections.album_tracks
    }

    /// Playlists in a user's library
    pub fn playlists(&self) -> &OrderedCollection<LibraryPlaylist> {
        &self.collections.playlists
    }

    /// Entries in a playlist
    pub fn playlist_items(&self) -> &OrderedCollection<PlaylistItem> {
        &self.collections.playlist_items
    }

    /// A user's favorites, addressed by row id
    pub fn favorites(&self) -> &OrderedCollection<Favorite> {
        &self.collections.favorites
    }

    /// Album membership by catalogue track id
    pub fn album_track_repository(&self) -> Arc<dyn AlbumTrackRepository> {
        Arc::clone(&self.collections.album_track_repository)
    }

    /// Favorite state by catalogue track id
    pub fn favorite_repository(&self) -> Arc<dyn FavoriteRepository> {
        Arc::clone(&self.collections.favorite_repository)
    }

    /// Close every pooled connection; in-flight operations finish first.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Ordering service closed");
    }
}

/// Build an [`OrderingService`] from configuration.
///
/// Installs logging (a host that already installed its own subscriber keeps
/// it), then opens and migrates the database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn bootstrap(config: CoreConfig) -> Result<OrderingService> {
    if let Err(err) = init_logging(config.logging.clone()) {
        warn!(error = %err, "Keeping the existing tracing subscriber");
    }

    let database = match &config.database {
        DatabaseLocation::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CoreError::InitializationFailed(format!(
                        "Cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            DatabaseConfig::new(path)
        }
        DatabaseLocation::InMemory => DatabaseConfig::in_memory(),
    };

    let pool = create_pool(database).await?;

    let location = match &config.database {
        DatabaseLocation::File(path) => strip_path(&path.to_string_lossy()).to_string(),
        DatabaseLocation::InMemory => ":memory:".to_string(),
    };
    info!(
        database = %location,
        foreign_ids = ?config.ordering.foreign_id_policy,
        compact_on_remove = config.ordering.compact_on_remove,
        "Ordering service ready"
    );

    Ok(OrderingService::new(pool, config))
}
