//! Domain models for the ordered collections
//!
//! Six concrete collections share the engine:
//!
//! | Entity | Parent | Table |
//! |---|---|---|
//! | [`LibraryTrack`] | [`UserId`] | `library_tracks` |
//! | [`LibraryAlbum`] | [`UserId`] | `library_albums` |
//! | [`AlbumTrack`] | [`AlbumId`] | `album_tracks` |
//! | [`LibraryPlaylist`] | [`UserId`] | `library_playlists` |
//! | [`PlaylistItem`] | [`PlaylistId`] | `playlist_items` |
//! | [`Favorite`] | [`UserId`] | `favorites` |

use crate::entity::{OrderedItem, OrderedTable, Position, SqliteQuery};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Longest album, playlist or track name accepted.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a user (owned by the authentication layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an uploaded track (owned by the track catalogue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declares a storage-assigned integer row id.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Row id of an uploaded track in its owner's library
    LibraryTrackId
);
row_id!(
    /// Row id of an album in a user's library
    AlbumId
);
row_id!(
    /// Row id of a track's membership in an album
    AlbumTrackId
);
row_id!(
    /// Row id of a playlist in a user's library
    PlaylistId
);
row_id!(
    /// Row id of a track's membership in a playlist
    PlaylistItemId
);
row_id!(
    /// Row id of a favorited track
    FavoriteId
);

fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(format!("name cannot exceed {} characters", MAX_NAME_LEN));
    }
    Ok(())
}

// =============================================================================
// Uploaded tracks
// =============================================================================

/// Name given to an uploaded track that arrives without one.
pub const UNTITLED_TRACK: &str = "(untitled)";

/// A track uploaded by a user, ordered inside the owner's track list.
///
/// `track_id` is the catalogue id album and playlist entries refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LibraryTrack {
    pub id: LibraryTrackId,
    pub owner_id: UserId,
    pub track_id: TrackId,
    pub name: String,
    pub source_url: Option<String>,
    pub play_count: i64,
    pub position: Position,
    pub created_at: i64,
}

/// Fields supplied when uploading a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLibraryTrack {
    pub track_id: TrackId,
    pub name: String,
    pub source_url: Option<String>,
}

impl NewLibraryTrack {
    /// A new upload with a fresh catalogue id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            track_id: TrackId::new(),
            name: name.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    fn stored_name(&self) -> &str {
        match self.name.trim() {
            "" => UNTITLED_TRACK,
            name => name,
        }
    }
}

impl OrderedItem for LibraryTrack {
    type Id = LibraryTrackId;
    type ParentId = UserId;

    fn id(&self) -> LibraryTrackId {
        self.id
    }

    fn parent_id(&self) -> UserId {
        self.owner_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for LibraryTrack {
    type Payload = NewLibraryTrack;

    const TABLE: &'static str = "library_tracks";
    const PARENT_COLUMN: &'static str = "owner_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["track_id", "name", "source_url"];
    const ENTITY: &'static str = "Track";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q NewLibraryTrack) -> SqliteQuery<'q> {
        query
            .bind(payload.track_id)
            .bind(payload.stored_name())
            .bind(&payload.source_url)
    }

    // Blank names fall back to the untitled placeholder; only length is checked.
    fn validate_payload(payload: &NewLibraryTrack) -> Result<(), String> {
        if payload.name.trim().chars().count() > MAX_NAME_LEN {
            return Err(format!("name cannot exceed {} characters", MAX_NAME_LEN));
        }
        Ok(())
    }
}

// =============================================================================
// Albums in a library
// =============================================================================

/// An album, ordered inside its owner's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LibraryAlbum {
    pub id: AlbumId,
    pub owner_id: UserId,
    pub name: String,
    pub is_default: bool,
    pub position: Position,
    pub created_at: i64,
}

/// Fields supplied when creating an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlbum {
    pub name: String,
    pub is_default: bool,
}

impl NewAlbum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
        }
    }
}

impl OrderedItem for LibraryAlbum {
    type Id = AlbumId;
    type ParentId = UserId;

    fn id(&self) -> AlbumId {
        self.id
    }

    fn parent_id(&self) -> UserId {
        self.owner_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for LibraryAlbum {
    type Payload = NewAlbum;

    const TABLE: &'static str = "library_albums";
    const PARENT_COLUMN: &'static str = "owner_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["name", "is_default"];
    const ENTITY: &'static str = "Album";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q NewAlbum) -> SqliteQuery<'q> {
        query.bind(payload.name.trim()).bind(payload.is_default)
    }

    fn validate_payload(payload: &NewAlbum) -> Result<(), String> {
        validate_name(&payload.name)
    }
}

// =============================================================================
// Tracks in an album
// =============================================================================

/// A track's membership in an album, with its per-album position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AlbumTrack {
    pub id: AlbumTrackId,
    pub album_id: AlbumId,
    pub track_id: TrackId,
    /// Album-local display name; the catalogue track keeps its own name.
    pub custom_name: Option<String>,
    pub position: Position,
    pub created_at: i64,
}

/// Fields supplied when attaching a track to an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlbumTrack {
    pub track_id: TrackId,
    pub custom_name: Option<String>,
}

impl NewAlbumTrack {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            custom_name: None,
        }
    }
}

impl OrderedItem for AlbumTrack {
    type Id = AlbumTrackId;
    type ParentId = AlbumId;

    fn id(&self) -> AlbumTrackId {
        self.id
    }

    fn parent_id(&self) -> AlbumId {
        self.album_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for AlbumTrack {
    type Payload = NewAlbumTrack;

    const TABLE: &'static str = "album_tracks";
    const PARENT_COLUMN: &'static str = "album_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["track_id", "custom_name"];
    const ENTITY: &'static str = "AlbumTrack";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q NewAlbumTrack) -> SqliteQuery<'q> {
        query.bind(payload.track_id).bind(&payload.custom_name)
    }

    fn validate_payload(payload: &NewAlbumTrack) -> Result<(), String> {
        match &payload.custom_name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Playlists in a library
// =============================================================================

/// A playlist, ordered inside its owner's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LibraryPlaylist {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub position: Position,
    pub created_at: i64,
}

/// Fields supplied when creating a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
}

impl NewPlaylist {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl OrderedItem for LibraryPlaylist {
    type Id = PlaylistId;
    type ParentId = UserId;

    fn id(&self) -> PlaylistId {
        self.id
    }

    fn parent_id(&self) -> UserId {
        self.owner_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for LibraryPlaylist {
    type Payload = NewPlaylist;

    const TABLE: &'static str = "library_playlists";
    const PARENT_COLUMN: &'static str = "owner_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["name"];
    const ENTITY: &'static str = "Playlist";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q NewPlaylist) -> SqliteQuery<'q> {
        query.bind(payload.name.trim())
    }

    fn validate_payload(payload: &NewPlaylist) -> Result<(), String> {
        validate_name(&payload.name)
    }
}

// =============================================================================
// Tracks in a playlist
// =============================================================================

/// A track's entry in a playlist. The same track may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub playlist_id: PlaylistId,
    pub track_id: TrackId,
    pub position: Position,
    pub created_at: i64,
}

impl OrderedItem for PlaylistItem {
    type Id = PlaylistItemId;
    type ParentId = PlaylistId;

    fn id(&self) -> PlaylistItemId {
        self.id
    }

    fn parent_id(&self) -> PlaylistId {
        self.playlist_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for PlaylistItem {
    type Payload = TrackId;

    const TABLE: &'static str = "playlist_items";
    const PARENT_COLUMN: &'static str = "playlist_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["track_id"];
    const ENTITY: &'static str = "PlaylistItem";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q TrackId) -> SqliteQuery<'q> {
        query.bind(*payload)
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// A favorited track, ordered inside its owner's favorites list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: FavoriteId,
    pub owner_id: UserId,
    pub track_id: TrackId,
    pub position: Position,
    pub created_at: i64,
}

impl OrderedItem for Favorite {
    type Id = FavoriteId;
    type ParentId = UserId;

    fn id(&self) -> FavoriteId {
        self.id
    }

    fn parent_id(&self) -> UserId {
        self.owner_id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl OrderedTable for Favorite {
    type Payload = TrackId;

    const TABLE: &'static str = "favorites";
    const PARENT_COLUMN: &'static str = "owner_id";
    const PAYLOAD_COLUMNS: &'static [&'static str] = &["track_id"];
    const ENTITY: &'static str = "Favorite";

    fn bind_payload<'q>(query: SqliteQuery<'q>, payload: &'q TrackId) -> SqliteQuery<'q> {
        query.bind(*payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_round_trips_through_string() {
        let id = UserId::new();
        let parsed = UserId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(UserId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_row_ids_order_and_display() {
        let a = AlbumTrackId::from(3);
        let b = AlbumTrackId(7);
        assert!(a < b);
        assert_eq!(b.to_string(), "7");
        assert_eq!(serde_json::to_string(&b).unwrap(), "7");
    }

    #[test]
    fn test_album_name_validation() {
        assert!(LibraryAlbum::validate_payload(&NewAlbum::new("Road trip")).is_ok());
        assert!(LibraryAlbum::validate_payload(&NewAlbum::new("   ")).is_err());
        assert!(LibraryAlbum::validate_payload(&NewAlbum::new("x".repeat(201))).is_err());
    }

    #[test]
    fn test_album_track_custom_name_validation() {
        let mut payload = NewAlbumTrack::new(TrackId::new());
        assert!(AlbumTrack::validate_payload(&payload).is_ok());

        payload.custom_name = Some(String::new());
        assert!(AlbumTrack::validate_payload(&payload).is_err());
    }

    #[test]
    fn test_library_track_name_defaults_to_untitled() {
        let blank = NewLibraryTrack::new("  ");
        assert_eq!(blank.stored_name(), UNTITLED_TRACK);
        assert!(LibraryTrack::validate_payload(&blank).is_ok());

        let named = NewLibraryTrack::new(" Intro ").with_source_url("https://example.com/a.mp3");
        assert_eq!(named.stored_name(), "Intro");
        assert!(LibraryTrack::validate_payload(&NewLibraryTrack::new("x".repeat(201))).is_err());
    }

    #[test]
    fn test_ordered_item_capability() {
        let mut favorite = Favorite {
            id: FavoriteId(1),
            owner_id: UserId::new(),
            track_id: TrackId::new(),
            position: 4,
            created_at: 0,
        };

        assert_eq!(favorite.id(), FavoriteId(1));
        assert_eq!(favorite.parent_id(), favorite.owner_id);
        favorite.set_position(0);
        assert_eq!(favorite.position(), 0);
    }
}
