//! Row types for the listen store.
//!
//! Identifiers are opaque strings taken verbatim from the source data. Anything
//! that may be missing upstream is an `Option`.

use std::ops::AddAssign;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRow {
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtistRow {
    pub artist_id: Option<String>,
    pub artist: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlbumRow {
    pub album_id: Option<String>,
    pub album: Option<String>,
    pub artist_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRow {
    pub track_id: Option<String>,
    pub track: Option<String>,
    pub album_id: Option<String>,
}

/// One playback, keyed by (user_name, listen_time).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenRow {
    pub user_name: String,
    /// Unix epoch seconds.
    pub listen_time: i64,
    pub track_id: Option<String>,
}

/// Candidate rows for every table, in input order and not deduplicated.
///
/// The store is expected to write these with insert-or-ignore semantics, so
/// repeated keys inside a batch (or across batches) collapse to the first one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListenBatch {
    pub users: Vec<UserRow>,
    pub artists: Vec<ArtistRow>,
    pub albums: Vec<AlbumRow>,
    pub tracks: Vec<TrackRow>,
    pub listens: Vec<ListenRow>,
}

impl ListenBatch {
    pub fn len(&self) -> usize {
        self.listens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listens.is_empty()
    }
}

/// Per-table row counts. Used both for "rows added by a load" and for
/// "rows currently stored".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub users: usize,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub listens: usize,
}

impl AddAssign for RowCounts {
    fn add_assign(&mut self, other: Self) {
        self.users += other.users;
        self.artists += other.artists;
        self.albums += other.albums;
        self.tracks += other.tracks;
        self.listens += other.listens;
    }
}

impl std::fmt::Display for RowCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} users, {} artists, {} albums, {} tracks, {} listens",
            self.users, self.artists, self.albums, self.tracks, self.listens
        )
    }
}
