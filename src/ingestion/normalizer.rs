//! Splits a listen event into one candidate row per table.
//!
//! No trimming, validation or in-memory dedup happens here; the store's
//! insert-or-ignore writes take care of repeated keys.

use super::parser::ListenEvent;
use crate::listen_store::{AlbumRow, ArtistRow, ListenBatch, ListenRow, TrackRow, UserRow};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedListen {
    pub user: UserRow,
    pub artist: ArtistRow,
    pub album: AlbumRow,
    pub track: TrackRow,
    pub listen: ListenRow,
}

pub fn normalize(event: ListenEvent) -> NormalizedListen {
    NormalizedListen {
        user: UserRow {
            user_name: event.user_name.clone(),
        },
        artist: ArtistRow {
            artist_id: event.artist_id.clone(),
            artist: event.artist_name,
        },
        album: AlbumRow {
            album_id: event.album_id.clone(),
            album: event.album_name,
            artist_id: event.artist_id,
        },
        track: TrackRow {
            track_id: event.track_id.clone(),
            track: event.track_name,
            album_id: event.album_id,
        },
        listen: ListenRow {
            user_name: event.user_name,
            listen_time: event.listened_at,
            track_id: event.track_id,
        },
    }
}

impl ListenBatch {
    pub fn push(&mut self, normalized: NormalizedListen) {
        self.users.push(normalized.user);
        self.artists.push(normalized.artist);
        self.albums.push(normalized.album);
        self.tracks.push(normalized.track);
        self.listens.push(normalized.listen);
    }
}

impl Extend<NormalizedListen> for ListenBatch {
    fn extend<I: IntoIterator<Item = NormalizedListen>>(&mut self, iter: I) {
        for normalized in iter {
            self.push(normalized);
        }
    }
}
