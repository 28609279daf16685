//! SQLite-backed listen store.
//!
//! Owns a single connection for the lifetime of a pipeline run. Writes go
//! through [`ListenStore::load_batch`], which commits each batch atomically.

use super::models::*;
use super::schema::{LISTEN_TIME_INDEX, LISTEN_VERSIONED_SCHEMAS};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};

pub struct ListenStore {
    conn: Connection,
}

/// Creates the latest schema on an empty database, otherwise checks that the
/// stored schema is the one we know how to write to.
fn initialize_schema(conn: &Connection) -> Result<()> {
    let latest_version = LISTEN_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &LISTEN_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating listen db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let expected_version = (BASE_DB_VERSION + latest_version) as i64;
    if db_version != expected_version {
        bail!(
            "Unsupported listen db version {}, expected {}",
            db_version,
            expected_version
        );
    }

    latest_schema
        .validate(conn)
        .context("Listen db schema does not match the expected layout")?;
    debug!("Listen db schema at version {} is valid", latest_version);
    Ok(())
}

impl ListenStore {
    /// Open (or create) the listen database at `db_path` and make sure its
    /// schema is in place.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open listen database at {:?}", db_path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Enforcement is per connection, not stored in the file.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        initialize_schema(&conn)?;

        let store = ListenStore { conn };
        info!("Opened listen store: {}", store.counts()?);
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Write every collection of `batch` with insert-or-ignore, parents before
    /// children, inside one transaction. Returns how many new rows each table
    /// received. Nothing is written if any statement fails.
    pub fn load_batch(&mut self, batch: &ListenBatch) -> Result<RowCounts> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut added = RowCounts::default();

        {
            let mut stmt = tx.prepare_cached("INSERT OR IGNORE INTO User (user_name) VALUES (?1)")?;
            for user in &batch.users {
                added.users += stmt.execute(params![user.user_name])?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO Artist (artist_id, artist) VALUES (?1, ?2)",
            )?;
            for artist in &batch.artists {
                added.artists += stmt.execute(params![artist.artist_id, artist.artist])?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO Album (album_id, album, artist_id) VALUES (?1, ?2, ?3)",
            )?;
            for album in &batch.albums {
                added.albums += stmt
                    .execute(params![album.album_id, album.album, album.artist_id])
                    .with_context(|| format!("Failed to insert album {:?}", album.album_id))?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO Track (track_id, track, album_id) VALUES (?1, ?2, ?3)",
            )?;
            for track in &batch.tracks {
                added.tracks += stmt
                    .execute(params![track.track_id, track.track, track.album_id])
                    .with_context(|| format!("Failed to insert track {:?}", track.track_id))?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO Listen (user_name, listen_time, track_id) VALUES (?1, ?2, ?3)",
            )?;
            for listen in &batch.listens {
                added.listens += stmt
                    .execute(params![listen.user_name, listen.listen_time, listen.track_id])
                    .with_context(|| {
                        format!(
                            "Failed to insert listen of {} at {}",
                            listen.user_name, listen.listen_time
                        )
                    })?;
            }
        }

        tx.commit()?;
        debug!("Committed batch of {} events: added {}", batch.len(), added);
        Ok(added)
    }

    /// Idempotently create the ascending index on `Listen.listen_time`.
    pub fn ensure_listen_time_index(&self) -> Result<()> {
        LISTEN_TIME_INDEX.create_if_missing(&self.conn)?;
        Ok(())
    }

    pub fn has_listen_time_index(&self) -> Result<bool> {
        LISTEN_TIME_INDEX.exists(&self.conn)
    }

    pub fn counts(&self) -> Result<RowCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(RowCounts {
            users: count("User")?,
            artists: count("Artist")?,
            albums: count("Album")?,
            tracks: count("Track")?,
            listens: count("Listen")?,
        })
    }

    /// Number of rows whose foreign keys point at nothing.
    pub fn foreign_key_violations(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut violations = 0;
        while rows.next()?.is_some() {
            violations += 1;
        }
        Ok(violations)
    }

    // =========================================================================
    // Point lookups
    // =========================================================================

    pub fn get_user(&self, user_name: &str) -> Result<Option<UserRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_name FROM User WHERE user_name = ?1",
                params![user_name],
                |r| Ok(UserRow { user_name: r.get(0)? }),
            )
            .optional()?)
    }

    pub fn get_artist(&self, artist_id: &str) -> Result<Option<ArtistRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT artist_id, artist FROM Artist WHERE artist_id = ?1",
                params![artist_id],
                |r| {
                    Ok(ArtistRow {
                        artist_id: r.get(0)?,
                        artist: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn get_album(&self, album_id: &str) -> Result<Option<AlbumRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT album_id, album, artist_id FROM Album WHERE album_id = ?1",
                params![album_id],
                |r| {
                    Ok(AlbumRow {
                        album_id: r.get(0)?,
                        album: r.get(1)?,
                        artist_id: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn get_track(&self, track_id: &str) -> Result<Option<TrackRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT track_id, track, album_id FROM Track WHERE track_id = ?1",
                params![track_id],
                |r| {
                    Ok(TrackRow {
                        track_id: r.get(0)?,
                        track: r.get(1)?,
                        album_id: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn get_listen(&self, user_name: &str, listen_time: i64) -> Result<Option<ListenRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_name, listen_time, track_id FROM Listen
                 WHERE user_name = ?1 AND listen_time = ?2",
                params![user_name, listen_time],
                |r| {
                    Ok(ListenRow {
                        user_name: r.get(0)?,
                        listen_time: r.get(1)?,
                        track_id: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }
}
