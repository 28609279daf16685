//! SQLite schema for the listen database.
//!
//! Five tables: `User`, `Artist`, `Album`, `Track` and the `Listen` fact table.
//! Entity keys are the upstream text identifiers. They are declared `NOT NULL`
//! so that a candidate row whose identifier is missing upstream is dropped by
//! `INSERT OR IGNORE` instead of creating an unreachable row.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, Index, SqlType, Table, VersionedSchema};

const USER_TABLE: Table = Table {
    name: "User",
    columns: &[sqlite_column!(
        "user_name",
        &SqlType::Text,
        is_primary_key = true,
        non_null = true
    )],
};

const ARTIST_TABLE: Table = Table {
    name: "Artist",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!("artist", &SqlType::Text),
    ],
};

const ALBUM_TABLE: Table = Table {
    name: "Album",
    columns: &[
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            foreign_key = Some(&ForeignKey {
                foreign_table: "Artist",
                foreign_column: "artist_id",
            })
        ),
    ],
};

const TRACK_TABLE: Table = Table {
    name: "Track",
    columns: &[
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!("track", &SqlType::Text),
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            foreign_key = Some(&ForeignKey {
                foreign_table: "Album",
                foreign_column: "album_id",
            })
        ),
    ],
};

/// Keyed by (user_name, listen_time): two listens by the same user in the same
/// second are the same row.
const LISTEN_TABLE: Table = Table {
    name: "Listen",
    columns: &[
        sqlite_column!(
            "user_name",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "User",
                foreign_column: "user_name",
            })
        ),
        sqlite_column!(
            "listen_time",
            &SqlType::Integer,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            foreign_key = Some(&ForeignKey {
                foreign_table: "Track",
                foreign_column: "track_id",
            })
        ),
    ],
};

pub const LISTEN_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE,
        ARTIST_TABLE,
        ALBUM_TABLE,
        TRACK_TABLE,
        LISTEN_TABLE,
    ],
}];

/// Ordering index used by the time-range reports.
pub const LISTEN_TIME_INDEX: Index = Index {
    name: "IX_Listen_listen_time",
    table: "Listen",
    column: "listen_time",
    descending: false,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_schema() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        LISTEN_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_creates_successfully() {
        let conn = create_schema();
        LISTEN_VERSIONED_SCHEMAS[0].validate(&conn).unwrap();
    }

    #[test]
    fn test_missing_entity_id_is_ignored() {
        let conn = create_schema();

        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO Artist (artist_id, artist) VALUES (NULL, 'Nobody')",
                [],
            )
            .unwrap();
        assert_eq!(changed, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Artist", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_track_requires_existing_album() {
        let conn = create_schema();

        let result = conn.execute(
            "INSERT OR IGNORE INTO Track (track_id, track, album_id) VALUES ('t1', 'Song', 'missing')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_listen_key_collapses_same_second() {
        let conn = create_schema();
        conn.execute("INSERT INTO User (user_name) VALUES ('alice')", [])
            .unwrap();

        let first = conn
            .execute(
                "INSERT OR IGNORE INTO Listen (user_name, listen_time, track_id) VALUES ('alice', 100, NULL)",
                [],
            )
            .unwrap();
        let second = conn
            .execute(
                "INSERT OR IGNORE INTO Listen (user_name, listen_time, track_id) VALUES ('alice', 100, NULL)",
                [],
            )
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }
}
