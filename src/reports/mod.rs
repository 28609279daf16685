//! Fixed aggregate reports over a loaded listen store.
//!
//! All queries run before any file is written, so a failing query leaves the
//! output directory untouched.

mod export;
mod queries;

pub use export::ReportTable;
pub use queries::{
    active_users_on, first_songs, most_active_users, utc_day_bounds, FirstSong, UserActivity,
};

use crate::listen_store::ListenStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MOST_ACTIVE_USERS_FILE: &str = "most_active_users.csv";
pub const ACTIVE_USERS_ON_DATE_FILE: &str = "active_users_on_date.csv";
pub const USERS_FIRST_SONGS_FILE: &str = "users_first_songs.csv";

#[derive(Clone, Debug)]
pub struct ReportSettings {
    pub target_date: NaiveDate,
    pub top_users: usize,
}

/// Results of the three report queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reports {
    pub target_date: NaiveDate,
    pub most_active_users: Vec<UserActivity>,
    pub active_users_on_date: i64,
    pub first_songs: Vec<FirstSong>,
}

impl Reports {
    pub fn collect(store: &ListenStore, settings: &ReportSettings) -> Result<Self> {
        let conn = store.connection();
        Ok(Reports {
            target_date: settings.target_date,
            most_active_users: most_active_users(conn, settings.top_users)?,
            active_users_on_date: active_users_on(conn, settings.target_date)?,
            first_songs: first_songs(conn)?,
        })
    }

    pub fn most_active_users_table(&self) -> ReportTable {
        let mut table = ReportTable::new(["user_name", "songs_played"]);
        for user in &self.most_active_users {
            table.push_row(vec![user.user_name.clone(), user.songs_played.to_string()]);
        }
        table
    }

    pub fn active_users_table(&self) -> ReportTable {
        let column = format!("active_users_on_{}", self.target_date.format("%d_%m_%Y"));
        let mut table = ReportTable::new([column]);
        table.push_row(vec![self.active_users_on_date.to_string()]);
        table
    }

    pub fn first_songs_table(&self) -> ReportTable {
        let mut table = ReportTable::new(["user_name", "track", "time_played"]);
        for song in &self.first_songs {
            table.push_row(vec![
                song.user_name.clone(),
                song.track.clone().unwrap_or_default(),
                song.time_played().unwrap_or_default(),
            ]);
        }
        table
    }

    /// Write the three CSV files into `output_dir`, creating it if needed.
    pub fn write_all(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

        let outputs = [
            (MOST_ACTIVE_USERS_FILE, self.most_active_users_table()),
            (ACTIVE_USERS_ON_DATE_FILE, self.active_users_table()),
            (USERS_FIRST_SONGS_FILE, self.first_songs_table()),
        ];

        let mut written = Vec::with_capacity(outputs.len());
        for (file_name, table) in outputs {
            let path = output_dir.join(file_name);
            table.write_csv(&path)?;
            info!("Wrote {} rows to {:?}", table.rows.len(), path);
            written.push(path);
        }
        Ok(written)
    }
}

/// Run every report against `store` and export them into `output_dir`.
pub fn generate_reports(
    store: &ListenStore,
    settings: &ReportSettings,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    info!("Performing data analysis...");
    let reports = Reports::collect(store, settings)?;
    reports.write_all(output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reports() -> Reports {
        Reports {
            target_date: NaiveDate::from_ymd_opt(2019, 3, 1).unwrap(),
            most_active_users: vec![UserActivity {
                user_name: "alice".to_string(),
                songs_played: 3,
            }],
            active_users_on_date: 1,
            first_songs: vec![FirstSong {
                user_name: "alice".to_string(),
                track: None,
                listen_time: 1551398400,
            }],
        }
    }

    #[test]
    fn test_active_users_column_names_the_date() {
        let table = sample_reports().active_users_table();
        assert_eq!(table.columns, vec!["active_users_on_01_03_2019"]);
        assert_eq!(table.rows, vec![vec!["1".to_string()]]);
    }

    #[test]
    fn test_first_songs_table_blank_for_unknown_track_name() {
        let table = sample_reports().first_songs_table();
        assert_eq!(
            table.rows,
            vec![vec![
                "alice".to_string(),
                String::new(),
                "2019-03-01 00:00:00".to_string()
            ]]
        );
    }

    #[test]
    fn test_failed_query_writes_no_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        let store = ListenStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE Listen;")
            .unwrap();
        let settings = ReportSettings {
            target_date: NaiveDate::from_ymd_opt(2019, 3, 1).unwrap(),
            top_users: 10,
        };

        let result = generate_reports(&store, &settings, &out_dir);

        assert!(result.is_err());
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_write_all_creates_three_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");

        let written = sample_reports().write_all(&out_dir).unwrap();

        assert_eq!(written.len(), 3);
        for file_name in [
            MOST_ACTIVE_USERS_FILE,
            ACTIVE_USERS_ON_DATE_FILE,
            USERS_FIRST_SONGS_FILE,
        ] {
            assert!(out_dir.join(file_name).is_file());
        }
    }
}
