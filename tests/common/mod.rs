//! Shared fixtures for the pipeline tests.

#![allow(dead_code)]

use listenbrainz_analysis::config::{AppConfig, CliConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A single listen as it appears in the input log.
pub struct Listen<'a> {
    pub user: &'a str,
    pub at: i64,
    pub track_id: &'a str,
    pub track: &'a str,
    pub album_id: &'a str,
    pub artist_id: &'a str,
}

impl<'a> Listen<'a> {
    pub fn new(user: &'a str, at: i64, track_id: &'a str) -> Self {
        Self {
            user,
            at,
            track_id,
            track: track_id,
            album_id: "album-1",
            artist_id: "artist-1",
        }
    }

    pub fn named(mut self, track: &'a str) -> Self {
        self.track = track;
        self
    }

    pub fn on_album(mut self, album_id: &'a str, artist_id: &'a str) -> Self {
        self.album_id = album_id;
        self.artist_id = artist_id;
        self
    }

    pub fn to_json_line(&self) -> String {
        serde_json::json!({
            "user_name": self.user,
            "listened_at": self.at,
            "recording_msid": self.track_id,
            "track_metadata": {
                "artist_name": format!("Artist {}", self.artist_id),
                "track_name": self.track,
                "release_name": format!("Album {}", self.album_id),
                "additional_info": {
                    "release_msid": self.album_id,
                    "artist_msid": self.artist_id,
                    "recording_msid": self.track_id,
                    "tags": [],
                }
            }
        })
        .to_string()
    }
}

/// Temporary workspace holding an input log, a database and an output dir.
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join("dataset.txt")
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("ListenBrainz.db")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("reports")
    }

    pub fn write_listens(&self, listens: &[Listen]) {
        let lines: Vec<String> = listens.iter().map(Listen::to_json_line).collect();
        self.write_raw(&lines.join("\n"));
    }

    pub fn write_raw(&self, content: &str) {
        fs::write(self.input_path(), content).unwrap();
    }

    pub fn cli_config(&self) -> CliConfig {
        CliConfig {
            input_path: Some(self.input_path()),
            db_path: Some(self.db_path()),
            output_dir: Some(self.output_dir()),
            ..Default::default()
        }
    }

    pub fn config(&self) -> AppConfig {
        AppConfig::resolve(&self.cli_config(), None).unwrap()
    }

    pub fn read_report(&self, file_name: &str) -> String {
        read_report(&self.output_dir().join(file_name))
    }
}

/// Reads a report, checking and stripping its UTF-8 byte order mark.
pub fn read_report(path: &Path) -> String {
    let text = fs::read_to_string(path).unwrap();
    text.strip_prefix('\u{FEFF}')
        .expect("report should start with a BOM")
        .to_string()
}
