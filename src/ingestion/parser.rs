//! JSON-lines decoding of listen events.

use serde::Deserialize;
use std::io::BufRead;
use thiserror::Error;

/// Errors raised while reading the listen log.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error after line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed listen on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// 1-based line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Io { line, .. } | ParseError::Malformed { line, .. } => *line,
        }
    }

    /// Whether the error is confined to a single line, so the rest of the
    /// input can still be read.
    pub fn is_row_level(&self) -> bool {
        matches!(self, ParseError::Malformed { .. })
    }
}

/// A decoded listen with its nested metadata flattened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenEvent {
    pub user_name: String,
    pub listened_at: i64,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub track_id: Option<String>,
    pub track_name: Option<String>,
}

#[derive(Deserialize)]
struct RawListen {
    user_name: String,
    listened_at: i64,
    track_metadata: RawTrackMetadata,
}

#[derive(Deserialize)]
struct RawTrackMetadata {
    artist_name: Option<String>,
    track_name: Option<String>,
    release_name: Option<String>,
    #[serde(default)]
    additional_info: Option<RawAdditionalInfo>,
}

#[derive(Deserialize)]
struct RawAdditionalInfo {
    release_msid: Option<String>,
    artist_msid: Option<String>,
    recording_msid: Option<String>,
}

impl From<RawListen> for ListenEvent {
    fn from(raw: RawListen) -> Self {
        let metadata = raw.track_metadata;
        let (album_id, artist_id, track_id) = match metadata.additional_info {
            Some(info) => (info.release_msid, info.artist_msid, info.recording_msid),
            None => (None, None, None),
        };
        ListenEvent {
            user_name: raw.user_name,
            listened_at: raw.listened_at,
            artist_id,
            artist_name: metadata.artist_name,
            album_id,
            album_name: metadata.release_name,
            track_id,
            track_name: metadata.track_name,
        }
    }
}

/// Decode a single JSON document into a [`ListenEvent`].
pub fn parse_line(bytes: &[u8]) -> serde_json::Result<ListenEvent> {
    serde_json::from_slice::<RawListen>(bytes).map(ListenEvent::from)
}

/// Lazy iterator over the listens of a JSON-lines stream.
///
/// Yields one item per non-blank line, in input order. After an I/O error the
/// iterator is exhausted; a malformed line does not stop it.
pub struct ListenParser<R> {
    reader: R,
    line: usize,
    buf: Vec<u8>,
    finished: bool,
}

pub fn parse_listens<R: BufRead>(reader: R) -> ListenParser<R> {
    ListenParser {
        reader,
        line: 0,
        buf: Vec::new(),
        finished: false,
    }
}

impl<R: BufRead> Iterator for ListenParser<R> {
    type Item = Result<ListenEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_ascii();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let line = self.line;
                    return Some(
                        parse_line(trimmed).map_err(|source| ParseError::Malformed { line, source }),
                    );
                }
                Err(source) => {
                    self.finished = true;
                    return Some(Err(ParseError::Io {
                        line: self.line,
                        source,
                    }));
                }
            }
        }
        None
    }
}
