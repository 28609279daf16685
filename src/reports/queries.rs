//! Aggregate queries over the listen store.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use rusqlite::{params, Connection};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserActivity {
    pub user_name: String,
    pub songs_played: i64,
}

/// Earliest listen of a user that resolves to a known track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirstSong {
    pub user_name: String,
    pub track: Option<String>,
    pub listen_time: i64,
}

impl FirstSong {
    /// `YYYY-MM-DD HH:MM:SS` in UTC.
    pub fn time_played(&self) -> Option<String> {
        DateTime::from_timestamp(self.listen_time, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Users ordered by number of listens, busiest first. Equal counts are
/// ordered by user name.
pub fn most_active_users(conn: &Connection, limit: usize) -> Result<Vec<UserActivity>> {
    let limit = i64::try_from(limit)
        .with_context(|| format!("Top users limit {} is too large", limit))?;
    let mut stmt = conn.prepare(
        "SELECT user_name, COUNT(*) AS songs_played
         FROM Listen
         GROUP BY user_name
         ORDER BY songs_played DESC, user_name ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], |r| {
            Ok(UserActivity {
                user_name: r.get(0)?,
                songs_played: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to query most active users")?;
    Ok(rows)
}

/// Half-open `[start, end)` range of epoch seconds covering `date` in UTC.
pub fn utc_day_bounds(date: NaiveDate) -> Result<(i64, i64)> {
    let next_day = date
        .succ_opt()
        .with_context(|| format!("No day after {}", date))?;
    let start = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid midnight for {}", date))?;
    let end = next_day
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid midnight for {}", next_day))?;
    Ok((start.and_utc().timestamp(), end.and_utc().timestamp()))
}

/// Number of distinct users with at least one listen on `date` (UTC).
pub fn active_users_on(conn: &Connection, date: NaiveDate) -> Result<i64> {
    let (start, end) = utc_day_bounds(date)?;
    let count = conn
        .query_row(
            "SELECT COUNT(DISTINCT user_name) FROM Listen
             WHERE listen_time >= ?1 AND listen_time < ?2",
            params![start, end],
            |r| r.get(0),
        )
        .with_context(|| format!("Failed to count users active on {}", date))?;
    Ok(count)
}

/// First known track each user played, ordered by user name. Listens whose
/// track is not in the store are not considered.
pub fn first_songs(conn: &Connection) -> Result<Vec<FirstSong>> {
    let mut stmt = conn.prepare(
        "SELECT l.user_name, t.track, l.listen_time
         FROM Listen l
         INNER JOIN Track t ON t.track_id = l.track_id
         WHERE l.listen_time = (
             SELECT MIN(l2.listen_time)
             FROM Listen l2
             INNER JOIN Track t2 ON t2.track_id = l2.track_id
             WHERE l2.user_name = l.user_name
         )
         ORDER BY l.user_name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FirstSong {
                user_name: r.get(0)?,
                track: r.get(1)?,
                listen_time: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to query first songs")?;
    Ok(rows)
}
