//! Catalog store: schema, prepared upserts, and a busy-retry wrapper around
//! `rusqlite`. One connection is opened per request or per scan (§3
//! Ownership, §9 "owning database handles") rather than pooled, matching the
//! original's "cheap handle, not pool checkout" resource model.

pub mod queries;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::models::ExtractedTag;

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the catalog database at `db_path`, apply the
/// pragmas the spec calls for, and ensure the schema/meta row exist.
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening catalog db at {}", db_path.display()))?;

    conn.execute_batch("PRAGMA synchronous = OFF; PRAGMA journal_mode = MEMORY;")?;
    conn.busy_timeout(Duration::from_secs(0))?; // busy steps are retried explicitly, see `retry_busy`

    ensure_schema(&conn)?;
    queries::register_fuzzy_distance(&conn)?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS SURF_DB_META (VERSION INTEGER NOT NULL);

        CREATE TABLE IF NOT EXISTS ARTISTS (
            UUID TEXT PRIMARY KEY,
            NAME TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ALBUMS (
            UUID TEXT PRIMARY KEY,
            TITLE TEXT NOT NULL,
            ARTISTSTR TEXT NOT NULL,
            COVERART TEXT,
            YEAR INTEGER NOT NULL DEFAULT 0,
            MONTH INTEGER NOT NULL DEFAULT 0,
            DAY INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS TRACKS (
            UUID TEXT PRIMARY KEY,
            FORMAT TEXT NOT NULL,
            BITRATE INTEGER NOT NULL DEFAULT 0,
            DURATION INTEGER NOT NULL DEFAULT 0,
            TITLE TEXT NOT NULL,
            TRACK INTEGER NOT NULL DEFAULT 0,
            DISC INTEGER NOT NULL DEFAULT 0,
            ARTISTSTR TEXT NOT NULL,
            ALBUM TEXT NOT NULL REFERENCES ALBUMS(UUID),
            LOCATION TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS TRACKARTISTS (
            TRACK TEXT NOT NULL REFERENCES TRACKS(UUID),
            ARTIST TEXT NOT NULL REFERENCES ARTISTS(UUID),
            RANK INTEGER NOT NULL,
            UNIQUE(TRACK, ARTIST)
        );

        CREATE TABLE IF NOT EXISTS ALBUMARTISTS (
            ALBUM TEXT NOT NULL REFERENCES ALBUMS(UUID),
            ARTIST TEXT NOT NULL REFERENCES ARTISTS(UUID),
            RANK INTEGER NOT NULL,
            UNIQUE(ALBUM, ARTIST)
        );

        CREATE TABLE IF NOT EXISTS PLAYLISTS (
            UUID TEXT PRIMARY KEY,
            NAME TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS PLAYLISTTRACKS (
            PLAYLIST TEXT NOT NULL REFERENCES PLAYLISTS(UUID) ON DELETE CASCADE,
            RANK INTEGER NOT NULL,
            TRACK TEXT NOT NULL REFERENCES TRACKS(UUID),
            UNIQUE(PLAYLIST, RANK)
        );
        ",
    )?;

    let version: Option<i64> = conn
        .query_row("SELECT VERSION FROM SURF_DB_META LIMIT 1", [], |row| row.get(0))
        .ok();

    if version.is_none() {
        conn.execute(
            "INSERT INTO SURF_DB_META (VERSION) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }

    Ok(())
}

/// Retry a step while the engine reports `SQLITE_BUSY`; any other error (or
/// `SQLITE_MISUSE`) propagates, since misuse is a programmer error, not a
/// transient condition.
pub fn retry_busy<T>(mut step: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
    loop {
        match step() {
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                continue;
            }
            other => return other,
        }
    }
}

/// Prepared upserts used during a scan, built once per connection.
pub struct PreparedUpserts<'conn> {
    pub insert_artist: rusqlite::Statement<'conn>,
    pub upsert_album: rusqlite::Statement<'conn>,
    pub upsert_track: rusqlite::Statement<'conn>,
    pub insert_album_artist: rusqlite::Statement<'conn>,
    pub insert_track_artist: rusqlite::Statement<'conn>,
}

impl<'conn> PreparedUpserts<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        Ok(Self {
            insert_artist: conn.prepare(
                "INSERT INTO ARTISTS (UUID, NAME) VALUES (?1, ?2)
                 ON CONFLICT(UUID) DO NOTHING",
            )?,
            upsert_album: conn.prepare(
                "INSERT INTO ALBUMS (UUID, TITLE, ARTISTSTR, COVERART, YEAR, MONTH, DAY)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(UUID) DO UPDATE SET
                    TITLE=excluded.TITLE, ARTISTSTR=excluded.ARTISTSTR,
                    COVERART=excluded.COVERART, YEAR=excluded.YEAR,
                    MONTH=excluded.MONTH, DAY=excluded.DAY",
            )?,
            upsert_track: conn.prepare(
                "INSERT INTO TRACKS (UUID, FORMAT, BITRATE, DURATION, TITLE, TRACK, DISC, ARTISTSTR, ALBUM, LOCATION)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(UUID) DO UPDATE SET
                    FORMAT=excluded.FORMAT, BITRATE=excluded.BITRATE, DURATION=excluded.DURATION,
                    TITLE=excluded.TITLE, TRACK=excluded.TRACK, DISC=excluded.DISC,
                    ARTISTSTR=excluded.ARTISTSTR, ALBUM=excluded.ALBUM, LOCATION=excluded.LOCATION",
            )?,
            insert_album_artist: conn.prepare(
                "INSERT INTO ALBUMARTISTS (ALBUM, ARTIST, RANK) VALUES (?1, ?2, ?3)
                 ON CONFLICT(ALBUM, ARTIST) DO NOTHING",
            )?,
            insert_track_artist: conn.prepare(
                "INSERT INTO TRACKARTISTS (TRACK, ARTIST, RANK) VALUES (?1, ?2, ?3)
                 ON CONFLICT(TRACK, ARTIST) DO NOTHING",
            )?,
        })
    }

    /// Insert all rows implied by one successfully extracted tag. Order matches
    /// §4.3: artists (both lists), album, track, album-artists, track-artists.
    pub fn upsert_tag(&mut self, tag: &ExtractedTag, location: &str) -> rusqlite::Result<()> {
        for (name, id) in tag.artist_names.iter().zip(tag.artist_ids.iter()) {
            retry_busy(|| self.insert_artist.execute(rusqlite::params![id, name]))?;
        }
        for (name, id) in tag.album_artist_names.iter().zip(tag.album_artist_ids.iter()) {
            retry_busy(|| self.insert_artist.execute(rusqlite::params![id, name]))?;
        }

        retry_busy(|| {
            self.upsert_album.execute(rusqlite::params![
                tag.album_id,
                tag.album_title,
                tag.album_artist_sort_string(),
                tag.cover_art_path,
                tag.year,
                tag.month,
                tag.day,
            ])
        })?;

        retry_busy(|| {
            self.upsert_track.execute(rusqlite::params![
                tag.track_id,
                tag.format,
                tag.bitrate,
                tag.duration_ms,
                tag.title,
                tag.track_num,
                tag.disc_num,
                tag.artist_sort_string(),
                tag.album_id,
                location,
            ])
        })?;

        for (rank, id) in tag.album_artist_ids.iter().enumerate() {
            retry_busy(|| {
                self.insert_album_artist
                    .execute(rusqlite::params![tag.album_id, id, (rank + 1) as i64])
            })?;
        }
        for (rank, id) in tag.artist_ids.iter().enumerate() {
            retry_busy(|| {
                self.insert_track_artist
                    .execute(rusqlite::params![tag.track_id, id, (rank + 1) as i64])
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tag(track_id: &str) -> ExtractedTag {
        ExtractedTag {
            track_id: track_id.to_string(),
            album_id: "album1".to_string(),
            format: "flac".to_string(),
            bitrate: 1000,
            duration_ms: 200_000,
            title: "T".to_string(),
            track_num: 3,
            disc_num: 1,
            year: 2020,
            month: 5,
            day: 4,
            album_title: "Al".to_string(),
            artist_names: vec!["Ar".to_string()],
            artist_ids: vec!["artist1".to_string()],
            album_artist_names: vec!["Ar".to_string()],
            album_artist_ids: vec!["artist1".to_string()],
            cover_art_path: None,
        }
    }

    #[test]
    fn open_creates_schema_and_seeds_meta() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir.path().join("test.db")).unwrap();
        let version: i64 = conn
            .query_row("SELECT VERSION FROM SURF_DB_META", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn upsert_tag_is_idempotent_and_keeps_id() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir.path().join("test.db")).unwrap();
        let tag = sample_tag("track1");

        {
            let mut upserts = PreparedUpserts::new(&conn).unwrap();
            upserts.upsert_tag(&tag, "/music/a.flac").unwrap();
        }
        {
            let mut upserts = PreparedUpserts::new(&conn).unwrap();
            upserts.upsert_tag(&tag, "/music/a.flac").unwrap();
        }

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM TRACKS", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
