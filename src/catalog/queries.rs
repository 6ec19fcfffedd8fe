//! Read queries backing the router & handlers (§4.7): grouped SQL driven by a
//! single ORDER-BY-primary-key query, folded in memory into nested JSON
//! shapes. Every fold here skips the final flush when no rows were observed,
//! fixing the `[null]`-on-empty-result bug the spec calls out (§9).

use std::collections::HashMap;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::AppError;
use crate::models::{
    AlbumDetail, AlbumListItem, AlbumRef, AlbumTrackItem, ArtistListItem, ArtistRef,
    PlaylistDetail, PlaylistListItem, SearchHit, TrackItem,
};

pub fn list_albums(conn: &Connection) -> rusqlite::Result<Vec<AlbumListItem>> {
    let mut stmt = conn.prepare(
        "SELECT AL.UUID, AL.TITLE, AL.ARTISTSTR, AL.YEAR, AL.MONTH, AL.DAY,
                (SELECT COUNT(*) FROM TRACKS T WHERE T.ALBUM = AL.UUID) AS NUM_TRACKS,
                (SELECT COALESCE(SUM(DURATION), 0) / 60000 FROM TRACKS T WHERE T.ALBUM = AL.UUID) AS TOTAL_DURATION,
                AR.UUID AS ARTIST_UUID, AR.NAME AS ARTIST_NAME
         FROM ALBUMS AL
         JOIN ALBUMARTISTS AA ON AA.ALBUM = AL.UUID
         JOIN ARTISTS AR ON AR.UUID = AA.ARTIST
         ORDER BY AL.ARTISTSTR, AL.YEAR, AL.MONTH, AL.DAY, AL.TITLE, AA.RANK",
    )?;

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    let mut current: Option<AlbumListItem> = None;

    while let Some(row) = rows.next()? {
        let uuid: String = row.get(0)?;
        let artist = ArtistRef {
            uuid: row.get(8)?,
            name: row.get(9)?,
        };

        match &mut current {
            Some(acc) if acc.uuid == uuid => acc.artists.push(artist),
            _ => {
                if let Some(finished) = current.take() {
                    out.push(finished);
                }
                current = Some(AlbumListItem {
                    uuid,
                    title: row.get(1)?,
                    artist_sort: row.get(2)?,
                    year: row.get(3)?,
                    month: row.get(4)?,
                    day: row.get(5)?,
                    num_tracks: row.get(6)?,
                    total_duration: row.get(7)?,
                    artists: vec![artist],
                });
            }
        }
    }
    if let Some(finished) = current {
        out.push(finished);
    }

    Ok(out)
}

pub fn list_artists(conn: &Connection) -> rusqlite::Result<Vec<ArtistListItem>> {
    let mut base_stmt = conn.prepare(
        "SELECT AR.UUID, AR.NAME,
                (SELECT COUNT(DISTINCT TA.TRACK) FROM TRACKARTISTS TA WHERE TA.ARTIST = AR.UUID) AS TOTAL_TRACKS
         FROM ARTISTS AR
         ORDER BY AR.NAME",
    )?;

    let mut membership_stmt = conn.prepare(
        "SELECT ARTIST, ALBUM, MAX(OWNED) AS OWNED FROM (
            SELECT AA.ARTIST AS ARTIST, AA.ALBUM AS ALBUM, 1 AS OWNED FROM ALBUMARTISTS AA
            UNION ALL
            SELECT TA.ARTIST AS ARTIST, T.ALBUM AS ALBUM, 0 AS OWNED
            FROM TRACKARTISTS TA JOIN TRACKS T ON T.UUID = TA.TRACK
         )
         GROUP BY ARTIST, ALBUM
         ORDER BY ARTIST",
    )?;

    let mut membership: HashMap<String, (Vec<String>, Vec<String>)> = HashMap::new();
    let mut rows = membership_stmt.query([])?;
    while let Some(row) = rows.next()? {
        let artist: String = row.get(0)?;
        let album: String = row.get(1)?;
        let owned: i64 = row.get(2)?;
        let entry = membership.entry(artist).or_default();
        if owned != 0 {
            entry.0.push(album);
        } else {
            entry.1.push(album);
        }
    }

    let mut out = Vec::new();
    let mut rows = base_stmt.query([])?;
    while let Some(row) = rows.next()? {
        let uuid: String = row.get(0)?;
        let (albums, appearances) = membership.remove(&uuid).unwrap_or_default();
        out.push(ArtistListItem {
            uuid,
            name: row.get(1)?,
            albums,
            appearances,
            total_tracks: row.get(2)?,
        });
    }

    Ok(out)
}

/// Whitelisted `sort` tokens, translated to concrete column lists. Unknown
/// tokens are rejected by the caller before this runs.
const SORT_WHITELIST: &[(&str, &str)] = &[
    ("album_artist", "AL.ARTISTSTR"),
    ("album_date", "AL.YEAR, AL.MONTH, AL.DAY"),
    ("album_title", "AL.TITLE"),
    ("track_number", "T.DISC, T.TRACK"),
    ("track_title", "T.TITLE"),
    ("track_artist", "T.ARTISTSTR"),
];

pub fn list_tracks(conn: &Connection, sort: Option<&str>) -> Result<Vec<TrackItem>, AppError> {
    let order_by = match sort {
        None => "AL.ARTISTSTR, AL.YEAR, AL.MONTH, AL.DAY, AL.TITLE, T.DISC, T.TRACK".to_string(),
        Some(tokens) => {
            let mut columns = Vec::new();
            for token in tokens.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()) {
                let Some((_, cols)) = SORT_WHITELIST.iter().find(|(name, _)| *name == token) else {
                    return Err(AppError::BadInput(format!(
                        "unknown sort token '{token}'"
                    )));
                };
                columns.push(*cols);
            }
            if columns.is_empty() {
                return Err(AppError::BadInput("empty sort parameter".to_string()));
            }
            columns.join(", ")
        }
    };

    let sql = format!(
        "SELECT T.UUID, T.DURATION, T.TITLE, T.DISC, T.TRACK, T.ALBUM, AL.TITLE,
                AR.UUID, AR.NAME
         FROM TRACKS T
         JOIN ALBUMS AL ON AL.UUID = T.ALBUM
         JOIN TRACKARTISTS TA ON TA.TRACK = T.UUID
         JOIN ARTISTS AR ON AR.UUID = TA.ARTIST
         ORDER BY {order_by}, TA.RANK"
    );

    let mut stmt = conn.prepare(&sql).map_err(|e| AppError::Catalog(e.into()))?;
    let mut rows = stmt.query([]).map_err(|e| AppError::Catalog(e.into()))?;

    let mut out = Vec::new();
    let mut current: Option<TrackItem> = None;

    while let Some(row) = rows.next().map_err(|e| AppError::Catalog(e.into()))? {
        let uuid: String = row.get(0).map_err(|e| AppError::Catalog(e.into()))?;
        let artist = ArtistRef {
            uuid: row.get(7).map_err(|e| AppError::Catalog(e.into()))?,
            name: row.get(8).map_err(|e| AppError::Catalog(e.into()))?,
        };

        match &mut current {
            Some(acc) if acc.uuid == uuid => acc.artists.push(artist),
            _ => {
                if let Some(finished) = current.take() {
                    out.push(finished);
                }
                current = Some(TrackItem {
                    uuid,
                    duration: row.get(1).map_err(|e| AppError::Catalog(e.into()))?,
                    title: row.get(2).map_err(|e| AppError::Catalog(e.into()))?,
                    disc: row.get(3).map_err(|e| AppError::Catalog(e.into()))?,
                    track: row.get(4).map_err(|e| AppError::Catalog(e.into()))?,
                    album: AlbumRef {
                        uuid: row.get(5).map_err(|e| AppError::Catalog(e.into()))?,
                        title: row.get(6).map_err(|e| AppError::Catalog(e.into()))?,
                    },
                    artists: vec![artist],
                });
            }
        }
    }
    if let Some(finished) = current {
        out.push(finished);
    }

    Ok(out)
}

pub fn get_album_detail(conn: &Connection, album_id: &str) -> rusqlite::Result<Option<AlbumDetail>> {
    let mut header_stmt = conn.prepare(
        "SELECT AL.UUID, AL.TITLE, AL.ARTISTSTR, AL.YEAR, AL.MONTH, AL.DAY, AR.UUID, AR.NAME
         FROM ALBUMS AL
         JOIN ALBUMARTISTS AA ON AA.ALBUM = AL.UUID
         JOIN ARTISTS AR ON AR.UUID = AA.ARTIST
         WHERE AL.UUID = ?1
         ORDER BY AA.RANK",
    )?;

    let mut rows = header_stmt.query([album_id])?;
    let mut detail: Option<AlbumDetail> = None;

    while let Some(row) = rows.next()? {
        let artist = ArtistRef {
            uuid: row.get(6)?,
            name: row.get(7)?,
        };
        match &mut detail {
            Some(d) => d.artists.push(artist),
            None => {
                detail = Some(AlbumDetail {
                    uuid: row.get(0)?,
                    title: row.get(1)?,
                    artist_sort: row.get(2)?,
                    year: row.get(3)?,
                    month: row.get(4)?,
                    day: row.get(5)?,
                    artists: vec![artist],
                    tracks: Vec::new(),
                });
            }
        }
    }

    let Some(mut detail) = detail else {
        return Ok(None);
    };

    let mut track_stmt = conn.prepare(
        "SELECT T.UUID, T.DURATION, T.TITLE, T.DISC, T.TRACK, AR.UUID, AR.NAME
         FROM TRACKS T
         JOIN TRACKARTISTS TA ON TA.TRACK = T.UUID
         JOIN ARTISTS AR ON AR.UUID = TA.ARTIST
         WHERE T.ALBUM = ?1
         ORDER BY T.DISC, T.TRACK, TA.RANK",
    )?;
    let mut rows = track_stmt.query([album_id])?;
    let mut current: Option<AlbumTrackItem> = None;

    while let Some(row) = rows.next()? {
        let uuid: String = row.get(0)?;
        let artist = ArtistRef {
            uuid: row.get(5)?,
            name: row.get(6)?,
        };
        match &mut current {
            Some(acc) if acc.uuid == uuid => acc.artists.push(artist),
            _ => {
                if let Some(finished) = current.take() {
                    detail.tracks.push(finished);
                }
                current = Some(AlbumTrackItem {
                    uuid,
                    duration: row.get(1)?,
                    title: row.get(2)?,
                    disc: row.get(3)?,
                    track: row.get(4)?,
                    artists: vec![artist],
                });
            }
        }
    }
    if let Some(finished) = current {
        detail.tracks.push(finished);
    }

    Ok(Some(detail))
}

pub fn get_cover_art_path(conn: &Connection, album_id: &str) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT COVERART FROM ALBUMS WHERE UUID = ?1",
        [album_id],
        |row| row.get::<_, Option<String>>(0),
    ) {
        Ok(path) => Ok(path),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn get_track_location(conn: &Connection, track_id: &str) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT LOCATION FROM TRACKS WHERE UUID = ?1",
        [track_id],
        |row| row.get(0),
    ) {
        Ok(loc) => Ok(Some(loc)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_playlists(conn: &Connection) -> rusqlite::Result<Vec<PlaylistListItem>> {
    let mut stmt = conn.prepare("SELECT UUID, NAME FROM PLAYLISTS ORDER BY NAME")?;
    let rows = stmt.query_map([], |row| {
        Ok(PlaylistListItem {
            uuid: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn get_playlist_detail(
    conn: &Connection,
    playlist_id: &str,
) -> rusqlite::Result<Option<PlaylistDetail>> {
    let name: Option<String> = conn
        .query_row(
            "SELECT NAME FROM PLAYLISTS WHERE UUID = ?1",
            [playlist_id],
            |row| row.get(0),
        )
        .ok();

    let Some(name) = name else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT T.UUID, T.DURATION, T.TITLE, T.DISC, T.TRACK, T.ALBUM, AL.TITLE, AR.UUID, AR.NAME
         FROM PLAYLISTTRACKS PLT
         JOIN TRACKS T ON T.UUID = PLT.TRACK
         JOIN ALBUMS AL ON AL.UUID = T.ALBUM
         JOIN TRACKARTISTS TA ON TA.TRACK = T.UUID
         JOIN ARTISTS AR ON AR.UUID = TA.ARTIST
         WHERE PLT.PLAYLIST = ?1
         ORDER BY PLT.RANK, TA.RANK",
    )?;
    let mut rows = stmt.query([playlist_id])?;
    let mut tracks = Vec::new();
    let mut current: Option<TrackItem> = None;

    while let Some(row) = rows.next()? {
        let uuid: String = row.get(0)?;
        let artist = ArtistRef {
            uuid: row.get(7)?,
            name: row.get(8)?,
        };
        match &mut current {
            Some(acc) if acc.uuid == uuid => acc.artists.push(artist),
            _ => {
                if let Some(finished) = current.take() {
                    tracks.push(finished);
                }
                current = Some(TrackItem {
                    uuid,
                    duration: row.get(1)?,
                    title: row.get(2)?,
                    disc: row.get(3)?,
                    track: row.get(4)?,
                    album: AlbumRef {
                        uuid: row.get(5)?,
                        title: row.get(6)?,
                    },
                    artists: vec![artist],
                });
            }
        }
    }
    if let Some(finished) = current {
        tracks.push(finished);
    }

    Ok(Some(PlaylistDetail {
        uuid: playlist_id.to_string(),
        name,
        tracks,
    }))
}

/// Replace a playlist's tracks. Wrapped in a single transaction (§9 fix: the
/// original performs the delete and the inserts as separate, unwrapped
/// statements, letting a concurrent reader observe an empty playlist).
pub fn replace_playlist(
    conn: &mut Connection,
    playlist_id: &str,
    name: Option<&str>,
    track_ids: &[String],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "DELETE FROM PLAYLISTTRACKS WHERE PLAYLIST = ?1",
        [playlist_id],
    )?;

    if let Some(name) = name {
        tx.execute(
            "INSERT INTO PLAYLISTS (UUID, NAME) VALUES (?1, ?2)
             ON CONFLICT(UUID) DO UPDATE SET NAME = excluded.NAME",
            rusqlite::params![playlist_id, name],
        )?;
    } else {
        tx.execute(
            "INSERT INTO PLAYLISTS (UUID, NAME) VALUES (?1, ?1)
             ON CONFLICT(UUID) DO NOTHING",
            [playlist_id],
        )?;
    }

    {
        let mut insert = tx.prepare(
            "INSERT INTO PLAYLISTTRACKS (PLAYLIST, RANK, TRACK) VALUES (?1, ?2, ?3)",
        )?;
        for (i, track_id) in track_ids.iter().enumerate() {
            insert.execute(rusqlite::params![playlist_id, (i + 1) as i64, track_id])?;
        }
    }

    tx.commit()
}

pub fn delete_playlist(conn: &mut Connection, playlist_id: &str) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM PLAYLISTTRACKS WHERE PLAYLIST = ?1",
        [playlist_id],
    )?;
    tx.execute("DELETE FROM PLAYLISTS WHERE UUID = ?1", [playlist_id])?;
    tx.commit()
}

/// Fuzzy-substring edit distance: a modified Damerau-Levenshtein where
/// insertions at the haystack's leading boundary are free, i.e.
/// `d[0][j] = min(j, 1)` instead of `d[0][j] = j`. This lets the needle match
/// anywhere inside the haystack rather than only as a prefix.
pub fn fuzzy_substring_distance(needle: &str, haystack: &str) -> i64 {
    let needle: Vec<char> = needle.chars().collect();
    let haystack: Vec<char> = haystack.chars().collect();
    let (n, m) = (needle.len(), haystack.len());

    if n == 0 {
        return if m == 0 { 0 } else { 1 };
    }

    let mut d = vec![vec![0i64; m + 1]; n + 1];
    for i in 0..=n {
        d[i][0] = i as i64;
    }
    for j in 0..=m {
        d[0][j] = (j.min(1)) as i64;
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = if needle[i - 1] == haystack[j - 1] { 0 } else { 1 };
            let mut best = (d[i - 1][j] + 1).min(d[i][j - 1] + 1).min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && needle[i - 1] == haystack[j - 2] && needle[i - 2] == haystack[j - 1] {
                best = best.min(d[i - 2][j - 2] + 1);
            }
            d[i][j] = best;
        }
    }

    (0..=m).map(|j| d[n][j]).min().unwrap_or(n as i64)
}

/// Register `fuzzy_distance(needle, haystack)` as a deterministic SQL scalar
/// function (§4.7/§9), so `search` below can filter with a `WHERE` clause
/// instead of pulling every row into Rust to score it.
pub fn register_fuzzy_distance(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fuzzy_distance",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let needle: String = ctx.get(0)?;
            let haystack: String = ctx.get(1)?;
            Ok(fuzzy_substring_distance(&needle, &haystack))
        },
    )
}

pub fn search(conn: &Connection, q: &str) -> rusqlite::Result<Vec<SearchHit>> {
    let q = q.to_lowercase();
    if q.chars().count() < 2 {
        return Ok(Vec::new());
    }

    let threshold = ((q.chars().count() as f64) * 0.45).round() as i64;
    let mut hits = Vec::new();

    let sources: &[(&str, &str)] = &[
        ("albums", "SELECT UUID, fuzzy_distance(?1, LOWER(TITLE)) AS SCORE FROM ALBUMS WHERE SCORE <= ?2"),
        ("tracks", "SELECT UUID, fuzzy_distance(?1, LOWER(TITLE)) AS SCORE FROM TRACKS WHERE SCORE <= ?2"),
        ("artists", "SELECT UUID, fuzzy_distance(?1, LOWER(NAME)) AS SCORE FROM ARTISTS WHERE SCORE <= ?2"),
        ("playlists", "SELECT UUID, fuzzy_distance(?1, LOWER(NAME)) AS SCORE FROM PLAYLISTS WHERE SCORE <= ?2"),
    ];

    for (kind, sql) in sources {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params![q, threshold])?;
        while let Some(row) = rows.next()? {
            hits.push(SearchHit {
                uuid: row.get(0)?,
                score: row.get(1)?,
                kind,
            });
        }
    }

    hits.sort_by_key(|h| h.score);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_distance_matches_exact_substring() {
        assert_eq!(fuzzy_substring_distance("art", "my artist name"), 0);
    }

    #[test]
    fn fuzzy_distance_nonzero_for_unrelated_strings() {
        assert!(fuzzy_substring_distance("zzz", "my artist name") > 0);
    }

    #[test]
    fn fuzzy_distance_handles_transposition() {
        // "ab" -> "ba" is a single transposition, distance 1 under Damerau rules.
        assert_eq!(fuzzy_substring_distance("ab", "ba"), 1);
    }
}
