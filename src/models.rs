//! JSON response shapes for the router & handlers (§6), and the tag record
//! produced by the tag extractor (§4.1).

use serde::Serialize;

/// Metadata extracted from one audio file, before it becomes catalog rows.
#[derive(Debug, Clone)]
pub struct ExtractedTag {
    pub track_id: String,
    pub album_id: String,
    pub format: String,
    pub bitrate: i64,
    pub duration_ms: i64,
    pub title: String,
    pub track_num: i64,
    pub disc_num: i64,
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub album_title: String,
    pub artist_names: Vec<String>,
    pub artist_ids: Vec<String>,
    pub album_artist_names: Vec<String>,
    pub album_artist_ids: Vec<String>,
    pub cover_art_path: Option<String>,
}

impl ExtractedTag {
    /// `ARTISTSTR`/`ALBUMARTISTSTR` columns: the tag's artist order, comma-joined.
    pub fn artist_sort_string(&self) -> String {
        self.artist_names.join(", ")
    }

    pub fn album_artist_sort_string(&self) -> String {
        self.album_artist_names.join(", ")
    }
}

#[derive(Debug, Serialize)]
pub struct ArtistRef {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AlbumListItem {
    pub uuid: String,
    pub title: String,
    pub artist_sort: String,
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub num_tracks: i64,
    pub total_duration: i64,
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Serialize)]
pub struct AlbumTrackItem {
    pub uuid: String,
    pub duration: i64,
    pub title: String,
    pub disc: i64,
    pub track: i64,
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Serialize)]
pub struct AlbumDetail {
    pub uuid: String,
    pub title: String,
    pub artist_sort: String,
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub artists: Vec<ArtistRef>,
    pub tracks: Vec<AlbumTrackItem>,
}

#[derive(Debug, Serialize)]
pub struct ArtistListItem {
    pub uuid: String,
    pub name: String,
    pub albums: Vec<String>,
    pub appearances: Vec<String>,
    pub total_tracks: i64,
}

#[derive(Debug, Serialize)]
pub struct AlbumRef {
    pub uuid: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct TrackItem {
    pub uuid: String,
    pub duration: i64,
    pub title: String,
    pub disc: i64,
    pub track: i64,
    pub album: AlbumRef,
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistListItem {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetail {
    pub uuid: String,
    pub name: String,
    pub tracks: Vec<TrackItem>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub uuid: String,
    pub score: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
}
