//! Tag extraction: reads one audio file's container metadata and derives the
//! stable identifiers and catalog fields described in §3/§4.1.

use std::path::Path;

use lofty::{Accessor, AudioFile, ItemKey, Probe, TaggedFileExt};

use crate::error::TagError;
use crate::models::ExtractedTag;
use crate::utils::hashing::{album_id, artist_id, normalize_tag_id, track_id_from_file};
use crate::utils::tokenize::{tokenize, TAG_DELIMS};

const COVER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn extract(path: &Path) -> Result<ExtractedTag, TagError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| TagError::ReadFailed(anyhow::anyhow!("{e}")))?
        .read()
        .map_err(|e| TagError::ReadFailed(anyhow::anyhow!("{e}")))?;

    if tagged_file.properties().duration().as_millis() == 0 && tagged_file.tags().is_empty() {
        return Err(TagError::NoAudioStream);
    }

    // prefer the container-level (primary) tag, falling back to the first
    // stream-level tag if the container carries none.
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .ok_or(TagError::MissingTag("TITLE"))?;

    let title = tag.title().map(|s| s.to_string()).ok_or(TagError::MissingTag("TITLE"))?;
    let album_title = tag.album().map(|s| s.to_string()).ok_or(TagError::MissingTag("ALBUM"))?;
    let artist_str = tag.artist().map(|s| s.to_string()).ok_or(TagError::MissingTag("ARTIST"))?;

    let artists_raw = tag
        .get_string(&ItemKey::TrackArtist)
        .map(|s| s.to_string())
        .ok_or(TagError::MissingTag("ARTISTS|ARTIST"))?;

    let album_artist_raw = tag
        .get_string(&ItemKey::AlbumArtist)
        .or_else(|| tag.get_string(&ItemKey::TrackArtist))
        .map(|s| s.to_string())
        .ok_or(TagError::MissingTag("album_artist|ALBUMARTIST|ARTIST"))?;

    let artist_names = tokenize(&artists_raw, TAG_DELIMS);
    let album_artist_names = tokenize(&album_artist_raw, TAG_DELIMS);

    let artist_ids = resolve_ids(
        tag.get_string(&ItemKey::MusicBrainzArtistId),
        &artist_names,
    );
    let album_artist_ids = resolve_ids(
        tag.get_string(&ItemKey::MusicBrainzArtistId),
        &album_artist_names,
    );

    if artist_ids.len() != artist_names.len() {
        return Err(TagError::ArtistCountMismatch {
            names: artist_names.len(),
            uuids: artist_ids.len(),
        });
    }
    if album_artist_ids.len() != album_artist_names.len() {
        return Err(TagError::ArtistCountMismatch {
            names: album_artist_names.len(),
            uuids: album_artist_ids.len(),
        });
    }

    let track_id = tag
        .get_string(&ItemKey::MusicBrainzRecordingId)
        .map(normalize_tag_id)
        .map(Ok)
        .unwrap_or_else(|| track_id_from_file(path).map_err(|e| TagError::ReadFailed(anyhow::Error::new(e))))?;

    let album_id = tag
        .get_string(&ItemKey::MusicBrainzReleaseGroupId)
        .map(normalize_tag_id)
        .unwrap_or_else(|| album_id(&album_artist_names.join(", "), &album_title));

    let (year, month, day) = parse_date(tag);
    let (track_num, disc_num) = (
        parse_numerator(tag.get_string(&ItemKey::TrackNumber)).unwrap_or(0),
        parse_numerator(tag.get_string(&ItemKey::DiscNumber)).unwrap_or(0),
    );

    let properties = tagged_file.properties();

    Ok(ExtractedTag {
        track_id,
        album_id,
        format: format_name(tagged_file.file_type()),
        bitrate: properties.audio_bitrate().unwrap_or(0) as i64,
        duration_ms: properties.duration().as_millis() as i64,
        title,
        track_num,
        disc_num,
        year,
        month,
        day,
        album_title,
        artist_names,
        artist_ids,
        album_artist_names,
        album_artist_ids,
        cover_art_path: find_cover_art(path),
    })
}

/// Map lofty's container classification to a short codec-family name, the
/// same shape the `format` catalog column expects (`mp3`, `flac`, ...).
fn format_name(file_type: lofty::FileType) -> String {
    use lofty::FileType;
    match file_type {
        FileType::Mpeg => "mp3",
        FileType::Flac => "flac",
        FileType::Vorbis => "ogg",
        FileType::Opus => "opus",
        FileType::Speex => "speex",
        FileType::Wav => "wav",
        FileType::Aiff => "aiff",
        FileType::Mp4 => "m4a",
        FileType::Ape => "ape",
        FileType::WavPack => "wv",
        _ => "unknown",
    }
    .to_string()
}

/// Resolve per-artist ids: a MusicBrainz id list if present and non-empty
/// (tokenized on the same delimiters), else per-name hashes.
fn resolve_ids(mb_ids_raw: Option<&str>, names: &[String]) -> Vec<String> {
    match mb_ids_raw {
        Some(raw) => {
            let ids = tokenize(raw, TAG_DELIMS);
            if ids.is_empty() {
                names.iter().map(|n| artist_id(n)).collect()
            } else {
                ids.iter().map(|id| normalize_tag_id(id)).collect()
            }
        }
        None => names.iter().map(|n| artist_id(n)).collect(),
    }
}

/// Dates come from the first of {date, originaldate, year, originalyear, TORY}
/// present, split on `-`, each component defaulted to "0" if absent or
/// non-numeric, padded to three components.
fn parse_date(tag: &lofty::Tag) -> (i64, i64, i64) {
    let date_keys = [
        ItemKey::RecordingDate,
        ItemKey::OriginalReleaseDate,
        ItemKey::Year,
    ];

    let raw = date_keys
        .iter()
        .find_map(|key| tag.get_string(key))
        .or_else(|| tag.get_string(&ItemKey::Unknown("TORY".to_string())));

    let Some(raw) = raw else {
        return (0, 0, 0);
    };

    let mut parts: Vec<i64> = raw
        .split('-')
        .map(|component| component.trim())
        .map(|component| {
            if !component.is_empty() && component.chars().all(|c| c.is_ascii_digit()) {
                component.parse().unwrap_or(0)
            } else {
                0
            }
        })
        .collect();

    parts.resize(3, 0);
    (parts[0], parts[1], parts[2])
}

/// `track`/`disc` values are `N` or `N/M`; keep the numerator.
fn parse_numerator(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.split('/').next())
        .map(|s| s.trim())
        .and_then(|s| s.parse().ok())
}

/// Look in the file's parent directory for a cover image: `cover`/`folder`
/// (case-insensitive) preferred, lexicographically first; else any image,
/// lexicographically first; else none.
fn find_cover_art(track_path: &Path) -> Option<String> {
    let dir = track_path.parent()?;
    let mut named_candidates = Vec::new();
    let mut any_candidates = Vec::new();

    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let Some(ext) = ext else { continue };
        if !COVER_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if stem == "cover" || stem == "folder" {
            named_candidates.push(path.clone());
        }
        any_candidates.push(path);
    }

    named_candidates.sort();
    any_candidates.sort();

    named_candidates
        .into_iter()
        .next()
        .or_else(|| any_candidates.into_iter().next())
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numerator_keeps_numerator_only() {
        assert_eq!(parse_numerator(Some("3/10")), Some(3));
        assert_eq!(parse_numerator(Some("5")), Some(5));
        assert_eq!(parse_numerator(None), None);
    }

    #[test]
    fn find_cover_art_prefers_named_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("back.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("cover.png"), b"x").unwrap();
        let track_path = dir.path().join("track.flac");
        std::fs::write(&track_path, b"x").unwrap();

        let found = find_cover_art(&track_path).unwrap();
        assert!(found.ends_with("cover.png"));
    }

    #[test]
    fn find_cover_art_falls_back_to_lexicographic_first_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zzz.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("aaa.png"), b"x").unwrap();
        let track_path = dir.path().join("track.flac");
        std::fs::write(&track_path, b"x").unwrap();

        let found = find_cover_art(&track_path).unwrap();
        assert!(found.ends_with("aaa.png"));
    }

    #[test]
    fn find_cover_art_none_when_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let track_path = dir.path().join("track.flac");
        std::fs::write(&track_path, b"x").unwrap();
        assert!(find_cover_art(&track_path).is_none());
    }
}
