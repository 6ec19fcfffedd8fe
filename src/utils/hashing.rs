//! Keyed 128-bit hashing for track/album/artist identifiers.
//!
//! The fixed key stands in for the original implementation's highwayhash key;
//! any constant works as long as it never changes between runs, since ids must
//! stay stable across rescans.
use xxhash_rust::xxh3::{xxh3_128_with_seed, Xxh3};

const HASH_SEED: u64 = 0x5352_5546_4853_4831; // "SURFHSH1" in ascii, arbitrary fixed key

/// Hash arbitrary bytes into a 32-hex-character lowercase id.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:032x}", xxh3_128_with_seed(bytes, HASH_SEED))
}

/// Hash one or more strings, concatenated in order, into a 32-hex-character id.
pub fn hash_strings(parts: &[&str]) -> String {
    let combined = parts.concat();
    hash_bytes(combined.as_bytes())
}

/// Derive an artist id from a single artist name.
pub fn artist_id(name: &str) -> String {
    hash_strings(&[name])
}

/// Derive an album id from the album-artist string and the album title.
pub fn album_id(album_artist: &str, title: &str) -> String {
    hash_strings(&[album_artist, title])
}

/// Derive a track id by hashing the file's raw bytes, read in fixed-size chunks
/// so large files don't need to be loaded in full.
pub fn track_id_from_file(path: &std::path::Path) -> std::io::Result<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 16384];
    let mut hasher = Xxh3::with_seed(HASH_SEED);
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:032x}", hasher.digest128()))
}

/// Normalize a MusicBrainz-style tag id: strip hyphens, lowercase.
pub fn normalize_tag_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_strings_is_deterministic() {
        let a = hash_strings(&["Artist", "Title"]);
        let b = hash_strings(&["Artist", "Title"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn hash_strings_is_order_sensitive_via_concat() {
        let a = hash_strings(&["foo", "bar"]);
        let b = hash_strings(&["foob", "ar"]);
        // concatenation collapses the boundary, which is expected: this mirrors
        // the teacher's create_hash behavior of joining arguments with no separator.
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_tag_id_strips_hyphens_and_lowercases() {
        assert_eq!(
            normalize_tag_id("AAAA-BBBB-CCCC-DDDD"),
            "aaaabbbbccccdddd"
        );
    }
}
