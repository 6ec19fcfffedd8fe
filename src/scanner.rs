//! Filesystem scan: walk a media root, extract tags per file, and upsert the
//! catalog in one transaction (§4.4).

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::{self, PreparedUpserts};
use crate::tagger;

const DB_FILE_NAME: &str = "surf.db";

/// Walk `root`, extract tags from every audio-looking file, and upsert the
/// catalog. Files that fail tag extraction are skipped, not fatal. Returns
/// the unix timestamp the scan completed at, for `latest_mod_time` tracking.
pub fn scan(conn: &mut Connection, root: &Path) -> Result<i64> {
    let root = root
        .canonicalize()
        .with_context(|| format!("canonicalizing media root {}", root.display()))?;

    let mut seen = 0u64;
    let mut skipped = 0u64;

    let tx = conn.transaction()?;
    {
        let mut upserts = PreparedUpserts::new(&tx)?;

        for entry in WalkDir::new(&root).follow_links(true).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // walkdir surfaces permission-denied and similar per-entry
                    // errors here rather than aborting the whole walk.
                    warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_hidden(path) || path.file_name().map(|n| n == DB_FILE_NAME).unwrap_or(false) {
                continue;
            }

            match tagger::extract(path) {
                Ok(tag) => {
                    upserts.upsert_tag(&tag, &path.to_string_lossy())?;
                    seen += 1;
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping file with no usable tag");
                    skipped += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!(seen, skipped, root = %root.display(), "scan complete");

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    Ok(now)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Convenience wrapper used by the CLI entrypoint: opens the catalog db
/// under `media_root` and scans it.
pub fn scan_media_root(media_root: &Path, db_path: &Path) -> Result<i64> {
    let mut conn = catalog::open(db_path)?;
    scan(&mut conn, media_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_skips_non_audio_files_without_failing() {
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(media.path().join(".hidden"), b"x").unwrap();

        let db_dir = TempDir::new().unwrap();
        let mut conn = catalog::open(&db_dir.path().join("surf.db")).unwrap();

        let result = scan(&mut conn, media.path());
        assert!(result.is_ok());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM TRACKS", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
