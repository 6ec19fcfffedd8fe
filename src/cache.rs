//! LRU cache for transcoded output files (§4.4). Keys are
//! `{track_id}.{quality}` strings; values are cache-file paths of the form
//! `<cache-dir>/<track_id>.<quality>.mp3`. Eviction removes the file from
//! disk as well as the in-memory index, under the same mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

pub struct TranscodeCache {
    inner: Mutex<Inner>,
    max_entries: usize,
}

struct Inner {
    /// Most-recently-used at the front, least-recently-used at the back.
    order: Vec<String>,
    paths: HashMap<String, PathBuf>,
}

impl TranscodeCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: Vec::new(),
                paths: HashMap::new(),
            }),
            max_entries,
        }
    }

    fn key(track_id: &str, quality: u8) -> String {
        format!("{track_id}.{quality}")
    }

    fn cache_path(cache_dir: &Path, track_id: &str, quality: u8) -> PathBuf {
        cache_dir.join(format!("{track_id}.{quality}.mp3"))
    }

    /// Move `key` to the front if present, otherwise insert it at the front;
    /// evict the tail key (deleting its file) if this pushes the cache over
    /// capacity. Returns the evicted path, if any, so the caller may delete
    /// it outside the mutex (§4.4) — here we just delete inline, since a
    /// single-process personal server has no reason to split that out.
    pub fn put(&self, key: String, path: PathBuf) {
        let mut inner = self.inner.lock();
        if inner.paths.insert(key.clone(), path).is_some() {
            touch(&mut inner.order, &key);
        } else {
            inner.order.insert(0, key);
        }

        while inner.order.len() > self.max_entries {
            let evicted_key = inner.order.pop().expect("order non-empty in eviction loop");
            if let Some(evicted_path) = inner.paths.remove(&evicted_key) {
                if let Err(err) = std::fs::remove_file(&evicted_path) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %evicted_path.display(), error = %err, "failed to remove evicted transcode");
                    }
                }
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().paths.contains_key(key)
    }

    /// `get_cached_transcode(track_id, quality)` (§4.4): compute the cache
    /// path, record access via `put` (promoting or registering the key as
    /// MRU even on a miss), and report whether a non-empty file already sits
    /// at that path.
    pub fn get_cached_transcode(
        &self,
        cache_dir: &Path,
        track_id: &str,
        quality: u8,
    ) -> (PathBuf, bool) {
        let path = Self::cache_path(cache_dir, track_id, quality);
        self.put(Self::key(track_id, quality), path.clone());
        let present = std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        (path, present)
    }
}

fn touch(order: &mut Vec<String>, key: &str) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        let k = order.remove(pos);
        order.insert(0, k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn evicts_least_recently_used_and_deletes_file() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodeCache::new(2);

        let p1 = dir.path().join("a");
        let p2 = dir.path().join("b");
        let p3 = dir.path().join("c");
        std::fs::write(&p1, b"1").unwrap();
        std::fs::write(&p2, b"2").unwrap();
        std::fs::write(&p3, b"3").unwrap();

        cache.put("a".into(), p1.clone());
        cache.put("b".into(), p2.clone());
        cache.put("a".into(), p1.clone()); // touch a, so b becomes LRU
        cache.put("c".into(), p3.clone());

        assert!(cache.contains("a"));
        assert!(cache.contains("c"));
        assert!(!cache.contains("b"));
        assert!(!p2.exists());
    }

    #[test]
    fn get_cached_transcode_reports_absence_then_presence() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodeCache::new(4);

        let (path, present) = cache.get_cached_transcode(dir.path(), "track1", 5);
        assert!(!present);
        assert_eq!(path, dir.path().join("track1.5.mp3"));

        std::fs::write(&path, b"not empty").unwrap();
        let (path2, present2) = cache.get_cached_transcode(dir.path(), "track1", 5);
        assert_eq!(path, path2);
        assert!(present2);
    }

    #[test]
    fn empty_file_counts_as_not_present() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodeCache::new(4);
        let (path, _) = cache.get_cached_transcode(dir.path(), "track1", 5);
        std::fs::write(&path, b"").unwrap();
        let (_, present) = cache.get_cached_transcode(dir.path(), "track1", 5);
        assert!(!present);
    }
}
