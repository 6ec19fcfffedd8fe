//! Filesystem locations derived from resolved settings: the catalog database
//! lives inside the media root; the transcode cache lives under the platform
//! cache home.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Settings;

const DB_FILE_NAME: &str = "surf.db";
const ORG: &str = "surf";
const APP: &str = "surf";

static PATHS: OnceCell<Arc<Paths>> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct Paths {
    media_root: PathBuf,
    cache_dir: PathBuf,
}

impl Paths {
    pub fn init(settings: &Settings) -> Result<Arc<Paths>> {
        let paths = PATHS.get_or_try_init(|| {
            let paths = Self::new(settings)?;
            Ok::<_, anyhow::Error>(Arc::new(paths))
        })?;
        Ok(Arc::clone(paths))
    }

    pub fn get() -> Result<Arc<Paths>> {
        PATHS.get().cloned().context("paths not initialized")
    }

    fn new(settings: &Settings) -> Result<Self> {
        let media_root = settings.media_root.clone();
        std::fs::create_dir_all(&media_root)
            .with_context(|| format!("creating media root {}", media_root.display()))?;

        let cache_dir = directories::ProjectDirs::from("", ORG, APP)
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| media_root.join(".surf-cache"));
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache dir {}", cache_dir.display()))?;

        Ok(Self {
            media_root,
            cache_dir,
        })
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn db_file_name(&self) -> &'static str {
        DB_FILE_NAME
    }

    pub fn db_path(&self) -> PathBuf {
        self.media_root.join(DB_FILE_NAME)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn db_path_lives_under_media_root() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            port: 1,
            max_cache: 1,
            media_root: dir.path().to_path_buf(),
        };
        // Can't use init() here because of the process-wide OnceCell; exercise
        // the constructor directly like the teacher's own paths test does.
        let paths = Paths::new(&settings).unwrap();
        assert_eq!(paths.db_path(), dir.path().join("surf.db"));
        assert!(paths.cache_dir().exists());
    }
}
