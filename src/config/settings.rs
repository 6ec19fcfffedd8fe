//! Resolves listen port, cache size, and media root from environment, an ini
//! file, and platform defaults, in that precedence order (env wins).

use anyhow::{Context, Result};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 27440;
const DEFAULT_MAX_CACHE: usize = 64;
const ORG: &str = "surf";
const APP: &str = "surf";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub max_cache: usize,
    pub media_root: PathBuf,
}

impl Settings {
    /// Resolve settings using (in increasing priority) platform defaults, the
    /// ini file at `<config-home>/<org>/<app>/config.ini` (or `cli_config_path`,
    /// if given), then environment variables `SURF_PORT`, `SURF_MAX_CACHE`,
    /// `SURF_MEDIA`, then CLI flags.
    pub fn resolve(
        cli_port: Option<u16>,
        cli_media: Option<PathBuf>,
        cli_cache_size: Option<usize>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut port = DEFAULT_PORT;
        let mut max_cache = DEFAULT_MAX_CACHE;
        let mut media_root = default_music_dir();

        let ini_path = cli_config_path.or_else(config_ini_path);
        if let Some(ini_path) = ini_path {
            if ini_path.exists() {
                apply_ini(&ini_path, &mut port, &mut max_cache, &mut media_root)
                    .with_context(|| format!("reading ini file {}", ini_path.display()))?;
            }
        }

        if let Ok(val) = std::env::var("SURF_PORT") {
            port = val.parse().with_context(|| format!("SURF_PORT={val}"))?;
        }
        if let Ok(val) = std::env::var("SURF_MAX_CACHE") {
            max_cache = val
                .parse()
                .with_context(|| format!("SURF_MAX_CACHE={val}"))?;
        }
        if let Ok(val) = std::env::var("SURF_MEDIA") {
            media_root = PathBuf::from(val);
        }

        // CLI flags win over everything, matching how the teacher's `Args`
        // override config-file-derived defaults.
        if let Some(p) = cli_port {
            port = p;
        }
        if let Some(c) = cli_cache_size {
            max_cache = c;
        }
        if let Some(m) = cli_media {
            media_root = m;
        }

        Ok(Self {
            port,
            max_cache,
            media_root,
        })
    }
}

fn default_music_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.audio_dir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_ini_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", ORG, APP)
        .map(|dirs| dirs.config_dir().join("config.ini"))
}

fn apply_ini(
    path: &std::path::Path,
    port: &mut u16,
    max_cache: &mut usize,
    media_root: &mut PathBuf,
) -> Result<()> {
    use config::{Config, File, FileFormat};

    let parsed = Config::builder()
        .add_source(File::new(path.to_str().unwrap_or_default(), FileFormat::Ini))
        .build()?;

    if let Ok(p) = parsed.get_int("net.port") {
        *port = p as u16;
    }
    if let Ok(p) = parsed.get_string("media.path") {
        *media_root = PathBuf::from(p);
    }
    if let Ok(c) = parsed.get_int("media.cache_size") {
        *max_cache = c as usize;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("SURF_PORT", "9999");
        let settings = Settings::resolve(None, None, None, None).unwrap();
        assert_eq!(settings.port, 9999);
        std::env::remove_var("SURF_PORT");
    }

    #[test]
    fn cli_overrides_env() {
        std::env::set_var("SURF_PORT", "9999");
        let settings = Settings::resolve(Some(1234), None, None, None).unwrap();
        assert_eq!(settings.port, 1234);
        std::env::remove_var("SURF_PORT");
    }
}
