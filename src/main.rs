mod cache;
mod catalog;
mod config;
mod error;
mod http;
mod models;
mod scanner;
mod tagger;
mod transcode;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Paths, Settings};

/// A self-hosted personal music server.
#[derive(Parser, Debug)]
#[command(name = "surf", version, about)]
struct Args {
    /// TCP port to listen on. Overrides config file and environment.
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory to scan for media. Overrides config file and environment.
    #[arg(short, long)]
    media: Option<PathBuf>,

    /// Maximum number of transcoded files to keep cached on disk.
    #[arg(long)]
    cache_size: Option<usize>,

    /// Path to an ini config file, overriding the platform-conventional location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Skip the startup scan and serve whatever is already in the catalog.
    #[arg(long, default_value_t = false)]
    no_scan: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .compact()
        .init();

    ignore_sigpipe();

    let settings = Settings::resolve(args.port, args.media.clone(), args.cache_size, args.config.clone())
        .context("resolving configuration")?;
    let paths = Paths::init(&settings).context("initializing paths")?;

    let latest_mod_time = if args.no_scan {
        tracing::info!("skipping startup scan (--no-scan)");
        0
    } else {
        run_startup_scan(&paths)?
    };

    let state = Arc::new(http::AppState::new(
        Arc::clone(&paths),
        settings.max_cache,
        latest_mod_time,
    ));

    http::run(settings.port, state).context("running http server")
}

fn run_startup_scan(paths: &Arc<Paths>) -> Result<i64> {
    tracing::info!(media_root = %paths.media_root().display(), "starting scan");
    scanner::scan_media_root(paths.media_root(), &paths.db_path())
        .context("scanning media root")
}

#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {}
