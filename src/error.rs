//! Error kinds shared across the catalog, scanner, transcoder, and HTTP layers.

use thiserror::Error;

/// A single error type for everything the HTTP layer needs to turn into a response.
///
/// Lower-level failures (`rusqlite::Error`, `std::io::Error`, tag-reading errors) are
/// wrapped in `anyhow::Error` at their call sites and only mapped into one of these
/// variants at the point a handler needs to decide a status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("range not satisfiable")]
    RangeNotSatisfiable { total_len: u64 },

    #[error("not implemented")]
    Unimplemented,

    #[error("catalog error: {0}")]
    Catalog(#[from] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadInput(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::MethodNotAllowed => 405,
            AppError::RangeNotSatisfiable { .. } => 416,
            AppError::Unimplemented => 501,
            AppError::Catalog(_) => 500,
            AppError::Io(_) => 500,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            AppError::NotFound(_) => "Not Found".to_string(),
            AppError::MethodNotAllowed => "Method Not Allowed".to_string(),
            other => other.to_string(),
        }
    }
}

/// An error kind produced by the tag extractor for a single file. The scanner
/// logs these and skips the file rather than propagating them.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("no audio stream found")]
    NoAudioStream,

    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("artist/uuid count mismatch ({names} names vs {uuids} uuids)")]
    ArtistCountMismatch { names: usize, uuids: usize },

    #[error("failed to read tags: {0}")]
    ReadFailed(#[from] anyhow::Error),
}

/// An error kind produced by the transcode pipeline.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg is not available")]
    FfmpegUnavailable,

    #[error("ffmpeg process failed: {0}")]
    ProcessFailed(String),

    #[error("io error during transcode: {0}")]
    Io(#[from] std::io::Error),
}
