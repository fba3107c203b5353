//! Error types for the scanning core.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for scanning-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors surfaced by the scanning core.
///
/// Soft conditions (detection misses, window-not-found, degenerate search
/// boxes) are never represented here; they flow through `Option` returns and
/// status text instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration detected before the loop starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required template asset could not be found on disk.
    #[error("required template asset missing: {}", .path.display())]
    AssetMissing { path: PathBuf },

    /// A template asset exists but could not be decoded.
    #[error("failed to load template asset {}: {}", .path.display(), .source)]
    AssetLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Screen or window enumeration / capture failed.
    #[error("screen capture failed: {0}")]
    Capture(String),

    /// Pointer injection failed.
    #[error("input injection failed: {0}")]
    Input(String),
}
