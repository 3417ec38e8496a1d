use std::path::PathBuf;

use thiserror::Error;

/// Library error type for pointer-frame startup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured refresh rate or pointer filename is unusable.
    #[error("invalid configuration: {0}")]
    BadConfig(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

/// Failure to turn a resolved image path into a displayable bitmap.
///
/// Always recovered by the refresh step (no-image state plus diagnostic
/// label); never escalated to the process.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}
