use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Invalid page URL")]
    InvalidInput,

    #[error("Page unavailable: {0}")]
    Api(String),
}

/// Why a single image did not make it to disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("image failed to load: {0}")]
    Load(String),

    #[error("image load timed out after {0:?}")]
    LoadTimeout(Duration),

    #[error("drawing failed: {0}")]
    Draw(String),

    #[error("encoding failed: {0}")]
    Encode(String),
}
