use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure while obtaining detections or embeddings from a detection engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load image {path}: {message}")]
    ImageLoad { path: PathBuf, message: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("folder does not exist: {0}")]
    FolderNotFound(PathBuf),

    #[error("missing files in folder {folder}: {}", missing.join(", "))]
    MissingImages { folder: PathBuf, missing: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Folder the error refers to, if any
    pub fn folder(&self) -> Option<&Path> {
        match self {
            ScanError::FolderNotFound(folder) | ScanError::MissingImages { folder, .. } => Some(folder.as_path()),
            ScanError::Io(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("distance threshold must be a positive number of pixels, got {0}")]
    InvalidDistanceThreshold(f32),

    #[error("similarity threshold must be within [-1, 1], got {0}")]
    InvalidSimilarityThreshold(f32),

    #[error("keyword for {0} must not be empty")]
    EmptyKeyword(&'static str),
}

#[derive(Debug, Error)]
pub enum PixelDumpError {
    #[error("couldn't find pixel block")]
    BlockNotFound,

    #[error("pixel block has an odd number of hex digits ({0})")]
    OddHexLength(usize),

    #[error("mismatched image size: got {got} bytes, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
}
