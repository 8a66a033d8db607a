use std::path::PathBuf;
use thiserror::Error;

/// Failure embedding a single image. `Decode` covers unreadable or corrupt
/// image files, `Provider` covers the embedding backend itself (including a
/// produced vector whose length disagrees with the reported dimensionality).
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("embedding provider failure: {0}")]
    Provider(String),
}

/// Failure reading or writing a persisted index snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no index snapshot found in {0}")]
    NotFound(PathBuf),
    #[error("index snapshot is corrupt: {0}")]
    Corrupt(String),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure answering a similarity query.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no search index available: {0}")]
    IndexUnavailable(#[source] StoreError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}
