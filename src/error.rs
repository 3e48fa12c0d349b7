use thiserror::Error;

/// Errors raised by the ingestion pipeline and its collaborators.
///
/// Per-file errors (`Download`, `Decode`, `Metadata`, `Artifact`) are caught
/// at the file boundary inside the pipeline and downgraded to a warning plus
/// a skip. Only `Listing`, `CacheLoad` and `CachePersist` abort a run.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("listing failed: {0}")]
    Listing(String),

    #[error("download failed for {name}: {message}")]
    Download { name: String, message: String },

    #[error("decode failed for {name}: {message}")]
    Decode { name: String, message: String },

    #[error("metadata read failed for {name}: {message}")]
    Metadata { name: String, message: String },

    #[error("artifact generation failed for {name}: {message}")]
    Artifact { name: String, message: String },

    #[error("cache load failed: {0}")]
    CacheLoad(String),

    #[error("cache persist failed: {0}")]
    CachePersist(String),
}

pub type Result<T> = std::result::Result<T, MapError>;
