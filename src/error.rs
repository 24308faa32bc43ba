use thiserror::Error;

/// Failures at the storage boundary. Engine operations themselves never fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot writer has shut down")]
    WriterClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
