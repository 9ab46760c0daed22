//! Error types for RonyBase.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collection '{collection}' is not a valid JSON array of records: {source}")]
    Parse {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}
