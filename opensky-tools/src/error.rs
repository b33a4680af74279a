//! Run-level errors of the batch tools.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Precondition(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("avro: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("{}: record {index}: {reason}", path.display())]
    Record {
        path: PathBuf,
        index: u64,
        reason: String,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("config: {0}")]
    Config(#[from] opensky_core::OpenskyError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    /// Failures detected before any record is processed.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ToolError::Precondition(_) | ToolError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
