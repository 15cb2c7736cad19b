//! Error types for pouet ingestion
//!
//! Every failure is fatal to a run: nothing here is retried or recovered,
//! errors only carry enough context to tell the operator what broke.

use crate::normalize::ColumnType;
use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure while fetching records from the catalog API
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// DNS, connect, timeout or body read failure
    #[error("Request for id {id} failed ({url}): {source}")]
    Transport {
        id: u32,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a status outside 2xx
    #[error("Request for id {id} returned {status} ({url})")]
    Status {
        id: u32,
        url: String,
        status: StatusCode,
    },

    /// The body could not be parsed as JSON
    #[error("Response for id {id} is not valid JSON ({url}): {source}")]
    Decode {
        id: u32,
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Identifier whose request failed, if any
    pub fn id(&self) -> Option<u32> {
        match self {
            FetchError::Client(_) => None,
            FetchError::Transport { id, .. }
            | FetchError::Status { id, .. }
            | FetchError::Decode { id, .. } => Some(*id),
        }
    }
}

/// Failure while normalizing or writing records into a destination
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "duckdb")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The destination kind is unknown or was not compiled in
    #[error("Unsupported destination '{0}'")]
    UnsupportedDestination(String),

    /// A table or dataset name is empty or reserved
    #[error("Invalid identifier '{0}': names must be non-empty and must not start with '_'")]
    InvalidIdentifier(String),

    /// A value cannot be stored in the column chosen for it
    #[error("Schema conflict in {table}.{column}: column is {expected}, value is {found}")]
    SchemaConflict {
        table: String,
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
}

/// Top-level error for a pipeline run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] pouet_common::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),
}
