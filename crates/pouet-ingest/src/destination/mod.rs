//! Embedded database destinations
//!
//! A destination stores normalized rows inside one dataset. It reads back
//! the current schema so the normalizer can evolve it, then applies a
//! [`LoadPackage`] atomically.

pub mod sql;
pub mod sqlite;

#[cfg(feature = "duckdb")]
pub mod duckdb;

use crate::config::PipelineConfig;
use crate::error::LoadError;
use crate::normalize::{LoadPackage, Schema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Supported destination engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// DuckDB, needs the `duckdb` cargo feature (on by default)
    #[default]
    DuckDb,
    /// SQLite through rusqlite
    Sqlite,
}

impl DestinationKind {
    /// File extension of the database file
    pub fn extension(self) -> &'static str {
        match self {
            DestinationKind::Sqlite => "sqlite",
            DestinationKind::DuckDb => "duckdb",
        }
    }

    /// Whether this build can open the destination
    pub fn is_available(self) -> bool {
        match self {
            DestinationKind::Sqlite => true,
            DestinationKind::DuckDb => cfg!(feature = "duckdb"),
        }
    }

    /// Database file of `pipeline` inside `data_dir`
    pub fn database_path(self, data_dir: &Path, pipeline: &str) -> PathBuf {
        data_dir.join(format!("{}.{}", pipeline, self.extension()))
    }
}

impl std::str::FromStr for DestinationKind {
    type Err = pouet_common::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DestinationKind::Sqlite),
            "duckdb" => Ok(DestinationKind::DuckDb),
            _ => Err(pouet_common::Error::config(format!(
                "Unknown destination '{}', expected sqlite or duckdb",
                s
            ))),
        }
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationKind::Sqlite => write!(f, "sqlite"),
            DestinationKind::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Load status stored in the bookkeeping table
pub const LOAD_STATUS_COMPLETED: i64 = 0;

/// Row appended to the `_loads` table for every load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRecord {
    pub load_id: String,
    pub pipeline_name: String,
    pub table_name: String,
    pub status: i64,
    pub row_count: u64,
    /// RFC 3339 timestamp
    pub inserted_at: String,
}

/// Storage engine receiving normalized rows
pub trait Destination {
    fn kind(&self) -> DestinationKind;

    /// Dataset every table lives in
    fn dataset(&self) -> &str;

    /// Current layout of the user tables of the dataset
    fn schema(&self) -> Result<Schema, LoadError>;

    /// Create missing tables and columns, insert every batch and record the
    /// load, all in one transaction
    fn write(&mut self, package: &LoadPackage, load: &LoadRecord) -> Result<(), LoadError>;
}

/// Open the destination described by `config`
pub fn open(config: &PipelineConfig) -> Result<Box<dyn Destination>, LoadError> {
    let location = if config.in_memory() {
        None
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        Some(config.data_dir.as_path())
    };

    match config.destination {
        DestinationKind::Sqlite => Ok(Box::new(sqlite::SqliteDestination::open(
            location,
            &config.pipeline_name,
            &config.dataset,
        )?)),
        #[cfg(feature = "duckdb")]
        DestinationKind::DuckDb => Ok(Box::new(duckdb::DuckDbDestination::open(
            location,
            &config.pipeline_name,
            &config.dataset,
        )?)),
        #[cfg(not(feature = "duckdb"))]
        DestinationKind::DuckDb => Err(LoadError::UnsupportedDestination(
            config.destination.to_string(),
        )),
    }
}
