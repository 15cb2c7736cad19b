//! Pouet Ingest Library
//!
//! Fetches demoscene production records from the pouet.net API and loads
//! them into an embedded analytical database.
//!
//! # Stages
//!
//! - **Fetch**: one GET per identifier, in ascending order, into a [`ResultSet`]
//! - **Normalize**: JSON records become rows of a root table and child tables
//! - **Load**: rows are written in one transaction, with a `_loads` entry
//!
//! # Example
//!
//! ```no_run
//! use pouet_ingest::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut pipeline = Pipeline::from_config(PipelineConfig::new())?;
//!     let summary = pipeline.run().await?;
//!     println!("{} rows written", summary.rows_written);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod destination;
pub mod error;
pub mod fetch;
pub mod load;
pub mod normalize;
pub mod pipeline;

pub use config::{IdRange, PipelineConfig};
pub use destination::{Destination, DestinationKind};
pub use error::{FetchError, IngestError, LoadError, Result};
pub use fetch::{Fetcher, Record, ResultSet};
pub use load::{DestinationLoader, LoadInfo, Loader, RowsWritten};
pub use pipeline::{Pipeline, RunSummary};
