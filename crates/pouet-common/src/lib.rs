//! Pouet Common Library
//!
//! Shared error handling and logging for the pouet ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the shared [`Error`] type and [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use pouet_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> pouet_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
