//! Pipeline configuration
//!
//! The API URL, identifier range, destination, dataset and table live in
//! [`PipelineConfig`] and are handed to the fetcher and loader at
//! construction time.

use crate::destination::DestinationKind;
use crate::normalize::naming;
use pouet_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Placeholder substituted with the identifier in the URL template.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Default request template for the pouet.net production endpoint.
pub const DEFAULT_URL_TEMPLATE: &str = "https://api.pouet.net/v1/prod/?id={id}";

/// Default pipeline name, also used to name the database file.
pub const DEFAULT_PIPELINE_NAME: &str = "pouet_prod";

/// Default dataset inside the destination.
pub const DEFAULT_DATASET: &str = "main";

/// Default destination table.
pub const DEFAULT_TABLE: &str = "pouet_prod";

/// First identifier fetched by default.
pub const DEFAULT_ID_FROM: u32 = 1;

/// Last identifier fetched by default (inclusive).
pub const DEFAULT_ID_TO: u32 = 100;

/// Directory holding the database files by default.
pub const DEFAULT_DATA_DIR: &str = ".";

/// `data_dir` value selecting an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Inclusive range of identifiers; `start > end` is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: u32,
    pub end: u32,
}

impl IdRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Range holding exactly one identifier
    pub fn single(id: u32) -> Self {
        Self { start: id, end: id }
    }

    /// Identifiers in ascending order
    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl Default for IdRange {
    fn default() -> Self {
        Self::new(DEFAULT_ID_FROM, DEFAULT_ID_TO)
    }
}

impl std::fmt::Display for IdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Configuration of one fetch-and-load pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, namespaces the database file and the load bookkeeping
    pub pipeline_name: String,

    /// Request URL with one `{id}` placeholder
    pub url_template: String,

    /// Identifiers to fetch
    pub id_range: IdRange,

    /// Destination engine
    pub destination: DestinationKind,

    /// Dataset (schema) inside the destination
    pub dataset: String,

    /// Table receiving the records
    pub table: String,

    /// Directory holding database files, or `:memory:`
    pub data_dir: PathBuf,

    /// Maximum depth of child tables; deeper arrays are stored as JSON text
    #[serde(default)]
    pub max_table_nesting: Option<usize>,

    /// HTTP request timeout, client default (none) when unset
    #[serde(default)]
    pub http_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: DEFAULT_PIPELINE_NAME.to_string(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            id_range: IdRange::default(),
            destination: DestinationKind::default(),
            dataset: DEFAULT_DATASET.to_string(),
            table: DEFAULT_TABLE.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_table_nesting: None,
            http_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = name.into();
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn with_id_range(mut self, range: IdRange) -> Self {
        self.id_range = range;
        self
    }

    pub fn with_destination(mut self, destination: DestinationKind) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_max_table_nesting(mut self, depth: Option<usize>) -> Self {
        self.max_table_nesting = depth;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Whether the destination lives in memory instead of on disk
    pub fn in_memory(&self) -> bool {
        self.data_dir.as_os_str() == IN_MEMORY
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let placeholders = self.url_template.matches(ID_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(Error::config(format!(
                "URL template must contain exactly one {} placeholder, found {} in '{}'",
                ID_PLACEHOLDER, placeholders, self.url_template
            )));
        }

        if self.id_range.start == 0 {
            return Err(Error::config("Identifiers start at 1, got a range starting at 0"));
        }

        if self.pipeline_name.trim().is_empty() {
            return Err(Error::config("Pipeline name cannot be empty"));
        }

        for (what, name) in [("Dataset", &self.dataset), ("Table", &self.table)] {
            if name.trim().is_empty() {
                return Err(Error::config(format!("{} name cannot be empty", what)));
            }
            if naming::is_reserved(&naming::normalize_identifier(name)) {
                return Err(Error::config(format!(
                    "{} name '{}' is reserved: names starting with '_' hold load bookkeeping",
                    what, name
                )));
            }
        }

        if !self.destination.is_available() {
            return Err(Error::config(format!(
                "Destination '{}' is not compiled into this build",
                self.destination
            )));
        }

        Ok(())
    }
}
