//! Loading a batch of records into a destination
//!
//! [`Loader`] is the seam between the pipeline and storage. The pipeline
//! calls it once per run with every fetched record.

use crate::config::PipelineConfig;
use crate::destination::{self, Destination, LoadRecord, LOAD_STATUS_COMPLETED};
use crate::error::LoadError;
use crate::fetch::Record;
use crate::normalize::Normalizer;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

/// Number of rows written to the root table by one load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RowsWritten(pub u64);

impl std::fmt::Display for RowsWritten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Loader {
    /// Store `records` in `table`, all or nothing
    fn load(&mut self, records: &[Record], table: &str) -> Result<RowsWritten, LoadError>;
}

/// Outcome of a load into a destination
#[derive(Debug, Clone, Serialize)]
pub struct LoadInfo {
    pub load_id: String,
    pub dataset: String,
    pub table: String,
    pub root_rows: u64,
    /// Rows per table, root first
    pub rows_per_table: Vec<(String, u64)>,
}

/// Loader writing into an embedded database
pub struct DestinationLoader {
    pipeline_name: String,
    destination: Box<dyn Destination>,
    max_table_nesting: Option<usize>,
}

impl DestinationLoader {
    pub fn new(pipeline_name: impl Into<String>, destination: Box<dyn Destination>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            destination,
            max_table_nesting: None,
        }
    }

    /// Open the destination named by `config`
    pub fn open(config: &PipelineConfig) -> Result<Self, LoadError> {
        let destination = destination::open(config)?;
        Ok(Self::new(config.pipeline_name.clone(), destination)
            .with_max_table_nesting(config.max_table_nesting))
    }

    pub fn with_max_table_nesting(mut self, depth: Option<usize>) -> Self {
        self.max_table_nesting = depth;
        self
    }

    pub fn destination(&self) -> &dyn Destination {
        self.destination.as_ref()
    }

    /// Normalize and write `records`, returning details about the load
    #[instrument(skip(self, records), fields(pipeline = %self.pipeline_name, records = records.len()))]
    pub fn load_with_info(&mut self, records: &[Record], table: &str) -> Result<LoadInfo, LoadError> {
        let load_id = new_load_id();
        let base = self.destination.schema()?;

        let package = Normalizer::new(base)
            .with_max_table_nesting(self.max_table_nesting)
            .normalize(records, table, &load_id)?;

        let record = LoadRecord {
            load_id: load_id.clone(),
            pipeline_name: self.pipeline_name.clone(),
            table_name: package.root_table.clone(),
            status: LOAD_STATUS_COMPLETED,
            row_count: package.root_rows(),
            inserted_at: Utc::now().to_rfc3339(),
        };
        self.destination.write(&package, &record)?;

        let info = LoadInfo {
            load_id,
            dataset: self.destination.dataset().to_string(),
            table: package.root_table.clone(),
            root_rows: package.root_rows(),
            rows_per_table: package.row_counts(),
        };

        info!(
            load_id = %info.load_id,
            destination = %self.destination.kind(),
            dataset = %info.dataset,
            table = %info.table,
            rows = info.root_rows,
            "Load completed"
        );

        Ok(info)
    }
}

impl Loader for DestinationLoader {
    fn load(&mut self, records: &[Record], table: &str) -> Result<RowsWritten, LoadError> {
        self.load_with_info(records, table)
            .map(|info| RowsWritten(info.root_rows))
    }
}

/// Load identifier: unix seconds with a microsecond fraction
fn new_load_id() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IN_MEMORY;
    use crate::destination::DestinationKind;
    use serde_json::json;

    fn memory_loader() -> DestinationLoader {
        let config = PipelineConfig::new()
            .with_destination(DestinationKind::Sqlite)
            .with_data_dir(IN_MEMORY);
        DestinationLoader::open(&config).unwrap()
    }

    #[test]
    fn test_load_id_format() {
        let id = new_load_id();
        let (secs, micros) = id.split_once('.').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 0);
        assert_eq!(micros.len(), 6);
    }

    #[test]
    fn test_load_reports_root_rows() {
        let mut loader = memory_loader();
        let records = vec![
            json!({"id": 1, "platforms": ["MS-Dos", "Amiga"]}),
            json!({"id": 2, "platforms": []}),
        ];

        let info = loader.load_with_info(&records, "pouet_prod").unwrap();
        assert_eq!(info.root_rows, 2);
        assert_eq!(info.dataset, "main");
        assert_eq!(
            info.rows_per_table,
            vec![
                ("pouet_prod".to_string(), 2),
                ("pouet_prod__platforms".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_empty_load_touches_no_user_table() {
        let mut loader = memory_loader();
        assert_eq!(loader.load(&[], "pouet_prod").unwrap(), RowsWritten(0));
        assert!(loader.destination().schema().unwrap().tables().is_empty());
    }

    #[test]
    fn test_schema_evolves_between_loads() {
        let mut loader = memory_loader();
        loader.load(&[json!({"id": 1})], "pouet_prod").unwrap();
        loader
            .load(&[json!({"id": 2, "name": "fr-08"})], "pouet_prod")
            .unwrap();

        let schema = loader.destination().schema().unwrap();
        let table = schema.table("pouet_prod").unwrap();
        assert!(table.column("id").is_some());
        assert!(table.column("name").is_some());
    }
}
