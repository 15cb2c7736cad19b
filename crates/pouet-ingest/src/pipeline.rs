//! Fetch-then-load pipeline
//!
//! A run fetches every identifier of the configured range in order, then
//! hands the whole [`ResultSet`] to the loader in a single call. Nothing is
//! written when fetching fails.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, ResultSet};
use crate::load::{DestinationLoader, Loader, RowsWritten};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline_name: String,
    pub table: String,
    pub records: usize,
    pub rows_written: RowsWritten,
    pub elapsed: Duration,
}

pub struct Pipeline<L: Loader> {
    config: PipelineConfig,
    fetcher: Fetcher,
    loader: L,
}

impl Pipeline<DestinationLoader> {
    /// Pipeline writing into the destination named by `config`
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let loader = DestinationLoader::open(&config)?;
        Self::new(config, loader)
    }
}

impl<L: Loader> Pipeline<L> {
    pub fn new(config: PipelineConfig, loader: L) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::from_config(&config)?;

        Ok(Self {
            config,
            fetcher,
            loader,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Fetch the configured range without loading it
    pub async fn fetch(&self) -> Result<ResultSet> {
        Ok(self.fetcher.fetch_range(self.config.id_range).await?)
    }

    /// Fetch the configured range, then load it in one call
    #[instrument(skip(self), fields(pipeline = %self.config.pipeline_name))]
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        info!(
            range = %self.config.id_range,
            destination = %self.config.destination,
            table = %self.config.table,
            "Starting pipeline run"
        );

        let results = self.fetch().await?;
        for record in &results {
            info!(record = %record, "Fetched record");
        }

        let rows_written = self.loader.load(results.as_slice(), &self.config.table)?;

        let summary = RunSummary {
            pipeline_name: self.config.pipeline_name.clone(),
            table: self.config.table.clone(),
            records: results.len(),
            rows_written,
            elapsed: started.elapsed(),
        };
        info!(
            records = summary.records,
            rows = %summary.rows_written,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Pipeline run finished"
        );

        Ok(summary)
    }
}
