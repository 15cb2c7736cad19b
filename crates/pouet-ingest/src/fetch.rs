//! Fetching production records from the catalog API
//!
//! One GET per identifier, strictly in ascending order, one request in
//! flight at a time. The first failure aborts the whole range.

use crate::config::{IdRange, PipelineConfig, ID_PLACEHOLDER};
use crate::error::FetchError;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

/// One JSON value returned by the API, kept as-is
pub type Record = serde_json::Value;

/// Records of one run, in ascending identifier order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// HTTP fetcher for one URL template
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    url_template: String,
}

impl Fetcher {
    /// Create a fetcher; `timeout` of `None` keeps the client default
    pub fn new(url_template: impl Into<String>, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, FetchError> {
        Self::new(config.url_template.clone(), config.http_timeout)
    }

    /// Request URL for `id`
    pub fn request_url(&self, id: u32) -> String {
        self.url_template.replace(ID_PLACEHOLDER, &id.to_string())
    }

    /// Fetch and parse the record for a single identifier
    pub async fn fetch_one(&self, id: u32) -> Result<Record, FetchError> {
        let url = self.request_url(id);
        info!(id, url = %url, "Fetching record");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                id,
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { id, url, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                id,
                url: url.clone(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { id, url, source })
    }

    /// Fetch every identifier of `range`, stopping at the first failure
    #[instrument(skip(self), fields(range = %range))]
    pub async fn fetch_range(&self, range: IdRange) -> Result<ResultSet, FetchError> {
        let mut results = ResultSet::new();

        for id in range.iter() {
            let record = self.fetch_one(id).await?;
            results.push(record);
        }

        info!(records = results.len(), "Fetched all records");
        Ok(results)
    }
}
