//! Pouet Ingest - fetch pouet.net productions into an embedded database

use anyhow::Result;
use clap::{Parser, Subcommand};
use pouet_common::logging::{init_logging, LogConfig, LogLevel};
use pouet_ingest::config::{
    DEFAULT_DATASET, DEFAULT_DATA_DIR, DEFAULT_ID_FROM, DEFAULT_ID_TO, DEFAULT_PIPELINE_NAME,
    DEFAULT_TABLE, DEFAULT_URL_TEMPLATE,
};
use pouet_ingest::{DestinationKind, Fetcher, IdRange, Pipeline, PipelineConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pouet-ingest")]
#[command(author, version, about = "Fetch pouet.net productions and load them into an embedded database")]
struct Cli {
    /// What to do, `run` when omitted
    #[command(subcommand)]
    command: Option<Command>,

    /// Request URL, `{id}` is replaced by each identifier
    #[arg(long, env = "POUET_URL_TEMPLATE", default_value = DEFAULT_URL_TEMPLATE, global = true)]
    url_template: String,

    /// First identifier to fetch
    #[arg(long, env = "POUET_ID_FROM", default_value_t = DEFAULT_ID_FROM, global = true)]
    from: u32,

    /// Last identifier to fetch (inclusive)
    #[arg(long, env = "POUET_ID_TO", default_value_t = DEFAULT_ID_TO, global = true)]
    to: u32,

    /// Pipeline name, also names the database file
    #[arg(long, env = "POUET_PIPELINE_NAME", default_value = DEFAULT_PIPELINE_NAME, global = true)]
    pipeline_name: String,

    /// Destination engine (duckdb, sqlite)
    #[arg(long, env = "POUET_DESTINATION", default_value = "duckdb", global = true)]
    destination: DestinationKind,

    /// Dataset inside the destination
    #[arg(long, env = "POUET_DATASET", default_value = DEFAULT_DATASET, global = true)]
    dataset: String,

    /// Table receiving the records
    #[arg(long, env = "POUET_TABLE", default_value = DEFAULT_TABLE, global = true)]
    table: String,

    /// Directory for database files, `:memory:` for an in-memory database
    #[arg(long, env = "POUET_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    data_dir: PathBuf,

    /// Arrays nested deeper than this are stored as JSON text
    #[arg(long, env = "POUET_MAX_TABLE_NESTING", global = true)]
    max_table_nesting: Option<usize>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "POUET_HTTP_TIMEOUT_SECS", global = true)]
    http_timeout_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Fetch every record, then load them into the destination
    Run,

    /// Fetch every record and print one JSON line per record
    Fetch,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_url_template(self.url_template.clone())
            .with_id_range(IdRange::new(self.from, self.to))
            .with_pipeline_name(self.pipeline_name.clone())
            .with_destination(self.destination)
            .with_dataset(self.dataset.clone())
            .with_table(self.table.clone())
            .with_data_dir(self.data_dir.clone())
            .with_max_table_nesting(self.max_table_nesting)
            .with_http_timeout(self.http_timeout_secs.map(Duration::from_secs))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from `.env` feed the `POUET_*` and `LOG_*` lookups below
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pouet-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let command = cli.command.unwrap_or(Command::Run);
    if let Err(e) = execute(command, cli.pipeline_config()).await {
        error!(error = %e, "Ingestion failed");
        return Err(e);
    }

    Ok(())
}

async fn execute(command: Command, config: PipelineConfig) -> Result<()> {
    match command {
        Command::Run => {
            let mut pipeline = Pipeline::from_config(config)?;
            let summary = pipeline.run().await?;
            info!(
                records = summary.records,
                rows = %summary.rows_written,
                table = %summary.table,
                "Ingestion complete"
            );
        },
        Command::Fetch => {
            config.validate()?;
            let fetcher = Fetcher::from_config(&config)?;
            let results = fetcher.fetch_range(config.id_range).await?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for record in &results {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            }
            out.flush()?;
        },
    }

    Ok(())
}
