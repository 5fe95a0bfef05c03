//! organogram-etl - command-line entry point
//!
//! `validate` runs a prepared batch file (spreadsheet rows or linked-data
//! items) through the pipeline. `fetch` pulls one body's posts from the
//! linked-data API and runs them, repairing eliminated bosses on the way.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use organogram_common::config::{ConfigResolver, LoggingConfig, TomlConfig};
use organogram_common::{DataSource, Period};
use organogram_etl::linked_data::{fetch_all_items, BodyUri, LinkedDataClient, LinkedDataPostSource};
use organogram_etl::normalizer::NormalizeContext;
use organogram_etl::registry::StaticRegistry;
use organogram_etl::types::RawRecord;
use organogram_etl::{OrganogramBatch, OrganogramOutput, Pipeline};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for organogram-etl
#[derive(Parser, Debug)]
#[command(name = "organogram-etl")]
#[command(about = "Validate and reconcile government organogram data")]
#[command(version)]
struct Args {
    /// Config file (overrides ORGANOGRAM_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON file mapping organisation names or URIs to department titles
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Write the output JSON here instead of stdout
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a batch file
    Validate {
        /// Batch JSON (organisation, period, source, records)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Fetch a body's posts from the linked-data API and validate them
    Fetch {
        /// e.g. http://reference.data.gov.uk/id/department/co
        #[arg(long)]
        body_uri: String,

        /// Period, e.g. 2011-09-30
        #[arg(long)]
        period: String,

        /// Organisation name stamped on every post
        #[arg(long)]
        organisation: String,

        #[arg(long, default_value = "")]
        parent_department: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = ConfigResolver::new(args.config.clone())
        .resolve()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!("Starting organogram-etl {}", env!("CARGO_PKG_VERSION"));

    let registry = match &args.registry {
        Some(path) => Some(StaticRegistry::load(path).context("Failed to load department registry")?),
        None => None,
    };
    let mut pipeline = Pipeline::new(&config);
    if let Some(registry) = &registry {
        pipeline = pipeline.with_registry(registry);
    }

    let output = match &args.command {
        Command::Validate { input } => {
            let content = std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let batch: OrganogramBatch =
                serde_json::from_str(&content).with_context(|| format!("Invalid batch file {}", input.display()))?;
            pipeline.run(&batch, None).await?
        }
        Command::Fetch {
            body_uri,
            period,
            organisation,
            parent_department,
        } => {
            let body = BodyUri::parse(body_uri)?;
            let period = Period::parse(period)?;
            let client = LinkedDataClient::new(&config.linked_data)?;

            let items = fetch_all_items(&client, &body, period, config.linked_data.fetch_attempts).await?;
            let batch = OrganogramBatch {
                organisation: organisation.clone(),
                parent_department: parent_department.clone(),
                period,
                source: DataSource::LinkedData,
                records: items.into_iter().map(RawRecord::LinkedItem).collect(),
            };
            let details = LinkedDataPostSource::new(
                &client,
                body,
                period,
                NormalizeContext {
                    organisation: organisation.clone(),
                    parent_department: parent_department.clone(),
                    source: DataSource::LinkedData,
                },
            );
            pipeline.run(&batch, Some(&details)).await?
        }
    };

    write_output(&output, args.out.as_deref())?;

    let report = &output.report;
    info!(
        name = %output.name,
        senior = output.senior.len(),
        junior = output.junior.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        will_display = report.will_display,
        "Done"
    );
    if let Some(fatal) = &report.fatal {
        warn!("{}", fatal);
        return Ok(ExitCode::from(2));
    }
    Ok(if report.will_display {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// RUST_LOG wins over the configured level. Logs go to stderr, or to the
/// configured file.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let (stderr_layer, file_layer) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn write_output(output: &OrganogramOutput, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
