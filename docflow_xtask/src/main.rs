use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use docflow_store::{
    DocflowStore, Document, DocumentQueueApi, Record, RunOutcome, load_config, now_utc,
};
use docflow_worker::{ApplyMode, LogHandle, LogSettings, Worker, WorkerSettings};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

mod seed;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logs = LogHandle::init(LogSettings {
        file: None,
        ..LogSettings::from_env()?
    })?;
    let result = match cli.command {
        Command::Migrate => migrate(cli.config).await,
        Command::Seed(args) => seed_demo_data(cli.config, args).await,
        Command::Status(args) => show_status(cli.config, args).await,
        Command::Run(args) => run_once(cli.config, args).await,
    };
    logs.shutdown();
    result
}

#[derive(Parser)]
#[command(author, version, about = "Developer utilities for the docflow workspace")]
struct Cli {
    /// JSON config file; defaults to the DB_* environment variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the documents and data tables.
    Migrate,
    /// Fill the tables with random demo records and documents.
    Seed(SeedArgs),
    /// Print pending, claimed, and processed document counts.
    Status(StatusArgs),
    /// Process one document, like a scheduled worker run.
    Run(RunArgs),
}

#[derive(Parser)]
struct SeedArgs {
    /// Seed even when the tables already hold rows.
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Store payloads as JSON-encoded strings.
    #[arg(long, default_value_t = false)]
    encode_payload: bool,
    /// Fixed RNG seed for reproducible data.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct StatusArgs {
    /// Restrict counts to one document type.
    #[arg(long)]
    document_type: Option<String>,
}

#[derive(Parser)]
struct RunArgs {
    /// Override DOCFLOW_DOCUMENT_TYPE; pass an empty string for any type.
    #[arg(long)]
    document_type: Option<String>,
    /// Override DOCFLOW_APPLY_MODE (atomic or per_field).
    #[arg(long)]
    apply_mode: Option<ApplyMode>,
}

async fn connect(config: Option<PathBuf>) -> Result<DocflowStore> {
    let config = load_config(config.as_deref()).context("load config")?;
    DocflowStore::connect(&config)
        .await
        .with_context(|| format!("connect to {} database", config.backend_name()))
}

async fn migrate(config: Option<PathBuf>) -> Result<()> {
    connect(config).await?;
    println!("Migrations applied");
    Ok(())
}

async fn seed_demo_data(config: Option<PathBuf>, args: SeedArgs) -> Result<()> {
    let store = connect(config).await?;
    let existing =
        store.query::<Record>().count().await? + store.query::<Document>().count().await?;
    if existing > 0 && !args.force {
        return Err(anyhow!(
            "tables already hold {existing} rows; rerun with --force to add more"
        ));
    }
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let data = seed::generate(
        &mut rng,
        now_utc(),
        seed::SeedOptions {
            encode_payload: args.encode_payload,
        },
    );
    let records = store.insert_many(&data.records).await?;
    let documents = store.insert_many(&data.documents).await?;
    info!("xtask: seeded {records} records and {documents} documents");
    println!("Seeded {records} records and {documents} documents");
    Ok(())
}

async fn show_status(config: Option<PathBuf>, args: StatusArgs) -> Result<()> {
    let store = connect(config).await?;
    let stats = store
        .queue_stats(args.document_type.as_deref(), now_utc())
        .await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_once(config: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let mut settings = WorkerSettings::from_env()?;
    if let Some(document_type) = args.document_type {
        settings.document_type = (!document_type.is_empty()).then_some(document_type);
    }
    if let Some(apply_mode) = args.apply_mode {
        settings.apply_mode = apply_mode;
    }
    let store = connect(config).await?;
    let outcome = Worker::new(store, settings).process_document().await;
    println!("Document processing result: {}", outcome.succeeded());
    match outcome {
        RunOutcome::Idle => {
            println!("No pending documents");
            Ok(())
        }
        RunOutcome::Completed(outcome) if outcome.succeeded() => Ok(()),
        RunOutcome::Completed(outcome) => {
            Err(anyhow!("document {} was not applied", outcome.doc_id()))
        }
        RunOutcome::Failed(err) => Err(err.into()),
    }
}
