//! Drug label importer CLI
//!
//! Imports FDA drug labels into SQLite with AI therapeutic classification,
//! and manages the classification cache.
//!
//! Usage:
//!   label-importer import -j Labels.json -s drug_label_schema.yaml
//!   label-importer import -j Labels.json --dry-run
//!   label-importer warm -j Labels.json
//!   label-importer cache stats
//!   label-importer cache clear --older-than-hours 48

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use completion_client::CompletionClient;
use drug_classification::{CacheManager, DrugClassifier, DrugDocument, SqliteCacheStore};
use label_ingest::{
    read_documents, FdaLabelSearch, Importer, MemoryDocumentStore, SchemaValidator,
    SqliteDocumentStore,
};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "label-importer")]
#[command(about = "Import FDA drug labels with AI therapeutic classification")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import labels from a JSON file
    Import {
        /// JSON file with a label or an array of labels
        #[arg(short = 'j', long, default_value = "Labels.json")]
        json_file: PathBuf,

        /// YAML or JSON schema to validate labels against
        #[arg(short = 's', long)]
        schema_file: Option<PathBuf>,

        /// Skip AI classification
        #[arg(long)]
        disable_ai: bool,

        /// Leave image URLs unchanged (no openFDA lookups)
        #[arg(long)]
        skip_images: bool,

        /// Validate only, write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Pre-populate the classification cache
    Warm {
        #[arg(short = 'j', long, default_value = "Labels.json")]
        json_file: PathBuf,
    },

    /// Inspect or clean the classification cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache metrics
    Stats,

    /// Remove expired entries
    Purge,

    /// Remove all entries, or only old ones
    Clear {
        #[arg(long)]
        older_than_hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::from_env();

    match cli.command {
        Commands::Import {
            json_file,
            schema_file,
            disable_ai,
            skip_images,
            dry_run,
        } => {
            let options = ImportOptions {
                schema_file,
                disable_ai,
                skip_images,
                dry_run,
            };
            run_import(&config, &json_file, options, cli.json).await
        }
        Commands::Warm { json_file } => run_warm(&config, &json_file, cli.json).await,
        Commands::Cache { action } => run_cache(&config, action, cli.json).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "debug,sqlx=warn,hyper=info,reqwest=info"
    } else {
        "info,label_ingest=debug,drug_classification=debug,sqlx=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

struct ImportOptions {
    schema_file: Option<PathBuf>,
    disable_ai: bool,
    skip_images: bool,
    dry_run: bool,
}

async fn connect(database_url: &str) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", database_url))
}

async fn classifier(
    config: &AppConfig,
    pool: &SqlitePool,
) -> Result<DrugClassifier<CompletionClient, SqliteCacheStore>> {
    let cache_store = SqliteCacheStore::from_pool(pool.clone())
        .await
        .context("Failed to prepare classification cache")?;
    DrugClassifier::from_config(&config.classification, cache_store)
        .context("Failed to initialize classifier")
}

async fn run_import(
    config: &AppConfig,
    json_file: &Path,
    options: ImportOptions,
    json: bool,
) -> Result<ExitCode> {
    let documents = read_documents(json_file).context("Failed to load labels")?;
    let validator = options
        .schema_file
        .as_deref()
        .map(SchemaValidator::from_file)
        .transpose()
        .context("Failed to load schema")?;

    if options.dry_run {
        let mut importer = Importer::new(MemoryDocumentStore::new());
        if let Some(validator) = validator {
            importer = importer.with_validator(validator);
        }
        let report = importer.dry_run(&documents);
        if json {
            print_json(&report)?;
        } else {
            println!("Dry run: {} valid, {} invalid", report.valid, report.invalid);
            for error in &report.errors {
                println!("  {}", error);
            }
        }
        return Ok(exit_code(report.is_success()));
    }

    let pool = connect(&config.database_url).await?;
    let store = SqliteDocumentStore::from_pool(pool.clone())
        .await
        .context("Failed to prepare document store")?;

    let mut importer = Importer::new(store);
    if let Some(validator) = validator {
        importer = importer.with_validator(validator);
    }
    if !options.skip_images {
        let lookup = FdaLabelSearch::new().context("Failed to build openFDA client")?;
        importer = importer.with_image_lookup(Arc::new(lookup));
    }
    if options.disable_ai {
        info!("AI classification disabled by flag");
    } else {
        importer = importer.with_classifier(Arc::new(classifier(config, &pool).await?));
    }

    info!(file = %json_file.display(), count = documents.len(), "Starting import");
    let summary = importer.process(documents).await;

    if json {
        print_json(&summary)?;
    } else {
        println!("Import summary:");
        println!("  Inserted:    {}", summary.inserted);
        println!("  Updated:     {}", summary.updated);
        println!("  Skipped:     {}", summary.skipped);
        println!("  Failed:      {}", summary.failed);
        println!("  AI enhanced: {}", summary.ai_enhanced);
        println!("  AI failed:   {}", summary.ai_failed);
        for error in &summary.errors {
            println!("  {}", error);
        }
    }

    Ok(exit_code(summary.is_success()))
}

async fn run_warm(config: &AppConfig, json_file: &Path, json: bool) -> Result<ExitCode> {
    if !config.classification.enabled {
        bail!("AI classification is disabled; set OPENPIPE_API_KEY to warm the cache");
    }

    let documents: Vec<DrugDocument> = read_documents(json_file)
        .context("Failed to load labels")?
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match DrugDocument::from_value(value) {
            Ok(document) => Some(document),
            Err(_) => {
                warn!(document = index + 1, "Skipping non-object label");
                None
            }
        })
        .collect();

    let pool = connect(&config.database_url).await?;
    let classifier = classifier(config, &pool).await?;
    let report = classifier.warm(&documents).await;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Cache warming: {} total, {} already cached, {} newly cached, {} failed ({:.1}s)",
            report.total,
            report.already_cached,
            report.newly_cached,
            report.failed,
            report.processing_time
        );
    }

    Ok(exit_code(report.failed == 0))
}

async fn run_cache(config: &AppConfig, action: CacheAction, json: bool) -> Result<ExitCode> {
    let pool = connect(&config.database_url).await?;
    let store = SqliteCacheStore::from_pool(pool)
        .await
        .context("Failed to prepare classification cache")?;
    let cache = CacheManager::new(store, config.classification.cache_ttl);

    match action {
        CacheAction::Stats => {
            let stats = cache.stats().await;
            if json {
                print_json(&stats)?;
            } else {
                println!("Cache entries: {}", stats.total_entries);
                println!("Stored size:   {} bytes", stats.stored_size_bytes);
                println!("TTL:           {}s", config.classification.cache_ttl.as_secs());
            }
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired().await;
            report_removed(removed, json)?;
        }
        CacheAction::Clear { older_than_hours } => {
            let older_than = older_than_hours.map(|hours| Duration::from_secs(hours.saturating_mul(3600)));
            let removed = cache.evict(older_than).await;
            report_removed(removed, json)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report_removed(removed: u64, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({ "removed": removed }))
    } else {
        println!("Removed {} cache entries", removed);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
