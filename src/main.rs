//! Quest - natural-language questions answered from a SQL Server database.

mod audit;
mod catalog;
mod classify;
mod cli;
mod config;
mod db;
mod error;
mod llm;
mod logging;
mod pipeline;
mod sql;

use std::sync::Arc;

use audit::AuditLog;
use catalog::SchemaCatalog;
use cli::Cli;
use config::Config;
use db::StoreClient;
use error::{QuestError, Result};
use llm::prompt::DEFAULT_SQL_EXAMPLES;
use llm::{CompletionClient, SqlGenerator, Summarizer};
use pipeline::Pipeline;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load a .env file if one is present; absence is not an error.
    dotenvy::dotenv().ok();

    // Unattended runs can divert logs to the state directory.
    if std::env::var_os("QUEST_LOG_TO_FILE").is_some() {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Resolve configuration with precedence:
    // 1. CLI arguments (highest)
    // 2. Environment variables
    // 3. Config file
    // 4. Built-in defaults
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults();
    cli.apply_to(&mut config)?;

    // A missing or empty catalog is a startup failure; every later stage
    // assumes a non-empty table allow-list.
    let catalog = SchemaCatalog::load(&config.catalog.path)?;
    info!(
        tables = catalog.tables.len(),
        path = %config.catalog.path.display(),
        "Schema catalog loaded"
    );

    let llm: Arc<dyn CompletionClient> = Arc::from(llm::create_client(&config.llm)?);
    let store: Arc<dyn StoreClient> = Arc::from(db::create_store(&config.store)?);

    if cli.check {
        return check(&config, llm.as_ref(), store.as_ref(), &catalog).await;
    }

    let question = cli.question.as_deref().ok_or_else(|| {
        QuestError::config("No question provided. Pass one as an argument, or use --check.")
    })?;

    let examples = match &config.llm.examples_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            QuestError::config(format!("Failed to read SQL examples {}: {e}", path.display()))
        })?,
        None => DEFAULT_SQL_EXAMPLES.to_string(),
    };

    let pipeline = Pipeline::new(
        SqlGenerator::new(Arc::clone(&llm), catalog.format_for_prompt(), examples),
        Summarizer::new(llm),
        store,
        catalog.allowed_tables(),
        AuditLog::new(&config.audit.path),
        config.pipeline.clone(),
    );

    let outcome = pipeline.run(question).await;

    if !outcome.success {
        let reason = outcome.error.as_deref().unwrap_or("Unknown failure");
        eprintln!("Query failed: {reason}");
        for attempt in &outcome.attempts {
            if let Some(err) = &attempt.error {
                eprintln!("  attempt {}: {err}", attempt.attempt);
            }
        }
        std::process::exit(1);
    }

    if let Some(summary) = &outcome.summary {
        println!("{summary}");
    }
    if cli.show_sql {
        if let Some(sql) = &outcome.sql {
            println!();
            println!("SQL: {sql}");
        }
    }
    if let Some(result) = &outcome.result {
        println!();
        println!(
            "{} row(s) in {:.3}s",
            result.row_count,
            result.execution_time.as_secs_f64()
        );
    }

    Ok(())
}

/// Health check for the configured endpoints. Reports both outcomes
/// before deciding the exit code, so one broken dependency does not mask
/// the other.
async fn check(
    config: &Config,
    llm: &dyn CompletionClient,
    store: &dyn StoreClient,
    catalog: &SchemaCatalog,
) -> Result<()> {
    println!(
        "Catalog: {} table(s) from {}",
        catalog.tables.len(),
        config.catalog.path.display()
    );

    let mut healthy = true;

    match store.ping().await {
        Ok(()) => println!("Store:   ok ({})", config.store.display_string()),
        Err(e) => {
            healthy = false;
            println!("Store:   FAILED ({e})");
        }
    }

    match llm.ping().await {
        Ok(()) => println!("LLM:     ok (provider {})", config.llm.provider),
        Err(e) => {
            healthy = false;
            println!("LLM:     FAILED ({e})");
        }
    }

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}
