//! affilscan - PubMed affiliation scanner
//!
//! ## Usage
//!
//! ### HTTP Server Mode
//! ```bash
//! affilscan serve --port 3000
//! ```
//!
//! ### CLI Mode
//! ```bash
//! affilscan search "crispr delivery"
//! affilscan history
//! affilscan export 7 --output results.csv
//! ```

use anyhow::{Context, Result};
use affilscan::{
    classifier::AffiliationClassifier,
    config::{self, Settings},
    export,
    extract::FieldExtractor,
    pubmed::PubMedClient,
    server::{self, AppState},
    service::SearchService,
    store::Store,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PubMed affiliation scanner
#[derive(Parser)]
#[command(name = "affilscan")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// SQLite database path
    #[arg(long, global = true, env = "AFFILSCAN_DB")]
    db: Option<PathBuf>,

    /// NCBI E-utilities API key
    #[arg(long, global = true, env = "NCBI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// esearch endpoint (for mirrors)
    #[arg(long, global = true, env = "AFFILSCAN_ESEARCH_URL", default_value = config::DEFAULT_ESEARCH_URL)]
    esearch_url: String,

    /// efetch endpoint (for mirrors)
    #[arg(long, global = true, env = "AFFILSCAN_EFETCH_URL", default_value = config::DEFAULT_EFETCH_URL)]
    efetch_url: String,

    /// Maximum articles fetched per search
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_RESULTS)]
    max_results: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Run one search and print the records as JSON
    Search {
        /// Search terms
        query: String,
    },

    /// List the most recent searches
    History,

    /// Export the stored records of one search to CSV
    Export {
        /// Search id (see `history`)
        search_id: i64,

        /// Output file
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            esearch_url: self.esearch_url.clone(),
            efetch_url: self.efetch_url.clone(),
            max_results: self.max_results,
            database_path: self.db.clone().unwrap_or(defaults.database_path),
            academic_keywords: defaults.academic_keywords,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    let settings = cli.settings();
    settings.validate().context("Invalid configuration")?;

    let service = build_service(&settings)?;

    match cli.command {
        Commands::Serve { port, host } => {
            info!(host = %host, port = port, db = %settings.database_path.display(), "Starting HTTP server");
            server::run_server(AppState { service }, &host, port).await?;
        }
        Commands::Search { query } => {
            let records = service.search(&query).await.context("Search failed")?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::History => {
            for search in service.history()? {
                println!(
                    "{:>6}  {}  {}",
                    search.id,
                    search.created_at.format("%Y-%m-%d %H:%M:%S"),
                    search.query
                );
            }
        }
        Commands::Export { search_id, output } => {
            if service.store().search(search_id)?.is_none() {
                anyhow::bail!("No search with id {}", search_id);
            }
            let records = service.results(search_id)?;
            export::save_csv(&output, &records)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} records to {}", records.len(), output.display());
        }
    }

    Ok(())
}

fn build_service(settings: &Settings) -> Result<Arc<SearchService>> {
    let store = Store::open(&settings.database_path).with_context(|| {
        format!(
            "Failed to open database {}",
            settings.database_path.display()
        )
    })?;
    let client = PubMedClient::new(settings).context("Failed to build PubMed client")?;
    let classifier = AffiliationClassifier::new(&settings.academic_keywords);
    let extractor = FieldExtractor::new(classifier).context("Failed to compile extractor")?;

    Ok(Arc::new(SearchService::new(
        Arc::new(client),
        extractor,
        Arc::new(store),
    )))
}
