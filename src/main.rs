//! # Research Digest CLI (`rdigest`)
//!
//! ## Usage
//!
//! ```bash
//! rdigest --config ./config/rdigest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rdigest init` | Create the SQLite database and schema |
//! | `rdigest ask "<query>"` | Gather evidence and print a summary |
//! | `rdigest list` | List stored queries |
//! | `rdigest show <id>` | Print one query with documents and summaries |
//! | `rdigest delete <id>` | Delete a query and everything it owns |
//! | `rdigest serve` | Start the HTTP API |
//! | `rdigest completions <shell>` | Print shell completions |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use research_digest::config::{self, Config};
use research_digest::models::QueryRecord;
use research_digest::pipeline::Orchestrator;
use research_digest::store::sqlite::SqliteStore;
use research_digest::store::EvidenceStore;
use research_digest::{db, migrate, server};

/// Research Digest: cached, length-budgeted evidence summaries.
#[derive(Parser)]
#[command(
    name = "rdigest",
    about = "Research Digest: gather evidence for a query and summarize it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rdigest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to re-run.
    Init,

    /// Run the pipeline once for a query.
    ///
    /// A cached summary for the same text and length is returned without
    /// any network or model work.
    Ask {
        /// Query text, matched exactly against earlier queries.
        query: String,

        /// Summary length: short, medium, or long. Anything else is medium.
        #[arg(long, default_value = "medium")]
        length: String,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored queries, newest first.
    List {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one query with its documents and summaries (JSON).
    Show {
        id: String,
    },

    /// Delete a query with its documents and summaries.
    Delete {
        id: String,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,research_digest=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_store(cfg: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn print_record_line(record: &QueryRecord) {
    let classes: Vec<&str> = record
        .summaries
        .iter()
        .map(|s| s.summary_class.as_str())
        .collect();
    println!(
        "{}  {}  {:<40}  docs={} summaries=[{}]",
        record.id,
        record.created_at,
        record.query_text,
        record.documents.len(),
        classes.join(",")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "rdigest", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ask { query, length, json } => {
            let store = open_store(&cfg).await?;
            let orchestrator = Orchestrator::from_config(&cfg, store)?;
            let outcome = orchestrator.process(&query, &length).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Query:   {}", outcome.query_text);
                println!("Length:  {}", outcome.summary_class);
                println!("Cached:  {}", outcome.cached);
                println!();
                println!("{}", outcome.summary_text);
            }
        }
        Commands::List { limit } => {
            let store = open_store(&cfg).await?;
            let records = store.list_queries(limit).await?;
            if records.is_empty() {
                println!("No queries stored.");
            }
            for record in &records {
                print_record_line(record);
            }
        }
        Commands::Show { id } => {
            let store = open_store(&cfg).await?;
            match store.get_query(&id).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => anyhow::bail!("query not found: {}", id),
            }
        }
        Commands::Delete { id } => {
            let store = open_store(&cfg).await?;
            if !store.delete_query(&id).await? {
                anyhow::bail!("query not found: {}", id);
            }
            println!("Deleted query {}", id);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
