//! Print the stored menu tree as JSON
//!
//! Opens the menu database, prints the nested tree to stdout and runs an
//! integrity audit. The process exits with an error when the audit finds
//! violations.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin menutree-dump -- --db-path ./data/menus.db
//!
//! # Audit only, with debug logging; the path may also come from the environment
//! MENUTREE_DB_PATH=./data/menus.db RUST_LOG=menutree_core=debug \
//!     cargo run --bin menutree-dump -- --audit-only
//! ```

use anyhow::Context;
use clap::Parser;
use menutree_core::config::{BUSY_TIMEOUT_ENV, DB_PATH_ENV};
use menutree_core::{open_store, MenuTreeConfig, QueryService};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "menutree-dump")]
#[command(about = "Dump and audit a menu tree database", long_about = None)]
struct Args {
    /// Only run the integrity audit; skip the JSON dump
    #[arg(long)]
    audit_only: bool,

    /// Database file (defaults to ~/.menutree/menutree.db)
    #[arg(long, env = DB_PATH_ENV)]
    db_path: Option<PathBuf>,

    /// Milliseconds to wait on a locked database
    #[arg(long, env = BUSY_TIMEOUT_ENV)]
    busy_timeout_ms: Option<u64>,
}

impl Args {
    fn config(&self) -> MenuTreeConfig {
        let mut config = match &self.db_path {
            Some(path) => MenuTreeConfig::new(path.clone()),
            None => MenuTreeConfig::default(),
        };
        if let Some(busy_timeout_ms) = self.busy_timeout_ms {
            config = config.with_busy_timeout_ms(busy_timeout_ms);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr keeps stdout clean for the JSON dump)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("menutree_dump=info,menutree_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.config();
    tracing::info!("Opening menu tree at {}", config.database_path.display());

    let store = open_store(&config)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let query_service = QueryService::new(store.clone());

    if !args.audit_only {
        let tree = query_service
            .list_tree()
            .await
            .context("Failed to load menu tree")?;
        let json = serde_json::to_string_pretty(&tree).context("Failed to serialize menu tree")?;
        println!("{}", json);
    }

    let violations = query_service
        .audit()
        .await
        .context("Failed to audit menu tree")?;

    store.close().await.context("Failed to close database")?;

    if violations.is_empty() {
        tracing::info!("Menu tree audit passed");
        return Ok(());
    }

    let report =
        serde_json::to_string_pretty(&violations).context("Failed to serialize audit report")?;
    eprintln!("{}", report);
    anyhow::bail!("Menu tree audit found {} violations", violations.len())
}
