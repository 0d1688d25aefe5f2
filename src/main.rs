//! # Context Recall CLI (`recall`)
//!
//! The `recall` binary drives the retrieval engine from the shell: build
//! the index, ingest documents, search it, and chat over it.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite index |
//! | `recall ingest <path>...` | Ingest files or directory trees |
//! | `recall search "<query>"` | Paginated semantic search |
//! | `recall batch "<q1>" "<q2>"` | Concurrent multi-query search |
//! | `recall remember` | Store a question/answer exchange |
//! | `recall ask "<question>"` | Answer with the local model over retrieved context |
//! | `recall export` / `recall import` | Knowledge-base backup |
//! | `recall stats` | Entry counts per source |
//! | `recall reset --yes` | Wipe the index |
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`); results go to
//! stdout.

mod chat_cmd;
mod export;
mod ingest;
mod search;
mod stats;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use context_recall::config;
use context_recall::llm::Language;
use context_recall::RetrievalEngine;
use tracing_subscriber::EnvFilter;

/// Context Recall CLI: a local retrieval engine for documents and chat
/// history.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Context Recall: local document retrieval with chat memory",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/recall.toml`. Used only if it exists.
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database. Idempotent.
    Init,

    /// Ingest files or directories.
    ///
    /// Directories are walked recursively. Supported extensions: txt, pdf,
    /// docx, csv, xlsx, html, md, json. Other files are skipped.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Search the index.
    Search {
        /// The search query string.
        query: String,

        /// Results per page. Defaults to `retrieval.default_k`.
        #[arg(long)]
        k: Option<usize>,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run several queries concurrently.
    ///
    /// Results are grouped per query unless `--flatten` is given, in which
    /// case they are concatenated in completion order.
    Batch {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        k: Option<usize>,

        #[arg(long)]
        flatten: bool,
    },

    /// Store a question/answer exchange for later recall.
    Remember {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },

    /// Ask the language model, using retrieved passages as context.
    Ask {
        question: String,

        /// Answer language: auto, en, or es. Defaults to `llm.language`.
        #[arg(long)]
        language: Option<Language>,

        #[arg(long)]
        k: Option<usize>,
    },

    /// Export every entry as JSON.
    Export {
        /// Output file (prints to stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import entries from an export file.
    Import { input: PathBuf },

    /// Show entry counts.
    Stats,

    /// Irreversibly delete every entry.
    Reset {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let engine = RetrievalEngine::open(&cfg).await?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths } => {
            ingest::run_ingest(&engine, &paths).await?;
        }
        Commands::Search {
            query,
            k,
            page,
            json,
        } => {
            let k = k.unwrap_or(engine.default_k());
            search::run_search(&engine, &query, k, page, json).await?;
        }
        Commands::Batch { queries, k, flatten } => {
            let k = k.unwrap_or(engine.default_k());
            search::run_batch(&engine, &queries, k, flatten).await?;
        }
        Commands::Remember { question, answer } => {
            chat_cmd::run_remember(&engine, &question, &answer).await?;
        }
        Commands::Ask {
            question,
            language,
            k,
        } => {
            let language = match language {
                Some(language) => language,
                None => cfg.llm.language.parse()?,
            };
            let k = k.unwrap_or(engine.default_k());
            chat_cmd::run_ask(&engine, &cfg, &question, k, language).await?;
        }
        Commands::Export { output } => {
            export::run_export(&engine, output.as_deref()).await?;
        }
        Commands::Import { input } => {
            export::run_import(&engine, &input).await?;
        }
        Commands::Stats => {
            stats::run_stats(&engine, &cfg).await?;
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to wipe the index without --yes");
            }
            engine.reset().await?;
            println!("Index reset.");
        }
    }

    Ok(())
}
