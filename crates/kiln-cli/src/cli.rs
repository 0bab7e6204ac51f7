use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Markdown ingestion and semantic retrieval pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (TOML or YAML); falls back to built-in defaults.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObserverModeArg {
    Polling,
    Push,
    Auto,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and upsert a single file or every matching file under a directory tree.
    Ingest {
        path: PathBuf,
    },

    /// Run the observer loop (polling or push) until interrupted or a cap elapses.
    Watch {
        #[arg(long, value_enum)]
        mode: Option<ObserverModeArg>,

        /// Polling-mode iteration cap, mainly for scripted runs.
        #[arg(long)]
        iterations: Option<u64>,

        /// Push-mode duration cap in seconds.
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Lexical search over title, summary, and path.
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Hybrid semantic search.
    Semantic {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Fetch one document's detail, optionally with assembled content.
    GetDoc {
        id: i64,

        #[arg(long)]
        content: bool,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        section: Option<String>,
    },

    /// Print document/link/queue/embedding counts.
    Stats,

    /// Check every link belonging to a document.
    CheckLinks {
        document_id: i64,

        #[arg(long)]
        external: bool,
    },

    /// Start the JSON-RPC + health-check HTTP surface.
    Serve,
}
