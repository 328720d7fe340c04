//! CLI module for ragbench
//!
//! Provides command-line interface parsing and handling for the ragbench-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// ragbench - retrieval backend for agent benchmarks
#[derive(Parser, Debug)]
#[command(
    name = "ragbench-server",
    version,
    about = "ragbench - retrieval backend for agent benchmarks",
    long_about = "Chunking, embedding, vector search and document storage behind a small HTTP API.\n\n\
                  Run without arguments to start the server, or use 'init' to write a default configuration.",
    after_help = "EXAMPLES:\n    \
                  ragbench-server init                         # Write ragbench.toml\n    \
                  ragbench-server                              # Start the server\n    \
                  ragbench-server ingest --file notes.txt      # Ingest a file\n    \
                  ragbench-server query \"memory safety\" -k 3   # Query from the terminal\n    \
                  ragbench-server rebuild                      # Rebuild the index from stored documents"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        default_value = "ragbench.toml",
        env = "RAGBENCH_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override `[server] host`
        #[arg(long)]
        host: Option<String>,

        /// Override `[server] port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ingest one document
    #[command(group(ArgGroup::new("source").required(true).args(["file", "text", "url"])))]
    Ingest {
        /// Read content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Content given inline
        #[arg(short, long)]
        text: Option<String>,

        /// Fetch content from a URL
        #[arg(short, long)]
        url: Option<String>,

        /// Source type (text, url, wiki, news, financial)
        #[arg(long)]
        source_type: Option<String>,

        /// Explicit document id instead of the content hash
        #[arg(long)]
        id: Option<String>,

        /// Metadata entries as key=value, repeatable
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,

        /// Chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunk overlap in characters
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Strip tags and collapse whitespace before chunking
        #[arg(long)]
        normalize: bool,
    },

    /// Query the index
    Query {
        /// Query text
        text: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum cosine similarity
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Show index and store status
    Status,

    /// Rebuild the vector index from the document store
    Rebuild,

    /// Write a default ragbench.toml and data directories
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing ragbench.toml
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Embedding backend (hashing, local, remote)
        #[arg(long, default_value = "hashing")]
        backend: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
