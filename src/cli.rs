use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ugoiraforge")]
#[command(author, version, about = "Convert pixiv ugoira animations to MP4")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP conversion server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Convert artwork ids to MP4 files
    Convert {
        /// Artwork ids, separated by spaces or commas
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Directory the MP4 files are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Check that the external encoder is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
