use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml
    #[clap(long, env = "MEDIALINK_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the HTTP API
    Daemon {},

    /// Extract media from a single URL and print the result
    Extract {
        url: String,
    },

    /// Extract media from several URLs at once
    Batch {
        #[clap(required = true)]
        urls: Vec<String>,
    },

    /// Print which source a URL belongs to. No network.
    Classify {
        url: String,
    },
}
