//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "zenfeed",
    version,
    about = "Feed intervention engine for short-form video feeds",
    long_about = "Zenfeed classifies visible feed items, scores their compulsive-engagement risk \
                  and blurs, removes or substitutes risky items with productive alternatives \
                  once a short learning period has passed."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/zenfeed/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP analysis server
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Classify and score a single title
    Analyze {
        /// Video title
        title: String,

        /// Duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Channel name
        #[arg(long)]
        channel: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the scanner over recorded scan frames (one JSON array per line)
    Replay {
        /// Frames file
        file: PathBuf,

        /// Print session insights when the replay finishes
        #[arg(long)]
        insights: bool,
    },

    /// Show or clear the persisted watch history
    History {
        /// Remove all entries
        #[arg(long)]
        clear: bool,

        /// Number of most recent entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
