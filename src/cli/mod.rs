//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod context;
pub mod debug;
pub mod init;
pub mod refresh;
pub mod run;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// Backdrop - keeps a weather- and season-aware background photo fresh
#[derive(Parser, Debug)]
#[command(name = "backdrop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "BACKDROP_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "BACKDROP_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override cache directory
    #[arg(long, global = true, env = "BACKDROP_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "BACKDROP_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Backdrop configuration
    Init,

    /// Show configuration and cached photo status
    Status,

    /// Keep the background photo fresh until interrupted
    #[command(after_help = "\
Signals (Unix):
  SIGHUP   reload settings from the config file and re-check the photo
  SIGUSR1  fetch a new photo now")]
    Run {
        /// Publish a debug report to the surface every second
        #[arg(long)]
        debug_report: bool,
    },

    /// Refresh the background photo once
    Refresh {
        /// Fetch a new photo even if the cached one is still valid
        #[arg(long)]
        force: bool,
    },

    /// Print one diagnostic report
    Debug,

    /// Manage the local photo cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   backdrop completion bash > /etc/bash_completion.d/backdrop
  zsh:    backdrop completion zsh > \"${fpath[1]}/_backdrop\"
  fish:   backdrop completion fish > ~/.config/fish/completions/backdrop.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the cached photo and storage details
    Status,

    /// Remove the cached photo
    Clear,

    /// Print the cache directory
    Path,
}
