//! Global CLI options shared across all commands

use crate::cli::{Cli, OutputFormat};

/// Global CLI options passed to all command handlers.
///
/// Precedence is CLI flag > environment variable > default; config file
/// values are resolved later in `CommandContext`.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Output format (pretty, table, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.backdrop/config.yaml)
    pub config: Option<String>,

    /// Custom cache directory (defaults to the platform cache dir)
    pub cache_dir: Option<String>,

    /// Debug logging requested
    pub debug: bool,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            cache_dir: cli.cache_dir.clone(),
            debug: cli.debug,
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Get cache directory override as `Option<&str>`.
    pub fn cache_dir_ref(&self) -> Option<&str> {
        self.cache_dir.as_deref()
    }
}
