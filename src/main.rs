//! Backdrop CLI - weather- and season-aware background photos that stay fresh

use clap::{CommandFactory, Parser};

mod cache;
mod cli;
mod client;
mod config;
mod context;
mod error;
mod orchestrator;
mod output;

use cli::{CacheCommands, Cli, Commands, CommandContext, GlobalOptions};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let opts = GlobalOptions::from_cli(&cli);
    init_logging(opts.debug);

    match cli.command {
        Commands::Init => cli::init::run(&opts),
        Commands::Status => cli::status::run(&opts),
        Commands::Run { debug_report } => {
            let ctx = CommandContext::new(&opts)?;
            cli::run::run(&ctx, debug_report).await
        }
        Commands::Refresh { force } => {
            let ctx = CommandContext::new(&opts)?;
            cli::refresh::run(&ctx, force).await
        }
        Commands::Debug => {
            let ctx = CommandContext::new(&opts)?;
            cli::debug::run(&ctx).await
        }
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::Completion { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "backdrop",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise info for this crate, or debug with `--debug`
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let default_filter = format!("backdrop={}", level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}
