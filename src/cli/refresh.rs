//! One-shot refresh command

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{CommandContext, OutputFormat};
use crate::error::{Error, Result};
use crate::orchestrator::{RefreshMode, RefreshOutcome};

/// Run one refresh and report what it did
pub async fn run(ctx: &CommandContext, force: bool) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let mode = if force {
        RefreshMode::Bypass
    } else {
        RefreshMode::Normal
    };

    let spinner = (ctx.format == OutputFormat::Pretty).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(if force {
            "Fetching a new photo..."
        } else {
            "Refreshing photo..."
        });
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let outcome = orchestrator.refresh(mode).await;
    orchestrator.finish_background_work().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let cached = orchestrator.cached();
    let diagnostics = orchestrator.diagnostics_snapshot();
    orchestrator.presenter().shutdown();

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "outcome": outcome.as_str(),
                "presented": outcome.presented(),
                "photo": cached,
                "last_error": diagnostics.last_error,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            let summary = match outcome {
                RefreshOutcome::Reused => "Cached photo is still current".to_string(),
                RefreshOutcome::ConsumedPrefetch | RefreshOutcome::Fetched => {
                    "Fetched a new photo".to_string()
                }
                RefreshOutcome::FellBack => "Kept the cached photo".to_string(),
                RefreshOutcome::Superseded => "A newer photo was committed meanwhile".to_string(),
                other => format!("Refresh {}", other.as_str().replace('_', " ")),
            };
            let marker = if outcome.presented() {
                "✓".green()
            } else {
                "✗".red()
            };
            println!("{} {}", marker, summary);

            if let Some(entry) = &cached {
                println!("  Photo:  {}", entry.artifact.url);
                println!("  Author: {}", entry.artifact.author.bold());
                println!("  Query:  {}", entry.query);
            }
            if let Some(err) = &diagnostics.last_error {
                println!("  {} {}", "Last error:".yellow(), err);
            }
        }
    }

    if outcome.presented() {
        Ok(())
    } else {
        Err(Error::Other(diagnostics.last_error.unwrap_or_else(|| {
            format!("refresh ended with {}", outcome.as_str())
        })))
    }
}
