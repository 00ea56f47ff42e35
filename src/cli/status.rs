//! Status command implementation

use colored::Colorize;
use serde::Serialize;

use crate::cache::{CacheStorage, CacheStore, TtlOracle};
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::{ConfigError, Error, Result};
use crate::orchestrator::StateFileSurface;
use crate::orchestrator::surface::STATE_FILE;
use crate::output::{FieldRow, format_table, format_time_remaining, format_timestamp_ms};

/// Everything `backdrop status` reports
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub config_path: String,
    pub config_found: bool,
    pub access_key_status: String,
    pub access_key_source: String,
    pub refresh_interval_minutes: u64,
    pub cache_dir: String,
    pub photo: Option<PhotoStatus>,
    /// Photo a running daemon last put on the surface
    pub displayed_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoStatus {
    pub url: String,
    pub author: String,
    pub query: String,
    pub committed_at: String,
    pub valid: bool,
    pub expires_in: String,
}

/// Gather status without touching the network
pub fn collect(opts: &GlobalOptions, now_ms: i64) -> Result<StatusReport> {
    let config_path = Config::resolve_path(opts.config_ref())?;
    let (config, config_found) = match Config::load_at(opts.config_ref()) {
        Ok(config) => (config, true),
        Err(Error::Config(ConfigError::NotFound)) => (Config::default(), false),
        Err(e) => return Err(e),
    };

    let key = config.access_key();
    let cache_dir = CacheStorage::resolve_dir(opts.cache_dir_ref())?;
    let store = CacheStorage::open_at(&cache_dir)?;
    let ttl_ms = config.settings.photos.refresh_interval_ms();

    let photo = store.read().map(|entry| PhotoStatus {
        valid: TtlOracle::is_valid_at(entry.timestamp_ms, now_ms, ttl_ms, 0),
        expires_in: format_time_remaining(ttl_ms - entry.age_ms(now_ms)),
        committed_at: format_timestamp_ms(entry.timestamp_ms),
        url: entry.artifact.url,
        author: entry.artifact.author,
        query: entry.query,
    });
    let displayed_url = StateFileSurface::load(&cache_dir.join(STATE_FILE))
        .and_then(|state| state.background)
        .map(|bg| bg.url);

    Ok(StatusReport {
        config_path: config_path.display().to_string(),
        config_found,
        access_key_status: key.status().to_string(),
        access_key_source: key.source.to_string(),
        refresh_interval_minutes: config.settings.photos.refresh_interval.max(1),
        cache_dir: cache_dir.display().to_string(),
        photo,
        displayed_url,
    })
}

/// Run the status command
pub fn run(opts: &GlobalOptions) -> Result<()> {
    let report = collect(opts, chrono::Utc::now().timestamp_millis())?;

    match opts.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => println!("{}", format_table(&rows(&report))),
        OutputFormat::Pretty => print_pretty(&report),
    }

    Ok(())
}

fn rows(report: &StatusReport) -> Vec<FieldRow> {
    let mut rows = vec![
        FieldRow::new("Config file", report.config_path.clone()),
        FieldRow::new("Access key", report.access_key_status.clone()),
        FieldRow::new("Key source", report.access_key_source.clone()),
        FieldRow::new(
            "Refresh interval",
            format!("{} min", report.refresh_interval_minutes),
        ),
        FieldRow::new("Cache dir", report.cache_dir.clone()),
    ];
    match &report.photo {
        Some(photo) => {
            rows.push(FieldRow::new("Photo", photo.url.clone()));
            rows.push(FieldRow::new("Author", photo.author.clone()));
            rows.push(FieldRow::new("Query", photo.query.clone()));
            rows.push(FieldRow::new("Committed", photo.committed_at.clone()));
            rows.push(FieldRow::new("Expires in", photo.expires_in.clone()));
        }
        None => rows.push(FieldRow::new("Photo", "none cached")),
    }
    rows
}

fn print_pretty(report: &StatusReport) {
    println!("{}\n", "Backdrop Status".bold());

    if report.config_found {
        println!("Config file: {}", report.config_path.cyan());
    } else {
        println!("{} Configuration not found", "✗".red());
        println!("  → Run {} to create one", "backdrop init".cyan());
    }
    println!();

    if report.access_key_status == "Available" {
        println!(
            "{} Access key available ({})",
            "✓".green(),
            report.access_key_source
        );
    } else {
        println!("{} Access key missing or invalid", "✗".red());
        println!("  → Run 'backdrop init' or set UNSPLASH_ACCESS_KEY");
    }
    println!(
        "{} Photo changes every {} min",
        "○".dimmed(),
        report.refresh_interval_minutes
    );
    println!();

    match &report.photo {
        Some(photo) => {
            let marker = if photo.valid {
                "✓".green()
            } else {
                "⚠".yellow()
            };
            println!("{} Cached photo by {}", marker, photo.author.bold());
            println!("  Query:     {}", photo.query);
            println!("  Committed: {}", photo.committed_at);
            if photo.valid {
                println!("  Expires in {}", photo.expires_in);
            } else {
                println!("  Expired (replaced on next refresh)");
            }
        }
        None => {
            println!("{} No photo cached yet", "○".dimmed());
            println!("  → Run {} to fetch one", "backdrop refresh".cyan());
        }
    }

    if let Some(url) = &report.displayed_url {
        println!("\nDisplayed: {}", url.dimmed());
    }
    println!();
}
