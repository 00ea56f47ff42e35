//! Cache management commands

use std::path::PathBuf;

use colored::Colorize;

use crate::cache::CacheStorage;
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::Result;
use crate::output::{FieldRow, format_size, format_table, format_timestamp_ms};

fn open(opts: &GlobalOptions) -> Result<(PathBuf, CacheStorage)> {
    let dir = CacheStorage::resolve_dir(opts.cache_dir_ref())?;
    let cache = CacheStorage::open_at(&dir)?;
    Ok((dir, cache))
}

/// Show the cached photo and storage details
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let (dir, cache) = open(opts)?;
    let stats = cache.stats()?;
    let path = dir.display().to_string();

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": path,
                "database": cache.db_path().display().to_string(),
                "has_photo": stats.entry.is_some(),
                "corrupt": stats.corrupt,
                "size_bytes": stats.size_bytes,
                "size_human": format_size(stats.size_bytes),
                "photo": stats.entry,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            let mut rows = vec![
                FieldRow::new("Location", path),
                FieldRow::new("Size", format_size(stats.size_bytes)),
            ];
            match &stats.entry {
                Some(entry) => {
                    rows.push(FieldRow::new("Photo", entry.artifact.url.clone()));
                    rows.push(FieldRow::new("Query", entry.query.clone()));
                    rows.push(FieldRow::new(
                        "Committed",
                        format_timestamp_ms(entry.timestamp_ms),
                    ));
                }
                None if stats.corrupt => rows.push(FieldRow::new("Photo", "unreadable")),
                None => rows.push(FieldRow::new("Photo", "none")),
            }
            println!("{}", format_table(&rows));
        }
        OutputFormat::Pretty => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", path);
            println!("Size:           {}", format_size(stats.size_bytes));

            match &stats.entry {
                Some(entry) => {
                    println!("Photo:          {}", entry.artifact.url);
                    println!("Author:         {}", entry.artifact.author);
                    println!("Query:          {}", entry.query);
                    println!(
                        "Committed:      {}",
                        format_timestamp_ms(entry.timestamp_ms)
                    );
                }
                None if stats.corrupt => {
                    println!(
                        "Photo:          {} (will be replaced on next refresh)",
                        "unreadable".yellow()
                    );
                }
                None => println!("Photo:          none"),
            }
        }
    }

    Ok(())
}

/// Remove the cached photo
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let (_, cache) = open(opts)?;
    let removed = cache.clear()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "removed": removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed {
                println!("Cleared the cached photo");
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    let path = CacheStorage::resolve_dir(opts.cache_dir_ref())?;
    println!("{}", path.display());
    Ok(())
}
