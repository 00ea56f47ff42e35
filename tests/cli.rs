use assert_cmd::prelude::*;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const FORECAST_JSON: &str = r#"{
    "timezone": "Europe/Oslo",
    "current": {
        "temperature_2m": -4.0,
        "relative_humidity_2m": 80,
        "rain": 0.0,
        "snowfall": 1.2,
        "cloudcover": 95,
        "wind_speed_10m": 12.0
    },
    "daily": {
        "sunrise": ["2026-01-15T09:05"],
        "sunset": ["2026-01-15T15:40"]
    }
}"#;

/// 1x1 transparent PNG
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

fn write_config(dir: &Path, access_key: Option<&str>) -> PathBuf {
    let path = dir.join("config.yaml");
    let mut contents = String::from(
        "location:\n  latitude: 59.91\n  longitude: 10.75\nsettings:\n  photos:\n    refresh_interval: 30\n",
    );
    if let Some(key) = access_key {
        contents.push_str(&format!("access_key: {key}\n"));
    }
    fs::write(&path, contents).expect("failed to write config");
    path
}

fn backdrop(config: &Path, cache_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("backdrop"));
    cmd.arg("--config")
        .arg(config)
        .arg("--cache-dir")
        .arg(cache_dir)
        .env_remove("UNSPLASH_ACCESS_KEY")
        .env_remove("BACKDROP_FORMAT")
        .env_remove("BACKDROP_CONFIG")
        .env_remove("BACKDROP_CACHE_DIR");
    cmd
}

#[test]
fn status_without_config_suggests_init() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    backdrop(&temp.path().join("missing.yaml"), &temp.path().join("cache"))
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration not found"))
        .stdout(predicate::str::contains("backdrop init"));

    Ok(())
}

#[test]
fn status_json_reports_config_and_key_source() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = write_config(temp.path(), Some("config-access-key-123"));

    let assert = backdrop(&config, &temp.path().join("cache"))
        .args(["--format", "json", "status"])
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(report["config_found"], true);
    assert_eq!(report["access_key_status"], "Available");
    assert_eq!(report["access_key_source"], "Config file");
    assert_eq!(report["refresh_interval_minutes"], 30);
    assert!(report["photo"].is_null());

    Ok(())
}

#[test]
fn cache_path_honors_override() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let cache_dir = temp.path().join("custom-cache");

    backdrop(&temp.path().join("config.yaml"), &cache_dir)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(cache_dir.to_string_lossy().to_string()));

    Ok(())
}

#[test]
fn cache_clear_on_empty_cache() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    let assert = backdrop(&temp.path().join("config.yaml"), &temp.path().join("cache"))
        .args(["--format", "json", "cache", "clear"])
        .assert()
        .success();

    let result: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(result["removed"], false);
    assert_eq!(result["success"], true);

    Ok(())
}

#[test]
fn completion_generates_bash_script() {
    Command::new(assert_cmd::cargo::cargo_bin!("backdrop"))
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backdrop"));
}

#[test]
fn refresh_fetches_then_reuses_cached_photo() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let host = server.url();

    let _forecast = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FORECAST_JSON)
        .create();
    let random = server
        .mock("GET", "/photos/random")
        .match_query(Matcher::Any)
        .match_header("authorization", "Client-ID config-access-key-123")
        .with_status(200)
        .with_body(format!(
            r#"{{
                "urls": {{ "regular": "{host}/img/photo.png?ixid=x&q=80" }},
                "user": {{ "name": "Ansel", "links": {{ "html": "https://unsplash.com/@ansel" }} }},
                "links": {{ "download_location": "{host}/photos/abc/download" }}
            }}"#
        ))
        .expect(1)
        .create();
    let _image = server
        .mock("GET", "/img/photo.png")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PIXEL_PNG)
        .create();
    let download = server
        .mock("GET", "/photos/abc/download")
        .with_status(200)
        .expect(1)
        .create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), Some("config-access-key-123"));
    let cache_dir = temp.path().join("cache");

    let first = backdrop(&config, &cache_dir)
        .args(["--format", "json", "refresh"])
        .env("BACKDROP_UNSPLASH_HOST", &host)
        .env("BACKDROP_FORECAST_URL", format!("{host}/v1/forecast"))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&first.get_output().stdout)?;
    assert_eq!(outcome["outcome"], "fetched");
    assert_eq!(outcome["photo"]["photo"]["author"], "Ansel");

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache_dir.join("current.json"))?)?;
    assert!(
        state["background"]["url"]
            .as_str()
            .is_some_and(|url| url.contains("/img/photo.png"))
    );

    let second = backdrop(&config, &cache_dir)
        .args(["--format", "json", "refresh"])
        .env("BACKDROP_UNSPLASH_HOST", &host)
        .env("BACKDROP_FORECAST_URL", format!("{host}/v1/forecast"))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&second.get_output().stdout)?;
    assert_eq!(outcome["outcome"], "reused");

    random.assert();
    download.assert();

    Ok(())
}

#[test]
fn refresh_without_access_key_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let host = server.url();
    let _forecast = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FORECAST_JSON)
        .create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), None);

    backdrop(&config, &temp.path().join("cache"))
        .args(["--format", "json", "refresh"])
        .env("BACKDROP_UNSPLASH_HOST", &host)
        .env("BACKDROP_FORECAST_URL", format!("{host}/v1/forecast"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"failed\""))
        .stderr(predicate::str::contains("access key"));

    Ok(())
}
