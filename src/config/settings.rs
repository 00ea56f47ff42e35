//! User settings and the store the orchestrator reads them from
//!
//! Settings are re-read on every scheduling decision, so a reload between two
//! ticks changes the refresh interval seen by the next tick.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::Result;

/// Quality used when the configured value cannot be understood
const DEFAULT_QUALITY: u32 = 80;

/// User-editable settings subtree of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub units: UnitsSettings,
    pub photos: PhotosSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsSettings {
    pub temperature_unit: TemperatureUnit,
    pub wind_speed_unit: WindSpeedUnit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kmh,
    Mph,
    Ms,
}

impl WindSpeedUnit {
    pub fn label(&self) -> &'static str {
        match self {
            WindSpeedUnit::Kmh => "km/h",
            WindSpeedUnit::Mph => "mph",
            WindSpeedUnit::Ms => "m/s",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosSettings {
    /// Minutes a photo stays current before it is replaced
    pub refresh_interval: u64,

    /// Either a percentage ("85", 85) or a legacy word (low, medium, high, maximum)
    #[serde(deserialize_with = "deserialize_quality")]
    pub photo_quality: String,

    /// Prefer holiday-themed queries around Christmas, New Year and Halloween
    pub festive: bool,
}

impl Default for PhotosSettings {
    fn default() -> Self {
        Self {
            refresh_interval: 30,
            photo_quality: DEFAULT_QUALITY.to_string(),
            festive: true,
        }
    }
}

impl PhotosSettings {
    /// Refresh interval in milliseconds, never shorter than one minute
    pub fn refresh_interval_ms(&self) -> i64 {
        let minutes = self.refresh_interval.max(1);
        i64::try_from(minutes.saturating_mul(60_000)).unwrap_or(i64::MAX)
    }

    /// Image quality percentage requested from the provider
    pub fn quality_percent(&self) -> u32 {
        match self.photo_quality.trim() {
            "low" => 65,
            "medium" => 80,
            "high" | "maximum" => 100,
            other => other
                .parse::<u32>()
                .map(|q| q.clamp(1, 100))
                .unwrap_or(DEFAULT_QUALITY),
        }
    }
}

/// Accept both `"85"` and `85`
fn deserialize_quality<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quality {
        Number(u64),
        Text(String),
    }

    Ok(match Quality::deserialize(deserializer)? {
        Quality::Number(n) => n.to_string(),
        Quality::Text(s) => s,
    })
}

/// Read access to the current settings snapshot
pub trait SettingsProvider: Send + Sync {
    /// Snapshot of the settings in effect right now
    fn current(&self) -> Settings;

    /// Re-read settings from their source
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Settings held in memory and reloaded from the config file on demand
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    /// Store backed by the config file at `path`
    pub fn new(path: PathBuf, initial: Settings) -> Self {
        Self {
            path: Some(path),
            settings: RwLock::new(initial),
        }
    }

    /// Store with no backing file; `reload` keeps the current value
    pub fn fixed(settings: Settings) -> Self {
        Self {
            path: None,
            settings: RwLock::new(settings),
        }
    }

    /// Replace the in-memory settings
    pub fn set(&self, settings: Settings) {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }
}

impl SettingsProvider for SettingsStore {
    fn current(&self) -> Settings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let config = super::Config::load_from(path)?;
        log::info!(
            "Settings reloaded (refresh interval {} min)",
            config.settings.photos.refresh_interval
        );
        self.set(config.settings);
        Ok(())
    }
}
