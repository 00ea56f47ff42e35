//! Configuration management for backdrop

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::Location;
use crate::error::{ConfigError, Result};

pub mod settings;

pub use settings::{
    PhotosSettings, Settings, SettingsProvider, SettingsStore, TemperatureUnit, UnitsSettings,
    WindSpeedUnit,
};

/// Environment variable consulted when the config file carries no access key
pub const ACCESS_KEY_ENV: &str = "UNSPLASH_ACCESS_KEY";

/// Placeholder shipped in sample configs; never a usable key
const PLACEHOLDER_KEY: &str = "YOUR_UNSPLASH_ACCESS_KEY";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Photo provider access key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Base URL of the companion display that is told about each new photo
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion_url: Option<String>,

    /// Size of the display surface photos are requested for
    #[serde(default)]
    pub viewport: Viewport,

    /// Fixed location; when absent the location is looked up by IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// User settings that govern refresh cadence and query toggles
    #[serde(default)]
    pub settings: Settings,
}

/// Display surface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Where the effective access key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    ConfigFile,
    RuntimeEnv,
    None,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KeySource::ConfigFile => "Config file",
            KeySource::RuntimeEnv => "Runtime env",
            KeySource::None => "None",
        };
        f.write_str(label)
    }
}

/// The access key actually in effect, with its provenance
#[derive(Debug, Clone)]
pub struct AccessKey {
    pub value: Option<String>,
    pub source: KeySource,
}

impl AccessKey {
    /// A key is usable when it looks like a real provider key
    pub fn is_available(&self) -> bool {
        self.value.as_deref().is_some_and(is_usable_key)
    }

    /// Status label used by diagnostics
    pub fn status(&self) -> &'static str {
        if self.is_available() {
            "Available"
        } else {
            "Missing or invalid"
        }
    }
}

fn is_usable_key(key: &str) -> bool {
    key.len() > 10 && key != PLACEHOLDER_KEY
}

/// Pick the config file key first, then the environment.
pub fn resolve_access_key(config_key: Option<&str>, env_key: Option<String>) -> AccessKey {
    if let Some(key) = config_key.filter(|k| is_usable_key(k)) {
        return AccessKey {
            value: Some(key.to_string()),
            source: KeySource::ConfigFile,
        };
    }

    match env_key.filter(|k| is_usable_key(k)) {
        Some(key) => AccessKey {
            value: Some(key),
            source: KeySource::RuntimeEnv,
        },
        None => AccessKey {
            value: None,
            source: KeySource::None,
        },
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".backdrop").join("config.yaml"))
    }

    /// Resolve an optional override into a concrete config path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional override path
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(&Self::resolve_path(path)?)
    }

    /// Load configuration, falling back to defaults when no file exists yet
    pub fn load_or_default_at(path: Option<&str>) -> Result<Self> {
        match Self::load_at(path) {
            Err(crate::error::Error::Config(ConfigError::NotFound)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Save configuration to an optional override path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(&Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // The file holds a provider key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// The access key in effect for this process
    pub fn access_key(&self) -> AccessKey {
        resolve_access_key(
            self.access_key.as_deref(),
            std::env::var(ACCESS_KEY_ENV).ok(),
        )
    }
}
