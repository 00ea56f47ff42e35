//! Weather, time and calendar context used to choose photos

use serde::{Deserialize, Serialize};

use crate::config::{Settings, TemperatureUnit};

pub mod debug;
pub mod query;

pub use debug::LocalDebugInfo;
pub use query::SeasonalQueryBuilder;

/// Geographic location used for weather lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Current conditions at the display's location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Temperature in `temperature_unit`
    pub temperature: f64,
    pub temperature_unit: TemperatureUnit,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Wind speed in the unit named by `wind_speed_label`
    pub wind_speed: f64,
    pub wind_speed_label: String,
    /// Cloud cover, percent
    pub cloudcover: f64,
    /// Rain, mm
    pub rain: f64,
    /// Snowfall, cm
    pub snowfall: f64,
    /// Local sunrise, `%Y-%m-%dT%H:%M`
    pub sunrise: String,
    /// Local sunset, `%Y-%m-%dT%H:%M`
    pub sunset: String,
    pub timezone: String,
}

/// Everything a query is built from, read fresh for each decision
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub weather: Weather,
    pub settings: Settings,
}

/// Inputs for composing diagnostic fields
#[derive(Debug, Clone, Default)]
pub struct DebugQuery {
    pub cache_timestamp: Option<i64>,
    pub query: Option<String>,
    pub weather: Option<Weather>,
    pub now_ms: i64,
}

/// Contextual diagnostic fields, pre-formatted for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugFields {
    pub photo_age: String,
    pub query: String,
    pub time_source: String,
    pub time_of_day: String,
    pub season: String,
    pub holiday: String,
    pub api_key_status: String,
    pub api_key_source: String,
    pub temperature: String,
    pub rain: String,
    pub snowfall: String,
    pub cloudcover: String,
}

#[cfg(test)]
pub(crate) fn sample_weather() -> Weather {
    Weather {
        temperature: 4.5,
        temperature_unit: TemperatureUnit::Celsius,
        humidity: 81.0,
        wind_speed: 12.0,
        wind_speed_label: "km/h".to_string(),
        cloudcover: 20.0,
        rain: 0.0,
        snowfall: 0.0,
        sunrise: "2026-01-15T07:45".to_string(),
        sunset: "2026-01-15T16:30".to_string(),
        timezone: "Europe/Amsterdam".to_string(),
    }
}
