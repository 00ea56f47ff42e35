//! Contextual diagnostic fields for the debug report

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use std::sync::Arc;

use super::query::{LocalTime, Season, festive_query, time_of_day};
use super::{DebugFields, DebugQuery};
use crate::client::DebugInfoProvider;
use crate::config::{AccessKey, SettingsProvider, TemperatureUnit};
use crate::error::FetchError;

const NOT_AVAILABLE: &str = "n/a";

/// Debug-info provider computed locally from settings, key state and clock
pub struct LocalDebugInfo {
    access_key: AccessKey,
    settings: Arc<dyn SettingsProvider>,
    local: LocalTime,
}

impl LocalDebugInfo {
    pub fn new(access_key: AccessKey, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            access_key,
            settings,
            local: LocalTime::default(),
        }
    }

    #[cfg(test)]
    fn at(mut self, now: NaiveDateTime) -> Self {
        self.local = LocalTime::frozen(now);
        self
    }

    fn compose(&self, query: &DebugQuery, now: NaiveDateTime) -> DebugFields {
        let unit = self.settings.current().units.temperature_unit;
        let weather = query.weather.as_ref();

        let (tod, source) = match weather {
            Some(w) => time_of_day(&w.sunrise, &w.sunset, now),
            None => time_of_day("", "", now),
        };

        DebugFields {
            photo_age: format_photo_age(query.cache_timestamp, query.now_ms),
            query: query
                .query
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            time_source: source.as_str().to_string(),
            time_of_day: tod.as_str().to_string(),
            season: Season::from_month(now.month()).to_string(),
            holiday: festive_query(now).unwrap_or("none").to_string(),
            api_key_status: self.access_key.status().to_string(),
            api_key_source: self.access_key.source.to_string(),
            temperature: weather
                .map(|w| format_temperature(w.temperature, unit))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            rain: weather
                .map(|w| format!("{:.1}mm", w.rain))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            snowfall: weather
                .map(|w| format!("{:.1}cm", w.snowfall))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            cloudcover: weather
                .map(|w| format!("{}%", w.cloudcover as i32))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

#[async_trait]
impl DebugInfoProvider for LocalDebugInfo {
    async fn debug_info(&self, query: &DebugQuery) -> Result<DebugFields, FetchError> {
        Ok(self.compose(query, self.local.now()))
    }
}

fn format_temperature(value: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{:.1}°C", value),
        TemperatureUnit::Fahrenheit => format!("{:.1}°F", value),
    }
}

/// Coarse age of the cached photo: `42s ago`, `5m ago`, `3h ago`, `2d ago`
pub fn format_photo_age(cache_timestamp: Option<i64>, now_ms: i64) -> String {
    let Some(ts) = cache_timestamp else {
        return "unknown".to_string();
    };

    let seconds = now_ms.saturating_sub(ts).max(0) / 1000;
    if seconds < 60 {
        return format!("{}s ago", seconds);
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", hours / 24)
    }
}
