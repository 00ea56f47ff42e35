//! Season, time-of-day and holiday rules for photo queries

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDateTime};
use std::fmt;

use super::{ContextSnapshot, Weather};
use crate::client::QueryBuilder;
use crate::error::FetchError;

/// Format of the sunrise/sunset instants supplied with the weather
const SUN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Dawn and dusk extend this far either side of sunrise and sunset
const TWILIGHT_MINUTES: i64 = 30;

/// Precipitation above this amount counts as rain or snow
const PRECIPITATION_THRESHOLD: f64 = 0.5;

/// Cloud cover (percent) above which a day counts as cloudy
const CLOUDY_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Dawn,
    Day,
    Dusk,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Dawn => "dawn",
            TimeOfDay::Day => "day",
            TimeOfDay::Dusk => "dusk",
            TimeOfDay::Night => "night",
        }
    }
}

/// Whether the time of day came from real sun times or the fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Api,
    Fallback,
}

impl TimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSource::Api => "api",
            TimeSource::Fallback => "fallback",
        }
    }
}

/// Classify `now` against the day's sunrise and sunset.
///
/// Unparsable or missing sun times classify as night from the fallback source.
pub fn time_of_day(sunrise: &str, sunset: &str, now: NaiveDateTime) -> (TimeOfDay, TimeSource) {
    let parsed = (
        NaiveDateTime::parse_from_str(sunrise, SUN_TIME_FORMAT),
        NaiveDateTime::parse_from_str(sunset, SUN_TIME_FORMAT),
    );
    let (Ok(sunrise), Ok(sunset)) = parsed else {
        return (TimeOfDay::Night, TimeSource::Fallback);
    };

    let twilight = Duration::minutes(TWILIGHT_MINUTES);
    let dawn_start = sunrise - twilight;
    let dawn_end = sunrise + twilight;
    let dusk_start = sunset - twilight;
    let dusk_end = sunset + twilight;

    let tod = if now < dawn_start || now > dusk_end {
        TimeOfDay::Night
    } else if now <= dawn_end {
        TimeOfDay::Dawn
    } else if now >= dusk_start {
        TimeOfDay::Dusk
    } else {
        TimeOfDay::Day
    };

    (tod, TimeSource::Api)
}

/// Holiday query for festive periods, if `now` falls in one
pub fn festive_query(now: NaiveDateTime) -> Option<&'static str> {
    let (month, day) = (now.month(), now.day());

    if month == 12 && (20..=26).contains(&day) {
        Some("christmas")
    } else if (month == 12 && day >= 27) || (month == 1 && day <= 5) {
        Some("new year")
    } else if month == 10 && day >= 25 {
        Some("halloween")
    } else {
        None
    }
}

/// Build the photo query for the given weather at `now`.
///
/// Festive periods win when enabled. Otherwise night, dawn and dusk outrank the
/// season, and precipitation decorates whichever is chosen.
pub fn build_photo_query(weather: &Weather, festive: bool, now: NaiveDateTime) -> String {
    if festive && let Some(holiday) = festive_query(now) {
        return holiday.to_string();
    }

    let (tod, _) = time_of_day(&weather.sunrise, &weather.sunset, now);
    let season = Season::from_month(now.month());
    let has_snow = weather.snowfall > PRECIPITATION_THRESHOLD;
    let has_rain = weather.rain > PRECIPITATION_THRESHOLD;

    match tod {
        TimeOfDay::Night if has_snow => format!("{season} snowy night"),
        TimeOfDay::Night if has_rain => format!("{season} rainy night"),
        TimeOfDay::Night => format!("{season} night"),
        TimeOfDay::Dawn => format!("{season} dawn"),
        TimeOfDay::Dusk => format!("{season} dusk"),
        TimeOfDay::Day if has_snow => format!("{season} snow"),
        TimeOfDay::Day if has_rain => format!("{season} rain"),
        TimeOfDay::Day if weather.cloudcover > CLOUDY_THRESHOLD && season != Season::Winter => {
            format!("{season} cloudy")
        }
        TimeOfDay::Day => season.to_string(),
    }
}

/// Local wall-clock time, optionally frozen for tests
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTime {
    fixed: Option<NaiveDateTime>,
}

impl LocalTime {
    #[cfg(test)]
    pub fn frozen(now: NaiveDateTime) -> Self {
        Self { fixed: Some(now) }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.fixed.unwrap_or_else(|| Local::now().naive_local())
    }
}

/// Query builder driven by the local wall clock
#[derive(Debug, Default, Clone)]
pub struct SeasonalQueryBuilder {
    local: LocalTime,
}

impl SeasonalQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder frozen at `now`
    #[cfg(test)]
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            local: LocalTime::frozen(now),
        }
    }
}

#[async_trait]
impl QueryBuilder for SeasonalQueryBuilder {
    async fn build_query(&self, context: &ContextSnapshot) -> Result<String, FetchError> {
        Ok(build_photo_query(
            &context.weather,
            context.settings.photos.festive,
            self.local.now(),
        ))
    }
}
