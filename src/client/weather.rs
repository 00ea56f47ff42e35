//! Weather context from Open-Meteo, located by IP when no location is configured

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::time::Instant;

use super::ContextProvider;
use crate::cache::CacheTtl;
use crate::config::{SettingsProvider, TemperatureUnit, UnitsSettings, WindSpeedUnit};
use crate::context::{Location, Weather};
use crate::error::{ContextError, FetchError};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const LOCATE_URL: &str = "http://ip-api.com/json/";

/// Overrides the forecast endpoint (for proxies and local testing)
pub const FORECAST_ENV: &str = "BACKDROP_FORECAST_URL";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,rain,snowfall,cloudcover,wind_speed_10m";

/// Exponential backoff between attempts of a fallible operation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempts run out; the last error is returned
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.mul_f64(self.multiplier).min(self.max_backoff);
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    lat: f64,
    lon: f64,
    city: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
    daily: DailySun,
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    rain: f64,
    snowfall: f64,
    cloudcover: f64,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct DailySun {
    sunrise: Vec<String>,
    sunset: Vec<String>,
}

/// Conditions as the API reports them: °C and km/h
#[derive(Debug, Clone, PartialEq)]
struct Reading {
    temperature_c: f64,
    humidity: f64,
    wind_kmh: f64,
    cloudcover: f64,
    rain: f64,
    snowfall: f64,
    sunrise: String,
    sunset: String,
    timezone: String,
}

impl Reading {
    fn from_forecast(forecast: ForecastResponse) -> Self {
        Self {
            temperature_c: forecast.current.temperature_2m,
            humidity: forecast.current.relative_humidity_2m,
            wind_kmh: forecast.current.wind_speed_10m,
            cloudcover: forecast.current.cloudcover,
            rain: forecast.current.rain,
            snowfall: forecast.current.snowfall,
            sunrise: forecast.daily.sunrise.first().cloned().unwrap_or_default(),
            sunset: forecast.daily.sunset.first().cloned().unwrap_or_default(),
            timezone: forecast.timezone,
        }
    }

    fn in_units(&self, units: &UnitsSettings) -> Weather {
        let temperature = match units.temperature_unit {
            TemperatureUnit::Celsius => self.temperature_c,
            TemperatureUnit::Fahrenheit => self.temperature_c * 9.0 / 5.0 + 32.0,
        };
        let wind_speed = match units.wind_speed_unit {
            WindSpeedUnit::Kmh => self.wind_kmh,
            WindSpeedUnit::Mph => self.wind_kmh * 0.621371,
            WindSpeedUnit::Ms => self.wind_kmh / 3.6,
        };

        Weather {
            temperature,
            temperature_unit: units.temperature_unit,
            humidity: self.humidity,
            wind_speed,
            wind_speed_label: units.wind_speed_unit.label().to_string(),
            cloudcover: self.cloudcover,
            rain: self.rain,
            snowfall: self.snowfall,
            sunrise: self.sunrise.clone(),
            sunset: self.sunset.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    location: Option<Location>,
    reading: Option<(Reading, Instant)>,
}

/// Weather provider backed by Open-Meteo.
///
/// A reading is reused for ten minutes. When a refresh fails after all
/// retries, the last good reading is served instead of an error.
pub struct OpenMeteoContext {
    http: HttpClient,
    forecast_url: String,
    locate_url: String,
    fixed_location: Option<Location>,
    settings: Arc<dyn SettingsProvider>,
    retry: RetryPolicy,
    max_age: Duration,
    state: Mutex<State>,
}

impl OpenMeteoContext {
    pub fn new(
        location: Option<Location>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            forecast_url: std::env::var(FORECAST_ENV)
                .unwrap_or_else(|_| FORECAST_URL.to_string()),
            locate_url: LOCATE_URL.to_string(),
            fixed_location: location,
            settings,
            retry: RetryPolicy::default(),
            max_age: CacheTtl::WEATHER_MAX_AGE,
            state: Mutex::new(State::default()),
        })
    }

    pub fn with_endpoints(mut self, forecast_url: &str, locate_url: &str) -> Self {
        self.forecast_url = forecast_url.to_string();
        self.locate_url = locate_url.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fresh_reading(&self) -> Option<Reading> {
        let state = self.state();
        let (reading, fetched_at) = state.reading.as_ref()?;
        (fetched_at.elapsed() < self.max_age).then(|| reading.clone())
    }

    async fn location(&self) -> Result<Location, FetchError> {
        if let Some(location) = &self.fixed_location {
            return Ok(location.clone());
        }
        let remembered = self.state().location.clone();
        if let Some(location) = remembered {
            return Ok(location);
        }

        let response = self.http.get(&self.locate_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Provider {
                status: response.status().as_u16(),
                message: "Location lookup failed".to_string(),
            });
        }
        let data: IpApiResponse = response.json().await.map_err(|e| {
            FetchError::InvalidResponse(format!("Failed to parse location: {}", e))
        })?;

        let location = Location {
            latitude: data.lat,
            longitude: data.lon,
            city: data.city,
            country: data.country,
        };
        debug!(
            "Located at {}, {} ({})",
            location.latitude,
            location.longitude,
            location.city.as_deref().unwrap_or("unknown city")
        );
        self.state().location = Some(location.clone());
        Ok(location)
    }

    async fn acquire(&self) -> Result<Reading, FetchError> {
        let location = self.location().await?;
        let (lat, lon) = (location.latitude.to_string(), location.longitude.to_string());

        let response = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("current", CURRENT_FIELDS),
                ("daily", "sunrise,sunset"),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let forecast: ForecastResponse = response.json().await.map_err(|e| {
            FetchError::InvalidResponse(format!("Failed to parse weather: {}", e))
        })?;
        Ok(Reading::from_forecast(forecast))
    }
}

#[async_trait]
impl ContextProvider for OpenMeteoContext {
    async fn weather(&self) -> Result<Weather, ContextError> {
        let units = self.settings.current().units;
        if let Some(reading) = self.fresh_reading() {
            return Ok(reading.in_units(&units));
        }

        match self.retry.run("Weather lookup", || self.acquire()).await {
            Ok(reading) => {
                let weather = reading.in_units(&units);
                self.state().reading = Some((reading, Instant::now()));
                Ok(weather)
            }
            Err(e) => match self.last_known() {
                Some(stale) => {
                    warn!("Using last known weather: {}", e);
                    Ok(stale)
                }
                None => Err(ContextError::Unavailable(e.to_string())),
            },
        }
    }

    fn last_known(&self) -> Option<Weather> {
        let units = self.settings.current().units;
        self.state()
            .reading
            .as_ref()
            .map(|(reading, _)| reading.in_units(&units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SettingsStore};
    use mockito::Matcher;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FORECAST_JSON: &str = r#"{
        "latitude": 59.91,
        "longitude": 10.75,
        "timezone": "Europe/Oslo",
        "current": {
            "time": "2026-01-15T12:00",
            "temperature_2m": 10.0,
            "relative_humidity_2m": 70,
            "rain": 0.2,
            "snowfall": 0.0,
            "cloudcover": 90,
            "wind_speed_10m": 36.0
        },
        "daily": {
            "time": ["2026-01-15"],
            "sunrise": ["2026-01-15T09:05"],
            "sunset": ["2026-01-15T15:40"]
        }
    }"#;

    const LOCATION_JSON: &str =
        r#"{"status":"success","lat":59.91,"lon":10.75,"city":"Oslo","country":"Norway"}"#;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(5),
        }
    }

    fn oslo() -> Location {
        Location {
            latitude: 59.91,
            longitude: 10.75,
            city: Some("Oslo".to_string()),
            country: None,
        }
    }

    fn context(
        server: &mockito::Server,
        location: Option<Location>,
        settings: Settings,
    ) -> OpenMeteoContext {
        OpenMeteoContext::new(location, Arc::new(SettingsStore::fixed(settings)))
            .unwrap()
            .with_endpoints(
                &format!("{}/v1/forecast", server.url()),
                &format!("{}/json/", server.url()),
            )
            .with_retry(quick_retry())
    }

    #[test]
    fn test_unit_conversion() {
        let reading = Reading {
            temperature_c: 10.0,
            humidity: 70.0,
            wind_kmh: 36.0,
            cloudcover: 90.0,
            rain: 0.0,
            snowfall: 0.0,
            sunrise: String::new(),
            sunset: String::new(),
            timezone: "UTC".to_string(),
        };

        let metric = reading.in_units(&UnitsSettings::default());
        assert_eq!(metric.temperature, 10.0);
        assert_eq!(metric.wind_speed, 36.0);
        assert_eq!(metric.wind_speed_label, "km/h");

        let imperial = reading.in_units(&UnitsSettings {
            temperature_unit: TemperatureUnit::Fahrenheit,
            wind_speed_unit: WindSpeedUnit::Mph,
        });
        assert_eq!(imperial.temperature, 50.0);
        assert!((imperial.wind_speed - 22.369356).abs() < 1e-6);
        assert_eq!(imperial.temperature_unit, TemperatureUnit::Fahrenheit);

        let si = reading.in_units(&UnitsSettings {
            temperature_unit: TemperatureUnit::Celsius,
            wind_speed_unit: WindSpeedUnit::Ms,
        });
        assert!((si.wind_speed - 10.0).abs() < 1e-9);
        assert_eq!(si.wind_speed_label, "m/s");
    }

    #[tokio::test]
    async fn test_fixed_location_skips_lookup() {
        let mut server = mockito::Server::new_async().await;
        let forecast = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("latitude".into(), "59.91".into()),
                Matcher::UrlEncoded("longitude".into(), "10.75".into()),
                Matcher::UrlEncoded("timezone".into(), "auto".into()),
            ]))
            .with_status(200)
            .with_body(FORECAST_JSON)
            .create_async()
            .await;
        let locate = server
            .mock("GET", "/json/")
            .expect(0)
            .create_async()
            .await;

        let weather = context(&server, Some(oslo()), Settings::default())
            .weather()
            .await
            .unwrap();

        forecast.assert_async().await;
        locate.assert_async().await;
        assert_eq!(weather.temperature, 10.0);
        assert_eq!(weather.sunrise, "2026-01-15T09:05");
        assert_eq!(weather.sunset, "2026-01-15T15:40");
        assert_eq!(weather.timezone, "Europe/Oslo");
    }

    #[tokio::test]
    async fn test_location_is_looked_up_once() {
        let mut server = mockito::Server::new_async().await;
        let forecast = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORECAST_JSON)
            .expect(2)
            .create_async()
            .await;
        let locate = server
            .mock("GET", "/json/")
            .with_status(200)
            .with_body(LOCATION_JSON)
            .expect(1)
            .create_async()
            .await;
        let context = context(&server, None, Settings::default()).with_max_age(Duration::ZERO);

        context.weather().await.unwrap();
        context.weather().await.unwrap();

        forecast.assert_async().await;
        locate.assert_async().await;
    }

    #[tokio::test]
    async fn test_reading_is_reused_within_max_age() {
        let mut server = mockito::Server::new_async().await;
        let forecast = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORECAST_JSON)
            .expect(1)
            .create_async()
            .await;

        let context = context(&server, Some(oslo()), Settings::default());
        let first = context.weather().await.unwrap();
        let second = context.weather().await.unwrap();

        forecast.assert_async().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failure_without_reading_is_unavailable_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let forecast = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("upstream down")
            .expect(3)
            .create_async()
            .await;

        let context = context(&server, Some(oslo()), Settings::default());
        let result = context.weather().await;

        forecast.assert_async().await;
        assert!(matches!(result, Err(ContextError::Unavailable(_))));
        assert!(context.last_known().is_none());
    }

    #[tokio::test]
    async fn test_failure_serves_last_known_reading() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORECAST_JSON)
            .create_async()
            .await;
        let context = context(&server, Some(oslo()), Settings::default())
            .with_max_age(Duration::ZERO);
        let good = context.weather().await.unwrap();

        ok.remove_async().await;
        let _down = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        assert_eq!(context.weather().await.unwrap(), good);
    }

    #[tokio::test]
    async fn test_last_known_follows_unit_changes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORECAST_JSON)
            .create_async()
            .await;
        let settings = Arc::new(SettingsStore::fixed(Settings::default()));
        let context = OpenMeteoContext::new(Some(oslo()), settings.clone())
            .unwrap()
            .with_endpoints(&format!("{}/v1/forecast", server.url()), "unused");
        context.weather().await.unwrap();

        let mut fahrenheit = Settings::default();
        fahrenheit.units.temperature_unit = TemperatureUnit::Fahrenheit;
        settings.set(fahrenheit);

        assert_eq!(context.last_known().unwrap().temperature, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backs_off_exponentially() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let result: Result<u32, String> = policy
            .run("flaky", || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_with_last_error() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let policy = RetryPolicy {
            attempts: 4,
            initial_backoff: Duration::from_secs(20),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        };
        let started = Instant::now();

        let result: Result<(), String> = policy
            .run("doomed", || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n}"))
            })
            .await;

        assert_eq!(result, Err("attempt 4".to_string()));
        // 20s, then capped at 30s twice
        assert!(started.elapsed() >= Duration::from_secs(80));
    }
}
