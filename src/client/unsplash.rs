//! Unsplash photo provider client

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::Deserialize;

use super::{Artifact, ArtifactFetcher};
use crate::config::SettingsProvider;
use crate::error::FetchError;

/// Unsplash API base URL
const API_BASE_URL: &str = "https://api.unsplash.com";

/// Overrides the API base URL (for proxies and local testing)
pub const HOST_ENV: &str = "BACKDROP_UNSPLASH_HOST";

/// Demo-tier quota: 50 requests per hour
const REQUESTS_PER_HOUR: u32 = 50;

/// Used when a 429/403 carries no Retry-After
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct RandomPhoto {
    urls: PhotoUrls,
    user: PhotoUser,
    links: PhotoLinks,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
    links: UserLinks,
}

#[derive(Debug, Deserialize)]
struct UserLinks {
    html: String,
}

#[derive(Debug, Deserialize)]
struct PhotoLinks {
    #[serde(default)]
    download_location: Option<String>,
}

/// Unsplash API client
pub struct UnsplashClient {
    http: HttpClient,
    base_url: String,
    access_key: Option<String>,
    settings: Arc<dyn SettingsProvider>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl UnsplashClient {
    /// Create a client; `access_key` may be missing, in which case every fetch is unauthorized
    pub fn new(
        access_key: Option<String>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let quota = Quota::per_hour(NonZeroU32::new(REQUESTS_PER_HOUR).unwrap_or(NonZeroU32::MIN));
        let base_url = std::env::var(HOST_ENV).unwrap_or_else(|_| API_BASE_URL.to_string());

        Ok(Self {
            http,
            base_url,
            access_key,
            settings,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Point the client at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn authorization(&self) -> Result<String, FetchError> {
        let key = self.access_key.as_deref().ok_or(FetchError::Unauthorized)?;
        Ok(format!("Client-ID {}", key))
    }

    /// Map a non-success response to the matching error
    async fn error_for(response: Response) -> FetchError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                FetchError::RateLimited(Duration::from_secs(retry_after))
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                FetchError::Provider {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl ArtifactFetcher for UnsplashClient {
    async fn fetch_artifact(
        &self,
        query: &str,
        width: u32,
        height: u32,
    ) -> Result<Artifact, FetchError> {
        let authorization = self.authorization()?;
        self.rate_limiter.until_ready().await;

        let url = format!("{}/photos/random", self.base_url);
        let (w, h) = (width.to_string(), height.to_string());
        let response = self
            .http
            .get(&url)
            .query(&[
                ("orientation", "landscape"),
                ("query", query),
                ("w", w.as_str()),
                ("h", h.as_str()),
            ])
            .header("Authorization", authorization)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let photo: RandomPhoto = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse photo: {}", e)))?;

        let quality = self.settings.current().photos.quality_percent();
        let url = photo_url(
            &photo.urls.regular,
            width,
            height,
            quality,
            Utc::now().timestamp_millis(),
        );
        debug!("Unsplash photo by {} for '{}'", photo.user.name, query);

        Ok(Artifact {
            url,
            author: photo.user.name,
            author_url: photo.user.links.html,
            download_location: photo.links.download_location,
        })
    }

    async fn track_download(&self, artifact: &Artifact) -> Result<(), FetchError> {
        let Some(location) = &artifact.download_location else {
            return Ok(());
        };

        let response = self
            .http
            .get(location)
            .header("Authorization", self.authorization()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }
}

/// Size the provider's photo URL for the viewport.
///
/// Any quality parameter already on the URL is replaced; `t` busts caches
/// between photos that share a source URL.
fn photo_url(regular: &str, width: u32, height: u32, quality: u32, cache_buster: i64) -> String {
    let mut url = regular.to_string();

    if let Some(pos) = url.find("&q=") {
        match url[pos + 1..].find('&') {
            Some(end) => url.replace_range(pos..pos + end + 1, ""),
            None => url.truncate(pos),
        }
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}w={}&h={}&fit=crop&q={}&t={}",
        url, separator, width, height, quality, cache_buster
    )
}
