//! Notifies a companion display of the photo being shown

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::{CurrentArtifact, Notifier};
use crate::error::FetchError;

/// Companion requests give up after this long
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CompanionNotifier {
    http: HttpClient,
    endpoint: String,
}

impl CompanionNotifier {
    /// Notifier posting to `<base_url>/api/photo/current`
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/photo/current", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Notifier for CompanionNotifier {
    async fn notify(&self, current: &CurrentArtifact) -> Result<(), FetchError> {
        let response = self.http.post(&self.endpoint).json(current).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Provider {
                status: status.as_u16(),
                message: format!("Companion rejected notification: {}", status),
            });
        }
        Ok(())
    }
}
