//! Image readiness probe: download the image and check it decodes

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;

use super::ImageProbe;
use crate::error::DecodeError;

/// Downloads the full image and reads its dimensions from the header
pub struct HttpImageProbe {
    http: HttpClient,
}

impl HttpImageProbe {
    pub fn new() -> Result<Self, DecodeError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DecodeError::Download(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn await_ready(&self, url: &str) -> Result<(), DecodeError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DecodeError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecodeError::Download(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DecodeError::Download(e.to_string()))?;
        let size =
            imagesize::blob_size(&bytes).map_err(|e| DecodeError::NotAnImage(e.to_string()))?;

        debug!(
            "Image ready: {}x{} ({} bytes)",
            size.width,
            size.height,
            bytes.len()
        );
        Ok(())
    }
}
