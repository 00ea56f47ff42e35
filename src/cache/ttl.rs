//! Age-based validity oracle

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::ValidityOracle;
use crate::config::SettingsProvider;
use crate::error::FetchError;
use crate::orchestrator::Clock;

/// A cached photo is valid while its age is below the refresh interval plus slack
pub struct TtlOracle {
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    slack_ms: i64,
}

impl TtlOracle {
    pub fn new(settings: Arc<dyn SettingsProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            slack_ms: 0,
        }
    }

    /// Extend validity past the refresh interval by `slack_ms`
    pub fn with_slack_ms(mut self, slack_ms: i64) -> Self {
        self.slack_ms = slack_ms;
        self
    }

    /// Pure validity rule, shared with status output
    pub fn is_valid_at(timestamp_ms: i64, now_ms: i64, ttl_ms: i64, slack_ms: i64) -> bool {
        let age = now_ms.saturating_sub(timestamp_ms).max(0);
        age < ttl_ms.saturating_add(slack_ms)
    }
}

#[async_trait]
impl ValidityOracle for TtlOracle {
    async fn check_validity(&self, timestamp_ms: i64) -> Result<bool, FetchError> {
        let ttl_ms = self.settings.current().photos.refresh_interval_ms();
        Ok(Self::is_valid_at(
            timestamp_ms,
            self.clock.now_ms(),
            ttl_ms,
            self.slack_ms,
        ))
    }
}
