//! Periodic read-only diagnostic report

use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Orchestrator;
use super::surface::Surface;
use crate::cache::prefetch::PrefetchState;
use crate::client::DebugInfoProvider;
use crate::context::{DebugFields, DebugQuery};
use crate::output::format_time_remaining;

/// How often the report is recomposed while enabled
pub const DEBUG_CADENCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub photo_url: Option<String>,
    pub author: Option<String>,
    pub prefetch: String,
    pub next_refresh_in: String,
    pub last_validity: Option<bool>,
    pub last_error: Option<String>,
    #[serde(flatten)]
    pub context: DebugFields,
}

/// Compose one report from the orchestrator's observable state.
///
/// Never fetches, commits or touches the prefetch buffer.
pub async fn compose(
    orchestrator: &Orchestrator,
    info: &dyn DebugInfoProvider,
) -> Result<DebugReport, crate::error::FetchError> {
    let cached = orchestrator.cached();
    let now = orchestrator.now_ms();
    let diagnostics = orchestrator.diagnostics_snapshot();

    let query = DebugQuery {
        cache_timestamp: cached.as_ref().map(|e| e.timestamp_ms),
        query: cached.as_ref().map(|e| e.query.clone()),
        weather: orchestrator.last_known_weather(),
        now_ms: now,
    };
    let context = info.debug_info(&query).await?;

    let next_refresh_in = match &cached {
        Some(entry) => format_time_remaining(orchestrator.refresh_interval_ms() - entry.age_ms(now)),
        None => "n/a".to_string(),
    };
    let prefetch = match orchestrator.prefetch_state() {
        PrefetchState::Empty => "empty".to_string(),
        PrefetchState::InFlight => "in flight".to_string(),
        PrefetchState::Ready(query) => format!("ready ({query})"),
    };

    Ok(DebugReport {
        photo_url: cached.as_ref().map(|e| e.artifact.url.clone()),
        author: cached.map(|e| e.artifact.author),
        prefetch,
        next_refresh_in,
        last_validity: diagnostics.last_validity,
        last_error: diagnostics.last_error,
        context,
    })
}

/// Pushes a fresh [`DebugReport`] to the surface every second while running
pub struct DebugReporter {
    orchestrator: Arc<Orchestrator>,
    info: Arc<dyn DebugInfoProvider>,
    surface: Arc<dyn Surface>,
    handle: Option<JoinHandle<()>>,
}

impl DebugReporter {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        info: Arc<dyn DebugInfoProvider>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        Self {
            orchestrator,
            info,
            surface,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let info = Arc::clone(&self.info);
        let surface = Arc::clone(&self.surface);
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DEBUG_CADENCE);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match compose(&orchestrator, info.as_ref()).await {
                    Ok(report) => surface.show_debug(&report),
                    Err(e) => debug!("Skipping debug report: {}", e),
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebugReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
