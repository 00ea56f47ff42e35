//! Settings-changed and force-refresh triggers
//!
//! Triggers are fire-and-forget. Each channel holds at most one pending
//! event, so a burst of identical triggers collapses into one.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Orchestrator, RefreshMode};
use crate::config::SettingsProvider;

/// Sending half, cloned into signal handlers and other producers
#[derive(Clone)]
pub struct Triggers {
    settings_changed: mpsc::Sender<()>,
    force_refresh: mpsc::Sender<()>,
}

/// Receiving half, consumed by [`Listener::subscribe`]
pub struct Listener {
    settings_changed: mpsc::Receiver<()>,
    force_refresh: mpsc::Receiver<()>,
}

/// Create a connected trigger/listener pair
pub fn channel() -> (Triggers, Listener) {
    let (settings_tx, settings_rx) = mpsc::channel(1);
    let (force_tx, force_rx) = mpsc::channel(1);
    (
        Triggers {
            settings_changed: settings_tx,
            force_refresh: force_tx,
        },
        Listener {
            settings_changed: settings_rx,
            force_refresh: force_rx,
        },
    )
}

impl Triggers {
    /// Returns false when the event was coalesced into a pending one or nobody listens
    pub fn settings_changed(&self) -> bool {
        self.settings_changed.try_send(()).is_ok()
    }

    /// Returns false when the event was coalesced into a pending one or nobody listens
    pub fn force_refresh(&self) -> bool {
        self.force_refresh.try_send(()).is_ok()
    }
}

impl Listener {
    /// Route triggers to the orchestrator until the subscription is dropped.
    ///
    /// Settings changes reload settings and re-run the scheduler decision so a
    /// new interval takes effect at once. Force refresh bypasses cache and
    /// prefetch.
    pub fn subscribe(
        mut self,
        orchestrator: Arc<Orchestrator>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Subscription {
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = self.settings_changed.recv() => {
                        info!("Settings changed");
                        if let Err(e) = settings.reload() {
                            warn!("Keeping previous settings: {}", e);
                        }
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            let report = orchestrator.tick().await;
                            debug!("Tick after settings change: {:?}", report);
                        });
                    }
                    Some(()) = self.force_refresh.recv() => {
                        info!("Force refresh requested");
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            let outcome = orchestrator.refresh(RefreshMode::Bypass).await;
                            debug!("Force refresh finished: {:?}", outcome);
                        });
                    }
                    else => break,
                }
            }
        });
        Subscription { handle }
    }
}

/// Live trigger routing; dropping it stops delivery
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
