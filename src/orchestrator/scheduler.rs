//! Periodic driver for [`Orchestrator::tick`]

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::Orchestrator;

/// Runs one orchestrator tick per period until stopped
pub struct Scheduler {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    /// Start ticking; the first tick fires one period from now.
    ///
    /// Starting an already running scheduler restarts it.
    pub fn start(&mut self, orchestrator: Arc<Orchestrator>) {
        self.stop();

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let report = orchestrator.tick().await;
                debug!("Scheduler tick: {:?}", report);
            }
        }));
        debug!("Scheduler started ({:?} period)", period);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
