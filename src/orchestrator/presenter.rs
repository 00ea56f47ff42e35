//! Puts a photo on the surface once it is ready to draw

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::surface::Surface;
use crate::client::{Artifact, CurrentArtifact, ImageProbe, Notifier};
use crate::error::DecodeError;

/// How long the attribution stays up after each new photo
pub const ATTRIBUTION_VISIBLE: Duration = Duration::from_secs(10);

/// How long to wait for an image before presenting it anyway
pub const IMAGE_READY_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Presenter {
    surface: Arc<dyn Surface>,
    probe: Arc<dyn ImageProbe>,
    notifier: Option<Arc<dyn Notifier>>,
    attribution_visible: Duration,
    ready_timeout: Duration,
    hide_timer: Mutex<Option<JoinHandle<()>>>,
    notifications: Mutex<Vec<JoinHandle<()>>>,
    current: Mutex<Option<Artifact>>,
}

impl Presenter {
    pub fn new(
        surface: Arc<dyn Surface>,
        probe: Arc<dyn ImageProbe>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            surface,
            probe,
            notifier,
            attribution_visible: ATTRIBUTION_VISIBLE,
            ready_timeout: IMAGE_READY_TIMEOUT,
            hide_timer: Mutex::new(None),
            notifications: Mutex::new(Vec::new()),
            current: Mutex::new(None),
        }
    }

    pub fn surface(&self) -> Arc<dyn Surface> {
        Arc::clone(&self.surface)
    }

    /// The photo most recently put on the surface
    pub fn current(&self) -> Option<Artifact> {
        lock(&self.current).clone()
    }

    /// Wait for the image, then show it with its attribution.
    ///
    /// A probe failure or timeout is logged and the photo is shown anyway.
    pub async fn present(&self, artifact: &Artifact) {
        match tokio::time::timeout(self.ready_timeout, self.probe.await_ready(&artifact.url)).await
        {
            Ok(Ok(())) => debug!("Image ready: {}", artifact.url),
            Ok(Err(e)) => warn!("Presenting photo anyway: {}", e),
            Err(_) => warn!(
                "Presenting photo anyway: {}",
                DecodeError::Timeout(self.ready_timeout)
            ),
        }

        self.surface.show_background(artifact);
        *lock(&self.current) = Some(artifact.clone());

        self.surface.show_attribution(artifact);
        self.schedule_attribution_hide();

        self.notify(artifact);
        info!("Presenting photo by {}", artifact.author);
    }

    /// Restart the hide timer; a pending hide from an earlier photo is cancelled
    fn schedule_attribution_hide(&self) {
        let mut timer = lock(&self.hide_timer);
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let surface = Arc::clone(&self.surface);
        let delay = self.attribution_visible;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            surface.hide_attribution();
        }));
    }

    fn notify(&self, artifact: &Artifact) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let notifier = Arc::clone(notifier);
        let current = CurrentArtifact::from(artifact);
        let handle = tokio::spawn(async move {
            if let Err(e) = notifier.notify(&current).await {
                debug!("Companion notification failed: {}", e);
            }
        });

        let mut pending = lock(&self.notifications);
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
    }

    /// Wait for companion notifications still being delivered
    pub async fn finish_notifications(&self) {
        let pending = std::mem::take(&mut *lock(&self.notifications));
        for task in pending {
            if let Err(e) = task.await {
                debug!("Companion notification task ended abnormally: {}", e);
            }
        }
    }

    /// Cancel the pending attribution hide, if any
    pub fn shutdown(&self) {
        if let Some(timer) = lock(&self.hide_timer).take() {
            timer.abort();
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
