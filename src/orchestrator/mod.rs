//! Refresh orchestration for the single cached background photo
//!
//! The [`Orchestrator`] decides, on every scheduler tick or trigger, whether to
//! reuse the cached photo, prefetch the next one, or replace it now. It owns the
//! prefetch buffer and the "refresh in flight" guard; everything it talks to
//! (cache store, context, query builder, fetcher, validity oracle, display
//! surface) is injected.

pub mod clock;
pub mod debug;
pub mod events;
pub mod presenter;
pub mod scheduler;
pub mod surface;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::cache::prefetch::{PrefetchSlot, PrefetchState};
use crate::cache::{CacheEntry, CacheStore, CacheTtl, PrefetchBuffer, PrefetchedArtifact};
use crate::client::{Artifact, ArtifactFetcher, ContextProvider, QueryBuilder, ValidityOracle};
use crate::config::{SettingsProvider, Viewport};
use crate::context::{ContextSnapshot, Weather};
use crate::error::FetchError;

pub use clock::{Clock, SystemClock};
pub use debug::{DebugReport, DebugReporter};
pub use events::{Subscription, Triggers};
pub use presenter::Presenter;
pub use scheduler::Scheduler;
pub use surface::{StateFileSurface, Surface};

/// Everything the orchestrator reads from or calls out to
pub struct Capabilities {
    pub store: Arc<dyn CacheStore>,
    pub settings: Arc<dyn SettingsProvider>,
    pub context: Arc<dyn ContextProvider>,
    pub queries: Arc<dyn QueryBuilder>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub oracle: Arc<dyn ValidityOracle>,
    pub clock: Arc<dyn Clock>,
}

/// How much of the refresh policy a refresh may short-circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Caller-initiated: reuse a valid cached photo, else a prefetched one, else fetch
    Normal,
    /// The cached photo expired: take a prefetched photo, else fetch
    Expired,
    /// Force refresh: always fetch a new photo
    Bypass,
}

/// What a refresh ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The valid cached photo was presented again
    Reused,
    /// The prefetched photo was committed and presented
    ConsumedPrefetch,
    /// A new photo was fetched, committed and presented
    Fetched,
    /// The fetch failed, or there was no context to fetch with; the stale
    /// cached photo was presented
    FellBack,
    /// The fetch failed and there was nothing to fall back to
    Failed,
    /// No weather context yet; nothing new was shown
    NoContext,
    /// A newer photo was committed while this one was in flight
    Superseded,
    /// Another refresh was already running
    Dropped,
}

impl RefreshOutcome {
    /// Whether a photo is on the surface after this refresh
    pub fn presented(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Reused
                | RefreshOutcome::ConsumedPrefetch
                | RefreshOutcome::Fetched
                | RefreshOutcome::FellBack
                | RefreshOutcome::Superseded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Reused => "reused",
            RefreshOutcome::ConsumedPrefetch => "consumed_prefetch",
            RefreshOutcome::Fetched => "fetched",
            RefreshOutcome::FellBack => "fell_back",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::NoContext => "no_context",
            RefreshOutcome::Superseded => "superseded",
            RefreshOutcome::Dropped => "dropped",
        }
    }
}

/// What one scheduler tick decided
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub cache_present: bool,
    pub prefetch_started: bool,
    pub forced: Option<RefreshOutcome>,
}

/// Observations kept for the debug report
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub last_error: Option<String>,
    pub last_validity: Option<bool>,
}

pub struct Orchestrator {
    caps: Capabilities,
    presenter: Presenter,
    viewport: Viewport,
    prefetch: PrefetchBuffer,
    refreshing: AtomicBool,
    diagnostics: Mutex<Diagnostics>,
    downloads: Mutex<Vec<JoinHandle<()>>>,
}

/// Clears the in-flight flag when a refresh finishes or is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(caps: Capabilities, presenter: Presenter, viewport: Viewport) -> Self {
        Self {
            caps,
            presenter,
            viewport,
            prefetch: PrefetchBuffer::new(),
            refreshing: AtomicBool::new(false),
            diagnostics: Mutex::new(Diagnostics::default()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// One scheduler decision: nothing, prefetch, or forced refresh.
    ///
    /// The age-window prefetch only starts while the oracle reports the cached
    /// photo valid, so an oracle that expires entries early skips prefetch.
    ///
    /// A prefetch runs in the background. When the oracle rejects the cached
    /// photo the forced refresh runs inline and takes any prefetched photo, so
    /// an expired tick never starts a second fetch next to it.
    pub async fn tick(self: &Arc<Self>) -> TickReport {
        let Some(cached) = self.caps.store.read() else {
            debug!("Tick: no cached photo yet");
            return TickReport::default();
        };

        let now = self.caps.clock.now_ms();
        let ttl = self.refresh_interval_ms();
        let age = cached.age_ms(now);
        let threshold = ttl - CacheTtl::PREFETCH_LEAD.as_millis() as i64;
        let in_prefetch_window = age >= threshold && age < ttl;

        let valid = self.check_validity(cached.timestamp_ms).await;
        let mut report = TickReport {
            cache_present: true,
            ..TickReport::default()
        };

        if valid {
            if in_prefetch_window && let Some(slot) = self.prefetch.reserve() {
                report.prefetch_started = true;
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_prefetch(slot).await });
            }
        } else {
            report.forced = Some(self.refresh(RefreshMode::Expired).await);
        }

        debug!(
            "Tick: age {}s of {}s, valid {}, prefetch started {}, forced {:?}",
            age / 1000,
            ttl / 1000,
            valid,
            report.prefetch_started,
            report.forced
        );
        report
    }

    /// Fetch the next photo into the prefetch buffer, if it is free.
    ///
    /// Returns whether a prefetch was attempted.
    pub async fn prefetch(&self) -> bool {
        match self.prefetch.reserve() {
            Some(slot) => {
                self.run_prefetch(slot).await;
                true
            }
            None => false,
        }
    }

    async fn run_prefetch(&self, slot: PrefetchSlot) {
        let Some(context) = self.snapshot().await else {
            debug!("Prefetch skipped: context unavailable");
            return;
        };

        match self.fetch_for(&context).await {
            Ok((artifact, query)) => {
                info!("Prefetched next photo for '{}'", query);
                slot.fill(PrefetchedArtifact { artifact, query });
            }
            Err(e) => {
                warn!("Prefetch failed: {}", e);
                self.record_error(&e);
            }
        }
    }

    /// Refresh the displayed photo.
    ///
    /// Only one refresh runs at a time; a refresh triggered while another is in
    /// flight is dropped rather than queued.
    pub async fn refresh(&self, mode: RefreshMode) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Refresh ({:?}) dropped: another refresh is in flight", mode);
            return RefreshOutcome::Dropped;
        }
        let _in_flight = InFlight(&self.refreshing);

        let outcome = self.refresh_exclusive(mode).await;
        debug!("Refresh ({:?}) finished: {:?}", mode, outcome);
        outcome
    }

    async fn refresh_exclusive(&self, mode: RefreshMode) -> RefreshOutcome {
        let cached = self.caps.store.read();

        if mode == RefreshMode::Normal
            && let Some(entry) = &cached
            && self.check_validity(entry.timestamp_ms).await
        {
            self.presenter.present(&entry.artifact).await;
            return RefreshOutcome::Reused;
        }

        if mode != RefreshMode::Bypass
            && let Some(prefetched) = self.prefetch.take().await
        {
            return self
                .commit(
                    prefetched.artifact,
                    prefetched.query,
                    cached.as_ref(),
                    RefreshOutcome::ConsumedPrefetch,
                )
                .await;
        }

        let Some(context) = self.snapshot().await else {
            debug!("Refresh deferred: context unavailable");
            if let Some(entry) = &cached
                && self.presenter.current().is_none()
            {
                info!("No context yet, showing previous photo by {}", entry.artifact.author);
                self.presenter.present(&entry.artifact).await;
                return RefreshOutcome::FellBack;
            }
            return RefreshOutcome::NoContext;
        };

        match self.fetch_for(&context).await {
            Ok((artifact, query)) => {
                self.commit(artifact, query, cached.as_ref(), RefreshOutcome::Fetched)
                    .await
            }
            Err(e) => {
                warn!("Photo fetch failed: {}", e);
                self.record_error(&e);
                match cached {
                    Some(entry) => {
                        info!("Keeping previous photo by {}", entry.artifact.author);
                        self.presenter.present(&entry.artifact).await;
                        RefreshOutcome::FellBack
                    }
                    None => RefreshOutcome::Failed,
                }
            }
        }
    }

    /// Retry a normal refresh until a photo is on the surface.
    pub async fn bootstrap(&self, retry: Duration) -> RefreshOutcome {
        loop {
            let outcome = self.refresh(RefreshMode::Normal).await;
            if outcome.presented() {
                return outcome;
            }
            debug!(
                "Bootstrap attempt ended with {:?}; retrying in {:?}",
                outcome, retry
            );
            tokio::time::sleep(retry).await;
        }
    }

    /// Persist a new photo and put it on the surface.
    ///
    /// `observed` is the entry the refresh started from; if the store moved on
    /// since then a newer commit won and this one is discarded.
    async fn commit(
        &self,
        artifact: Artifact,
        query: String,
        observed: Option<&CacheEntry>,
        outcome: RefreshOutcome,
    ) -> RefreshOutcome {
        let current = self.caps.store.read();
        if current.as_ref() != observed {
            info!("Discarding photo for '{}': a newer photo was committed", query);
            return RefreshOutcome::Superseded;
        }

        let floor = current.map(|e| e.timestamp_ms).unwrap_or(i64::MIN);
        let entry = CacheEntry {
            artifact,
            query,
            timestamp_ms: self.caps.clock.now_ms().max(floor),
        };

        if let Err(e) = self.caps.store.write(&entry) {
            warn!("Failed to persist photo cache: {}", e);
        }
        self.diagnostics().last_error = None;
        info!("Committed photo for '{}' by {}", entry.query, entry.artifact.author);

        self.presenter.present(&entry.artifact).await;
        self.track_download(entry.artifact);
        outcome
    }

    fn track_download(&self, artifact: Artifact) {
        let fetcher = Arc::clone(&self.caps.fetcher);
        let handle = tokio::spawn(async move {
            if let Err(e) = fetcher.track_download(&artifact).await {
                debug!("Download tracking failed: {}", e);
            }
        });

        let mut downloads = lock(&self.downloads);
        downloads.retain(|task| !task.is_finished());
        downloads.push(handle);
    }

    /// Wait for download tracking and companion notifications still in flight.
    ///
    /// One-shot callers run this before the runtime goes away.
    pub async fn finish_background_work(&self) {
        let downloads = std::mem::take(&mut *lock(&self.downloads));
        for task in downloads {
            if let Err(e) = task.await {
                debug!("Download tracking task ended abnormally: {}", e);
            }
        }
        self.presenter.finish_notifications().await;
    }

    async fn snapshot(&self) -> Option<ContextSnapshot> {
        match self.caps.context.weather().await {
            Ok(weather) => Some(ContextSnapshot {
                weather,
                settings: self.caps.settings.current(),
            }),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    async fn fetch_for(
        &self,
        context: &ContextSnapshot,
    ) -> Result<(Artifact, String), FetchError> {
        let query = self.caps.queries.build_query(context).await?;
        debug!("Fetching photo for '{}'", query);
        let artifact = self
            .caps
            .fetcher
            .fetch_artifact(&query, self.viewport.width, self.viewport.height)
            .await?;
        Ok((artifact, query))
    }

    /// Ask the oracle; an oracle error counts as invalid
    async fn check_validity(&self, timestamp_ms: i64) -> bool {
        let valid = match self.caps.oracle.check_validity(timestamp_ms).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Validity check failed, treating cache as expired: {}", e);
                false
            }
        };
        self.diagnostics().last_validity = Some(valid);
        valid
    }

    fn record_error(&self, error: &FetchError) {
        self.diagnostics().last_error = Some(error.to_string());
    }

    fn diagnostics(&self) -> MutexGuard<'_, Diagnostics> {
        lock(&self.diagnostics)
    }

    /// Refresh interval currently in effect, in milliseconds
    pub fn refresh_interval_ms(&self) -> i64 {
        self.caps.settings.current().photos.refresh_interval_ms()
    }

    /// Snapshot of the diagnostics, for read-only reporting
    pub fn diagnostics_snapshot(&self) -> Diagnostics {
        self.diagnostics().clone()
    }

    /// The persisted entry, for read-only reporting
    pub fn cached(&self) -> Option<CacheEntry> {
        self.caps.store.read()
    }

    pub fn prefetch_state(&self) -> PrefetchState {
        self.prefetch.state()
    }

    pub fn last_known_weather(&self) -> Option<Weather> {
        self.caps.context.last_known()
    }

    pub fn now_ms(&self) -> i64 {
        self.caps.clock.now_ms()
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Orchestrator wired to in-memory mocks

    use super::*;
    use crate::cache::{CacheStorage, TtlOracle};
    use crate::client::mock::{
        MockContext, MockFetcher, MockProbe, MockQueryBuilder, MockSurface,
    };
    use crate::config::{Settings, SettingsStore};
    use crate::orchestrator::clock::ManualClock;
    use tempfile::TempDir;

    pub const MINUTE: i64 = 60_000;
    pub const START: i64 = 1_800_000_000_000;

    pub struct Harness {
        pub orchestrator: Arc<Orchestrator>,
        pub store: Arc<CacheStorage>,
        pub settings: Arc<SettingsStore>,
        pub context: Arc<MockContext>,
        pub fetcher: Arc<MockFetcher>,
        pub surface: Arc<MockSurface>,
        pub clock: Arc<ManualClock>,
        _dir: TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_oracle(None)
        }

        pub fn with_oracle(oracle: Option<Arc<dyn ValidityOracle>>) -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(CacheStorage::open_at(dir.path()).unwrap());
            let settings = Arc::new(SettingsStore::fixed(Settings::default()));
            let context = Arc::new(MockContext::available());
            let fetcher = Arc::new(MockFetcher::new());
            let surface = Arc::new(MockSurface::new());
            let clock = Arc::new(ManualClock::at(START));
            let oracle: Arc<dyn ValidityOracle> = match oracle {
                Some(oracle) => oracle,
                None => Arc::new(TtlOracle::new(settings.clone(), clock.clone())),
            };

            let presenter = Presenter::new(surface.clone(), Arc::new(MockProbe::ready()), None);
            let caps = Capabilities {
                store: store.clone(),
                settings: settings.clone(),
                context: context.clone(),
                queries: Arc::new(MockQueryBuilder::new("winter night")),
                fetcher: fetcher.clone(),
                oracle,
                clock: clock.clone(),
            };

            Self {
                orchestrator: Arc::new(Orchestrator::new(caps, presenter, Viewport::default())),
                store,
                settings,
                context,
                fetcher,
                surface,
                clock,
                _dir: dir,
            }
        }

        /// Store an entry committed `age_ms` before now
        pub fn seed_cache(&self, url: &str, age_ms: i64) -> CacheEntry {
            let entry = CacheEntry {
                artifact: Artifact {
                    url: url.to_string(),
                    author: "Seeded".to_string(),
                    author_url: "https://example.com/@seeded".to_string(),
                    download_location: None,
                },
                query: "seeded".to_string(),
                timestamp_ms: self.clock.now_ms() - age_ms,
            };
            self.store.write(&entry).unwrap();
            entry
        }

        /// Let spawned tasks run until `done` holds
        pub async fn settle(&self, done: impl Fn() -> bool) {
            for _ in 0..1000 {
                if done() {
                    return;
                }
                tokio::task::yield_now().await;
            }
            panic!("condition never held");
        }
    }
}
