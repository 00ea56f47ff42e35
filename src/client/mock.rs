//! In-memory capability mocks for testing
//!
//! Each mock counts its calls and can be told to fail, so orchestrator tests
//! can drive every branch without the network. Accessors are synchronous so
//! they can be polled from inside test closures.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{
    Artifact, ArtifactFetcher, ContextProvider, CurrentArtifact, DebugInfoProvider, ImageProbe,
    Notifier, QueryBuilder, ValidityOracle,
};
use crate::context::{ContextSnapshot, DebugFields, DebugQuery, Weather, sample_weather};
use crate::error::{ContextError, DecodeError, FetchError};
use crate::orchestrator::debug::DebugReport;
use crate::orchestrator::surface::Surface;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Fetcher that hands out numbered photos
#[derive(Default)]
pub struct MockFetcher {
    /// Error returned by every fetch until `recover`
    error: Mutex<Option<FetchError>>,
    /// While set, fetches block after being counted
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: AtomicUsize,
    tracked: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every fetch with `error` until [`MockFetcher::recover`]
    pub fn fail_with(&self, error: FetchError) {
        *lock(&self.error) = Some(error);
    }

    pub fn recover(&self) {
        *lock(&self.error) = None;
    }

    /// Hold fetches in flight until [`MockFetcher::release`]
    pub fn hold(&self) {
        *lock(&self.gate) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.close();
        }
    }

    /// Fetches started, including failed and held ones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Download-tracking pings received
    pub fn tracked(&self) -> usize {
        self.tracked.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl ArtifactFetcher for MockFetcher {
    async fn fetch_artifact(
        &self,
        query: &str,
        width: u32,
        height: u32,
    ) -> Result<Artifact, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.queries).push(query.to_string());

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            // Closed on release; the error just means "go"
            let _ = gate.acquire().await;
        }

        if let Some(error) = lock(&self.error).clone() {
            return Err(error);
        }

        Ok(Artifact {
            url: format!(
                "https://images.example/{}-{}.jpg?w={}&h={}",
                n,
                query.replace(' ', "-"),
                width,
                height
            ),
            author: format!("Photographer {n}"),
            author_url: format!("https://example.com/@photographer{n}"),
            download_location: Some(format!("https://api.example/photos/{n}/download")),
        })
    }

    async fn track_download(&self, _artifact: &Artifact) -> Result<(), FetchError> {
        self.tracked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Context provider whose weather can be switched on and off
pub struct MockContext {
    weather: Mutex<Option<Weather>>,
    calls: AtomicUsize,
}

impl MockContext {
    pub fn available() -> Self {
        Self {
            weather: Mutex::new(Some(sample_weather())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self) {
        *lock(&self.weather) = Some(sample_weather());
    }

    pub fn set_unavailable(&self) {
        *lock(&self.weather) = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextProvider for MockContext {
    async fn weather(&self) -> Result<Weather, ContextError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.weather)
            .clone()
            .ok_or_else(|| ContextError::Unavailable("mock weather switched off".to_string()))
    }

    fn last_known(&self) -> Option<Weather> {
        lock(&self.weather).clone()
    }
}

/// Query builder that always answers the same query
pub struct MockQueryBuilder {
    query: String,
}

impl MockQueryBuilder {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
        }
    }
}

#[async_trait]
impl QueryBuilder for MockQueryBuilder {
    async fn build_query(&self, _context: &ContextSnapshot) -> Result<String, FetchError> {
        Ok(self.query.clone())
    }
}

/// Oracle with a fixed answer, or a fixed error
pub struct ScriptedOracle {
    answer: Option<bool>,
}

impl ScriptedOracle {
    pub fn answering(valid: bool) -> Self {
        Self {
            answer: Some(valid),
        }
    }

    pub fn failing() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl ValidityOracle for ScriptedOracle {
    async fn check_validity(&self, _timestamp_ms: i64) -> Result<bool, FetchError> {
        self.answer
            .ok_or_else(|| FetchError::Network("oracle unreachable".to_string()))
    }
}

enum ProbeBehavior {
    Ready,
    Delayed(Duration),
    Broken,
}

pub struct MockProbe {
    behavior: ProbeBehavior,
}

impl MockProbe {
    pub fn ready() -> Self {
        Self {
            behavior: ProbeBehavior::Ready,
        }
    }

    /// Ready after `delay` of (tokio) time
    pub fn delayed(delay: Duration) -> Self {
        Self {
            behavior: ProbeBehavior::Delayed(delay),
        }
    }

    pub fn broken() -> Self {
        Self {
            behavior: ProbeBehavior::Broken,
        }
    }
}

#[async_trait]
impl ImageProbe for MockProbe {
    async fn await_ready(&self, _url: &str) -> Result<(), DecodeError> {
        match self.behavior {
            ProbeBehavior::Ready => Ok(()),
            ProbeBehavior::Delayed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            ProbeBehavior::Broken => Err(DecodeError::NotAnImage("mock".to_string())),
        }
    }
}

/// Notifier that records what it was told
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<CurrentArtifact>>,
    error: Mutex<Option<FetchError>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every notification with `error`
    pub fn fail_with(&self, error: FetchError) {
        *lock(&self.error) = Some(error);
    }

    pub fn sent(&self) -> Vec<CurrentArtifact> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, current: &CurrentArtifact) -> Result<(), FetchError> {
        if let Some(error) = lock(&self.error).clone() {
            return Err(error);
        }
        lock(&self.sent).push(current.clone());
        Ok(())
    }
}

/// Debug-info provider echoing its inputs
#[derive(Default)]
pub struct MockDebugInfo {
    /// Error to return - consumed on first use
    error: Mutex<Option<FetchError>>,
}

impl MockDebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: FetchError) {
        *lock(&self.error) = Some(error);
    }
}

#[async_trait]
impl DebugInfoProvider for MockDebugInfo {
    async fn debug_info(&self, query: &DebugQuery) -> Result<DebugFields, FetchError> {
        if let Some(error) = lock(&self.error).take() {
            return Err(error);
        }

        let na = || "n/a".to_string();
        Ok(DebugFields {
            photo_age: query
                .cache_timestamp
                .map(|ts| format!("{}ms", query.now_ms - ts))
                .unwrap_or_else(na),
            query: query.query.clone().unwrap_or_else(na),
            time_source: "api".to_string(),
            time_of_day: "day".to_string(),
            season: "winter".to_string(),
            holiday: "none".to_string(),
            api_key_status: "Available".to_string(),
            api_key_source: "Config file".to_string(),
            temperature: na(),
            rain: na(),
            snowfall: na(),
            cloudcover: na(),
        })
    }
}

/// One call made on a [`MockSurface`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Background(String),
    AttributionShown(String),
    AttributionHidden,
    Debug,
}

/// Surface that records every call in order
#[derive(Default)]
pub struct MockSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        lock(&self.events).clone()
    }

    /// URLs shown as background, in order
    pub fn backgrounds(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Background(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: SurfaceEvent) {
        lock(&self.events).push(event);
    }
}

impl Surface for MockSurface {
    fn show_background(&self, artifact: &Artifact) {
        self.record(SurfaceEvent::Background(artifact.url.clone()));
    }

    fn show_attribution(&self, artifact: &Artifact) {
        self.record(SurfaceEvent::AttributionShown(artifact.author.clone()));
    }

    fn hide_attribution(&self) {
        self.record(SurfaceEvent::AttributionHidden);
    }

    fn show_debug(&self, _report: &DebugReport) {
        self.record(SurfaceEvent::Debug);
    }
}
