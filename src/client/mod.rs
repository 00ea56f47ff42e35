//! External capabilities the orchestrator depends on
//!
//! Each capability is a trait so the orchestrator can be driven by the real
//! HTTP-backed implementations in production and by [`mock`] in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{ContextSnapshot, DebugFields, DebugQuery, Weather};
use crate::error::{ContextError, DecodeError, FetchError};

pub mod companion;
#[cfg(test)]
pub mod mock;
pub mod probe;
pub mod unsplash;
pub mod weather;

pub use companion::CompanionNotifier;
pub use probe::HttpImageProbe;
pub use unsplash::UnsplashClient;
pub use weather::{OpenMeteoContext, RetryPolicy};

/// A background photo plus its attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Fully parameterized image URL
    pub url: String,

    /// Photographer name
    pub author: String,

    /// Photographer profile page
    pub author_url: String,

    /// Provider endpoint to ping when the photo is actually used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_location: Option<String>,
}

/// What the companion display is told about each presented photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentArtifact {
    pub url: String,
    pub author: String,
    pub author_url: String,
}

impl From<&Artifact> for CurrentArtifact {
    fn from(artifact: &Artifact) -> Self {
        Self {
            url: artifact.url.clone(),
            author: artifact.author.clone(),
            author_url: artifact.author_url.clone(),
        }
    }
}

/// Fetches a photo matching a query
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch one photo for `query`, sized for a `width` × `height` surface
    async fn fetch_artifact(
        &self,
        query: &str,
        width: u32,
        height: u32,
    ) -> Result<Artifact, FetchError>;

    /// Tell the provider a fetched photo is being used
    async fn track_download(&self, _artifact: &Artifact) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Supplies the weather half of the context snapshot
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Current weather, acquiring it if needed
    async fn weather(&self) -> Result<Weather, ContextError>;

    /// Last weather acquired, without any I/O
    fn last_known(&self) -> Option<Weather>;
}

/// Turns a context snapshot into a photo search query
#[async_trait]
pub trait QueryBuilder: Send + Sync {
    async fn build_query(&self, context: &ContextSnapshot) -> Result<String, FetchError>;
}

/// Decides whether a cached timestamp may still be reused
#[async_trait]
pub trait ValidityOracle: Send + Sync {
    async fn check_validity(&self, timestamp_ms: i64) -> Result<bool, FetchError>;
}

/// Composes contextual diagnostic fields
#[async_trait]
pub trait DebugInfoProvider: Send + Sync {
    async fn debug_info(&self, query: &DebugQuery) -> Result<DebugFields, FetchError>;
}

/// Best-effort side channel to a companion consumer
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, current: &CurrentArtifact) -> Result<(), FetchError>;
}

/// Waits until an image URL is fully retrievable and decodable
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn await_ready(&self, url: &str) -> Result<(), DecodeError>;
}
