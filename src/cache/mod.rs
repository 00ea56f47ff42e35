//! Persistent photo cache
//!
//! Holds at most one committed photo (the [`CacheEntry`]) in SQLite and at most
//! one not-yet-committed photo in the [`PrefetchBuffer`].

pub mod prefetch;
pub mod storage;
pub mod ttl;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::Artifact;
use crate::error::CacheError;

/// Timing constants for the refresh cycle
pub struct CacheTtl;

impl CacheTtl {
    /// A prefetch starts this long before the cached photo expires
    pub const PREFETCH_LEAD: Duration = Duration::from_secs(60);

    /// Scheduler period; equal to the lead so one tick falls in every prefetch window
    pub const SCHEDULER_TICK: Duration = Duration::from_secs(60);

    /// Delay between bootstrap attempts while no photo has been presented
    pub const BOOTSTRAP_RETRY: Duration = Duration::from_secs(30);

    /// Last good weather is reused this long before it is fetched again
    pub const WEATHER_MAX_AGE: Duration = Duration::from_secs(10 * 60);
}

/// The committed photo, as persisted
///
/// Serialized as `{ "photo": …, "query": …, "timestamp": <ms since epoch> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "photo")]
    pub artifact: Artifact,

    /// Query the photo was fetched for
    pub query: String,

    /// Wall-clock time of the commit, in milliseconds
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl CacheEntry {
    /// Milliseconds since the commit; a timestamp in the future counts as zero
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp_ms).max(0)
    }
}

/// Single-slot persistent store for the committed photo
pub trait CacheStore: Send + Sync {
    /// The persisted entry; unreadable or corrupt data reads as absent
    fn read(&self) -> Option<CacheEntry>;

    /// Replace whatever entry was stored before
    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError>;
}

pub use prefetch::{PrefetchBuffer, PrefetchedArtifact};
pub use storage::CacheStorage;
pub use ttl::TtlOracle;
