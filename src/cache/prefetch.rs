//! One-slot buffer for a photo fetched ahead of expiry
//!
//! The slot lock doubles as the "prefetch in flight" marker: a prefetch holds
//! the lock from the moment it is reserved until it fills (or abandons) the
//! slot. A refresh that wants the prefetched photo waits on the same lock, so
//! it picks up an in-flight result instead of fetching a second photo.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::client::Artifact;

/// A fetched photo that has not been committed yet
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchedArtifact {
    pub artifact: Artifact,
    pub query: String,
}

/// Observable state of the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchState {
    Empty,
    InFlight,
    /// Holds a photo fetched for this query
    Ready(String),
}

#[derive(Clone, Default)]
pub struct PrefetchBuffer {
    slot: Arc<Mutex<Option<PrefetchedArtifact>>>,
}

impl PrefetchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new prefetch.
    ///
    /// Returns `None` when a prefetch is already in flight or a prefetched
    /// photo is still waiting to be consumed.
    pub fn reserve(&self) -> Option<PrefetchSlot> {
        let guard = self.slot.clone().try_lock_owned().ok()?;
        if guard.is_some() {
            return None;
        }
        Some(PrefetchSlot { guard })
    }

    /// Take the pending photo, waiting for an in-flight prefetch to settle first
    pub async fn take(&self) -> Option<PrefetchedArtifact> {
        self.slot.lock().await.take()
    }

    /// Current state, without waiting and without changing anything
    pub fn state(&self) -> PrefetchState {
        match self.slot.try_lock() {
            Err(_) => PrefetchState::InFlight,
            Ok(guard) => match guard.as_ref() {
                Some(p) => PrefetchState::Ready(p.query.clone()),
                None => PrefetchState::Empty,
            },
        }
    }
}

/// Exclusive claim on the empty buffer, held while a prefetch runs
pub struct PrefetchSlot {
    guard: OwnedMutexGuard<Option<PrefetchedArtifact>>,
}

impl PrefetchSlot {
    /// Store the prefetched photo and release the claim
    pub fn fill(mut self, prefetched: PrefetchedArtifact) {
        *self.guard = Some(prefetched);
    }
}
