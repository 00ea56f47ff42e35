//! Display surfaces the presenter draws on

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::debug::DebugReport;
use crate::client::{Artifact, CurrentArtifact};

/// File name of the state snapshot inside the cache directory
pub const STATE_FILE: &str = "current.json";

/// Where photos, attribution and the debug report end up
pub trait Surface: Send + Sync {
    fn show_background(&self, artifact: &Artifact);

    fn show_attribution(&self, artifact: &Artifact);

    fn hide_attribution(&self);

    fn show_debug(&self, _report: &DebugReport) {}
}

/// What an external renderer needs to draw the current state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceState {
    pub background: Option<CurrentArtifact>,
    pub attribution_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Surface that mirrors its state into a JSON file for a renderer to pick up
pub struct StateFileSurface {
    path: PathBuf,
    state: Mutex<SurfaceState>,
}

impl StateFileSurface {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(SurfaceState::default()),
        }
    }

    /// Surface writing `current.json` into `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back a state file written by a running daemon
    pub fn load(path: &Path) -> Option<SurfaceState> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn snapshot(&self) -> SurfaceState {
        self.update(|_| {})
    }

    fn update(&self, change: impl FnOnce(&mut SurfaceState)) -> SurfaceState {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        change(&mut state);
        state.clone()
    }

    fn persist(&self, state: &SurfaceState) {
        let json = match serde_json::to_string_pretty(state) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize surface state: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }

    fn apply(&self, change: impl FnOnce(&mut SurfaceState)) {
        let state = self.update(|state| {
            change(state);
            state.updated_at = Some(Utc::now());
        });
        self.persist(&state);
    }
}

impl Surface for StateFileSurface {
    fn show_background(&self, artifact: &Artifact) {
        self.apply(|state| state.background = Some(CurrentArtifact::from(artifact)));
    }

    fn show_attribution(&self, _artifact: &Artifact) {
        self.apply(|state| state.attribution_visible = true);
    }

    fn hide_attribution(&self) {
        self.apply(|state| state.attribution_visible = false);
    }

    fn show_debug(&self, report: &DebugReport) {
        match serde_json::to_value(report) {
            Ok(value) => self.apply(|state| state.debug = Some(value)),
            Err(e) => warn!("Failed to serialize debug report: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact() -> Artifact {
        Artifact {
            url: "https://images.example/fjord.jpg".to_string(),
            author: "Solveig".to_string(),
            author_url: "https://example.com/@solveig".to_string(),
            download_location: Some("https://api.example/dl/fjord".to_string()),
        }
    }

    #[test]
    fn test_state_file_follows_surface_calls() {
        let dir = TempDir::new().unwrap();
        let surface = StateFileSurface::in_dir(dir.path());

        surface.show_background(&artifact());
        surface.show_attribution(&artifact());
        let state = StateFileSurface::load(surface.path()).unwrap();
        assert_eq!(
            state.background.unwrap().url,
            "https://images.example/fjord.jpg"
        );
        assert!(state.attribution_visible);
        assert!(state.updated_at.is_some());

        surface.hide_attribution();
        let state = StateFileSurface::load(surface.path()).unwrap();
        assert!(!state.attribution_visible);
        assert!(state.background.is_some());
    }

    #[test]
    fn test_missing_state_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(StateFileSurface::load(&dir.path().join(STATE_FILE)).is_none());
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let surface = StateFileSurface::new(dir.path().join("missing").join(STATE_FILE));

        surface.show_background(&artifact());

        assert!(surface.snapshot().background.is_some());
    }
}
