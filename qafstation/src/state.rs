//! Persisted station position.
//!
//! The resume point is two scalars, the stored track index and the
//! reciter name, kept in a small versioned JSON file. Loading is
//! deliberately lenient: a missing, corrupt or future-version file
//! falls back to defaults so a bad disk never blocks startup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::scheduler::StationHandle;
use crate::track::TrackIndex;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    track: u16,
    reciter: String,
    saved_at: DateTime<Utc>,
}

/// Resume position restored at startup and checkpointed while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationState {
    pub track: TrackIndex,
    pub reciter: String,
}

impl StationState {
    /// Fresh state at the first track with the given reciter.
    pub fn initial(default_reciter: &str) -> Self {
        Self {
            track: TrackIndex::FIRST,
            reciter: default_reciter.to_string(),
        }
    }
}

/// JSON-file persistence for [`StationState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved position, falling back to defaults when the file
    /// is missing or unusable. Never fails.
    pub async fn load(&self, default_reciter: &str) -> StationState {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state, starting fresh");
                return StationState::initial(default_reciter);
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "state file unreadable, starting fresh");
                return StationState::initial(default_reciter);
            }
        };

        match serde_json::from_str::<StateFile>(&raw) {
            Ok(file) if file.version == STATE_VERSION => {
                let reciter = if file.reciter.trim().is_empty() {
                    default_reciter.to_string()
                } else {
                    file.reciter
                };
                StationState {
                    track: TrackIndex::from_persisted(file.track),
                    reciter,
                }
            }
            Ok(file) => {
                warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "state file from unknown version, starting fresh"
                );
                StationState::initial(default_reciter)
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "state file corrupt, starting fresh");
                StationState::initial(default_reciter)
            }
        }
    }

    /// Write the current position, creating parent directories as needed.
    pub async fn save(&self, state: &StationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = StateFile {
            version: STATE_VERSION,
            track: state.track.get(),
            reciter: state.reciter.clone(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), track = state.track.get(), "state saved");
        Ok(())
    }
}

/// Periodically snapshot the scheduler position to disk.
///
/// Runs until the scheduler goes away. The final save at shutdown is the
/// owner's responsibility, not this task's.
pub fn spawn_autosave(
    store: StateStore,
    station: StationHandle,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match station.snapshot().await {
                Ok(state) => {
                    if let Err(err) = store.save(&state).await {
                        warn!(error = %err, "state autosave failed");
                    }
                }
                Err(_) => {
                    debug!("scheduler gone, autosave task exiting");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = store_in(&dir).load("Saad Al Ghamdi").await;
        assert_eq!(state, StationState::initial("Saad Al Ghamdi"));
    }

    #[tokio::test]
    async fn test_save_then_load_restores_position() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let state = StationState {
            track: TrackIndex::from_persisted(57),
            reciter: "Abdul Basit".to_string(),
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load("Saad Al Ghamdi").await, state);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        let state = store.load("Saad Al Ghamdi").await;
        assert_eq!(state, StationState::initial("Saad Al Ghamdi"));
    }

    #[tokio::test]
    async fn test_load_clamps_out_of_range_track() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let raw = serde_json::json!({
            "version": STATE_VERSION,
            "track": 999,
            "reciter": "Abdul Basit",
            "saved_at": "2026-01-01T00:00:00Z",
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();
        let state = store.load("Saad Al Ghamdi").await;
        assert_eq!(state.track, TrackIndex::FIRST);
        assert_eq!(state.reciter, "Abdul Basit");
    }

    #[tokio::test]
    async fn test_load_unknown_version_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let raw = serde_json::json!({
            "version": 99,
            "track": 12,
            "reciter": "Abdul Basit",
            "saved_at": "2026-01-01T00:00:00Z",
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();
        let state = store.load("Saad Al Ghamdi").await;
        assert_eq!(state, StationState::initial("Saad Al Ghamdi"));
    }

    #[tokio::test]
    async fn test_load_blank_reciter_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let raw = serde_json::json!({
            "version": STATE_VERSION,
            "track": 5,
            "reciter": "  ",
            "saved_at": "2026-01-01T00:00:00Z",
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();
        let state = store.load("Saad Al Ghamdi").await;
        assert_eq!(state.reciter, "Saad Al Ghamdi");
        assert_eq!(state.track.get(), 5);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/deeper/state.json"));
        store
            .save(&StationState::initial("Saad Al Ghamdi"))
            .await
            .unwrap();
        assert!(store.path().is_file());
    }
}
