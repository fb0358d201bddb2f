//! Presence notifications for external status surfaces.
//!
//! The scheduler reports what it is doing through a [`PresenceNotifier`];
//! the concrete [`PresenceHub`] fans those reports out on a broadcast
//! channel so UI surfaces (SSE, status panels) can subscribe. Repeat
//! announcements for the same track are dropped so a flaky sink does not
//! spam subscribers, and any idle or cleared signal re-arms the
//! deduplication so the next track start is always delivered.

use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::track::TrackIndex;

/// Subscriber backlog kept per presence channel.
pub const PRESENCE_CAPACITY: usize = 64;

/// Observer for station activity changes.
///
/// Implementations must be fire-and-forget: the scheduler never awaits a
/// notification and ignores delivery failures.
pub trait PresenceNotifier: Send + Sync {
    /// A track is about to become audible.
    fn notify_playing(&self, track: TrackIndex, reciter: &str);

    /// Playback was paused.
    fn notify_idle(&self);

    /// Playback was stopped and the display should go blank.
    fn notify_cleared(&self);
}

/// One presence change, as published to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PresenceEvent {
    Playing {
        track: u16,
        title: String,
        reciter: String,
    },
    Idle,
    Cleared,
}

/// Timestamped presence update.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceUpdate {
    #[serde(flatten)]
    pub event: PresenceEvent,
    pub at: DateTime<Utc>,
}

/// Broadcast-backed notifier with per-track deduplication.
#[derive(Debug)]
pub struct PresenceHub {
    sender: broadcast::Sender<PresenceUpdate>,
    // 0 means "nothing announced"; valid tracks start at 1.
    last_track: AtomicU16,
}

impl PresenceHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(PRESENCE_CAPACITY);
        Self {
            sender,
            last_track: AtomicU16::new(0),
        }
    }

    /// New subscription receiving every update from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceUpdate> {
        self.sender.subscribe()
    }

    fn publish(&self, event: PresenceEvent) {
        let update = PresenceUpdate {
            event,
            at: Utc::now(),
        };
        // A send error only means nobody is subscribed right now.
        let _ = self.sender.send(update);
    }
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceNotifier for PresenceHub {
    fn notify_playing(&self, track: TrackIndex, reciter: &str) {
        let raw = track.get();
        if self.last_track.load(Ordering::SeqCst) == raw {
            debug!(track = raw, "presence unchanged, skipping update");
            return;
        }
        self.last_track.store(raw, Ordering::SeqCst);
        self.publish(PresenceEvent::Playing {
            track: raw,
            title: qafcatalog::track_label(raw),
            reciter: reciter.to_string(),
        });
    }

    fn notify_idle(&self) {
        self.last_track.store(0, Ordering::SeqCst);
        self.publish(PresenceEvent::Idle);
    }

    fn notify_cleared(&self) {
        self.last_track.store(0, Ordering::SeqCst);
        self.publish(PresenceEvent::Cleared);
    }
}
