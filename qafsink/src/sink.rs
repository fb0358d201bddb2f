//! The transport seam between the scheduler and a concrete audio sink.

use std::fmt;

use async_trait::async_trait;
use qafcatalog::ResolvedTrack;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Room flavors a gateway can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Plain voice room: joining is enough to be heard.
    Voice,
    /// Broadcast room: audible only after claiming the transmitter slot.
    Broadcast,
}

/// Identifies a gateway endpoint and the room to join on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTarget {
    pub base_url: String,
    pub room: String,
    pub kind: RoomKind,
}

impl fmt::Display for RoomTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.room, self.base_url)
    }
}

/// End-of-playback notice delivered on the channel handed to [`AudioSink::play`].
///
/// Exactly one notice is sent when a track ends on its own or dies on an
/// error. A preempting [`AudioSink::stop`] sends nothing: the sender is
/// dropped with the monitor, and silence on the channel is how intentional
/// stops are told apart from natural completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEnd {
    pub error: Option<String>,
}

/// Contract every audio sink transport implements.
///
/// The scheduler owns a single boxed sink and is the only caller, so
/// mutating operations take `&mut self`. State reads are synchronous and
/// cheap (session flags, not network round-trips).
#[async_trait]
pub trait AudioSink: Send {
    /// Connect to `target`.
    ///
    /// Idempotent: already connected to `target` returns Ok without a new
    /// join; connected to a different target force-disconnects first.
    async fn connect(&mut self, target: &RoomTarget) -> Result<()>;

    /// Tear the session down. Safe when not connected; used by the
    /// reconnect path to clear half-open sessions before a fresh join.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;

    /// Start streaming `media`; `done` receives the end-of-playback notice.
    async fn play(&mut self, media: &ResolvedTrack, done: mpsc::Sender<PlaybackEnd>)
        -> Result<()>;

    /// Stop current playback, suppressing its end notice and clearing the
    /// playing flag immediately. Logged no-op when nothing is playing.
    async fn stop(&mut self);

    /// Pause playback; logged no-op unless playing.
    async fn pause(&mut self);

    /// Resume playback; logged no-op unless paused.
    async fn resume(&mut self);
}
