//! Continuous playback scheduling for a cyclic recitation catalog.
//!
//! One worker task (the [`StationScheduler`]) drives the whole station:
//! it keeps the audio sink connected with exponential backoff, walks the
//! 114-track catalog in a loop, and applies user commands (skip,
//! previous, reciter change, pause, resume, stop) received through a
//! [`StationHandle`]. Presence observers learn about track changes via
//! the [`presence`] module, and the resume position is checkpointed to
//! disk by the [`state`] module.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use qafcatalog::RecitationCatalog;
//! use qafsink::{GatewaySink, RoomKind, RoomTarget};
//! use qafstation::{PresenceHub, StationScheduler, StationState};
//!
//! # async fn run() -> qafstation::Result<()> {
//! let catalog = RecitationCatalog::new("/srv/audio");
//! let sink = GatewaySink::new("http://radio.local:9170/media")?;
//! let presence = Arc::new(PresenceHub::new());
//! let target = RoomTarget {
//!     base_url: "http://gateway.local:9200".into(),
//!     room: "quran".into(),
//!     kind: RoomKind::Voice,
//! };
//!
//! let (scheduler, handle) = StationScheduler::spawn(
//!     sink,
//!     catalog,
//!     presence.clone(),
//!     Some(target),
//!     StationState::initial("Saad Al Ghamdi"),
//! );
//! handle.skip().await?;
//! scheduler.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod constants;
pub mod error;
pub mod presence;
pub mod scheduler;
pub mod state;
pub mod track;

pub use backoff::ReconnectBackoff;
pub use error::{Result, StationError};
pub use presence::{PresenceEvent, PresenceHub, PresenceNotifier, PresenceUpdate};
pub use scheduler::{PlaybackState, StationHandle, StationScheduler, StationStatus};
pub use state::{spawn_autosave, StateStore, StationState};
pub use track::TrackIndex;
