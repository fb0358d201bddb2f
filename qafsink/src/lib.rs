//! Audio sink abstraction and the room gateway implementation.
//!
//! The station scheduler drives exactly one [`AudioSink`]: an asynchronous
//! transport that joins a room, accepts play/stop/pause/resume commands and
//! reports the natural end of each track through a channel of
//! [`PlaybackEnd`] events. [`GatewaySink`] implements the trait over a
//! plain-HTTP room gateway and keeps session truth in atomics shared with
//! a background status monitor.
//!
//! # Example
//!
//! ```no_run
//! use qafsink::{GatewaySink, RoomKind, RoomTarget};
//!
//! # async fn run() -> qafsink::Result<()> {
//! use qafsink::AudioSink;
//!
//! let mut sink = GatewaySink::new("http://radio.local:9170/media")?;
//! let target = RoomTarget {
//!     base_url: "http://gateway.local:9200".into(),
//!     room: "quran".into(),
//!     kind: RoomKind::Broadcast,
//! };
//! sink.connect(&target).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod sink;

pub use error::{Result, SinkError};
pub use gateway::GatewaySink;
pub use sink::{AudioSink, PlaybackEnd, RoomKind, RoomTarget};
