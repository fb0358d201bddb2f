//! Timing and sizing constants for the station scheduler.

use std::time::Duration;

/// Number of tracks in the cyclic catalog.
pub const TRACK_COUNT: u16 = qafcatalog::CATALOG_TRACKS;

/// Idle tick between scheduler passes.
pub const TICK: Duration = Duration::from_secs(1);

/// Pause after an unexpected scheduler fault before the next pass.
pub const FAULT_PAUSE: Duration = Duration::from_secs(5);

/// First reconnection delay after a lost session.
pub const BACKOFF_INITIAL: Duration = Duration::from_secs(10);

/// Upper bound for the doubled reconnection delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Default interval between periodic state snapshots.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Depth of the command inbox shared by API handlers.
pub const COMMAND_QUEUE_DEPTH: usize = 32;
