//! # qafcatalog - Recitation catalog for the QafRadio station
//!
//! Maps `(track, reciter)` pairs onto audio files laid out as one directory
//! per reciter under a common root. The catalog is a fixed cycle of 114
//! tracks; resolution falls back across collections so a missing file in
//! one reciter's directory never stalls playback.
//!
//! ```no_run
//! use qafcatalog::RecitationCatalog;
//!
//! let catalog = RecitationCatalog::new("/var/lib/qafradio/audio");
//! let resolved = catalog.resolve(36, "Saad Al Ghamdi")?;
//! println!("playing {} from {:?}", resolved.file_name, resolved.path);
//! # Ok::<(), qafcatalog::CatalogError>(())
//! ```

mod catalog;
mod error;
mod names;

pub use catalog::{RecitationCatalog, ResolvedTrack};
pub use error::{CatalogError, Result};
pub use names::{track_label, track_title};

/// Number of tracks in a complete collection.
pub const CATALOG_TRACKS: u16 = 114;
