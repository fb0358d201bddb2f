//! Filesystem-backed recitation catalog.
//!
//! The catalog root contains one directory per reciter, each holding the
//! tracks of a complete collection as zero-padded MP3 files:
//!
//! ```text
//! <root>/Saad Al Ghamdi/001.mp3
//! <root>/Saad Al Ghamdi/002.mp3
//! <root>/Mishary Alafasy/001.mp3
//! ...
//! ```
//!
//! Resolution prefers the requested reciter and falls back to the first
//! other collection (alphabetical) that has the track, so a single missing
//! file never silences the station.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CatalogError, Result};

/// A track resolved to a concrete file on disk.
///
/// `reciter` names the collection that actually provided the file, which
/// differs from the requested reciter when fallback kicked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub track: u16,
    pub reciter: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// Read-only view over the on-disk catalog.
#[derive(Debug, Clone)]
pub struct RecitationCatalog {
    root: PathBuf,
}

impl RecitationCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name a track is stored under (`5` → `005.mp3`).
    pub fn track_file_name(track: u16) -> String {
        format!("{:03}.mp3", track)
    }

    /// Resolve a track to a playable file.
    ///
    /// Primary lookup goes through the requested reciter; on a miss every
    /// other known reciter is tried in alphabetical order and the first hit
    /// wins, with the substitution logged. Returns [`CatalogError::TrackNotFound`]
    /// only when no collection has the file, which is also the natural
    /// outcome for out-of-range track numbers.
    pub fn resolve(&self, track: u16, reciter: &str) -> Result<ResolvedTrack> {
        let file_name = Self::track_file_name(track);

        let primary = self.root.join(reciter).join(&file_name);
        if primary.is_file() {
            debug!(track, reciter, "resolved track from requested reciter");
            return Ok(ResolvedTrack {
                track,
                reciter: reciter.to_string(),
                file_name,
                path: primary,
            });
        }

        for candidate in self.list_reciters()? {
            if candidate == reciter {
                continue;
            }
            let path = self.root.join(&candidate).join(&file_name);
            if path.is_file() {
                warn!(
                    track,
                    requested = reciter,
                    substitute = %candidate,
                    "track missing from requested reciter, using substitute collection"
                );
                return Ok(ResolvedTrack {
                    track,
                    reciter: candidate,
                    file_name,
                    path,
                });
            }
        }

        Err(CatalogError::TrackNotFound {
            track,
            reciter: reciter.to_string(),
        })
    }

    /// All reciter collections under the root, alphabetical.
    ///
    /// Hidden entries (leading `.`) and plain files are skipped.
    pub fn list_reciters(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Whether a reciter collection exists under the root.
    ///
    /// Reciter names are single path components; anything with a separator
    /// or a leading dot is rejected outright.
    pub fn reciter_exists(&self, name: &str) -> bool {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return false;
        }
        self.root.join(name).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog_with(layout: &[(&str, &[u16])]) -> (TempDir, RecitationCatalog) {
        let dir = TempDir::new().unwrap();
        for (reciter, tracks) in layout {
            let reciter_dir = dir.path().join(reciter);
            fs::create_dir_all(&reciter_dir).unwrap();
            for track in *tracks {
                let file = reciter_dir.join(RecitationCatalog::track_file_name(*track));
                fs::write(file, b"mp3").unwrap();
            }
        }
        let catalog = RecitationCatalog::new(dir.path());
        (dir, catalog)
    }

    #[test]
    fn test_track_file_name_zero_padded() {
        assert_eq!(RecitationCatalog::track_file_name(1), "001.mp3");
        assert_eq!(RecitationCatalog::track_file_name(36), "036.mp3");
        assert_eq!(RecitationCatalog::track_file_name(114), "114.mp3");
    }

    #[test]
    fn test_resolve_prefers_requested_reciter() {
        let (_dir, catalog) = catalog_with(&[("Alpha", &[5]), ("Beta", &[5])]);

        let resolved = catalog.resolve(5, "Beta").unwrap();
        assert_eq!(resolved.reciter, "Beta");
        assert_eq!(resolved.file_name, "005.mp3");
        assert!(resolved.path.ends_with("Beta/005.mp3"));
    }

    #[test]
    fn test_resolve_falls_back_to_other_collection() {
        let (_dir, catalog) = catalog_with(&[("Alpha", &[1]), ("Beta", &[1, 5])]);

        let resolved = catalog.resolve(5, "Alpha").unwrap();
        assert_eq!(resolved.reciter, "Beta");
        assert_eq!(resolved.track, 5);
    }

    #[test]
    fn test_resolve_out_of_range_is_not_found() {
        let (_dir, catalog) = catalog_with(&[("Alpha", &[1, 2, 3])]);

        let err = catalog.resolve(999, "Alpha").unwrap_err();
        assert!(matches!(
            err,
            CatalogError::TrackNotFound { track: 999, .. }
        ));
    }

    #[test]
    fn test_resolve_missing_everywhere_is_not_found() {
        let (_dir, catalog) = catalog_with(&[("Alpha", &[1]), ("Beta", &[2])]);

        let err = catalog.resolve(7, "Alpha").unwrap_err();
        assert!(matches!(err, CatalogError::TrackNotFound { track: 7, .. }));
    }

    #[test]
    fn test_list_reciters_sorted_and_filtered() {
        let (dir, catalog) = catalog_with(&[("Zeta", &[1]), ("Alpha", &[1])]);
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let reciters = catalog.list_reciters().unwrap();
        assert_eq!(reciters, vec!["Alpha".to_string(), "Zeta".to_string()]);
    }

    #[test]
    fn test_reciter_exists() {
        let (dir, catalog) = catalog_with(&[("Alpha", &[1])]);
        fs::create_dir(dir.path().join(".hidden")).unwrap();

        assert!(catalog.reciter_exists("Alpha"));
        assert!(!catalog.reciter_exists("Beta"));
        assert!(!catalog.reciter_exists(".hidden"));
        assert!(!catalog.reciter_exists(""));
        assert!(!catalog.reciter_exists("../Alpha"));
    }
}
