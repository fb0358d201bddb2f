//! Cyclic track position arithmetic.

use std::fmt;

use crate::constants::TRACK_COUNT;

/// One-based position in the cyclic catalog.
///
/// The scheduler stores the position of the next track it will hand to
/// the sink, so during playback the audible track sits one step behind
/// this value (see [`TrackIndex::previous`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackIndex(u16);

impl TrackIndex {
    /// First track of the cycle.
    pub const FIRST: TrackIndex = TrackIndex(1);

    /// Build an index from a possibly stale persisted value.
    /// Out-of-range values fall back to the first track.
    pub fn from_persisted(raw: u16) -> Self {
        if (1..=TRACK_COUNT).contains(&raw) {
            Self(raw)
        } else {
            Self::FIRST
        }
    }

    /// The raw one-based value.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Next position in the cycle, wrapping after the last track.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 % TRACK_COUNT + 1)
    }

    /// Previous position in the cycle, wrapping before the first track.
    #[must_use]
    pub fn previous(self) -> Self {
        if self.0 == 1 {
            Self(TRACK_COUNT)
        } else {
            Self(self.0 - 1)
        }
    }
}

impl Default for TrackIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for TrackIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_next_wraps_after_last_track() {
        assert_eq!(TrackIndex::from_persisted(TRACK_COUNT).next(), TrackIndex::FIRST);
        assert_eq!(TrackIndex::from_persisted(3).next().get(), 4);
    }

    #[test]
    fn test_previous_wraps_before_first_track() {
        assert_eq!(TrackIndex::FIRST.previous().get(), TRACK_COUNT);
        assert_eq!(TrackIndex::from_persisted(3).previous().get(), 2);
    }

    #[test]
    fn test_from_persisted_clamps_out_of_range() {
        assert_eq!(TrackIndex::from_persisted(0), TrackIndex::FIRST);
        assert_eq!(TrackIndex::from_persisted(TRACK_COUNT + 1), TrackIndex::FIRST);
        assert_eq!(TrackIndex::from_persisted(57).get(), 57);
    }

    #[test]
    fn test_full_cycle_visits_every_track_once() {
        let mut seen = HashSet::new();
        let mut index = TrackIndex::FIRST;
        for _ in 0..TRACK_COUNT {
            seen.insert(index.get());
            index = index.next();
        }
        assert_eq!(seen.len(), TRACK_COUNT as usize);
        assert_eq!(index, TrackIndex::FIRST);
    }

    #[test]
    fn test_next_then_previous_round_trips() {
        for raw in [1, 2, 57, TRACK_COUNT] {
            let index = TrackIndex::from_persisted(raw);
            assert_eq!(index.next().previous(), index);
            assert_eq!(index.previous().next(), index);
        }
    }
}
