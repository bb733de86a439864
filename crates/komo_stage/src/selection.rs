//! Track selection for single songs and concerts.

use std::fmt;
use std::ops::RangeInclusive;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::library::Track;

/// Kind of performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    Single,
    Concert,
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Concert => write!(f, "concert"),
        }
    }
}

/// Pick the tracks for one performance.
///
/// A concert draws a count uniformly from `concert_size`, clamps it to the
/// number of tracks and samples that many without replacement. A single
/// performance draws one track.
pub fn select_tracks<R: Rng>(
    tracks: &[Track],
    mode: PerformanceMode,
    concert_size: RangeInclusive<usize>,
    rng: &mut R,
) -> Vec<Track> {
    if tracks.is_empty() {
        return Vec::new();
    }

    let count = match mode {
        PerformanceMode::Single => 1,
        PerformanceMode::Concert => {
            let (lo, hi) = (*concert_size.start(), *concert_size.end());
            let (lo, hi) = (lo.min(hi).max(1), hi.max(lo).max(1));
            rng.gen_range(lo..=hi).min(tracks.len())
        }
    };

    tracks.choose_multiple(rng, count).cloned().collect()
}
