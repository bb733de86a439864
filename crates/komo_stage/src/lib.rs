//! # komo_stage
//!
//! Singing performances for the Komomo assistant.
//!
//! A [`PerformanceDirector`] picks tracks from a [`SongLibrary`] and runs a
//! single song or a concert on its own task, holding the singing flag for the
//! whole sequence. [`PerformanceTrigger`] starts performances from user input.

pub mod error;
pub mod library;
pub mod selection;
pub mod sequencer;
pub mod trigger;

pub use error::{StageError, StageResult};
pub use library::{wav_duration, SongLibrary, Track, TrackAssets};
pub use selection::{select_tracks, PerformanceMode};
pub use sequencer::{
    PerformanceDirector, PerformanceHandle, PerformanceJob, PerformanceReport, PerformanceState,
    PerformanceTiming,
};
pub use trigger::PerformanceTrigger;
