//! Song library: `*.wav` tracks in one directory, with optional `<stem>.txt` lyrics.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StageError, StageResult};

/// One playable track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, title }
    }

    /// Lyric file path next to the track.
    pub fn lyric_path(&self) -> PathBuf {
        self.path.with_extension("txt")
    }

    /// Lyrics, if the file exists and is valid UTF-8.
    pub fn load_lyrics(&self) -> Option<String> {
        let path = self.lyric_path();
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Skipping lyrics {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn load_audio(&self) -> StageResult<Vec<u8>> {
        fs::read(&self.path).map_err(|e| StageError::Audio {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Read lyrics, audio bytes and duration in one blocking pass.
    pub fn load_assets(&self, fallback: Duration) -> TrackAssets {
        TrackAssets {
            lyrics: self.load_lyrics(),
            audio: self.load_audio(),
            duration: self.duration(fallback),
        }
    }

    /// Playback length from the WAV header, or `fallback` when unreadable.
    pub fn duration(&self, fallback: Duration) -> Duration {
        wav_duration(&self.path).unwrap_or_else(|| {
            debug!("Using fallback duration for {:?}", self.path);
            fallback
        })
    }
}

/// Everything read from disk before a track plays.
#[derive(Debug)]
pub struct TrackAssets {
    pub lyrics: Option<String>,
    pub audio: StageResult<Vec<u8>>,
    pub duration: Duration,
}

/// Frames divided by sample rate. `None` if the file is not a readable WAV.
pub fn wav_duration(path: &Path) -> Option<Duration> {
    let reader = hound::WavReader::open(path).ok()?;
    let frames = reader.duration();
    let sample_rate = reader.spec().sample_rate;
    if frames == 0 || sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(frames as f64 / sample_rate as f64))
}

/// Directory of tracks.
#[derive(Debug, Clone)]
pub struct SongLibrary {
    dir: PathBuf,
}

impl SongLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All tracks in path order. A missing directory or an empty one is
    /// [`StageError::AssetMissing`].
    pub fn scan(&self) -> StageResult<Vec<Track>> {
        if !self.dir.is_dir() {
            return Err(StageError::AssetMissing(self.dir.clone()));
        }

        let mut tracks: Vec<Track> = WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
            })
            .map(|e| Track::new(e.into_path()))
            .collect();

        if tracks.is_empty() {
            return Err(StageError::AssetMissing(self.dir.clone()));
        }

        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Found {} tracks in {:?}", tracks.len(), self.dir);
        Ok(tracks)
    }
}
