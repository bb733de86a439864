//! Performance sequencer.
//!
//! A performance runs on its own task and walks
//! `Idle → Selecting → Announcing → PlayingTrack(i) → CoolingDown(i) → ... → Closing → Idle`,
//! driving the avatar through hook bus events. The singing flag is held by a
//! lease owned by the task, so it is released exactly once whether the
//! sequence completes, panics or is dropped with the runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use komo_core::{Event, Expression, HookBus, Mode, ModeGuard, ModeLease, PerformanceSettings};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StageError, StageResult};
use crate::library::{SongLibrary, Track, TrackAssets};
use crate::selection::{select_tracks, PerformanceMode};

/// Where a performance currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceState {
    Idle,
    Selecting,
    Announcing,
    PlayingTrack(usize),
    CoolingDown(usize),
    Closing,
}

impl fmt::Display for PerformanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Selecting => write!(f, "selecting"),
            Self::Announcing => write!(f, "announcing"),
            Self::PlayingTrack(i) => write!(f, "playing track {}", i + 1),
            Self::CoolingDown(i) => write!(f, "cooling down after track {}", i + 1),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Fixed waits used while performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceTiming {
    pub announce_settle: Duration,
    pub track_buffer: Duration,
    pub closing_pause: Duration,
    pub closing_settle: Duration,
    /// Used when a track's length cannot be read from its header.
    pub fallback_track: Duration,
}

impl From<&PerformanceSettings> for PerformanceTiming {
    fn from(settings: &PerformanceSettings) -> Self {
        Self {
            announce_settle: Duration::from_millis(settings.announce_settle_ms),
            track_buffer: Duration::from_millis(settings.track_buffer_ms),
            closing_pause: Duration::from_millis(settings.closing_pause_ms),
            closing_settle: Duration::from_millis(settings.closing_settle_ms),
            fallback_track: Duration::from_secs(settings.fallback_track_secs),
        }
    }
}

/// One accepted performance request.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceJob {
    pub id: Uuid,
    pub mode: PerformanceMode,
    pub tracks: Vec<Track>,
    /// Index of the current or last started track.
    pub step: usize,
    pub started_at: DateTime<Utc>,
}

impl PerformanceJob {
    pub fn new(mode: PerformanceMode, tracks: Vec<Track>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            tracks,
            step: 0,
            started_at: Utc::now(),
        }
    }
}

/// Summary returned when a performance task finishes.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub job_id: Uuid,
    pub mode: PerformanceMode,
    pub tracks: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Handle to a running performance.
#[derive(Debug)]
pub struct PerformanceHandle {
    job_id: Uuid,
    join: JoinHandle<PerformanceReport>,
}

impl PerformanceHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for the performance to finish.
    pub async fn wait(self) -> StageResult<PerformanceReport> {
        self.join
            .await
            .map_err(|e| StageError::Aborted(e.to_string()))
    }
}

struct Stage {
    bus: Arc<HookBus>,
    settings: PerformanceSettings,
    timing: PerformanceTiming,
    state: watch::Sender<PerformanceState>,
    /// Serializes lease handover with state changes so a finishing run
    /// cannot report `Idle` over a run that just started.
    transition: Mutex<()>,
}

/// Owns the singing lease for one run; returns the stage to idle on drop.
struct ActiveRun {
    lease: Option<ModeLease>,
    stage: Arc<Stage>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        let _transition = self.stage.transition.lock();
        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        self.stage.set_state(PerformanceState::Idle);
    }
}

impl Stage {
    fn set_state(&self, state: PerformanceState) {
        debug!("Performance state: {}", state);
        self.state.send_replace(state);
    }

    async fn perform(&self, mut job: PerformanceJob, run: ActiveRun) -> PerformanceReport {
        self.set_state(PerformanceState::Announcing);
        let intro = match job.mode {
            PerformanceMode::Concert => &self.settings.concert_intro,
            PerformanceMode::Single => &self.settings.single_intro,
        };
        self.bus.dispatch(&Event::reply(intro.clone())).await;
        sleep(self.timing.announce_settle).await;

        for index in 0..job.tracks.len() {
            job.step = index;
            self.play_track(index, &job.tracks[index]).await;
        }

        self.set_state(PerformanceState::Closing);
        self.bus.dispatch(&Event::expression(Expression::NEUTRAL)).await;
        if job.mode == PerformanceMode::Concert {
            sleep(self.timing.closing_pause).await;
            self.bus
                .dispatch(&Event::reply(self.settings.closing_remark.clone()))
                .await;
            sleep(self.timing.closing_settle).await;
        }

        drop(run);

        let report = PerformanceReport {
            job_id: job.id,
            mode: job.mode,
            tracks: job.tracks.iter().map(|t| t.title.clone()).collect(),
            started_at: job.started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Performance {} finished after {} track(s)",
            report.job_id,
            report.tracks.len()
        );
        report
    }

    async fn play_track(&self, index: usize, track: &Track) {
        self.set_state(PerformanceState::PlayingTrack(index));
        info!("Playing track {}: {}", index + 1, track.title);

        self.bus.dispatch(&Event::expression(Expression::SINGING)).await;

        let assets = load_assets(track, self.timing.fallback_track).await;
        if let Some(lyrics) = assets.lyrics {
            self.bus.dispatch(&Event::lyric(lyrics)).await;
        }

        match assets.audio {
            Ok(bytes) => {
                self.bus.dispatch(&Event::audio(bytes)).await;
            }
            Err(e) => warn!("Skipping audio: {}", e),
        }

        sleep(assets.duration + self.timing.track_buffer).await;

        self.set_state(PerformanceState::CoolingDown(index));
        self.bus.dispatch(&Event::lyric_closed()).await;
    }
}

/// Read a track's files on the blocking pool.
async fn load_assets(track: &Track, fallback: Duration) -> TrackAssets {
    let owned = track.clone();
    match tokio::task::spawn_blocking(move || owned.load_assets(fallback)).await {
        Ok(assets) => assets,
        Err(e) => {
            warn!("Loading {} failed: {}", track.title, e);
            TrackAssets {
                lyrics: None,
                audio: Err(StageError::Aborted(e.to_string())),
                duration: fallback,
            }
        }
    }
}

/// Starts performances and reports their progress.
pub struct PerformanceDirector {
    stage: Arc<Stage>,
    modes: Arc<ModeGuard>,
    library: SongLibrary,
}

impl PerformanceDirector {
    pub fn new(bus: Arc<HookBus>, modes: Arc<ModeGuard>, settings: PerformanceSettings) -> Self {
        let (state, _) = watch::channel(PerformanceState::Idle);
        let library = SongLibrary::new(&settings.songs_dir);
        let timing = PerformanceTiming::from(&settings);
        Self {
            stage: Arc::new(Stage {
                bus,
                settings,
                timing,
                state,
                transition: Mutex::new(()),
            }),
            modes,
            library,
        }
    }

    pub fn bus(&self) -> &Arc<HookBus> {
        &self.stage.bus
    }

    pub fn settings(&self) -> &PerformanceSettings {
        &self.stage.settings
    }

    pub fn library(&self) -> &SongLibrary {
        &self.library
    }

    pub fn state(&self) -> PerformanceState {
        *self.stage.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() != PerformanceState::Idle
    }

    /// Start a performance on its own task.
    ///
    /// Fails with [`StageError::AssetMissing`] before touching the singing
    /// flag when there is nothing to play, and with
    /// [`StageError::AlreadyPerforming`] when another performance holds it.
    pub fn start(&self, mode: PerformanceMode) -> StageResult<PerformanceHandle> {
        let available = self.library.scan()?;

        let run = {
            let _transition = self.stage.transition.lock();
            let lease = self
                .modes
                .try_acquire(Mode::Singing)
                .map_err(|_| StageError::AlreadyPerforming)?;
            self.stage.set_state(PerformanceState::Selecting);
            ActiveRun {
                lease: Some(lease),
                stage: Arc::clone(&self.stage),
            }
        };

        let settings = &self.stage.settings;
        let tracks = select_tracks(
            &available,
            mode,
            settings.concert_min..=settings.concert_max,
            &mut rand::thread_rng(),
        );
        let job = PerformanceJob::new(mode, tracks);
        let job_id = job.id;
        info!(
            "Starting {} performance {} with {} track(s)",
            mode,
            job_id,
            job.tracks.len()
        );

        let stage = Arc::clone(&self.stage);
        let join = tokio::spawn(async move { stage.perform(job, run).await });
        Ok(PerformanceHandle { job_id, join })
    }

    /// Resolve once no performance is running.
    pub async fn wait_idle(&self) {
        let mut state = self.stage.state.subscribe();
        let _ = state.wait_for(|s| *s == PerformanceState::Idle).await;
    }
}

impl fmt::Debug for PerformanceDirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceDirector")
            .field("state", &self.state())
            .field("songs_dir", &self.library.dir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use komo_core::{EventKind, HookOutcome, HookResult, ModeChange, Subscriber};
    use parking_lot::Mutex;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Reply(String),
        Expression(u32),
        Lyric(String),
        Audio(usize),
        LyricClosed,
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Seen>>);

    impl Recorder {
        fn seen(&self) -> Vec<Seen> {
            self.0.lock().clone()
        }
    }

    #[async_trait]
    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn on_event(&self, event: &Event) -> HookResult {
            let seen = match event.kind {
                EventKind::ReplyGenerated => Seen::Reply(event.text().unwrap_or_default().to_string()),
                EventKind::ExpressionChanged => {
                    Seen::Expression(event.payload.as_expression().map(|e| e.id()).unwrap_or(0))
                }
                EventKind::LyricDisplayed => Seen::Lyric(event.text().unwrap_or_default().to_string()),
                EventKind::AudioGenerated => Seen::Audio(event.payload.as_audio().map(|a| a.len()).unwrap_or(0)),
                EventKind::LyricClosed => Seen::LyricClosed,
                _ => return Ok(HookOutcome::Continue),
            };
            self.0.lock().push(seen);
            Ok(HookOutcome::Continue)
        }
    }

    fn write_track(dir: &Path, stem: &str, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.join(format!("{}.wav", stem)), spec).unwrap();
        for _ in 0..8000 * seconds {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn setup(dir: &TempDir) -> (PerformanceDirector, Arc<Recorder>, Arc<ModeGuard>) {
        setup_with(dir, PerformanceSettings::default())
    }

    fn setup_with(
        dir: &TempDir,
        settings: PerformanceSettings,
    ) -> (PerformanceDirector, Arc<Recorder>, Arc<ModeGuard>) {
        let bus = Arc::new(HookBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.register(recorder.clone(), &EventKind::all());
        let modes = ModeGuard::new();
        let settings = PerformanceSettings {
            songs_dir: dir.path().to_path_buf(),
            ..settings
        };
        (PerformanceDirector::new(bus, modes.clone(), settings), recorder, modes)
    }

    fn count_releases(changes: &mut tokio::sync::broadcast::Receiver<ModeChange>) -> usize {
        let mut released = 0;
        while let Ok(change) = changes.try_recv() {
            if change.mode == Mode::Singing && !change.active {
                released += 1;
            }
        }
        released
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_performance_sequence_and_timing() {
        let dir = tempdir().unwrap();
        write_track(dir.path(), "hello", 1);
        std::fs::write(dir.path().join("hello.txt"), "ラララ").unwrap();
        let (director, recorder, modes) = setup(&dir);

        let started = Instant::now();
        let handle = director.start(PerformanceMode::Single).unwrap();
        assert!(modes.is_singing());
        assert!(director.is_active());

        let report = handle.wait().await.unwrap();
        let elapsed = started.elapsed();

        // 2.5s announce + 1s track + 1.5s buffer
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
        assert_eq!(report.tracks, vec!["hello".to_string()]);
        assert!(!modes.is_singing());
        assert_eq!(director.state(), PerformanceState::Idle);

        let audio_len = std::fs::metadata(dir.path().join("hello.wav")).unwrap().len() as usize;
        assert_eq!(
            recorder.seen(),
            vec![
                Seen::Reply("私の歌、聴いてほしいな。".to_string()),
                Seen::Expression(20),
                Seen::Lyric("ラララ".to_string()),
                Seen::Audio(audio_len),
                Seen::LyricClosed,
                Seen::Expression(12),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concert_plays_every_track_once_with_bad_lyrics() {
        let dir = tempdir().unwrap();
        write_track(dir.path(), "one", 1);
        write_track(dir.path(), "two", 1);
        std::fs::write(dir.path().join("two.txt"), [0xffu8, 0xfe]).unwrap();
        let (director, recorder, modes) = setup(&dir);
        let mut changes = modes.subscribe();

        let report = director.start(PerformanceMode::Concert).unwrap().wait().await.unwrap();

        let mut played = report.tracks.clone();
        played.sort();
        assert_eq!(played, vec!["one".to_string(), "two".to_string()]);

        let seen = recorder.seen();
        assert_eq!(seen.first(), Some(&Seen::Reply("コンサート、始めちゃうよ！".to_string())));
        assert_eq!(seen.last(), Some(&Seen::Reply("聴いてくれてありがとう。".to_string())));
        assert_eq!(seen.iter().filter(|s| matches!(s, Seen::Audio(_))).count(), 2);
        assert_eq!(seen.iter().filter(|s| **s == Seen::LyricClosed).count(), 2);
        assert!(!seen.iter().any(|s| matches!(s, Seen::Lyric(_))));

        assert!(!modes.is_singing());
        assert_eq!(count_releases(&mut changes), 1);
    }

    #[tokio::test]
    async fn test_missing_assets_leave_flag_untouched() {
        let dir = tempdir().unwrap();
        let (director, recorder, modes) = setup(&dir);
        let mut changes = modes.subscribe();

        let err = director.start(PerformanceMode::Concert).unwrap_err();
        assert!(matches!(err, StageError::AssetMissing(_)));
        assert!(!modes.is_singing());
        assert!(changes.try_recv().is_err());
        assert!(recorder.seen().is_empty());
        assert_eq!(director.state(), PerformanceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected_until_idle() {
        let dir = tempdir().unwrap();
        write_track(dir.path(), "solo", 2);
        let (director, _recorder, modes) = setup(&dir);

        let handle = director.start(PerformanceMode::Single).unwrap();
        assert!(matches!(
            director.start(PerformanceMode::Concert),
            Err(StageError::AlreadyPerforming)
        ));

        director.wait_idle().await;
        assert!(!modes.is_singing());
        handle.wait().await.unwrap();

        let again = director.start(PerformanceMode::Single).unwrap();
        again.wait().await.unwrap();
        assert!(!director.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_track_uses_fallback_duration() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.wav"), b"RIFF").unwrap();
        let (director, recorder, _modes) = setup(&dir);

        let started = Instant::now();
        director.start(PerformanceMode::Single).unwrap().wait().await.unwrap();

        // 2.5s announce + 180s fallback + 1.5s buffer
        assert!(started.elapsed() >= Duration::from_secs(184));
        assert!(recorder.seen().contains(&Seen::Audio(4)));
    }

    /// A run that finishes while the next one starts must not report `Idle`
    /// over the new run.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_back_to_back_runs_keep_state_in_step_with_flag() {
        let dir = tempdir().unwrap();
        write_track(dir.path(), "blip", 0);
        let settings = PerformanceSettings {
            announce_settle_ms: 5,
            track_buffer_ms: 0,
            closing_pause_ms: 0,
            closing_settle_ms: 0,
            fallback_track_secs: 0,
            ..PerformanceSettings::default()
        };
        let (director, _recorder, modes) = setup_with(&dir, settings);

        for _ in 0..50 {
            let first = director.start(PerformanceMode::Single).unwrap();
            let second = loop {
                match director.start(PerformanceMode::Single) {
                    Ok(handle) => break handle,
                    Err(StageError::AlreadyPerforming) => tokio::task::yield_now().await,
                    Err(e) => panic!("unexpected start failure: {}", e),
                }
            };
            assert!(modes.is_singing());
            assert!(director.is_active());

            first.wait().await.unwrap();
            second.wait().await.unwrap();
            assert!(!modes.is_singing());
            assert_eq!(director.state(), PerformanceState::Idle);
        }
    }
}
