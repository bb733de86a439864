//! Integration tests for the input pipeline.
//!
//! These tests wire the performance trigger, the input router and a capture
//! controller onto one hook bus, using mock providers and an in-memory
//! launcher so nothing leaves the process.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use komo_core::{
    AppEntry, Event, EventKind, HookBus, HookOutcome, HookResult, ModeGuard, PerformanceSettings,
    Subscriber,
};
use komo_llm::{FallbackChain, MockProvider, ReplyProvider};
use komo_router::{
    CaptureController, InputRouter, ProcessLauncher, RouterResult, SpeechRecognizer, StopSignal,
};
use komo_stage::{PerformanceDirector, PerformanceTrigger};
use parking_lot::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingLauncher {
    commands: Mutex<Vec<String>>,
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, command: &str) -> io::Result<()> {
        self.commands.lock().push(command.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct Transcript(Mutex<Vec<(EventKind, String)>>);

impl Transcript {
    fn texts(&self, kind: EventKind) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Subscriber for Transcript {
    fn name(&self) -> &str {
        "transcript"
    }

    async fn on_event(&self, event: &Event) -> HookResult {
        self.0
            .lock()
            .push((event.kind, event.text().unwrap_or_default().to_string()));
        Ok(HookOutcome::Continue)
    }
}

struct Pipeline {
    bus: Arc<HookBus>,
    modes: Arc<ModeGuard>,
    director: Arc<PerformanceDirector>,
    launcher: Arc<RecordingLauncher>,
    transcript: Arc<Transcript>,
    _songs: TempDir,
}

fn write_track(dir: &Path, stem: &str) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(format!("{}.wav", stem)), spec).unwrap();
    for _ in 0..8000 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn pipeline(providers: Vec<MockProvider>, with_songs: bool) -> Pipeline {
    let songs = tempfile::tempdir().unwrap();
    if with_songs {
        write_track(songs.path(), "komomo-theme");
    }

    let bus = Arc::new(HookBus::new());
    let modes = ModeGuard::new();
    let settings = PerformanceSettings {
        songs_dir: songs.path().to_path_buf(),
        ..PerformanceSettings::default()
    };
    let director = Arc::new(PerformanceDirector::new(bus.clone(), modes.clone(), settings));
    let launcher = Arc::new(RecordingLauncher::default());
    let transcript = Arc::new(Transcript::default());

    let chain = FallbackChain::new(
        providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn ReplyProvider>)
            .collect(),
    );
    let router = InputRouter::new(bus.clone(), modes.clone(), chain, launcher.clone())
        .with_apps(vec![AppEntry::new("browser", "launch-browser-cmd")])
        .with_instruction("明るい秘書、こもも。");

    // Registration order is deliberately not priority order
    bus.register(Arc::new(router), &[EventKind::InputReceived]);
    bus.register(
        Arc::new(PerformanceTrigger::new(director.clone(), modes.clone())),
        &[EventKind::InputReceived],
    );
    bus.register(
        transcript.clone(),
        &[EventKind::ReplyGenerated, EventKind::StatusChanged, EventKind::LyricClosed],
    );

    Pipeline {
        bus,
        modes,
        director,
        launcher,
        transcript,
        _songs: songs,
    }
}

/// Input arriving mid-performance never reaches the providers.
#[tokio::test(start_paused = true)]
async fn test_performance_blocks_conversation() {
    let provider = MockProvider::replying("gemini", "はーい");
    let p = pipeline(vec![provider.clone()], true);

    assert_eq!(p.bus.dispatch(&Event::input("歌って！")).await, HookOutcome::Handled);
    assert!(p.modes.is_singing());

    assert_eq!(p.bus.dispatch(&Event::input("こんにちは")).await, HookOutcome::Handled);
    assert_eq!(p.bus.dispatch(&Event::input("browserを起動")).await, HookOutcome::Handled);
    assert_eq!(provider.call_count(), 0);
    assert!(p.launcher.commands.lock().is_empty());

    p.director.wait_idle().await;
    assert!(!p.modes.is_singing());
    assert_eq!(p.transcript.texts(EventKind::LyricClosed).len(), 1);

    p.bus.dispatch(&Event::input("こんにちは")).await;
    assert_eq!(provider.call_count(), 1);
    assert!(p.transcript.texts(EventKind::ReplyGenerated).contains(&"はーい".to_string()));
}

/// A matched app is launched and the providers are skipped.
#[tokio::test]
async fn test_app_launch_short_circuits() {
    let provider = MockProvider::replying("gemini", "unused");
    let p = pipeline(vec![provider.clone()], false);

    p.bus.dispatch(&Event::input("browserを起動")).await;

    assert_eq!(*p.launcher.commands.lock(), vec!["launch-browser-cmd".to_string()]);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(
        p.transcript.texts(EventKind::ReplyGenerated),
        vec!["はい、browserを起動しますね。".to_string()]
    );
}

/// A provider that never answers is skipped after its timeout.
#[tokio::test(start_paused = true)]
async fn test_slow_provider_falls_back() {
    let slow = MockProvider::hanging("gemini").with_timeout(Duration::from_secs(15));
    let fast = MockProvider::replying("groq", "[ID:17]お待たせ！");
    let p = pipeline(vec![slow.clone(), fast.clone()], false);

    p.bus.dispatch(&Event::input("元気？")).await;

    assert_eq!(slow.call_count(), 1);
    assert_eq!(fast.call_count(), 1);
    assert_eq!(p.transcript.texts(EventKind::ReplyGenerated), vec!["お待たせ！".to_string()]);
    assert_eq!(
        p.transcript.texts(EventKind::StatusChanged).last().map(String::as_str),
        Some("応答: groq")
    );
}

/// Asking for a song without songs still gets a conversational answer.
#[tokio::test]
async fn test_missing_songs_fall_through_to_conversation() {
    let provider = MockProvider::replying("gemini", "ごめんね、歌がないみたい");
    let p = pipeline(vec![provider.clone()], false);

    p.bus.dispatch(&Event::input("コンサートして")).await;

    assert!(!p.modes.is_singing());
    assert_eq!(provider.call_count(), 1);
    let statuses = p.transcript.texts(EventKind::StatusChanged);
    assert_eq!(statuses.first().map(String::as_str), Some("歌が見つかりません"));
    assert_eq!(
        p.transcript.texts(EventKind::ReplyGenerated),
        vec!["ごめんね、歌がないみたい".to_string()]
    );
}

/// Every provider failing ends in a status line, not an error.
#[tokio::test]
async fn test_all_providers_failing_reports_status() {
    let p = pipeline(
        vec![MockProvider::failing("gemini", "quota"), MockProvider::failing("groq", "503")],
        false,
    );

    let outcome = p.bus.dispatch(&Event::input("ねえねえ")).await;

    assert_eq!(outcome, HookOutcome::Handled);
    assert!(p.transcript.texts(EventKind::ReplyGenerated).is_empty());
    assert_eq!(
        p.transcript.texts(EventKind::StatusChanged),
        vec!["思考中...".to_string(), "全API接続失敗".to_string()]
    );
}

struct SaysSing;

#[async_trait]
impl SpeechRecognizer for SaysSing {
    async fn recognize(&self, stop: StopSignal) -> RouterResult<String> {
        while !stop.is_raised() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok("歌って".to_string())
    }
}

/// A spoken request goes through the same pipeline as typed input.
#[tokio::test(start_paused = true)]
async fn test_recognized_speech_starts_performance() {
    let provider = MockProvider::replying("gemini", "unused");
    let p = pipeline(vec![provider.clone()], true);
    let capture = Arc::new(CaptureController::new(
        p.bus.clone(),
        p.modes.clone(),
        Arc::new(SaysSing),
    ));
    p.bus.register(
        capture.clone(),
        &[EventKind::RecordingStartRequested, EventKind::RecordingStopRequested],
    );

    let task = capture.start().unwrap();
    assert!(p.modes.is_recording());
    p.bus.dispatch(&Event::recording_stop()).await;
    task.await.unwrap();

    assert!(!p.modes.is_recording());
    p.director.wait_idle().await;
    assert_eq!(provider.call_count(), 0);
    assert_eq!(
        p.transcript.texts(EventKind::ReplyGenerated).first().map(String::as_str),
        Some("私の歌、聴いてほしいな。")
    );
}
