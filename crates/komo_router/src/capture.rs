//! Speech capture controller. Sole owner of the recording flag.
//!
//! A start request acquires the recording lease and runs the recognizer on
//! its own task; a stop request raises a cooperative stop signal that the
//! recognizer polls. A non-empty transcript is fed back as input.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use komo_core::{CaptureSettings, Event, EventKind, HookBus, HookOutcome, HookResult, Mode, ModeGuard, Subscriber};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RouterError, RouterResult};

/// Cooperative stop flag shared between the controller and a recognizer.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Turns speech into text until stopped.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture and transcribe. Must return soon after `stop` is raised.
    async fn recognize(&self, stop: StopSignal) -> RouterResult<String>;
}

/// Runs an external transcription command and reads its stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
    max_duration: Duration,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            poll_interval: Duration::from_millis(100),
            max_duration: Duration::from_secs(15),
        }
    }

    pub fn from_settings(settings: &CaptureSettings) -> Self {
        Self::new(&settings.command, settings.args.clone())
            .with_poll_interval(Duration::from_millis(settings.poll_interval_ms))
            .with_max_duration(Duration::from_secs(settings.max_duration_secs))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = limit;
        self
    }

    fn run(&self, stop: &StopSignal) -> RouterResult<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RouterError::RecognizerSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RouterError::Capture("recognizer stdout unavailable".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut stdout = stdout;
            let mut bytes = Vec::new();
            let _ = stdout.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        });

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                debug!("Recognizer exited with {}", status);
                break;
            }
            if stop.is_raised() || started.elapsed() >= self.max_duration {
                debug!("Stopping recognizer {}", self.program);
                let _ = child.kill();
                let _ = child.wait();
                break;
            }
            std::thread::sleep(self.poll_interval);
        }

        let transcript = reader
            .join()
            .map_err(|_| RouterError::Capture("stdout reader panicked".to_string()))?;
        Ok(transcript.trim().to_string())
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn recognize(&self, stop: StopSignal) -> RouterResult<String> {
        let recognizer = self.clone();
        tokio::task::spawn_blocking(move || recognizer.run(&stop))
            .await
            .map_err(|e| RouterError::Capture(e.to_string()))?
    }
}

/// Hook bus subscriber for recording start/stop requests.
pub struct CaptureController {
    bus: Arc<HookBus>,
    modes: Arc<ModeGuard>,
    recognizer: Arc<dyn SpeechRecognizer>,
    active: Mutex<Option<StopSignal>>,
}

impl CaptureController {
    pub fn new(bus: Arc<HookBus>, modes: Arc<ModeGuard>, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            bus,
            modes,
            recognizer,
            active: Mutex::new(None),
        }
    }

    /// Begin capturing. Returns `None` when a capture is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let lease = match self.modes.try_acquire(Mode::Recording) {
            Ok(lease) => lease,
            Err(_) => {
                debug!("Recording already in progress");
                return None;
            }
        };

        let stop = StopSignal::new();
        *self.active.lock() = Some(stop.clone());

        let bus = Arc::clone(&self.bus);
        let recognizer = Arc::clone(&self.recognizer);
        info!("Recording started");
        Some(tokio::spawn(async move {
            let result = recognizer.recognize(stop).await;
            lease.release();

            match result {
                Ok(transcript) if !transcript.is_empty() => {
                    info!("Recognized: {}", transcript);
                    bus.dispatch(&Event::input(transcript)).await;
                }
                Ok(_) => debug!("Nothing recognized"),
                Err(e) => warn!("Recognition failed: {}", e),
            }
        }))
    }

    /// Ask the running capture to finish. Returns false if none is running.
    pub fn stop(&self) -> bool {
        match self.active.lock().take() {
            Some(stop) => {
                stop.raise();
                info!("Recording stop requested");
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Subscriber for CaptureController {
    fn name(&self) -> &str {
        "capture-controller"
    }

    async fn on_event(&self, event: &Event) -> HookResult {
        match event.kind {
            EventKind::RecordingStartRequested => {
                self.start();
            }
            EventKind::RecordingStopRequested => {
                self.stop();
            }
            _ => {}
        }
        Ok(HookOutcome::Continue)
    }
}
