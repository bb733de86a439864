//! Assembly of the assistant from configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use komo_core::{ConfigStore, EventKind, HookBus, ModeGuard};
use komo_llm::{providers_from_config, EmotionAnalyzer, FallbackChain, ProfileExtractor};
use komo_router::{CaptureController, CommandRecognizer, InputRouter, ShellLauncher};
use komo_stage::{PerformanceDirector, PerformanceTrigger};
use tracing::{info, warn};

use crate::console::{ConsoleRenderer, RENDERED_EVENTS};

/// Everything wired onto one hook bus.
pub struct Assistant {
    pub config: ConfigStore,
    pub bus: Arc<HookBus>,
    pub modes: Arc<ModeGuard>,
    pub director: Arc<PerformanceDirector>,
    pub chain: FallbackChain,
    pub capture: Option<Arc<CaptureController>>,
}

impl Assistant {
    /// Load configuration and build the assistant. Configuration failure is fatal.
    pub fn load(path: &Path, quiet: bool) -> Result<Self> {
        let config = ConfigStore::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        Self::build(config, quiet)
    }

    /// Wire every subscriber onto a fresh bus. Fails before the bus exists if
    /// the character file cannot be read.
    pub fn build(config: ConfigStore, quiet: bool) -> Result<Self> {
        let instruction = config.instruction().context("Failed to load character file")?;

        let bus = Arc::new(HookBus::new());
        let modes = ModeGuard::new();

        let director = Arc::new(PerformanceDirector::new(
            Arc::clone(&bus),
            Arc::clone(&modes),
            config.performance(),
        ));
        bus.register(
            Arc::new(PerformanceTrigger::new(Arc::clone(&director), Arc::clone(&modes))),
            &[EventKind::InputReceived],
        );

        let chain = FallbackChain::new(providers_from_config(&config));
        if chain.is_empty() {
            warn!("No reply providers configured; conversation will report failures");
        }

        let mut router = InputRouter::new(
            Arc::clone(&bus),
            Arc::clone(&modes),
            chain.clone(),
            Arc::new(ShellLauncher),
        )
        .configured(&config)
        .with_instruction(instruction);

        if let Some(settings) = config.profile() {
            match EmotionAnalyzer::from_settings(&settings, Arc::clone(&bus), Arc::clone(&modes)) {
                Ok(analyzer) => {
                    let profile: Arc<dyn ProfileExtractor> = Arc::new(analyzer);
                    router = router.with_profile(profile);
                }
                Err(e) => warn!("Profile extraction disabled: {}", e),
            }
        }
        bus.register(Arc::new(router), &[EventKind::InputReceived]);

        let capture = config.capture().map(|settings| {
            let capture = Arc::new(CaptureController::new(
                Arc::clone(&bus),
                Arc::clone(&modes),
                Arc::new(CommandRecognizer::from_settings(&settings)),
            ));
            bus.register(
                capture.clone(),
                &[EventKind::RecordingStartRequested, EventKind::RecordingStopRequested],
            );
            capture
        });

        bus.register(
            Arc::new(ConsoleRenderer::new(config.character_name(), quiet)),
            &RENDERED_EVENTS,
        );

        info!(
            "Assistant ready: {} provider(s), capture {}",
            chain.len(),
            if capture.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            bus,
            modes,
            director,
            chain,
            capture,
        })
    }
}
