//! Hook bus subscriber that turns sing/concert requests into performances.

use std::sync::Arc;

use async_trait::async_trait;
use komo_core::{contains_any, normalize_input, Event, HookOutcome, HookResult, ModeGuard, Priority, Subscriber};
use tracing::{info, warn};

use crate::error::StageError;
use crate::selection::PerformanceMode;
use crate::sequencer::PerformanceDirector;

const NO_SONGS_STATUS: &str = "歌が見つかりません";

/// Watches input for performance phrases. Runs ahead of the conversation path.
pub struct PerformanceTrigger {
    director: Arc<PerformanceDirector>,
    modes: Arc<ModeGuard>,
}

impl PerformanceTrigger {
    pub fn new(director: Arc<PerformanceDirector>, modes: Arc<ModeGuard>) -> Self {
        Self { director, modes }
    }

    /// Concert phrases win over sing phrases.
    pub fn match_mode(&self, normalized: &str) -> Option<PerformanceMode> {
        let settings = self.director.settings();
        if contains_any(normalized, &settings.concert_phrases) {
            Some(PerformanceMode::Concert)
        } else if contains_any(normalized, &settings.sing_phrases) {
            Some(PerformanceMode::Single)
        } else {
            None
        }
    }
}

#[async_trait]
impl Subscriber for PerformanceTrigger {
    fn name(&self) -> &str {
        "performance-trigger"
    }

    fn priority(&self) -> Priority {
        Priority::First
    }

    async fn on_event(&self, event: &Event) -> HookResult {
        if self.modes.is_singing() {
            return Ok(HookOutcome::Handled);
        }

        let Some(text) = event.text() else {
            return Ok(HookOutcome::Continue);
        };
        let Some(mode) = self.match_mode(&normalize_input(text)) else {
            return Ok(HookOutcome::Continue);
        };

        match self.director.start(mode) {
            Ok(handle) => {
                info!("Performance {} triggered by input", handle.job_id());
                Ok(HookOutcome::Handled)
            }
            Err(StageError::AlreadyPerforming) => Ok(HookOutcome::Handled),
            Err(e @ StageError::AssetMissing(_)) => {
                warn!("Cannot perform: {}", e);
                self.director.bus().dispatch(&Event::status(NO_SONGS_STATUS)).await;
                Ok(HookOutcome::Continue)
            }
            Err(e) => Err(e.into()),
        }
    }
}
