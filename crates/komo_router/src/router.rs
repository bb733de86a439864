//! Input router: the conversational path for every piece of user input.
//!
//! Per request: normalize, refuse while singing, try the app-launch table,
//! otherwise ask the fallback chain and broadcast the cleaned reply.

use std::sync::Arc;

use async_trait::async_trait;
use komo_core::{
    normalize_input, AppEntry, ConfigStore, Event, HookBus, HookOutcome, HookResult, ModeGuard,
    RouterSettings, Subscriber,
};
use komo_llm::{spawn_extraction, FallbackChain, ProfileExtractor, ReplyEnvelope};
use tracing::{debug, info, warn};

use crate::launcher::{match_app, ProcessLauncher};

/// What happened to one piece of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Nothing left after normalization.
    Ignored,
    /// Dropped because a performance is running.
    Suppressed,
    /// An app was launched; carries the app name.
    Launched(String),
    /// A provider answered.
    Replied(ReplyEnvelope),
    /// Every provider failed.
    Exhausted,
}

/// Conversational subscriber for input-received events.
pub struct InputRouter {
    bus: Arc<HookBus>,
    modes: Arc<ModeGuard>,
    chain: FallbackChain,
    launcher: Arc<dyn ProcessLauncher>,
    apps: Vec<AppEntry>,
    settings: RouterSettings,
    instruction: String,
    user_name: String,
    profile: Option<Arc<dyn ProfileExtractor>>,
}

impl InputRouter {
    pub fn new(
        bus: Arc<HookBus>,
        modes: Arc<ModeGuard>,
        chain: FallbackChain,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            bus,
            modes,
            chain,
            launcher,
            apps: Vec::new(),
            settings: RouterSettings::default(),
            instruction: String::new(),
            user_name: "あなた".to_string(),
            profile: None,
        }
    }

    /// Pull the app table, phrases and user name from config. The character
    /// instruction is loaded separately because reading it can fail.
    pub fn configured(self, config: &ConfigStore) -> Self {
        self.with_apps(config.app_launch_table())
            .with_settings(config.router())
            .with_user_name(config.user_name())
    }

    pub fn with_apps(mut self, apps: Vec<AppEntry>) -> Self {
        self.apps = apps;
        self
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn with_profile(mut self, profile: Arc<dyn ProfileExtractor>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Route one utterance.
    pub async fn route(&self, text: &str) -> RouteOutcome {
        let normalized = normalize_input(text);
        if self.modes.is_singing() {
            info!("Input suppressed during performance");
            return RouteOutcome::Suppressed;
        }

        if normalized.is_empty() {
            debug!("Ignoring empty input");
            return RouteOutcome::Ignored;
        }

        if let Some(app) = match_app(&self.apps, &self.settings.launch_suffixes, &normalized) {
            match self.launcher.launch(&app.command) {
                Ok(()) => {
                    info!("Launched app {}", app.name);
                    let confirmation = self.settings.launch_confirmation.replace("{name}", &app.name);
                    self.bus.dispatch(&Event::reply(confirmation)).await;
                    return RouteOutcome::Launched(app.name.clone());
                }
                Err(e) => warn!("Failed to launch {} ({}), asking providers instead", app.name, e),
            }
        }

        self.converse(text.trim()).await
    }

    async fn converse(&self, text: &str) -> RouteOutcome {
        self.bus
            .dispatch(&Event::status(self.settings.thinking_status.clone()))
            .await;

        match self.chain.invoke(text, &self.build_instruction()).await {
            Ok(envelope) => {
                let reply = envelope.cleaned.replace("{{user}}", &self.user_name);
                self.bus.dispatch(&Event::reply(reply.clone())).await;
                self.bus
                    .dispatch(&Event::status(format!("応答: {}", envelope.provider)))
                    .await;

                if let Some(profile) = &self.profile {
                    spawn_extraction(Arc::clone(profile), text.to_string(), reply);
                }
                RouteOutcome::Replied(envelope)
            }
            Err(e) => {
                warn!("No reply: {}", e);
                self.bus
                    .dispatch(&Event::status(self.settings.exhausted_status.clone()))
                    .await;
                RouteOutcome::Exhausted
            }
        }
    }

    fn build_instruction(&self) -> String {
        match &self.profile {
            Some(profile) => {
                let summary = profile.summary();
                if summary.is_empty() {
                    self.instruction.clone()
                } else {
                    format!("{}\n\n{}", self.instruction, summary)
                }
            }
            None => self.instruction.clone(),
        }
    }
}

#[async_trait]
impl Subscriber for InputRouter {
    fn name(&self) -> &str {
        "input-router"
    }

    async fn on_event(&self, event: &Event) -> HookResult {
        let Some(text) = event.text() else {
            return Ok(HookOutcome::Continue);
        };
        Ok(match self.route(text).await {
            RouteOutcome::Ignored => HookOutcome::Continue,
            _ => HookOutcome::Handled,
        })
    }
}
