//! # komo_core
//!
//! Orchestration primitives for the Komomo assistant.
//!
//! # Architecture
//!
//! - **Hook Bus**: ordered, short-circuiting publish/subscribe dispatcher
//! - **Mode Guard**: singing/recording flags acquired through leases
//! - **Config**: startup settings loaded from JSON, TOML or YAML
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use komo_core::{Event, EventKind, HookBus};
//!
//! let bus = HookBus::new();
//! bus.register(Arc::new(MyRenderer), &[EventKind::ReplyGenerated]);
//!
//! let outcome = bus.dispatch(&Event::reply("こんにちは")).await;
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod mode;
pub mod text;

// Re-export main types for convenience
pub use bus::{HookBus, HookOutcome, HookResult, Priority, Subscriber};
pub use config::{
    AppEntry, CaptureSettings, ConfigStore, PerformanceSettings, ProfileSettings, ProviderKind,
    ProviderSettings, RouterSettings,
};
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventKind, Expression, Payload, ReplyKind, CONTROL_PREFIX, LYRIC_PREFIX};
pub use mode::{Mode, ModeChange, ModeFlags, ModeGuard, ModeLease};
pub use text::{contains_any, normalize_input};
