//! # komo_router
//!
//! The conversational side of the Komomo assistant.
//!
//! - [`InputRouter`] turns input into an app launch or a provider reply
//! - [`CaptureController`] owns the recording flag and feeds transcripts back as input
//! - [`ProcessLauncher`] is the seam for starting external apps

pub mod capture;
pub mod error;
pub mod launcher;
pub mod router;

pub use capture::{CaptureController, CommandRecognizer, SpeechRecognizer, StopSignal};
pub use error::{RouterError, RouterResult};
pub use launcher::{match_app, ProcessLauncher, ShellLauncher};
pub use router::{InputRouter, RouteOutcome};
