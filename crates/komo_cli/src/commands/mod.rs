//! CLI command definitions.
//!
//! Each subcommand builds the assistant from configuration and drives it
//! through the hook bus.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod ask;
pub mod check;
pub mod perform;
pub mod run;

/// Komomo - a voice assistant with a singing avatar
#[derive(Parser)]
#[command(name = "komo")]
#[command(version, about = "Komomo - a voice assistant with a singing avatar")]
#[command(long_about = r#"
Komomo routes typed or spoken input through a hook bus: performance
requests start a song or a concert, app-launch phrases start programs, and
everything else is answered by the first language-model provider that
responds in time.

COMMANDS:
  run           → Interactive session (type to talk, /rec and /stop to record)
  ask           → Send one utterance through the full pipeline
  perform       → Sing a song or give a concert
  check-config  → Load the configuration and show what would run

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress status lines
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, global = true, env = "KOMO_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            quiet: self.quiet,
        }
    }
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub config: PathBuf,
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive session reading input from stdin
    Run(run::RunArgs),

    /// Send one utterance through the pipeline
    Ask(ask::AskArgs),

    /// Sing a song or give a concert
    Perform(perform::PerformArgs),

    /// Load the configuration and print the resolved setup
    #[command(name = "check-config")]
    CheckConfig(check::CheckConfigArgs),
}
