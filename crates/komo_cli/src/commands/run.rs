//! Run command - Interactive session on stdin.

use anyhow::Result;
use clap::Args;
use komo_core::Event;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::GlobalArgs;
use crate::app::Assistant;

#[derive(Args)]
pub struct RunArgs {
    /// Wait for a running performance to finish before exiting
    #[arg(long)]
    wait_on_exit: bool,
}

pub async fn execute(global: GlobalArgs, args: RunArgs) -> Result<()> {
    let assistant = Assistant::load(&global.config, global.quiet)?;
    info!("Interactive session started");

    println!(
        "{}さん、こんにちは。Type to talk. /rec and /stop record speech, /quit exits.",
        assistant.config.user_name()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/rec" => {
                if assistant.capture.is_none() {
                    println!("⚠️  No capture command configured");
                } else if assistant.modes.is_recording() {
                    println!("⚠️  Already recording");
                } else {
                    assistant.bus.dispatch(&Event::recording_start()).await;
                    println!("🎙️  Recording... (/stop to finish)");
                }
            }
            "/stop" => {
                assistant.bus.dispatch(&Event::recording_stop()).await;
            }
            text => {
                assistant.bus.dispatch(&Event::input(text)).await;
            }
        }
    }

    if args.wait_on_exit && assistant.director.is_active() {
        println!("Waiting for the performance to finish...");
        assistant.director.wait_idle().await;
    }

    info!("Interactive session ended");
    Ok(())
}
