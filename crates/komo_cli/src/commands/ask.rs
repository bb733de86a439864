//! Ask command - Send one utterance through the pipeline.

use anyhow::Result;
use clap::Args;
use komo_core::Event;

use super::GlobalArgs;
use crate::app::Assistant;

#[derive(Args)]
pub struct AskArgs {
    /// What to say
    #[arg(required = true)]
    text: Vec<String>,
}

pub async fn execute(global: GlobalArgs, args: AskArgs) -> Result<()> {
    let text = args.text.join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("Invalid argument: text is empty");
    }

    let assistant = Assistant::load(&global.config, global.quiet)?;
    assistant.bus.dispatch(&Event::input(text)).await;

    // The input may have started a performance
    assistant.director.wait_idle().await;
    Ok(())
}
