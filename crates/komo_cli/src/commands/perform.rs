//! Perform command - Sing a song or give a concert.

use anyhow::Result;
use clap::Args;
use komo_stage::PerformanceMode;

use super::GlobalArgs;
use crate::app::Assistant;

#[derive(Args)]
pub struct PerformArgs {
    /// Play several songs in a row
    #[arg(long)]
    concert: bool,
}

pub async fn execute(global: GlobalArgs, args: PerformArgs) -> Result<()> {
    let assistant = Assistant::load(&global.config, global.quiet)?;
    let mode = if args.concert {
        PerformanceMode::Concert
    } else {
        PerformanceMode::Single
    };

    let report = assistant.director.start(mode)?.wait().await?;

    println!(
        "✅ {} finished: {}",
        report.mode,
        report.tracks.join(", ")
    );
    Ok(())
}
