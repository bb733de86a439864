//! Check-config command - Load the configuration and print the resolved setup.

use anyhow::Result;
use clap::Args;
use komo_core::ConfigStore;
use komo_stage::SongLibrary;
use serde_json::json;

use super::GlobalArgs;

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Print the resolved setup as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(global: GlobalArgs, args: CheckConfigArgs) -> Result<()> {
    let config = ConfigStore::load(&global.config)?;
    let instruction = config.instruction()?;

    let providers = config.enabled_providers();
    let apps = config.app_launch_table();
    let performance = config.performance();
    let tracks = SongLibrary::new(&performance.songs_dir).scan().map(|t| t.len()).unwrap_or(0);
    let capture = config.capture();
    let profile = config.profile();

    if args.json {
        let report = json!({
            "user_name": config.user_name(),
            "instruction_chars": instruction.chars().count(),
            "providers": providers.iter().map(|p| json!({
                "name": p.name,
                "kind": p.kind(),
                "model": p.model,
                "timeout_secs": p.timeout_secs,
                "has_key": p.resolve_api_key().is_some(),
            })).collect::<Vec<_>>(),
            "apps": apps,
            "songs_dir": performance.songs_dir,
            "tracks": tracks,
            "capture": capture.as_ref().map(|c| c.command.clone()),
            "profile": profile.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📋 Configuration: {}", global.config.display());
    println!("   User: {}", config.user_name());
    println!("   Character: {} ({} chars)", config.character_name(), instruction.chars().count());

    println!("🤖 Providers (in order):");
    if providers.is_empty() {
        println!("   ⚠️  none configured");
    }
    for (index, provider) in providers.iter().enumerate() {
        let key = if provider.resolve_api_key().is_some() { "✅" } else { "❌ no key" };
        println!(
            "   {}. {} ({:?}, {}, {}s) {}",
            index + 1,
            provider.name,
            provider.kind(),
            provider.model.as_deref().unwrap_or("default model"),
            provider.timeout_secs,
            key
        );
    }

    println!("🚀 Apps:");
    if apps.is_empty() {
        println!("   (none)");
    }
    for app in &apps {
        println!("   {} → {}", app.name, app.command);
    }

    println!("🎵 Songs: {} track(s) in {}", tracks, performance.songs_dir.display());
    println!(
        "🎙️  Capture: {}",
        capture.map(|c| c.command).unwrap_or_else(|| "off".to_string())
    );
    println!("🧠 Profile extraction: {}", if profile.is_some() { "on" } else { "off" });
    Ok(())
}
