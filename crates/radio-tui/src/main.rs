mod action;
mod analyser;
mod app;
mod component;
mod components;
mod core;
mod mpv;
mod theme;

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use radio_core::config::{Config, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "ascii-radio", version, about = "Text-art car radio for the terminal")]
struct Args {
    /// Audio file to play (overrides `player.track` in the config)
    track: Option<PathBuf>,

    /// Config file to use instead of ~/.config/ascii-radio/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pin the mood to this hour of the day (0-23)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    hour: Option<u32>,

    /// Only use mpv/ffmpeg found on PATH
    #[arg(long)]
    system_deps: bool,
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(track) = &args.track {
        config.player.track = track.clone();
    }
    if args.hour.is_some() {
        config.mood.fixed_hour = args.hour;
    }
    if args.system_deps {
        config.player.use_system_deps = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = radio_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("ascii-radio.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; the terminal belongs to the panel, so logs go to a file.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("ascii-radio log: {}", log_path.display());
    tracing::info!("ascii-radio starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = load_config(&args)?;
    radio_core::platform::set_use_system_deps(config.player.use_system_deps);
    tracing::info!("track: {}", config.player.track.display());

    // ── Channels (App ⇄ PlayerCore) ──────────────────────────────────────────
    let (core_tx, core_rx) = mpsc::channel::<core::CoreEvent>(256);
    let (player_tx, player_rx) = mpsc::channel::<core::PlayerEvent>(256);

    // ── Spawn PlayerCore event loop ──────────────────────────────────────────
    let player = core::PlayerCore::new(
        config.player.track.clone(),
        config.meter.clone(),
        core_tx.clone(),
        player_tx,
    );
    let player_task = tokio::spawn(async move {
        if let Err(e) = player.run(core_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let title = app::track_title(
        &config.player.track,
        config.display.track_label.as_deref(),
    );
    let app = app::App::new(config, title, core_tx);
    app.run(player_rx).await?;

    // Let PlayerCore kill mpv before the runtime goes away.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), player_task).await;
    Ok(())
}
