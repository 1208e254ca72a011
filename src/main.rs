// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! PPE Monitor - camera supervision and safety-violation detection
//!
//! Runs the capture workers, the reconciliation loop and the HTTP API in one
//! process until Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ppe_monitor::{Config, Engine, NAME, VERSION};

/// PPE Monitor - camera supervision and safety-violation detection
#[derive(Parser, Debug)]
#[command(name = "ppe-monitor")]
#[command(version = VERSION)]
#[command(about = "Supervise cameras, detect PPE violations and stream live video")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides server.bind_addr)
    #[arg(short, long)]
    bind: Option<String>,

    /// Data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Demo mode with synthetic cameras and a simulated classifier
    #[arg(long)]
    demo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.data_dir = data_dir;
    }
    if let Some(bind) = args.bind.clone() {
        config.server.bind_addr = bind;
    }
    config.validate()?;

    // Initialize logging; flags win over the configured level
    let log_level = if args.trace {
        Level::TRACE.as_str().to_lowercase()
    } else if args.debug {
        Level::DEBUG.as_str().to_lowercase()
    } else {
        config.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let bind_addr = config.server.bind_addr.clone();

    let mut engine = Engine::new(config).await?;
    engine.start().await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("🚀 Listening on http://{}", listener.local_addr()?);
    info!("   Press Ctrl+C to shutdown");

    axum::serve(listener, engine.router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    engine.stop().await?;
    info!("{} shutdown complete", NAME);

    Ok(())
}
