// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use amqp_input::{config::Settings, input::AmqpInput, logging, router::StdoutRouter};
use anyhow::{anyhow, Context};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Consumes a RabbitMQ queue and prints every message as a JSON line.
#[derive(Debug, Parser)]
#[command(name = "amqp-input", version)]
struct Args {
    /// Path to the TOML settings file
    #[arg(short, long, default_value = "amqp-input.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    logging::init(&settings.log).map_err(|err| anyhow!(err))?;

    let config = settings.amqp.into_config()?;
    let mut running = AmqpInput::new(config, Arc::new(StdoutRouter))
        .start()
        .await?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            info!("shutdown requested");
        }
        _ = running.closed() => {}
    }

    let stats = running.shutdown().await?;
    info!(
        acknowledged = stats.acknowledged,
        requeued = stats.requeued,
        failed = stats.failed,
        "amqp input stopped"
    );

    Ok(())
}
