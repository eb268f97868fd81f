// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::info;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

use dd_containermap::{Config, Reconciler, config};

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(config::log_level_from_env())?;
    info!(
        "dd-containermapd starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let mut reconciler = Reconciler::bootstrap(&config).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        let _ = shutdown_tx.send(true);
    });

    reconciler
        .run(&config, shutdown_rx)
        .await
        .context("reconciliation loop failed")?;

    info!("dd-containermapd shutting down");
    Ok(())
}
