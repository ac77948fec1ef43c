// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `railbook serve` command implementation.
//!
//! Opens the inventory database and drives the chart scheduler until a
//! shutdown signal arrives, then closes the database cleanly.

use tracing::{error, info};

use railbook_config::RailbookConfig;
use railbook_core::RailbookError;

use crate::engine::Engine;
use crate::shutdown;

pub async fn run_serve(config: RailbookConfig) -> Result<(), RailbookError> {
    let engine = Engine::open(&config).await?;
    let scheduler = engine.scheduler(&config);
    let cancel = shutdown::install_signal_handler();

    info!(
        service = %config.service.name,
        database = %config.storage.database_path,
        poll_interval_secs = config.chart.poll_interval_secs,
        "railbook is running"
    );

    scheduler.run(cancel).await;
    drop(scheduler);

    if let Err(e) = engine.close().await {
        error!(error = %e, "failed to close database");
        return Err(e);
    }
    info!("railbook stopped");
    Ok(())
}
