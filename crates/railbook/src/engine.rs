// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by every command that touches the database.

use std::sync::Arc;

use tracing::debug;

use railbook_booking::ReservationLedger;
use railbook_chart::{ChartPipeline, ChartScheduler};
use railbook_config::RailbookConfig;
use railbook_core::{InventoryStore, RailbookError, SystemClock};
use railbook_storage::SqliteStore;

/// An opened store with the ledger and chart pipeline built on top of it.
pub struct Engine {
    store: SqliteStore,
    pub ledger: Arc<ReservationLedger>,
    pub pipeline: Arc<ChartPipeline>,
}

impl Engine {
    pub async fn open(config: &RailbookConfig) -> Result<Self, RailbookError> {
        let store = SqliteStore::open(&config.storage).await?;
        let shared: Arc<dyn InventoryStore> = Arc::new(store.clone());
        let ledger = Arc::new(ReservationLedger::new(
            shared,
            Arc::new(SystemClock),
            config,
        ));
        let pipeline = Arc::new(ChartPipeline::new(ledger.clone()));
        debug!(path = %config.storage.database_path, "engine opened");
        Ok(Self {
            store,
            ledger,
            pipeline,
        })
    }

    pub fn scheduler(&self, config: &RailbookConfig) -> ChartScheduler {
        ChartScheduler::new(self.pipeline.clone(), config.chart.clone())
    }

    /// Drops the engine's handles and checkpoints the database.
    pub async fn close(self) -> Result<(), RailbookError> {
        let Self {
            store,
            ledger,
            pipeline,
        } = self;
        drop(pipeline);
        drop(ledger);
        store.close().await
    }
}
