// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end booking scenarios.
//!
//! `TestHarness` assembles the whole engine over a temp SQLite database and a
//! [`ManualClock`], with the reference train from [`crate::fixtures`] already
//! registered.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use railbook_booking::{
    BookingReceipt, BookingRequest, PaymentOutcome, ReservationLedger, SeatAllocator,
};
use railbook_chart::{ChartPipeline, ChartScheduler};
use railbook_config::model::RailbookConfig;
use railbook_core::{Clock, InventoryStore, ManualClock, RailbookError};
use railbook_storage::{Database, SqliteStore};

use crate::fixtures;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    class_seats: u32,
    urgent_seats: u32,
    start_at: DateTime<Utc>,
    seed: u64,
    config: RailbookConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            class_seats: 10,
            urgent_seats: 0,
            start_at: fixtures::day_before_morning(),
            seed: 42,
            config: RailbookConfig::default(),
        }
    }

    /// Seat counts of each coach class on the reference train.
    pub fn with_seats(mut self, seats: u32, urgent: u32) -> Self {
        self.class_seats = seats;
        self.urgent_seats = urgent;
        self
    }

    /// Initial reading of the manual clock.
    pub fn starting_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_at = at;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn configure(mut self, edit: impl FnOnce(&mut RailbookConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub async fn build(self) -> Result<TestHarness, RailbookError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RailbookError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;
        let store: Arc<dyn InventoryStore> = Arc::new(SqliteStore::new(db));
        let clock = Arc::new(ManualClock::new(self.start_at));

        let ledger = ReservationLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
            &self.config,
        )
        .with_allocator(SeatAllocator::with_seed(
            Arc::clone(&store),
            self.config.allocation.max_coach_attempts,
            self.seed,
        ));
        ledger
            .register_train(
                &fixtures::train(self.class_seats, self.urgent_seats),
                fixtures::route(),
            )
            .await?;
        let ledger = Arc::new(ledger);
        let pipeline = Arc::new(ChartPipeline::new(Arc::clone(&ledger)));

        Ok(TestHarness {
            ledger,
            pipeline,
            store,
            clock,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over temp storage.
pub struct TestHarness {
    pub ledger: Arc<ReservationLedger>,
    pub pipeline: Arc<ChartPipeline>,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<dyn InventoryStore>,
    pub clock: Arc<ManualClock>,
    pub config: RailbookConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, RailbookError> {
        Self::builder().build().await
    }

    pub fn scheduler(&self) -> ChartScheduler {
        ChartScheduler::new(Arc::clone(&self.pipeline), self.config.chart.clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Stages `request` and reports a successful payment for it.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingReceipt, RailbookError> {
        let staged = self.ledger.stage_intent(request).await?;
        match self.ledger.on_payment_result(&staged.intent_id, true).await? {
            PaymentOutcome::Persisted(receipt) => Ok(receipt),
            other => Err(RailbookError::Internal(format!(
                "payment for {} was not persisted: {other:?}",
                staged.intent_id
            ))),
        }
    }
}
