// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic trigger for chart stages.
//!
//! Each tick looks at every train's origin departure for the journey dates
//! from today up to the configured lookahead, and runs whichever stage is due.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use railbook_config::model::ChartConfig;
use railbook_booking::time::{local_now, to_utc};
use railbook_core::types::{ChartPhase, Train};
use railbook_core::RailbookError;

use crate::pipeline::ChartPipeline;

/// Stages started by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub preliminary: u32,
    pub finalized: u32,
}

pub struct ChartScheduler {
    pipeline: Arc<ChartPipeline>,
    config: ChartConfig,
}

impl ChartScheduler {
    pub fn new(pipeline: Arc<ChartPipeline>, config: ChartConfig) -> Self {
        Self { pipeline, config }
    }

    /// Runs every stage that is due at the current instant.
    ///
    /// A failure on one (train, date) is logged and does not stop the others.
    pub async fn tick(&self) -> Result<TickReport, RailbookError> {
        let ledger = self.pipeline.ledger();
        ledger.purge_stale_intents();

        let now = ledger.clock().now();
        let today = local_now(ledger.clock().as_ref(), ledger.utc_offset()).date();
        let mut report = TickReport::default();

        for train in ledger.store().list_trains().await? {
            for offset in 0..=self.config.lookahead_days {
                let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
                    continue;
                };
                match self.run_due(&train, date, now).await {
                    Ok(Some(ChartPhase::Final)) => report.finalized += 1,
                    Ok(Some(_)) => report.preliminary += 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(train = %train.id, %date, error = %e, "chart stage failed");
                    }
                }
            }
        }

        if report != TickReport::default() {
            info!(
                preliminary = report.preliminary,
                finalized = report.finalized,
                "chart tick completed"
            );
        }
        Ok(report)
    }

    async fn run_due(
        &self,
        train: &Train,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<ChartPhase>, RailbookError> {
        let ledger = self.pipeline.ledger();
        let route = ledger.routes().get(ledger.store().as_ref(), &train.id).await?;
        let origin = route.origin();
        let Some(local) = route.departure_local(&origin.station, date) else {
            debug!(train = %train.id, "origin has no departure time, chart not scheduled");
            return Ok(None);
        };
        let Some(departure) = to_utc(local, ledger.utc_offset()) else {
            return Ok(None);
        };

        let preliminary_at =
            departure - Duration::hours(i64::from(self.config.preliminary_hours_before));
        let final_at = departure - Duration::minutes(i64::from(self.config.final_minutes_before));
        if now < preliminary_at {
            return Ok(None);
        }

        let state = ledger.chart_state(&train.id, date).await?;
        if now >= final_at {
            if state.phase == ChartPhase::Final {
                return Ok(None);
            }
            self.pipeline.run_final(&train.id, date).await?;
            return Ok(Some(ChartPhase::Final));
        }
        if state.phase == ChartPhase::Pending {
            self.pipeline.run_preliminary(&train.id, date).await?;
            return Ok(Some(ChartPhase::PreliminaryClosed));
        }
        Ok(None)
    }

    /// Ticks every `poll_interval_secs` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(StdDuration::from_secs(self.config.poll_interval_secs.max(1)));
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            lookahead_days = self.config.lookahead_days,
            "chart scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "chart tick failed (non-fatal)");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("chart scheduler shutting down");
                    break;
                }
            }
        }
    }
}
