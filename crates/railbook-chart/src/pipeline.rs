// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-stage chart preparation.
//!
//! Preliminary: hand freed seats out one last time, cancel whatever is still
//! waitlisted, and close bookings. Final: seat every confirmed and
//! contingency passenger. Both stages run under the train lock and are
//! no-ops once the chart has moved past them.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use railbook_booking::ReservationLedger;
use railbook_core::types::{ChartPhase, ChartState, ReservationStatus, TrainId};
use railbook_core::RailbookError;

pub struct ChartPipeline {
    ledger: Arc<ReservationLedger>,
}

impl ChartPipeline {
    pub fn new(ledger: Arc<ReservationLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<ReservationLedger> {
        &self.ledger
    }

    pub async fn run_preliminary(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<ChartState, RailbookError> {
        self.require_train(train).await?;
        let guard = self.ledger.lock_train(train).await;
        let state = self.ledger.chart_state(train, date).await?;
        if state.phase >= ChartPhase::PreliminaryClosed {
            return Ok(state);
        }
        self.preliminary_locked(&guard, state).await
    }

    /// Runs the preliminary stage first when the chart is still pending.
    pub async fn run_final(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<ChartState, RailbookError> {
        self.require_train(train).await?;
        let guard = self.ledger.lock_train(train).await;
        let mut state = self.ledger.chart_state(train, date).await?;
        if state.phase == ChartPhase::Final {
            return Ok(state);
        }
        if state.phase == ChartPhase::Pending {
            state = self.preliminary_locked(&guard, state).await?;
        }

        let store = self.ledger.store();
        let holders = store
            .list_reservations(
                train,
                date,
                &[
                    ReservationStatus::Confirmed,
                    ReservationStatus::ContingencyConfirmed,
                ],
            )
            .await?;
        let mut seated = 0u32;
        for res in &holders {
            let assigned = self.ledger.allocator().allocate_for(res).await?;
            seated += assigned.len() as u32;
        }

        state.phase = ChartPhase::Final;
        state.seats_allocated += seated;
        state.updated_at = Some(self.ledger.clock().now());
        store.save_chart_state(&state).await?;
        drop(guard);

        info!(
            train = %train,
            %date,
            reservations = holders.len(),
            seats_allocated = seated,
            "final chart prepared"
        );
        Ok(state)
    }

    async fn preliminary_locked(
        &self,
        guard: &OwnedMutexGuard<()>,
        mut state: ChartState,
    ) -> Result<ChartState, RailbookError> {
        let train = state.train.clone();
        let date = state.journey_date;
        let store = self.ledger.store();

        let rebalance = self.ledger.rebalance_locked(guard, &train, date).await?;

        let now = self.ledger.clock().now();
        let leftover = store
            .list_reservations(&train, date, &[ReservationStatus::Waitlisted])
            .await?;
        for res in &leftover {
            store.cancel_reservation(&res.id, 0.0, now).await?;
        }
        if !leftover.is_empty() {
            warn!(
                train = %train,
                %date,
                cancelled = leftover.len(),
                "waitlisted reservations cancelled at chart preparation"
            );
        }

        state.phase = ChartPhase::PreliminaryClosed;
        state.promoted += (rebalance.upgraded.len() + rebalance.promoted.len()) as u32;
        state.cancelled += leftover.len() as u32;
        state.updated_at = Some(now);
        store.save_chart_state(&state).await?;
        self.ledger.invalidate_availability(&train, date);

        info!(
            train = %train,
            %date,
            promoted = state.promoted,
            cancelled = state.cancelled,
            "preliminary chart prepared, bookings closed"
        );
        Ok(state)
    }

    async fn require_train(&self, train: &TrainId) -> Result<(), RailbookError> {
        match self.ledger.store().get_train(train).await? {
            Some(_) => Ok(()),
            None => Err(RailbookError::TrainNotFound(train.clone())),
        }
    }
}
