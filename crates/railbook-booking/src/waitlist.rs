// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted FIFO waitlist per (train, date, subtype).
//!
//! Positions live in the store and are renumbered there; this type only
//! orders the promotion walk. Callers must hold the train lock for
//! [`WaitlistQueue::promote`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use railbook_core::types::{
    CoachClass, FareQuota, QuotaSubtype, Reservation, ReservationId, ReservationStatus,
    StationCode, TrainId, WaitlistEntry,
};
use railbook_core::{Clock, InventoryStore, RailbookError};

use crate::route::RouteGraph;

/// Free confirmable seats keyed by (class, quota).
pub type PoolSeats = HashMap<(CoachClass, FareQuota), u32>;

pub struct WaitlistQueue {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl WaitlistQueue {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn enqueue(
        &self,
        reservation: &ReservationId,
        train: &TrainId,
        date: NaiveDate,
        subtype: QuotaSubtype,
    ) -> Result<u32, RailbookError> {
        let position = self
            .store
            .enqueue_waitlist(reservation, train, date, subtype, self.clock.now())
            .await?;
        debug!(reservation = %reservation, train = %train, %date, %subtype, position, "waitlist entry appended");
        Ok(position)
    }

    pub async fn remove(&self, reservation: &ReservationId) -> Result<bool, RailbookError> {
        self.store.remove_waitlist(reservation).await
    }

    pub async fn position(&self, reservation: &ReservationId) -> Result<Option<u32>, RailbookError> {
        Ok(self
            .store
            .waitlist_entry(reservation)
            .await?
            .map(|e| e.position))
    }

    pub async fn entries(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, RailbookError> {
        self.store.waitlist_entries(train, date).await
    }

    /// Confirms every entry that fits, in priority order, in one store transaction.
    ///
    /// `free` is decremented by the seats handed out. Returns the promoted
    /// reservations with their new status.
    pub async fn promote(
        &self,
        train: &TrainId,
        date: NaiveDate,
        free: &mut PoolSeats,
    ) -> Result<Vec<Reservation>, RailbookError> {
        let entries = self.store.waitlist_entries(train, date).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut queue = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.store.get_reservation(&entry.reservation_id).await? {
                Some(res) if res.status == ReservationStatus::Waitlisted => queue.push((entry, res)),
                Some(res) => warn!(
                    reservation = %res.id,
                    status = %res.status,
                    "waitlist entry points at a reservation that is no longer waitlisted"
                ),
                None => warn!(reservation = %entry.reservation_id, "orphan waitlist entry"),
            }
        }

        let chosen = plan_promotion(&queue, free);
        if chosen.is_empty() {
            return Ok(Vec::new());
        }
        self.store.confirm_reservations(&chosen).await?;

        let chosen: HashSet<_> = chosen.into_iter().collect();
        let promoted: Vec<Reservation> = queue
            .into_iter()
            .filter(|(_, res)| chosen.contains(&res.id))
            .map(|(_, mut res)| {
                res.status = ReservationStatus::Confirmed;
                res
            })
            .collect();
        for res in &promoted {
            info!(
                reservation = %res.id,
                train = %train,
                %date,
                class = %res.coach_class,
                quota = %res.fare_quota,
                passengers = res.passenger_count,
                "waitlisted reservation promoted"
            );
        }
        Ok(promoted)
    }
}

/// Picks the reservations to confirm from `queue`, which must be sorted by
/// subtype priority then position.
///
/// Within a subtype bucket, the first entry of a pool that does not fit
/// blocks every later entry of that pool in the same bucket.
pub fn plan_promotion(
    queue: &[(WaitlistEntry, Reservation)],
    free: &mut PoolSeats,
) -> Vec<ReservationId> {
    let mut blocked: HashSet<(QuotaSubtype, CoachClass, FareQuota)> = HashSet::new();
    let mut chosen = Vec::new();
    for (entry, res) in queue {
        let pool = (res.coach_class, res.fare_quota);
        let lane = (entry.subtype, res.coach_class, res.fare_quota);
        if blocked.contains(&lane) {
            continue;
        }
        let seats = free.entry(pool).or_insert(0);
        if res.passenger_count <= *seats {
            *seats -= res.passenger_count;
            chosen.push(res.id.clone());
        } else {
            blocked.insert(lane);
        }
    }
    chosen
}

/// Waitlist bucket for a journey: boarding at the origin is general, short
/// intermediate segments are pooled, long ones remote.
pub fn classify_subtype(
    route: &RouteGraph,
    from: &StationCode,
    to: &StationCode,
    pooled_max_distance_km: f64,
) -> Result<QuotaSubtype, RailbookError> {
    if route.origin().station == *from {
        return Ok(QuotaSubtype::General);
    }
    let distance = route.distance(from, to)?;
    Ok(if distance <= pooled_max_distance_km {
        QuotaSubtype::Pooled
    } else {
        QuotaSubtype::RemoteLocation
    })
}
