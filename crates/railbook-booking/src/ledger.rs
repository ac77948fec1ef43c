// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reservation state machine and concurrency controller.
//!
//! Staging decides a provisional outcome and keeps the intent in memory.
//! Payment re-decides under the train lock and persists atomically.
//! Cancellation releases capacity, then upgrades contingency holders and
//! promotes the waitlist within the same critical section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use railbook_config::model::{BookingConfig, CancellationConfig, RailbookConfig};
use railbook_core::types::{
    AvailabilitySnapshot, ChartState, CoachClass, FareQuota, IntentId, LocatorCode, PoolKey,
    QuotaSubtype, Reservation, ReservationId, ReservationStatus, RouteStop, StationCode, Train,
    TrainId,
};
use railbook_core::{Clock, InventoryStore, RailbookError};

use crate::allocator::SeatAllocator;
use crate::availability::{AvailabilityEngine, PoolCapacity};
use crate::factory::{build_reservation, new_intent_id, new_locator};
use crate::fare::{FareCalculator, FareProfile, FareRates, round_currency};
use crate::gate::UrgentBookingGate;
use crate::locks::TrainLocks;
use crate::request::{
    BookingReceipt, BookingRequest, CancellationReceipt, PaymentOutcome, StagedIntent,
};
use crate::route::RouteCache;
use crate::time::{local_now, local_offset, to_utc};
use crate::waitlist::{PoolSeats, WaitlistQueue, classify_subtype};

/// Fresh locators tried when the generated one collides.
const LOCATOR_ATTEMPTS: u32 = 5;

/// Reservations moved to confirmed by freed capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rebalance {
    /// Contingency holders upgraded to confirmed.
    pub upgraded: Vec<ReservationId>,
    /// Waitlisted reservations promoted to confirmed.
    pub promoted: Vec<ReservationId>,
}

#[derive(Debug, Clone)]
struct PendingIntent {
    request: BookingRequest,
    locator: LocatorCode,
    amount: f64,
    provisional: ReservationStatus,
    subtype: QuotaSubtype,
    staged_at: DateTime<Utc>,
}

pub struct ReservationLedger {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    booking: BookingConfig,
    cancellation: CancellationConfig,
    offset: FixedOffset,
    routes: Arc<RouteCache>,
    fares: FareCalculator,
    availability: AvailabilityEngine,
    gate: UrgentBookingGate,
    waitlist: WaitlistQueue,
    allocator: SeatAllocator,
    locks: TrainLocks,
    intents: DashMap<IntentId, PendingIntent>,
}

impl ReservationLedger {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        config: &RailbookConfig,
    ) -> Self {
        let offset = local_offset(config.booking.utc_offset_minutes);
        let routes = Arc::new(RouteCache::new());
        Self {
            availability: AvailabilityEngine::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&routes),
                config.availability.cache_ttl_secs,
                config.booking.contingency_fraction,
            ),
            gate: UrgentBookingGate::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.urgent.windows(),
                offset,
            ),
            waitlist: WaitlistQueue::new(Arc::clone(&store), Arc::clone(&clock)),
            allocator: SeatAllocator::new(
                Arc::clone(&store),
                config.allocation.max_coach_attempts,
            ),
            fares: FareCalculator::new(config.fare.clone()),
            booking: config.booking.clone(),
            cancellation: config.cancellation.clone(),
            locks: TrainLocks::new(),
            intents: DashMap::new(),
            offset,
            routes,
            store,
            clock,
        }
    }

    /// Replace the seat allocator, e.g. with a seeded one.
    pub fn with_allocator(mut self, allocator: SeatAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn routes(&self) -> &RouteCache {
        &self.routes
    }

    pub fn allocator(&self) -> &SeatAllocator {
        &self.allocator
    }

    pub fn waitlist(&self) -> &WaitlistQueue {
        &self.waitlist
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.offset
    }

    /// Exclusive access to a train's inventory. Hold the guard for the whole
    /// read-decide-write sequence.
    pub async fn lock_train(&self, train: &TrainId) -> OwnedMutexGuard<()> {
        self.locks.lock(train).await
    }

    // --- Staging ---

    /// Validates a request and stages an in-memory payment intent.
    pub async fn stage_intent(&self, request: BookingRequest) -> Result<StagedIntent, RailbookError> {
        request.validate(&self.booking)?;
        let train = self.load_train(&request.train).await?;
        if !train.offers(request.coach_class) {
            return Err(RailbookError::InvalidRequest(format!(
                "train {} does not offer class {}",
                train.id, request.coach_class
            )));
        }
        let route = self.routes.get(self.store.as_ref(), &train.id).await?;
        let distance_km = route.distance(&request.from, &request.to)?;

        self.check_horizon(&train.id, request.journey_date)?;
        if request.fare_quota == FareQuota::Urgent
            && !self
                .gate
                .is_open(request.journey_date, request.coach_class, &train.id)
                .await?
        {
            return Err(RailbookError::UrgentWindowClosed {
                train: train.id.clone(),
                date: request.journey_date,
                coach_class: request.coach_class,
            });
        }
        self.ensure_chart_open(&train.id, request.journey_date).await?;

        let provisional = {
            let _guard = self.locks.lock(&train.id).await;
            self.decide(&train, &request, true).await?
        };

        let subtype = classify_subtype(
            &route,
            &request.from,
            &request.to,
            self.booking.pooled_max_distance_km,
        )?;
        let profiles: Vec<FareProfile> = request
            .passengers
            .iter()
            .map(|p| FareProfile {
                age: p.age,
                gender: p.gender,
            })
            .collect();
        let amount = self.fares.compute(
            distance_km,
            request.coach_class,
            request.fare_quota,
            FareRates::from(&train),
            &profiles,
        );

        let intent_id = new_intent_id();
        let locator = new_locator(&mut rand::thread_rng());
        info!(
            intent = %intent_id,
            train = %train.id,
            date = %request.journey_date,
            class = %request.coach_class,
            quota = %request.fare_quota,
            passengers = request.passengers.len(),
            %provisional,
            amount,
            "booking intent staged"
        );
        self.intents.insert(
            intent_id.clone(),
            PendingIntent {
                request,
                locator: locator.clone(),
                amount,
                provisional,
                subtype,
                staged_at: self.clock.now(),
            },
        );

        Ok(StagedIntent {
            intent_id,
            locator,
            amount,
            provisional,
            distance_km,
            subtype,
        })
    }

    // --- Payment ---

    /// Applies the payment collaborator's verdict to a staged intent.
    pub async fn on_payment_result(
        &self,
        intent_id: &IntentId,
        succeeded: bool,
    ) -> Result<PaymentOutcome, RailbookError> {
        if !succeeded {
            if self.intents.remove(intent_id).is_some() {
                info!(intent = %intent_id, "payment failed, intent discarded");
                return Ok(PaymentOutcome::Discarded(intent_id.clone()));
            }
            return match self.store.find_by_intent(intent_id).await? {
                Some(existing) => Ok(PaymentOutcome::AlreadyProcessed(existing)),
                None => Err(RailbookError::IntentNotFound(intent_id.to_string())),
            };
        }

        let pending = self.intents.get(intent_id).map(|p| p.value().clone());
        let Some(pending) = pending else {
            return match self.store.find_by_intent(intent_id).await? {
                Some(existing) => Ok(PaymentOutcome::AlreadyProcessed(existing)),
                None => Err(RailbookError::IntentNotFound(intent_id.to_string())),
            };
        };
        let request = &pending.request;

        let _guard = self.locks.lock(&request.train).await;
        if let Some(existing) = self.store.find_by_intent(intent_id).await? {
            self.intents.remove(intent_id);
            return Ok(PaymentOutcome::AlreadyProcessed(existing));
        }
        if let Err(e) = self
            .ensure_chart_open(&request.train, request.journey_date)
            .await
        {
            self.intents.remove(intent_id);
            warn!(intent = %intent_id, train = %request.train, "chart closed before payment completed");
            return Err(e);
        }

        let train = self.load_train(&request.train).await?;
        let status = self.decide(&train, request, false).await?;
        let now = self.clock.now();

        let mut locator = pending.locator.clone();
        let mut attempt = 0;
        let (reservation, waitlist_position) = loop {
            let (reservation, passengers) = build_reservation(
                request,
                locator.clone(),
                intent_id.clone(),
                status,
                pending.subtype,
                pending.amount,
                now,
            );
            match self.store.insert_reservation(&reservation, &passengers).await {
                Ok(position) => break (reservation, position),
                Err(RailbookError::DuplicateLocator(code)) if attempt < LOCATOR_ATTEMPTS => {
                    attempt += 1;
                    debug!(locator = %code, attempt, "locator collision, regenerating");
                    locator = new_locator(&mut rand::thread_rng());
                }
                Err(e) => return Err(e),
            }
        };
        self.intents.remove(intent_id);
        self.availability
            .invalidate(&reservation.train, reservation.journey_date);

        if status == ReservationStatus::Confirmed {
            self.allocator.allocate_for(&reservation).await?;
        }

        let downgraded =
            pending.provisional == ReservationStatus::Confirmed && status != pending.provisional;
        if downgraded {
            warn!(
                reservation = %reservation.id,
                train = %reservation.train,
                date = %reservation.journey_date,
                class = %reservation.coach_class,
                %status,
                "capacity taken between staging and payment, reservation downgraded"
            );
        }
        info!(
            reservation = %reservation.id,
            locator = %reservation.locator,
            train = %reservation.train,
            date = %reservation.journey_date,
            class = %reservation.coach_class,
            quota = %reservation.fare_quota,
            %status,
            waitlist_position,
            "reservation persisted"
        );

        let passengers = self.store.passengers(&reservation.id).await?;
        Ok(PaymentOutcome::Persisted(BookingReceipt {
            reservation,
            passengers,
            waitlist_position,
            downgraded,
        }))
    }

    /// Drops intents staged longer than the configured time-to-live ago.
    pub fn purge_stale_intents(&self) -> usize {
        let ttl = i64::try_from(self.booking.intent_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds);
        let Some(cutoff) = ttl.and_then(|ttl| self.clock.now().checked_sub_signed(ttl)) else {
            return 0;
        };
        let before = self.intents.len();
        self.intents.retain(|_, p| p.staged_at > cutoff);
        let purged = before.saturating_sub(self.intents.len());
        if purged > 0 {
            info!(purged, "stale payment intents dropped");
        }
        purged
    }

    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    // --- Cancellation ---

    pub async fn cancel(&self, id: &ReservationId) -> Result<CancellationReceipt, RailbookError> {
        let train = self.load_reservation(id).await?.train;
        let guard = self.locks.lock(&train).await;
        // Status may have moved while waiting for the lock.
        let res = self.load_reservation(id).await?;
        if res.status == ReservationStatus::Cancelled {
            return Err(RailbookError::InvalidTransition {
                reservation: res.id.to_string(),
                from: res.status,
                to: ReservationStatus::Cancelled,
            });
        }

        let now = self.clock.now();
        let departure = self.boarding_departure(&res).await;
        let charge = cancellation_charge(&res, departure, now, &self.cancellation);
        self.store.cancel_reservation(&res.id, charge, now).await?;

        let released = if res.status.holds_capacity() {
            res.passenger_count
        } else {
            0
        };
        // A departing waitlist head may unblock the entries behind it.
        let rebalance = if released > 0 || res.status == ReservationStatus::Waitlisted {
            self.rebalance_locked(&guard, &res.train, res.journey_date)
                .await?
        } else {
            Rebalance::default()
        };
        self.availability.invalidate(&res.train, res.journey_date);
        drop(guard);

        info!(
            reservation = %res.id,
            train = %res.train,
            date = %res.journey_date,
            class = %res.coach_class,
            from_status = %res.status,
            charge,
            released,
            upgraded = rebalance.upgraded.len(),
            promoted = rebalance.promoted.len(),
            "reservation cancelled"
        );
        Ok(CancellationReceipt {
            reservation_id: res.id,
            locator: res.locator,
            charge,
            refund: round_currency(res.total_amount - charge),
            released,
            upgraded: rebalance.upgraded,
            promoted: rebalance.promoted,
        })
    }

    pub async fn cancel_by_locator(
        &self,
        locator: &LocatorCode,
    ) -> Result<CancellationReceipt, RailbookError> {
        let res = self
            .store
            .find_by_locator(locator)
            .await?
            .ok_or_else(|| RailbookError::ReservationNotFound(locator.to_string()))?;
        self.cancel(&res.id).await
    }

    /// Hands freed confirmable seats of (train, date) to contingency holders,
    /// then to the waitlist, and seats everyone newly confirmed.
    ///
    /// The guard must be the one returned by [`Self::lock_train`] for `train`.
    pub async fn rebalance_locked(
        &self,
        _guard: &OwnedMutexGuard<()>,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Rebalance, RailbookError> {
        let train_def = self.load_train(train).await?;
        let mut free = self.free_confirmable(&train_def, date).await?;

        let contingency = self
            .store
            .list_reservations(train, date, &[ReservationStatus::ContingencyConfirmed])
            .await?;
        let upgraded = plan_upgrades(&contingency, &mut free);
        if !upgraded.is_empty() {
            self.store.confirm_reservations(&upgraded).await?;
            for id in &upgraded {
                info!(reservation = %id, train = %train, %date, "contingency reservation upgraded");
            }
        }

        let promoted = self.waitlist.promote(train, date, &mut free).await?;

        for id in &upgraded {
            self.allocator.allocate(id).await?;
        }
        for res in &promoted {
            self.allocator.allocate_for(res).await?;
        }
        if !upgraded.is_empty() || !promoted.is_empty() {
            self.availability.invalidate(train, date);
        }

        Ok(Rebalance {
            upgraded,
            promoted: promoted.into_iter().map(|r| r.id).collect(),
        })
    }

    // --- Read projections ---

    pub async fn availability(
        &self,
        train: &TrainId,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
        class: CoachClass,
        quota: FareQuota,
    ) -> Result<AvailabilitySnapshot, RailbookError> {
        self.availability
            .query(train, from, to, date, class, quota)
            .await
    }

    /// Drops cached availability of (train, date) after an external write.
    pub fn invalidate_availability(&self, train: &TrainId, date: NaiveDate) {
        self.availability.invalidate(train, date);
    }

    pub async fn reservation(&self, id: &ReservationId) -> Result<Reservation, RailbookError> {
        self.load_reservation(id).await
    }

    pub async fn by_locator(&self, locator: &LocatorCode) -> Result<Reservation, RailbookError> {
        self.store
            .find_by_locator(locator)
            .await?
            .ok_or_else(|| RailbookError::ReservationNotFound(locator.to_string()))
    }

    pub async fn waitlist_position(&self, id: &ReservationId) -> Result<Option<u32>, RailbookError> {
        self.waitlist.position(id).await
    }

    pub async fn chart_state(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<ChartState, RailbookError> {
        Ok(self
            .store
            .chart_state(train, date)
            .await?
            .unwrap_or_else(|| ChartState::pending(train.clone(), date)))
    }

    // --- Administration ---

    /// Inserts or updates a train together with its full stop list.
    pub async fn register_train(
        &self,
        train: &Train,
        stops: Vec<RouteStop>,
    ) -> Result<(), RailbookError> {
        self.store.upsert_train(train).await?;
        let graph = self.routes.replace(self.store.as_ref(), &train.id, stops).await?;
        info!(train = %train.id, stops = graph.stops().len(), "train registered");
        Ok(())
    }

    pub async fn replace_route(
        &self,
        train: &TrainId,
        stops: Vec<RouteStop>,
    ) -> Result<(), RailbookError> {
        self.load_train(train).await?;
        let _guard = self.locks.lock(train).await;
        self.routes.replace(self.store.as_ref(), train, stops).await?;
        info!(train = %train, "route replaced");
        Ok(())
    }

    // --- Internals ---

    async fn load_train(&self, id: &TrainId) -> Result<Train, RailbookError> {
        self.store
            .get_train(id)
            .await?
            .ok_or_else(|| RailbookError::TrainNotFound(id.clone()))
    }

    async fn load_reservation(&self, id: &ReservationId) -> Result<Reservation, RailbookError> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or_else(|| RailbookError::ReservationNotFound(id.to_string()))
    }

    fn check_horizon(&self, train: &TrainId, date: NaiveDate) -> Result<(), RailbookError> {
        let today = local_now(self.clock.as_ref(), self.offset).date();
        let closed = |reason: String| RailbookError::BookingWindowClosed {
            train: train.clone(),
            date,
            reason,
        };
        if date < today {
            return Err(closed("journey date has passed".into()));
        }
        let last = today
            .checked_add_days(Days::new(u64::from(self.booking.advance_booking_days)))
            .unwrap_or(NaiveDate::MAX);
        if date > last {
            return Err(closed(format!(
                "booking opens {} days before the journey",
                self.booking.advance_booking_days
            )));
        }
        Ok(())
    }

    async fn ensure_chart_open(&self, train: &TrainId, date: NaiveDate) -> Result<(), RailbookError> {
        match self.store.chart_state(train, date).await? {
            Some(state) if !state.is_open() => Err(RailbookError::BookingWindowClosed {
                train: train.clone(),
                date,
                reason: format!("chart is {}", state.phase),
            }),
            _ => Ok(()),
        }
    }

    /// Outcome for the request against current committed counts.
    ///
    /// Callers hold the train lock.
    async fn decide(
        &self,
        train: &Train,
        request: &BookingRequest,
        enforce_waitlist_limit: bool,
    ) -> Result<ReservationStatus, RailbookError> {
        let pool = PoolKey {
            train: train.id.clone(),
            journey_date: request.journey_date,
            coach_class: request.coach_class,
            fare_quota: request.fare_quota,
        };
        let capacity = PoolCapacity::of(
            train,
            request.coach_class,
            request.fare_quota,
            self.availability.contingency_fraction(),
        );
        let counts = self.store.committed_counts(&pool).await?;
        let needed = request.passengers.len() as u32;

        if capacity.confirmable.saturating_sub(counts.confirmed) >= needed {
            return Ok(ReservationStatus::Confirmed);
        }
        if capacity.contingency.saturating_sub(counts.contingency) >= needed {
            return Ok(ReservationStatus::ContingencyConfirmed);
        }
        if enforce_waitlist_limit
            && self.availability.waitlisted(&pool).await? >= self.booking.waitlist_limit
        {
            return Err(RailbookError::WaitlistFull {
                train: train.id.clone(),
                date: request.journey_date,
                coach_class: request.coach_class,
                quota: request.fare_quota,
            });
        }
        Ok(ReservationStatus::Waitlisted)
    }

    async fn free_confirmable(
        &self,
        train: &Train,
        date: NaiveDate,
    ) -> Result<PoolSeats, RailbookError> {
        let mut free = HashMap::new();
        for &class in &train.coach_classes {
            for quota in [FareQuota::Standard, FareQuota::Urgent] {
                let capacity = PoolCapacity::of(
                    train,
                    class,
                    quota,
                    self.availability.contingency_fraction(),
                );
                let counts = self
                    .store
                    .committed_counts(&PoolKey {
                        train: train.id.clone(),
                        journey_date: date,
                        coach_class: class,
                        fare_quota: quota,
                    })
                    .await?;
                free.insert(
                    (class, quota),
                    capacity.confirmable.saturating_sub(counts.confirmed),
                );
            }
        }
        Ok(free)
    }

    async fn boarding_departure(&self, res: &Reservation) -> Option<DateTime<Utc>> {
        let route = self.routes.get(self.store.as_ref(), &res.train).await.ok()?;
        let local = route.departure_local(&res.from, res.journey_date)?;
        to_utc(local, self.offset)
    }
}

/// Contingency holders to upgrade, oldest first; the first one of a pool that
/// does not fit blocks the rest of that pool.
fn plan_upgrades(contingency: &[Reservation], free: &mut PoolSeats) -> Vec<ReservationId> {
    let mut blocked: HashSet<(CoachClass, FareQuota)> = HashSet::new();
    let mut upgraded = Vec::new();
    for res in contingency {
        let pool = (res.coach_class, res.fare_quota);
        if blocked.contains(&pool) {
            continue;
        }
        let seats = free.entry(pool).or_insert(0);
        if res.passenger_count <= *seats {
            *seats -= res.passenger_count;
            upgraded.push(res.id.clone());
        } else {
            blocked.insert(pool);
        }
    }
    upgraded
}

/// Amount retained when `res` is cancelled at `now`. Capped at the amount paid.
///
/// `departure` is the boarding station's departure instant; without one the
/// flat per-class charge applies.
pub fn cancellation_charge(
    res: &Reservation,
    departure: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &CancellationConfig,
) -> f64 {
    let passengers = f64::from(res.passenger_count);
    let amount = res.total_amount;
    let charge = match res.status {
        ReservationStatus::AwaitingPayment | ReservationStatus::Cancelled => 0.0,
        ReservationStatus::Waitlisted | ReservationStatus::ContingencyConfirmed => {
            config.waitlist_clerkage * passengers
        }
        ReservationStatus::Confirmed if res.fare_quota == FareQuota::Urgent => amount,
        ReservationStatus::Confirmed => {
            let flat = config.flat_charge(res.coach_class) * passengers;
            match departure.map(|at| at - now) {
                None => flat,
                Some(left) if left >= Duration::hours(48) => flat,
                Some(left) if left >= Duration::hours(12) => (amount * 0.25).max(flat),
                Some(left) if left >= Duration::hours(4) => (amount * 0.5).max(flat),
                Some(_) => amount,
            }
        }
    };
    round_currency(charge.clamp(0.0, amount.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use railbook_core::ManualClock;
    use railbook_core::types::{ChartPhase, Gender};
    use railbook_storage::{Database, SqliteStore};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    use crate::request::PassengerDetails;

    fn journey() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    /// 2026-03-01 10:00 local time.
    fn morning_before() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap()
    }

    /// Two-class train with `seats` and `urgent` seats in each class.
    fn train(seats: u32, urgent: u32) -> Train {
        Train {
            id: "12951".into(),
            name: "Western Express".into(),
            total_seats: seats * 2,
            urgent_quota_seats: urgent * 2,
            standard_rate_per_km: 0.5,
            urgent_rate_per_km: 0.6,
            coach_classes: vec![CoachClass::Sleeper, CoachClass::ThirdAc],
        }
    }

    fn stops() -> Vec<RouteStop> {
        let stop = |seq: u32, station: &str, km: f64, dep: Option<u32>, day: u32| RouteStop {
            train: "12951".into(),
            station: station.into(),
            sequence: seq,
            distance_km: km,
            arrival: None,
            departure: dep.and_then(|h| NaiveTime::from_hms_opt(h, 0, 0)),
            day_offset: day,
        };
        vec![
            stop(1, "MMCT", 0.0, Some(17), 0),
            stop(2, "ST", 263.0, Some(20), 0),
            stop(3, "BRC", 392.0, Some(22), 0),
            stop(4, "NDLS", 1386.0, None, 1),
        ]
    }

    struct Fixture {
        ledger: ReservationLedger,
        clock: Arc<ManualClock>,
        _dir: TempDir,
    }

    async fn fixture_with(train: Train, config: RailbookConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let store: Arc<dyn InventoryStore> = Arc::new(SqliteStore::new(db));
        let clock = Arc::new(ManualClock::new(morning_before()));
        let ledger = ReservationLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
            &config,
        )
        .with_allocator(SeatAllocator::with_seed(store, 5, 42));
        ledger.register_train(&train, stops()).await.unwrap();
        Fixture {
            ledger,
            clock,
            _dir: dir,
        }
    }

    async fn fixture(seats: u32) -> Fixture {
        fixture_with(train(seats, 0), RailbookConfig::default()).await
    }

    fn request(n: usize) -> BookingRequest {
        BookingRequest {
            owner: "asha".into(),
            train: "12951".into(),
            from: "MMCT".into(),
            to: "NDLS".into(),
            journey_date: journey(),
            coach_class: CoachClass::Sleeper,
            fare_quota: FareQuota::Standard,
            passengers: (0..n)
                .map(|i| PassengerDetails {
                    name: format!("Passenger {i}"),
                    age: 30,
                    gender: Gender::Female,
                    berth_preference: None,
                })
                .collect(),
            group_id: None,
        }
    }

    async fn book(ledger: &ReservationLedger, req: BookingRequest) -> BookingReceipt {
        let staged = ledger.stage_intent(req).await.unwrap();
        match ledger.on_payment_result(&staged.intent_id, true).await.unwrap() {
            PaymentOutcome::Persisted(receipt) => receipt,
            other => panic!("expected a persisted booking, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn replaced_route_takes_effect_immediately() {
        let f = fixture(10).await;
        let mut from_brc = request(1);
        from_brc.from = "BRC".into();
        book(&f.ledger, from_brc.clone()).await;

        let without_brc: Vec<RouteStop> = stops()
            .into_iter()
            .filter(|s| s.station.as_str() != "BRC")
            .enumerate()
            .map(|(i, s)| RouteStop {
                sequence: i as u32 + 1,
                ..s
            })
            .collect();
        f.ledger
            .replace_route(&"12951".into(), without_brc)
            .await
            .unwrap();

        assert!(matches!(
            f.ledger.stage_intent(from_brc).await,
            Err(RailbookError::RouteNotFound { .. })
        ));
        book(&f.ledger, request(1)).await;
    }

    #[tokio::test]
    async fn paid_booking_is_confirmed_and_seated() {
        let f = fixture(10).await;
        let staged = f.ledger.stage_intent(request(2)).await.unwrap();
        assert_eq!(staged.provisional, ReservationStatus::Confirmed);
        assert_eq!(staged.subtype, QuotaSubtype::General);
        assert_eq!(staged.distance_km, 1386.0);
        assert_eq!(f.ledger.pending_intents(), 1);

        let outcome = f
            .ledger
            .on_payment_result(&staged.intent_id, true)
            .await
            .unwrap();
        let PaymentOutcome::Persisted(receipt) = outcome else {
            panic!("expected a persisted booking");
        };
        assert_eq!(receipt.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(receipt.reservation.total_amount, staged.amount);
        assert!(!receipt.downgraded);
        assert_eq!(receipt.waitlist_position, None);
        assert_eq!(receipt.passengers.len(), 2);
        assert!(receipt.passengers.iter().all(|p| p.seat.is_some() && p.berth.is_some()));
        assert_ne!(receipt.passengers[0].seat, receipt.passengers[1].seat);
        assert_eq!(f.ledger.pending_intents(), 0);

        let found = f.ledger.by_locator(&receipt.reservation.locator).await.unwrap();
        assert_eq!(found.id, receipt.reservation.id);
    }

    #[tokio::test]
    async fn full_pool_goes_to_contingency_then_waitlist() {
        let f = fixture(10).await;
        book(&f.ledger, request(6)).await;
        book(&f.ledger, request(3)).await;

        let rac = book(&f.ledger, request(1)).await;
        assert_eq!(rac.reservation.status, ReservationStatus::ContingencyConfirmed);
        assert!(rac.passengers.iter().all(|p| p.seat.is_none()));

        let wl = book(&f.ledger, request(2)).await;
        assert_eq!(wl.reservation.status, ReservationStatus::Waitlisted);
        assert_eq!(wl.waitlist_position, Some(1));
        assert_eq!(
            f.ledger.waitlist_position(&wl.reservation.id).await.unwrap(),
            Some(1)
        );

        let snapshot = f
            .ledger
            .availability(
                &"12951".into(),
                &"MMCT".into(),
                &"NDLS".into(),
                journey(),
                CoachClass::Sleeper,
                FareQuota::Standard,
            )
            .await
            .unwrap();
        assert_eq!(
            snapshot,
            AvailabilitySnapshot {
                available: 0,
                contingency: 0,
                waitlisted: 1
            }
        );
    }

    #[tokio::test]
    async fn failed_payment_discards_and_persists_nothing() {
        let f = fixture(10).await;
        let staged = f.ledger.stage_intent(request(1)).await.unwrap();
        let outcome = f
            .ledger
            .on_payment_result(&staged.intent_id, false)
            .await
            .unwrap();
        assert_eq!(outcome, PaymentOutcome::Discarded(staged.intent_id.clone()));
        assert!(f.ledger.store().find_by_intent(&staged.intent_id).await.unwrap().is_none());

        let again = f.ledger.on_payment_result(&staged.intent_id, true).await;
        assert!(matches!(again, Err(RailbookError::IntentNotFound(_))));
    }

    #[tokio::test]
    async fn repeated_success_is_idempotent() {
        let f = fixture(10).await;
        let staged = f.ledger.stage_intent(request(1)).await.unwrap();
        let first = f.ledger.on_payment_result(&staged.intent_id, true).await.unwrap();
        let PaymentOutcome::Persisted(receipt) = first else {
            panic!("expected a persisted booking");
        };
        for succeeded in [true, false] {
            let again = f
                .ledger
                .on_payment_result(&staged.intent_id, succeeded)
                .await
                .unwrap();
            match again {
                PaymentOutcome::AlreadyProcessed(res) => assert_eq!(res.id, receipt.reservation.id),
                other => panic!("expected AlreadyProcessed, got {other:?}"),
            }
        }
        let all = f
            .ledger
            .store()
            .list_reservations(&"12951".into(), journey(), &[ReservationStatus::Confirmed])
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn capacity_race_downgrades_the_later_payer() {
        let f = fixture(10).await;
        let a = f.ledger.stage_intent(request(5)).await.unwrap();
        let b = f.ledger.stage_intent(request(5)).await.unwrap();
        assert_eq!(a.provisional, ReservationStatus::Confirmed);
        assert_eq!(b.provisional, ReservationStatus::Confirmed);

        f.ledger.on_payment_result(&a.intent_id, true).await.unwrap();
        let PaymentOutcome::Persisted(receipt) =
            f.ledger.on_payment_result(&b.intent_id, true).await.unwrap()
        else {
            panic!("expected a persisted booking");
        };
        assert!(receipt.downgraded);
        assert_eq!(receipt.reservation.status, ReservationStatus::Waitlisted);
        assert_eq!(receipt.waitlist_position, Some(1));
        assert!(logs_contain("reservation downgraded"));
    }

    #[tokio::test]
    async fn cancelling_confirmed_promotes_waitlist() {
        let f = fixture(10).await;
        let first = book(&f.ledger, request(4)).await;
        book(&f.ledger, request(4)).await;
        let waiting = book(&f.ledger, request(4)).await;
        assert_eq!(waiting.reservation.status, ReservationStatus::Waitlisted);

        let receipt = f.ledger.cancel(&first.reservation.id).await.unwrap();
        assert_eq!(receipt.released, 4);
        assert_eq!(receipt.promoted, vec![waiting.reservation.id.clone()]);
        assert!(receipt.charge > 0.0);
        assert!((receipt.charge + receipt.refund - first.reservation.total_amount).abs() < 0.01);

        let promoted = f.ledger.reservation(&waiting.reservation.id).await.unwrap();
        assert_eq!(promoted.status, ReservationStatus::Confirmed);
        assert_eq!(f.ledger.waitlist_position(&promoted.id).await.unwrap(), None);
        let seated = f.ledger.store().passengers(&promoted.id).await.unwrap();
        assert!(seated.iter().all(|p| p.seat.is_some()));

        let twice = f.ledger.cancel(&first.reservation.id).await;
        assert!(matches!(
            twice,
            Err(RailbookError::InvalidTransition {
                from: ReservationStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn freed_seats_upgrade_contingency_before_waitlist() {
        let f = fixture(10).await;
        book(&f.ledger, request(6)).await;
        let three = book(&f.ledger, request(3)).await;
        let rac = book(&f.ledger, request(1)).await;
        let waiting = book(&f.ledger, request(2)).await;

        let receipt = f.ledger.cancel(&three.reservation.id).await.unwrap();
        assert_eq!(receipt.upgraded, vec![rac.reservation.id.clone()]);
        assert_eq!(receipt.promoted, vec![waiting.reservation.id.clone()]);
        assert_eq!(
            f.ledger.reservation(&rac.reservation.id).await.unwrap().status,
            ReservationStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn cancelling_waitlisted_renumbers_and_charges_clerkage() {
        let f = fixture(10).await;
        book(&f.ledger, request(6)).await;
        book(&f.ledger, request(3)).await;
        let w1 = book(&f.ledger, request(2)).await;
        let w2 = book(&f.ledger, request(2)).await;
        assert_eq!(w2.waitlist_position, Some(2));

        let receipt = f.ledger.cancel(&w1.reservation.id).await.unwrap();
        assert_eq!(receipt.released, 0);
        assert_eq!(receipt.charge, 120.0);
        assert!(receipt.promoted.is_empty());
        assert_eq!(
            f.ledger.waitlist_position(&w2.reservation.id).await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn cancelling_blocked_head_unblocks_the_queue() {
        let f = fixture(10).await;
        book(&f.ledger, request(6)).await;
        let three = book(&f.ledger, request(3)).await;
        let head = book(&f.ledger, request(4)).await;
        let behind = book(&f.ledger, request(2)).await;
        assert_eq!(behind.waitlist_position, Some(2));

        // Three seats free, but the head needs four and blocks the bucket.
        let receipt = f.ledger.cancel(&three.reservation.id).await.unwrap();
        assert!(receipt.promoted.is_empty());

        let receipt = f.ledger.cancel(&head.reservation.id).await.unwrap();
        assert_eq!(receipt.promoted, vec![behind.reservation.id.clone()]);
        let promoted = f.ledger.reservation(&behind.reservation.id).await.unwrap();
        assert_eq!(promoted.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn closed_chart_rejects_staging() {
        let f = fixture(10).await;
        let mut state = ChartState::pending("12951".into(), journey());
        state.phase = ChartPhase::PreliminaryClosed;
        f.ledger.store().save_chart_state(&state).await.unwrap();

        let err = f.ledger.stage_intent(request(1)).await.unwrap_err();
        assert!(matches!(err, RailbookError::BookingWindowClosed { .. }), "{err}");
    }

    #[tokio::test]
    async fn chart_closing_before_payment_rejects_and_drops_intent() {
        let f = fixture(10).await;
        let staged = f.ledger.stage_intent(request(1)).await.unwrap();
        let mut state = ChartState::pending("12951".into(), journey());
        state.phase = ChartPhase::PreliminaryClosed;
        f.ledger.store().save_chart_state(&state).await.unwrap();

        let err = f
            .ledger
            .on_payment_result(&staged.intent_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, RailbookError::BookingWindowClosed { .. }));
        assert_eq!(f.ledger.pending_intents(), 0);
    }

    #[tokio::test]
    async fn dates_outside_horizon_are_rejected() {
        let f = fixture(10).await;
        let mut past = request(1);
        past.journey_date = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert!(matches!(
            f.ledger.stage_intent(past).await,
            Err(RailbookError::BookingWindowClosed { .. })
        ));

        let mut far = request(1);
        far.journey_date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert!(matches!(
            f.ledger.stage_intent(far).await,
            Err(RailbookError::BookingWindowClosed { .. })
        ));
    }

    #[tokio::test]
    async fn urgent_quota_follows_default_windows() {
        let f = fixture_with(train(20, 4), RailbookConfig::default()).await;
        let mut urgent = request(1);
        urgent.fare_quota = FareQuota::Urgent;

        // Non-AC classes open at 11:00 local.
        let err = f.ledger.stage_intent(urgent.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            RailbookError::UrgentWindowClosed {
                coach_class: CoachClass::Sleeper,
                ..
            }
        ));

        f.clock.advance(Duration::hours(1));
        let staged = f.ledger.stage_intent(urgent).await.unwrap();
        assert_eq!(staged.provisional, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn waitlist_limit_is_enforced_at_staging() {
        let mut config = RailbookConfig::default();
        config.booking.waitlist_limit = 1;
        let f = fixture_with(train(10, 0), config).await;
        book(&f.ledger, request(6)).await;
        book(&f.ledger, request(3)).await;
        book(&f.ledger, request(1)).await;
        let waiting = book(&f.ledger, request(1)).await;
        assert_eq!(waiting.reservation.status, ReservationStatus::Waitlisted);

        let err = f.ledger.stage_intent(request(1)).await.unwrap_err();
        assert!(matches!(err, RailbookError::WaitlistFull { .. }), "{err}");
    }

    #[tokio::test]
    async fn malformed_requests_fail_before_any_lookup() {
        let f = fixture(10).await;

        let mut wrong_class = request(1);
        wrong_class.coach_class = CoachClass::FirstAc;
        assert!(matches!(
            f.ledger.stage_intent(wrong_class).await,
            Err(RailbookError::InvalidRequest(_))
        ));

        let mut reversed = request(1);
        reversed.from = "NDLS".into();
        reversed.to = "MMCT".into();
        assert!(matches!(
            f.ledger.stage_intent(reversed).await,
            Err(RailbookError::RouteNotFound { .. })
        ));

        let mut unknown = request(1);
        unknown.train = "99999".into();
        assert!(matches!(
            f.ledger.stage_intent(unknown).await,
            Err(RailbookError::TrainNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stale_intents_are_purged() {
        let f = fixture(10).await;
        f.ledger.stage_intent(request(1)).await.unwrap();
        assert_eq!(f.ledger.purge_stale_intents(), 0);
        f.clock.advance(Duration::minutes(16));
        assert_eq!(f.ledger.purge_stale_intents(), 1);
        assert_eq!(f.ledger.pending_intents(), 0);
    }

    fn paid(status: ReservationStatus, quota: FareQuota, amount: f64) -> Reservation {
        Reservation {
            id: "r1".into(),
            locator: "1234567890".into(),
            owner: "asha".into(),
            train: "12951".into(),
            from: "MMCT".into(),
            to: "NDLS".into(),
            journey_date: journey(),
            passenger_count: 2,
            coach_class: CoachClass::Sleeper,
            fare_quota: quota,
            status,
            subtype: QuotaSubtype::General,
            group_id: None,
            total_amount: amount,
            intent_id: "i1".into(),
            created_at: morning_before(),
            cancellation_charge: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn charge_tiers_by_time_to_departure() {
        let cfg = CancellationConfig::default();
        let departure = morning_before() + Duration::hours(100);
        let res = paid(ReservationStatus::Confirmed, FareQuota::Standard, 2000.0);
        let at = |hours_left: i64| departure - Duration::hours(hours_left);

        assert_eq!(cancellation_charge(&res, Some(departure), at(72), &cfg), 240.0);
        assert_eq!(cancellation_charge(&res, Some(departure), at(24), &cfg), 500.0);
        assert_eq!(cancellation_charge(&res, Some(departure), at(6), &cfg), 1000.0);
        assert_eq!(cancellation_charge(&res, Some(departure), at(2), &cfg), 2000.0);
        assert_eq!(cancellation_charge(&res, None, at(2), &cfg), 240.0);
    }

    #[test]
    fn flat_charge_floors_percentage_tiers() {
        let cfg = CancellationConfig::default();
        let departure = morning_before() + Duration::hours(100);
        let res = paid(ReservationStatus::Confirmed, FareQuota::Standard, 400.0);
        let charge = cancellation_charge(&res, Some(departure), departure - Duration::hours(24), &cfg);
        assert_eq!(charge, 240.0);
    }

    #[test]
    fn urgent_and_unconfirmed_charges() {
        let cfg = CancellationConfig::default();
        let now = morning_before();
        let urgent = paid(ReservationStatus::Confirmed, FareQuota::Urgent, 1500.0);
        assert_eq!(cancellation_charge(&urgent, None, now, &cfg), 1500.0);

        let waiting = paid(ReservationStatus::Waitlisted, FareQuota::Standard, 1500.0);
        assert_eq!(cancellation_charge(&waiting, None, now, &cfg), 120.0);

        let rac = paid(ReservationStatus::ContingencyConfirmed, FareQuota::Standard, 100.0);
        assert_eq!(cancellation_charge(&rac, None, now, &cfg), 100.0);
    }

    #[test]
    fn upgrades_respect_head_of_line_per_pool() {
        let mut big = paid(ReservationStatus::ContingencyConfirmed, FareQuota::Standard, 10.0);
        big.id = "big".into();
        big.passenger_count = 3;
        let mut small = big.clone();
        small.id = "small".into();
        small.passenger_count = 1;

        let mut free = PoolSeats::from([((CoachClass::Sleeper, FareQuota::Standard), 2)]);
        assert!(plan_upgrades(&[big.clone(), small.clone()], &mut free).is_empty());

        let mut free = PoolSeats::from([((CoachClass::Sleeper, FareQuota::Standard), 4)]);
        let up = plan_upgrades(&[big, small], &mut free);
        assert_eq!(up, vec![ReservationId::from("big"), ReservationId::from("small")]);
    }
}
