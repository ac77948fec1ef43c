// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Availability projection with a short-lived snapshot cache.
//!
//! Snapshots are derived from reservation aggregates and never consulted for
//! booking decisions; the ledger always recomputes under the train lock.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use tracing::trace;

use railbook_core::types::{
    AvailabilitySnapshot, CoachClass, FareQuota, PoolKey, ReservationStatus, StationCode, Train,
    TrainId,
};
use railbook_core::{Clock, InventoryStore, RailbookError};

use crate::route::RouteCache;

/// Seats of one (class, quota) pool, split into the confirmable share and
/// the contingency reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacity {
    pub confirmable: u32,
    pub contingency: u32,
}

impl PoolCapacity {
    pub fn of(train: &Train, class: CoachClass, quota: FareQuota, contingency_fraction: f64) -> Self {
        let total = train.quota_capacity(class, quota);
        let reserve = ((f64::from(total) * contingency_fraction).floor() as u32).min(total);
        Self {
            confirmable: total - reserve,
            contingency: reserve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SnapshotKey {
    train: TrainId,
    from: StationCode,
    to: StationCode,
    date: NaiveDate,
    class: CoachClass,
    quota: FareQuota,
}

pub struct AvailabilityEngine {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    routes: Arc<RouteCache>,
    ttl: Duration,
    contingency_fraction: f64,
    cache: DashMap<SnapshotKey, (AvailabilitySnapshot, DateTime<Utc>)>,
    /// Bumped by every `invalidate`; a query only caches what it computed
    /// if the generation it started under is still current.
    generations: DashMap<(TrainId, NaiveDate), u64>,
}

impl AvailabilityEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        routes: Arc<RouteCache>,
        ttl_secs: u64,
        contingency_fraction: f64,
    ) -> Self {
        Self {
            store,
            clock,
            routes,
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
            contingency_fraction,
            cache: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Availability for a journey, served from cache while the snapshot is fresh.
    pub async fn query(
        &self,
        train: &TrainId,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
        class: CoachClass,
        quota: FareQuota,
    ) -> Result<AvailabilitySnapshot, RailbookError> {
        let key = SnapshotKey {
            train: train.clone(),
            from: from.clone(),
            to: to.clone(),
            date,
            class,
            quota,
        };
        let now = self.clock.now();
        if let Some(entry) = self.cache.get(&key) {
            let (snapshot, computed_at) = *entry;
            if now - computed_at < self.ttl {
                trace!(train = %train, %date, %class, %quota, "availability cache hit");
                return Ok(snapshot);
            }
        }

        let generation = self.generation(train, date);
        let route = self.routes.get(self.store.as_ref(), train).await?;
        if !route.has_path(from, to) {
            return Err(RailbookError::RouteNotFound {
                train: train.clone(),
                from: from.clone(),
                to: to.clone(),
            });
        }
        let train_def = self
            .store
            .get_train(train)
            .await?
            .ok_or_else(|| RailbookError::TrainNotFound(train.clone()))?;

        let pool = PoolKey {
            train: train.clone(),
            journey_date: date,
            coach_class: class,
            fare_quota: quota,
        };
        let snapshot = self.compute(&train_def, &pool).await?;
        self.store_if_current(key, snapshot, now, generation);
        Ok(snapshot)
    }

    fn generation(&self, train: &TrainId, date: NaiveDate) -> u64 {
        *self.generations.entry((train.clone(), date)).or_insert(0)
    }

    /// Caches `snapshot` unless (train, date) was invalidated after
    /// `generation` was read. The generation entry stays locked across the
    /// insert so a concurrent `invalidate` either sees the entry or wins first.
    fn store_if_current(
        &self,
        key: SnapshotKey,
        snapshot: AvailabilitySnapshot,
        computed_at: DateTime<Utc>,
        generation: u64,
    ) {
        let current = self.generations.entry((key.train.clone(), key.date)).or_insert(0);
        if *current == generation {
            self.cache.insert(key, (snapshot, computed_at));
        } else {
            trace!(train = %key.train, date = %key.date, "snapshot went stale while computing");
        }
    }

    /// Uncached availability of one pool straight from the store.
    pub async fn compute(
        &self,
        train: &Train,
        pool: &PoolKey,
    ) -> Result<AvailabilitySnapshot, RailbookError> {
        let capacity = PoolCapacity::of(
            train,
            pool.coach_class,
            pool.fare_quota,
            self.contingency_fraction,
        );
        let counts = self.store.committed_counts(pool).await?;
        let waitlisted = self.waitlisted(pool).await?;
        Ok(AvailabilitySnapshot {
            available: capacity.confirmable.saturating_sub(counts.confirmed),
            contingency: capacity.contingency.saturating_sub(counts.contingency),
            waitlisted,
        })
    }

    /// Waitlisted reservations drawing on this pool.
    pub async fn waitlisted(&self, pool: &PoolKey) -> Result<u32, RailbookError> {
        let waiting = self
            .store
            .list_reservations(&pool.train, pool.journey_date, &[ReservationStatus::Waitlisted])
            .await?;
        let count = waiting
            .iter()
            .filter(|r| r.coach_class == pool.coach_class && r.fare_quota == pool.fare_quota)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Drop every cached snapshot for (train, date).
    pub fn invalidate(&self, train: &TrainId, date: NaiveDate) {
        *self.generations.entry((train.clone(), date)).or_insert(0) += 1;
        self.cache
            .retain(|k, _| !(k.train == *train && k.date == date));
    }

    pub fn contingency_fraction(&self) -> f64 {
        self.contingency_fraction
    }
}
