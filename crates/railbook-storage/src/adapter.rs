// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`InventoryStore`] port.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use railbook_config::model::StorageConfig;
use railbook_core::types::{
    ChartState, CoachClass, CommittedCounts, IntentId, LocatorCode, PassengerSlot, PoolKey,
    QuotaSubtype, Reservation, ReservationId, ReservationStatus, RouteStop, SeatAssignment, Train,
    TrainId, UrgentBookingPolicy, UrgentOverride, UrgentWindow, WaitlistEntry,
};
use railbook_core::{InventoryStore, RailbookError};

use crate::database::Database;
use crate::queries::{charts, policy, reservations, trains, waitlist};

/// SQLite-backed inventory store.
///
/// Wraps a [`Database`] handle and delegates every operation to the typed
/// query modules.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database described by the storage config.
    pub async fn open(config: &StorageConfig) -> Result<Self, RailbookError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite inventory store initialized");
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoint and close the underlying database.
    pub async fn close(self) -> Result<(), RailbookError> {
        self.db.close().await
    }
}

#[async_trait]
impl InventoryStore for SqliteStore {
    // --- Trains and routes ---

    async fn upsert_train(&self, train: &Train) -> Result<(), RailbookError> {
        train.validate()?;
        trains::upsert_train(&self.db, train).await
    }

    async fn get_train(&self, id: &TrainId) -> Result<Option<Train>, RailbookError> {
        trains::get_train(&self.db, id).await
    }

    async fn list_trains(&self) -> Result<Vec<Train>, RailbookError> {
        trains::list_trains(&self.db).await
    }

    async fn replace_route(
        &self,
        train: &TrainId,
        stops: &[RouteStop],
    ) -> Result<(), RailbookError> {
        trains::replace_route(&self.db, train, stops).await
    }

    async fn route_stops(&self, train: &TrainId) -> Result<Vec<RouteStop>, RailbookError> {
        trains::route_stops(&self.db, train).await
    }

    // --- Reservations ---

    async fn insert_reservation(
        &self,
        reservation: &Reservation,
        passengers: &[PassengerSlot],
    ) -> Result<Option<u32>, RailbookError> {
        reservations::insert(&self.db, reservation, passengers).await
    }

    async fn get_reservation(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, RailbookError> {
        reservations::get(&self.db, id).await
    }

    async fn find_by_locator(
        &self,
        locator: &LocatorCode,
    ) -> Result<Option<Reservation>, RailbookError> {
        reservations::by_locator(&self.db, locator).await
    }

    async fn find_by_intent(
        &self,
        intent: &IntentId,
    ) -> Result<Option<Reservation>, RailbookError> {
        reservations::by_intent(&self.db, intent).await
    }

    async fn list_reservations(
        &self,
        train: &TrainId,
        date: NaiveDate,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, RailbookError> {
        reservations::list(&self.db, train, date, statuses).await
    }

    async fn passengers(
        &self,
        reservation: &ReservationId,
    ) -> Result<Vec<PassengerSlot>, RailbookError> {
        reservations::passengers(&self.db, reservation).await
    }

    async fn committed_counts(&self, key: &PoolKey) -> Result<CommittedCounts, RailbookError> {
        reservations::committed_counts(&self.db, key).await
    }

    async fn taken_seats(
        &self,
        train: &TrainId,
        date: NaiveDate,
        class: CoachClass,
    ) -> Result<Vec<String>, RailbookError> {
        reservations::taken_seats(&self.db, train, date, class).await
    }

    async fn group_seats(
        &self,
        train: &TrainId,
        date: NaiveDate,
        class: CoachClass,
        group_id: &str,
    ) -> Result<Vec<String>, RailbookError> {
        reservations::group_seats(&self.db, train, date, class, group_id).await
    }

    async fn assign_seats(&self, assignments: &[SeatAssignment]) -> Result<(), RailbookError> {
        reservations::assign_seats(&self.db, assignments).await
    }

    async fn cancel_reservation(
        &self,
        id: &ReservationId,
        charge: f64,
        at: DateTime<Utc>,
    ) -> Result<(), RailbookError> {
        if reservations::cancel(&self.db, id, charge, at).await? {
            Ok(())
        } else {
            Err(RailbookError::ReservationNotFound(id.to_string()))
        }
    }

    async fn confirm_reservations(&self, ids: &[ReservationId]) -> Result<(), RailbookError> {
        let changed = reservations::confirm(&self.db, ids).await?;
        debug!(requested = ids.len(), changed, "reservations confirmed");
        Ok(())
    }

    // --- Waitlist ---

    async fn enqueue_waitlist(
        &self,
        reservation: &ReservationId,
        train: &TrainId,
        date: NaiveDate,
        subtype: QuotaSubtype,
        at: DateTime<Utc>,
    ) -> Result<u32, RailbookError> {
        waitlist::enqueue(&self.db, reservation, train, date, subtype, at).await
    }

    async fn remove_waitlist(&self, reservation: &ReservationId) -> Result<bool, RailbookError> {
        waitlist::remove(&self.db, reservation).await
    }

    async fn waitlist_entries(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, RailbookError> {
        waitlist::entries(&self.db, train, date).await
    }

    async fn waitlist_entry(
        &self,
        reservation: &ReservationId,
    ) -> Result<Option<WaitlistEntry>, RailbookError> {
        waitlist::entry(&self.db, reservation).await
    }

    // --- Chart ---

    async fn chart_state(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Option<ChartState>, RailbookError> {
        charts::get(&self.db, train, date).await
    }

    async fn save_chart_state(&self, state: &ChartState) -> Result<(), RailbookError> {
        charts::save(&self.db, state).await
    }

    // --- Urgent policy ---

    async fn urgent_policy(&self) -> Result<UrgentBookingPolicy, RailbookError> {
        policy::load(&self.db).await
    }

    async fn save_urgent_window(&self, window: &UrgentWindow) -> Result<(), RailbookError> {
        policy::save_window(&self.db, window).await
    }

    async fn remove_urgent_window(&self, name: &str) -> Result<bool, RailbookError> {
        policy::remove_window(&self.db, name).await
    }

    async fn set_urgent_override(
        &self,
        rule: Option<&UrgentOverride>,
    ) -> Result<(), RailbookError> {
        policy::set_override(&self.db, rule).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone};
    use railbook_core::types::{
        BerthType, ChartPhase, FareQuota, Gender, PassengerId, StationCode,
    };
    use tempfile::tempdir;

    async fn setup() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("store.db").display().to_string(),
            wal_mode: true,
        };
        let store = SqliteStore::open(&config).await.unwrap();
        store.upsert_train(&train()).await.unwrap();
        (store, dir)
    }

    fn train() -> Train {
        Train {
            id: "12951".into(),
            name: "Test Mail".into(),
            total_seats: 10,
            urgent_quota_seats: 2,
            standard_rate_per_km: 0.5,
            urgent_rate_per_km: 0.7,
            coach_classes: vec![CoachClass::Sleeper],
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    fn reservation(n: u32, status: ReservationStatus, pax: u32) -> Reservation {
        Reservation {
            id: ReservationId(format!("r{n}")),
            locator: LocatorCode(format!("{:010}", 4_000_000_000u64 + n as u64)),
            owner: "alice".into(),
            train: "12951".into(),
            from: "MMCT".into(),
            to: "NDLS".into(),
            journey_date: date(),
            passenger_count: pax,
            coach_class: CoachClass::Sleeper,
            fare_quota: FareQuota::Standard,
            status,
            subtype: QuotaSubtype::General,
            group_id: None,
            total_amount: 100.0 * pax as f64,
            intent_id: IntentId(format!("i{n}")),
            created_at: t0() + Duration::seconds(n as i64),
            cancellation_charge: None,
            cancelled_at: None,
        }
    }

    fn slots(r: &Reservation) -> Vec<PassengerSlot> {
        (0..r.passenger_count)
            .map(|i| PassengerSlot {
                id: PassengerId(format!("{}-p{i}", r.id)),
                reservation_id: r.id.clone(),
                name: format!("P{i}"),
                age: 30,
                gender: Gender::Female,
                berth_preference: Some(BerthType::Lower),
                seat: None,
                berth: None,
            })
            .collect()
    }

    async fn insert(store: &SqliteStore, r: &Reservation) -> Option<u32> {
        store.insert_reservation(r, &slots(r)).await.unwrap()
    }

    fn positions(entries: &[WaitlistEntry]) -> Vec<(String, u32)> {
        entries
            .iter()
            .map(|e| (e.reservation_id.to_string(), e.position))
            .collect()
    }

    #[tokio::test]
    async fn insert_and_lookup_by_every_key() {
        let (store, _dir) = setup().await;
        let r = reservation(1, ReservationStatus::Confirmed, 2);
        assert_eq!(insert(&store, &r).await, None);

        assert_eq!(store.get_reservation(&r.id).await.unwrap(), Some(r.clone()));
        assert_eq!(store.find_by_locator(&r.locator).await.unwrap(), Some(r.clone()));
        assert_eq!(store.find_by_intent(&r.intent_id).await.unwrap(), Some(r.clone()));
        let pax = store.passengers(&r.id).await.unwrap();
        assert_eq!(pax.len(), 2);
        assert_eq!(pax[0].name, "P0");
        assert_eq!(pax[0].berth_preference, Some(BerthType::Lower));
    }

    #[tokio::test]
    async fn duplicate_locator_is_reported() {
        let (store, _dir) = setup().await;
        let first = reservation(1, ReservationStatus::Confirmed, 1);
        insert(&store, &first).await;

        let mut clash = reservation(2, ReservationStatus::Confirmed, 1);
        clash.locator = first.locator.clone();
        let err = store
            .insert_reservation(&clash, &slots(&clash))
            .await
            .unwrap_err();
        assert!(matches!(err, RailbookError::DuplicateLocator(_)));
        assert!(store.get_reservation(&clash.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_counts_split_by_status() {
        let (store, _dir) = setup().await;
        insert(&store, &reservation(1, ReservationStatus::Confirmed, 3)).await;
        insert(&store, &reservation(2, ReservationStatus::ContingencyConfirmed, 1)).await;
        insert(&store, &reservation(3, ReservationStatus::Waitlisted, 4)).await;

        let key = reservation(0, ReservationStatus::Confirmed, 1).pool_key();
        let counts = store.committed_counts(&key).await.unwrap();
        assert_eq!(counts, CommittedCounts { confirmed: 3, contingency: 1 });
    }

    #[tokio::test]
    async fn waitlisted_insert_enqueues_contiguously() {
        let (store, _dir) = setup().await;
        for n in 1..=3 {
            let pos = insert(&store, &reservation(n, ReservationStatus::Waitlisted, 1)).await;
            assert_eq!(pos, Some(n));
        }

        assert!(store.remove_waitlist(&"r2".into()).await.unwrap());
        let entries = store.waitlist_entries(&"12951".into(), date()).await.unwrap();
        assert_eq!(
            positions(&entries),
            vec![("r1".to_string(), 1), ("r3".to_string(), 2)]
        );
        assert!(!store.remove_waitlist(&"r2".into()).await.unwrap());
    }

    #[tokio::test]
    async fn buckets_are_numbered_independently() {
        let (store, _dir) = setup().await;
        insert(&store, &reservation(1, ReservationStatus::Waitlisted, 1)).await;
        let mut pooled = reservation(2, ReservationStatus::Waitlisted, 1);
        pooled.subtype = QuotaSubtype::Pooled;
        assert_eq!(insert(&store, &pooled).await, Some(1));

        let entries = store.waitlist_entries(&"12951".into(), date()).await.unwrap();
        assert_eq!(entries[0].subtype, QuotaSubtype::General);
        assert_eq!(entries[1].subtype, QuotaSubtype::Pooled);
    }

    #[tokio::test]
    async fn confirm_removes_entries_and_renumbers() {
        let (store, _dir) = setup().await;
        for n in 1..=4 {
            insert(&store, &reservation(n, ReservationStatus::Waitlisted, 1)).await;
        }
        store
            .confirm_reservations(&["r1".into(), "r3".into()])
            .await
            .unwrap();

        let entries = store.waitlist_entries(&"12951".into(), date()).await.unwrap();
        assert_eq!(
            positions(&entries),
            vec![("r2".to_string(), 1), ("r4".to_string(), 2)]
        );
        let r1 = store.get_reservation(&"r1".into()).await.unwrap().unwrap();
        assert_eq!(r1.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn cancel_records_charge_and_leaves_queue() {
        let (store, _dir) = setup().await;
        insert(&store, &reservation(1, ReservationStatus::Waitlisted, 1)).await;
        insert(&store, &reservation(2, ReservationStatus::Waitlisted, 1)).await;

        let at = t0() + Duration::hours(1);
        store.cancel_reservation(&"r1".into(), 60.0, at).await.unwrap();

        let r1 = store.get_reservation(&"r1".into()).await.unwrap().unwrap();
        assert_eq!(r1.status, ReservationStatus::Cancelled);
        assert_eq!(r1.cancellation_charge, Some(60.0));
        assert_eq!(r1.cancelled_at, Some(at));
        assert!(store.waitlist_entry(&"r1".into()).await.unwrap().is_none());
        assert_eq!(
            store.waitlist_entry(&"r2".into()).await.unwrap().unwrap().position,
            1
        );

        let missing = store.cancel_reservation(&"nope".into(), 0.0, at).await;
        assert!(matches!(missing, Err(RailbookError::ReservationNotFound(_))));
    }

    #[tokio::test]
    async fn seats_are_scoped_to_live_reservations() {
        let (store, _dir) = setup().await;
        let mut a = reservation(1, ReservationStatus::Confirmed, 1);
        a.group_id = Some("family".into());
        let b = reservation(2, ReservationStatus::Confirmed, 1);
        insert(&store, &a).await;
        insert(&store, &b).await;

        store
            .assign_seats(&[
                SeatAssignment {
                    passenger_id: "r1-p0".into(),
                    seat: "S1-1".into(),
                    berth: BerthType::Lower,
                },
                SeatAssignment {
                    passenger_id: "r2-p0".into(),
                    seat: "S2-1".into(),
                    berth: BerthType::Upper,
                },
            ])
            .await
            .unwrap();

        let taken = store
            .taken_seats(&"12951".into(), date(), CoachClass::Sleeper)
            .await
            .unwrap();
        assert_eq!(taken, vec!["S1-1".to_string(), "S2-1".to_string()]);
        let group = store
            .group_seats(&"12951".into(), date(), CoachClass::Sleeper, "family")
            .await
            .unwrap();
        assert_eq!(group, vec!["S1-1".to_string()]);

        store.cancel_reservation(&"r2".into(), 0.0, t0()).await.unwrap();
        let taken = store
            .taken_seats(&"12951".into(), date(), CoachClass::Sleeper)
            .await
            .unwrap();
        assert_eq!(taken, vec!["S1-1".to_string()]);
    }

    #[tokio::test]
    async fn list_filters_status_oldest_first() {
        let (store, _dir) = setup().await;
        insert(&store, &reservation(2, ReservationStatus::Confirmed, 1)).await;
        insert(&store, &reservation(1, ReservationStatus::Confirmed, 1)).await;
        insert(&store, &reservation(3, ReservationStatus::Waitlisted, 1)).await;

        let confirmed = store
            .list_reservations(&"12951".into(), date(), &[ReservationStatus::Confirmed])
            .await
            .unwrap();
        let ids: Vec<_> = confirmed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert!(
            store
                .list_reservations(&"12951".into(), date(), &[])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn chart_state_never_regresses() {
        let (store, _dir) = setup().await;
        let mut state = ChartState::pending("12951".into(), date());
        assert!(store.chart_state(&state.train, date()).await.unwrap().is_none());

        state.phase = ChartPhase::PreliminaryClosed;
        state.cancelled = 2;
        state.updated_at = Some(t0());
        store.save_chart_state(&state).await.unwrap();

        let stale = ChartState::pending("12951".into(), date());
        store.save_chart_state(&stale).await.unwrap();

        let stored = store.chart_state(&state.train, date()).await.unwrap().unwrap();
        assert_eq!(stored.phase, ChartPhase::PreliminaryClosed);
        assert_eq!(stored.cancelled, 2);
        assert_eq!(stored.updated_at, Some(t0()));
    }

    #[tokio::test]
    async fn urgent_policy_roundtrip() {
        let (store, _dir) = setup().await;
        assert_eq!(store.urgent_policy().await.unwrap(), UrgentBookingPolicy::default());

        let window = UrgentWindow {
            name: "ac".into(),
            coach_classes: vec![CoachClass::ThirdAc, CoachClass::SecondAc],
            opens_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            closes_at: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            days_before: 1,
        };
        store.save_urgent_window(&window).await.unwrap();
        let rule = UrgentOverride {
            enabled: true,
            coach_classes: vec![],
            trains: vec!["12951".into(), "12952".into()],
            expires_at: Some(t0()),
        };
        store.set_urgent_override(Some(&rule)).await.unwrap();

        let policy = store.urgent_policy().await.unwrap();
        assert_eq!(policy.windows, vec![window]);
        assert_eq!(policy.override_rule, Some(rule));

        store.set_urgent_override(None).await.unwrap();
        assert!(store.remove_urgent_window("ac").await.unwrap());
        assert!(!store.remove_urgent_window("ac").await.unwrap());
        assert_eq!(store.urgent_policy().await.unwrap(), UrgentBookingPolicy::default());
    }

    #[tokio::test]
    async fn route_requires_known_train() {
        let (store, _dir) = setup().await;
        let stop = RouteStop {
            train: "99999".into(),
            station: StationCode::from("X"),
            sequence: 1,
            distance_km: 0.0,
            arrival: None,
            departure: None,
            day_offset: 0,
        };
        assert!(store.replace_route(&"99999".into(), &[stop]).await.is_err());
    }
}
