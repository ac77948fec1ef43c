// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tempfile::TempDir;

use railbook_booking::{
    BookingReceipt, BookingRequest, PassengerDetails, PaymentOutcome, ReservationLedger,
    SeatAllocator,
};
use railbook_config::model::RailbookConfig;
use railbook_core::types::{CoachClass, FareQuota, Gender, RouteStop, Train};
use railbook_core::{Clock, InventoryStore, ManualClock};
use railbook_storage::{Database, SqliteStore};

use crate::ChartPipeline;

pub fn journey() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// 2026-03-01 10:00 local time.
pub fn day_before() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap()
}

/// Origin departure of the journey run: 17:00 local on the journey date.
pub fn departure() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap()
}

pub struct Fixture {
    pub ledger: Arc<ReservationLedger>,
    pub pipeline: Arc<ChartPipeline>,
    pub clock: Arc<ManualClock>,
    pub config: RailbookConfig,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new(seats: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let store: Arc<dyn InventoryStore> = Arc::new(SqliteStore::new(db));
        let clock = Arc::new(ManualClock::new(day_before()));
        let config = RailbookConfig::default();
        let ledger = ReservationLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
            &config,
        )
        .with_allocator(SeatAllocator::with_seed(store, 5, 7));

        let train = Train {
            id: "12951".into(),
            name: "Western Express".into(),
            total_seats: seats,
            urgent_quota_seats: 0,
            standard_rate_per_km: 0.5,
            urgent_rate_per_km: 0.6,
            coach_classes: vec![CoachClass::Sleeper],
        };
        let stop = |seq: u32, station: &str, km: f64, dep: Option<u32>, day: u32| RouteStop {
            train: "12951".into(),
            station: station.into(),
            sequence: seq,
            distance_km: km,
            arrival: None,
            departure: dep.and_then(|h| NaiveTime::from_hms_opt(h, 0, 0)),
            day_offset: day,
        };
        ledger
            .register_train(
                &train,
                vec![
                    stop(1, "MMCT", 0.0, Some(17), 0),
                    stop(2, "BRC", 392.0, Some(22), 0),
                    stop(3, "NDLS", 1386.0, None, 1),
                ],
            )
            .await
            .unwrap();

        let ledger = Arc::new(ledger);
        Self {
            pipeline: Arc::new(ChartPipeline::new(Arc::clone(&ledger))),
            ledger,
            clock,
            config,
            _dir: dir,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub fn request(n: usize) -> BookingRequest {
    BookingRequest {
        owner: "ravi".into(),
        train: "12951".into(),
        from: "MMCT".into(),
        to: "NDLS".into(),
        journey_date: journey(),
        coach_class: CoachClass::Sleeper,
        fare_quota: FareQuota::Standard,
        passengers: (0..n)
            .map(|i| PassengerDetails {
                name: format!("Traveller {i}"),
                age: 40,
                gender: Gender::Male,
                berth_preference: None,
            })
            .collect(),
        group_id: None,
    }
}

pub async fn book(ledger: &ReservationLedger, req: BookingRequest) -> BookingReceipt {
    let staged = ledger.stage_intent(req).await.unwrap();
    match ledger.on_payment_result(&staged.intent_id, true).await.unwrap() {
        PaymentOutcome::Persisted(receipt) => receipt,
        other => panic!("expected a persisted booking, got {other:?}"),
    }
}
