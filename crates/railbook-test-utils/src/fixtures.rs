// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference data shared by integration tests.
//!
//! Train `12951` runs MMCT 17:00 -> ST 20:00 -> BRC 22:00 -> NDLS 08:35 (+1)
//! in local time (UTC+05:30).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use railbook_booking::{BookingRequest, PassengerDetails};
use railbook_core::types::{CoachClass, FareQuota, Gender, RouteStop, Train, TrainId};

pub const TRAIN: &str = "12951";

pub fn train_id() -> TrainId {
    TRAIN.into()
}

pub fn journey_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// Instant for a local wall-clock time (UTC+05:30).
pub fn local(date: NaiveDate, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    let ist = FixedOffset::east_opt(330 * 60).unwrap();
    ist.from_local_datetime(&date.and_hms_opt(hour, minute, second).unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

/// 10:00 local on the day before the journey.
pub fn day_before_morning() -> DateTime<Utc> {
    local(journey_date().pred_opt().unwrap(), 10, 0, 0)
}

/// Origin departure of the journey-date run.
pub fn origin_departure() -> DateTime<Utc> {
    local(journey_date(), 17, 0, 0)
}

/// SL/3A/2A train with `seats` and `urgent` seats in each class.
pub fn train(seats: u32, urgent: u32) -> Train {
    let coach_classes = vec![CoachClass::Sleeper, CoachClass::ThirdAc, CoachClass::SecondAc];
    let classes = coach_classes.len() as u32;
    Train {
        id: train_id(),
        name: "Western Express".into(),
        total_seats: seats * classes,
        urgent_quota_seats: urgent * classes,
        standard_rate_per_km: 0.5,
        urgent_rate_per_km: 0.6,
        coach_classes,
    }
}

pub fn route() -> Vec<RouteStop> {
    let time = |h, m| NaiveTime::from_hms_opt(h, m, 0);
    let stop = |sequence, station: &str, distance_km, arrival, departure, day_offset| RouteStop {
        train: train_id(),
        station: station.into(),
        sequence,
        distance_km,
        arrival,
        departure,
        day_offset,
    };
    vec![
        stop(1, "MMCT", 0.0, None, time(17, 0), 0),
        stop(2, "ST", 263.0, time(19, 55), time(20, 0), 0),
        stop(3, "BRC", 392.0, time(21, 50), time(22, 0), 0),
        stop(4, "NDLS", 1386.0, time(8, 35), None, 1),
    ]
}

/// Standard-quota sleeper request for `passengers` adults, MMCT to NDLS.
pub fn request(passengers: usize) -> BookingRequest {
    BookingRequest {
        owner: "tester".into(),
        train: train_id(),
        from: "MMCT".into(),
        to: "NDLS".into(),
        journey_date: journey_date(),
        coach_class: CoachClass::Sleeper,
        fare_quota: FareQuota::Standard,
        passengers: (0..passengers)
            .map(|i| PassengerDetails {
                name: format!("Passenger {}", i + 1),
                age: 35,
                gender: if i % 2 == 0 { Gender::Female } else { Gender::Male },
                berth_preference: None,
            })
            .collect(),
        group_id: None,
    }
}

/// Urgent-quota request in `class`.
pub fn urgent_request(passengers: usize, class: CoachClass) -> BookingRequest {
    BookingRequest {
        coach_class: class,
        fare_quota: FareQuota::Urgent,
        ..request(passengers)
    }
}
