// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed requests and receipts exchanged with the booking engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use railbook_config::model::BookingConfig;
use railbook_core::types::{
    BerthType, CoachClass, FareQuota, Gender, IntentId, LocatorCode, PassengerSlot, QuotaSubtype,
    Reservation, ReservationId, ReservationStatus, StationCode, TrainId,
};
use railbook_core::RailbookError;

/// Oldest age accepted on a booking.
pub const MAX_PASSENGER_AGE: u8 = 125;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(default)]
    pub berth_preference: Option<BerthType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub owner: String,
    pub train: TrainId,
    pub from: StationCode,
    pub to: StationCode,
    pub journey_date: NaiveDate,
    pub coach_class: CoachClass,
    pub fare_quota: FareQuota,
    pub passengers: Vec<PassengerDetails>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl BookingRequest {
    /// Shape checks that do not need the store.
    pub fn validate(&self, config: &BookingConfig) -> Result<(), RailbookError> {
        let max = match self.fare_quota {
            FareQuota::Standard => config.max_passengers,
            FareQuota::Urgent => config.max_urgent_passengers,
        };
        let count = self.passengers.len();
        if count == 0 {
            return Err(RailbookError::InvalidRequest(
                "at least one passenger is required".into(),
            ));
        }
        if count > max as usize {
            return Err(RailbookError::InvalidRequest(format!(
                "{count} passengers exceeds the {} quota limit of {max}",
                self.fare_quota
            )));
        }
        if self.owner.trim().is_empty() {
            return Err(RailbookError::InvalidRequest("owner is required".into()));
        }
        if self.from == self.to {
            return Err(RailbookError::InvalidRequest(format!(
                "origin and destination are both {}",
                self.from
            )));
        }
        for (i, p) in self.passengers.iter().enumerate() {
            if p.name.trim().is_empty() {
                return Err(RailbookError::InvalidRequest(format!(
                    "passenger {} has no name",
                    i + 1
                )));
            }
            if p.age > MAX_PASSENGER_AGE {
                return Err(RailbookError::InvalidRequest(format!(
                    "passenger {} age {} is out of range",
                    i + 1,
                    p.age
                )));
            }
        }
        if let Some(group) = &self.group_id {
            if group.trim().is_empty() {
                return Err(RailbookError::InvalidRequest("group id is blank".into()));
            }
        }
        Ok(())
    }
}

/// Result of staging: nothing is persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedIntent {
    pub intent_id: IntentId,
    /// Placeholder shown to the payer; the persisted code may differ on collision.
    pub locator: LocatorCode,
    pub amount: f64,
    /// Outcome if payment succeeded right now.
    pub provisional: ReservationStatus,
    pub distance_km: f64,
    pub subtype: QuotaSubtype,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingReceipt {
    pub reservation: Reservation,
    pub passengers: Vec<PassengerSlot>,
    pub waitlist_position: Option<u32>,
    /// Staging promised a confirmed seat but capacity was taken before payment.
    pub downgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PaymentOutcome {
    Persisted(BookingReceipt),
    Discarded(IntentId),
    AlreadyProcessed(Reservation),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationReceipt {
    pub reservation_id: ReservationId,
    pub locator: LocatorCode,
    pub charge: f64,
    pub refund: f64,
    /// Passengers whose seats went back to the pool.
    pub released: u32,
    pub upgraded: Vec<ReservationId>,
    pub promoted: Vec<ReservationId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            owner: "asha".into(),
            train: "12951".into(),
            from: "MMCT".into(),
            to: "NDLS".into(),
            journey_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            coach_class: CoachClass::Sleeper,
            fare_quota: FareQuota::Standard,
            passengers: vec![PassengerDetails {
                name: "Asha".into(),
                age: 34,
                gender: Gender::Female,
                berth_preference: None,
            }],
            group_id: None,
        }
    }

    fn details(n: usize) -> Vec<PassengerDetails> {
        (0..n)
            .map(|i| PassengerDetails {
                name: format!("P{i}"),
                age: 30,
                gender: Gender::Male,
                berth_preference: None,
            })
            .collect()
    }

    #[test]
    fn well_formed_request_passes() {
        assert!(request().validate(&BookingConfig::default()).is_ok());
    }

    #[test]
    fn passenger_limits_depend_on_quota() {
        let cfg = BookingConfig::default();
        let mut r = request();
        r.passengers = details(6);
        assert!(r.validate(&cfg).is_ok());
        r.fare_quota = FareQuota::Urgent;
        assert!(matches!(r.validate(&cfg), Err(RailbookError::InvalidRequest(_))));
        r.passengers = details(4);
        assert!(r.validate(&cfg).is_ok());
        r.passengers.clear();
        assert!(r.validate(&cfg).is_err());
    }

    #[test]
    fn malformed_fields_are_rejected() {
        let cfg = BookingConfig::default();

        let mut r = request();
        r.to = r.from.clone();
        assert!(r.validate(&cfg).is_err());

        let mut r = request();
        r.passengers[0].name = "  ".into();
        assert!(r.validate(&cfg).is_err());

        let mut r = request();
        r.passengers[0].age = 126;
        assert!(r.validate(&cfg).is_err());

        let mut r = request();
        r.group_id = Some(String::new());
        assert!(r.validate(&cfg).is_err());
    }

    #[test]
    fn request_deserializes_with_optional_fields_missing() {
        let json = r#"{
            "owner": "asha", "train": "12951", "from": "MMCT", "to": "NDLS",
            "journey_date": "2026-03-02", "coach_class": "SL", "fare_quota": "standard",
            "passengers": [{"name": "Asha", "age": 34, "gender": "female"}]
        }"#;
        let r: BookingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(r, request());
    }
}
