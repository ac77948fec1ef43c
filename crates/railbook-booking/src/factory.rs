// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier generation and reservation assembly.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use railbook_core::types::{
    IntentId, LocatorCode, PassengerId, PassengerSlot, QuotaSubtype, Reservation, ReservationId,
    ReservationStatus,
};

use crate::request::BookingRequest;

/// Random 10-digit locator with a non-zero leading digit.
pub fn new_locator<R: Rng + ?Sized>(rng: &mut R) -> LocatorCode {
    LocatorCode(rng.gen_range(1_000_000_000u64..=9_999_999_999).to_string())
}

pub fn new_intent_id() -> IntentId {
    IntentId(Uuid::new_v4().to_string())
}

/// Builds the rows persisted for a paid booking.
pub fn build_reservation(
    request: &BookingRequest,
    locator: LocatorCode,
    intent: IntentId,
    status: ReservationStatus,
    subtype: QuotaSubtype,
    amount: f64,
    now: DateTime<Utc>,
) -> (Reservation, Vec<PassengerSlot>) {
    let id = ReservationId(Uuid::new_v4().to_string());
    let passengers = request
        .passengers
        .iter()
        .map(|p| PassengerSlot {
            id: PassengerId(Uuid::new_v4().to_string()),
            reservation_id: id.clone(),
            name: p.name.trim().to_string(),
            age: p.age,
            gender: p.gender,
            berth_preference: p.berth_preference,
            seat: None,
            berth: None,
        })
        .collect::<Vec<_>>();
    let reservation = Reservation {
        id,
        locator,
        owner: request.owner.clone(),
        train: request.train.clone(),
        from: request.from.clone(),
        to: request.to.clone(),
        journey_date: request.journey_date,
        passenger_count: passengers.len() as u32,
        coach_class: request.coach_class,
        fare_quota: request.fare_quota,
        status,
        subtype,
        group_id: request.group_id.clone(),
        total_amount: amount,
        intent_id: intent,
        created_at: now,
        cancellation_charge: None,
        cancelled_at: None,
    };
    (reservation, passengers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn locators_are_ten_digits() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let code = new_locator(&mut rng);
            assert_eq!(code.as_str().len(), 10);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
            assert!(!code.as_str().starts_with('0'));
        }
    }

    #[test]
    fn intent_ids_are_unique() {
        assert_ne!(new_intent_id(), new_intent_id());
    }
}
