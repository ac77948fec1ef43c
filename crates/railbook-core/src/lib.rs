// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Railbook reservation engine.
//!
//! This crate provides the domain types, the error taxonomy, the injectable
//! clock, and the persistence port used throughout the Railbook workspace.
//! Storage adapters implement [`InventoryStore`]; the booking engine and the
//! chart pipeline depend only on this crate's abstractions.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RailbookError;
pub use traits::InventoryStore;
pub use types::{
    BerthType, ChartPhase, ChartState, CoachClass, FareQuota, Gender, IntentId, LocatorCode,
    PassengerId, QuotaSubtype, Reservation, ReservationId, ReservationStatus, StationCode,
    TrainId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn railbook_error_has_all_variants() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let errors = [
            RailbookError::RouteNotFound {
                train: "12951".into(),
                from: "MMCT".into(),
                to: "NDLS".into(),
            },
            RailbookError::BookingWindowClosed {
                train: "12951".into(),
                date,
                reason: "chart prepared".into(),
            },
            RailbookError::UrgentWindowClosed {
                train: "12951".into(),
                date,
                coach_class: CoachClass::ThirdAc,
            },
            RailbookError::WaitlistFull {
                train: "12951".into(),
                date,
                coach_class: CoachClass::Sleeper,
                quota: FareQuota::Standard,
            },
            RailbookError::InvalidRequest("no passengers".into()),
            RailbookError::TrainNotFound("00000".into()),
            RailbookError::ReservationNotFound("x".into()),
            RailbookError::IntentNotFound("x".into()),
            RailbookError::InvalidTransition {
                reservation: "x".into(),
                from: ReservationStatus::Cancelled,
                to: ReservationStatus::Cancelled,
            },
        ];
        for err in &errors {
            assert!(err.is_user_facing(), "{err} should be user-facing");
        }

        let internal = [
            RailbookError::DuplicateLocator("1234567890".into()),
            RailbookError::Config("bad".into()),
            RailbookError::Storage {
                source: Box::new(std::io::Error::other("disk")),
            },
            RailbookError::Internal("oops".into()),
        ];
        for err in &internal {
            assert!(!err.is_user_facing(), "{err} should be internal");
        }
    }

    #[test]
    fn error_messages_carry_context() {
        let err = RailbookError::UrgentWindowClosed {
            train: "12951".into(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            coach_class: CoachClass::SecondAc,
        };
        let msg = err.to_string();
        assert!(msg.contains("12951"));
        assert!(msg.contains("2A"));
        assert!(msg.contains("2026-03-02"));
    }

    #[test]
    fn ids_display_their_inner_value() {
        let id = TrainId::from("12951");
        assert_eq!(id.to_string(), "12951");
        assert_eq!(id.as_str(), "12951");
        assert_eq!(StationCode::from("NDLS").to_string(), "NDLS");
    }
}
