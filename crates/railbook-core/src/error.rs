// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Railbook reservation engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{CoachClass, FareQuota, ReservationStatus, StationCode, TrainId};

/// The primary error type used across the store port and every engine component.
///
/// User-facing rejections carry enough context (train, date, class, quota) for
/// the caller to retry with different parameters. The engine never retries
/// them itself.
#[derive(Debug, Error)]
pub enum RailbookError {
    /// Station pair is absent from the train's route or is reversed/degenerate.
    #[error("no route on train {train} from {from} to {to}")]
    RouteNotFound {
        train: TrainId,
        from: StationCode,
        to: StationCode,
    },

    /// Journey date is outside the booking horizon, or the chart has closed.
    #[error("booking closed for train {train} on {date}: {reason}")]
    BookingWindowClosed {
        train: TrainId,
        date: NaiveDate,
        reason: String,
    },

    /// Urgent quota requested outside its opening window.
    #[error("urgent quota for {coach_class} on train {train} ({date}) is not open")]
    UrgentWindowClosed {
        train: TrainId,
        date: NaiveDate,
        coach_class: CoachClass,
    },

    /// The waitlist for this pool has reached its configured limit.
    #[error("waitlist full for train {train} on {date} ({coach_class}/{quota})")]
    WaitlistFull {
        train: TrainId,
        date: NaiveDate,
        coach_class: CoachClass,
        quota: FareQuota,
    },

    /// The request failed shape validation at the edge of the core.
    #[error("invalid booking request: {0}")]
    InvalidRequest(String),

    /// No train with this identifier is registered.
    #[error("train not found: {0}")]
    TrainNotFound(TrainId),

    /// No reservation matches the given id or locator code.
    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    /// No staged intent matches the given id (never staged, or already discarded).
    #[error("payment intent not found: {0}")]
    IntentNotFound(String),

    /// The reservation cannot move from its current status to the requested one.
    #[error("reservation {reservation} cannot move from {from} to {to}")]
    InvalidTransition {
        reservation: String,
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// A generated locator code collided with an existing reservation.
    #[error("locator code already in use: {0}")]
    DuplicateLocator(String),

    /// Configuration errors surfaced at runtime (bad policy data, invalid route).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RailbookError {
    /// Whether the caller can correct the request and try again.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::RouteNotFound { .. }
                | Self::BookingWindowClosed { .. }
                | Self::UrgentWindowClosed { .. }
                | Self::WaitlistFull { .. }
                | Self::InvalidRequest(_)
                | Self::TrainNotFound(_)
                | Self::ReservationNotFound(_)
                | Self::IntentNotFound(_)
                | Self::InvalidTransition { .. }
        )
    }
}
