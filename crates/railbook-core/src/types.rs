// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the store port and the booking engine.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::RailbookError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Train number, e.g. `12951`.
    TrainId
);
string_id!(
    /// Station code, e.g. `NDLS`.
    StationCode
);
string_id!(
    /// Internal reservation identifier (UUID v4).
    ReservationId
);
string_id!(
    /// Public 10-digit locator code given to the traveler.
    LocatorCode
);
string_id!(
    /// Identifier of a staged payment intent.
    IntentId
);
string_id!(
    /// Identifier of a passenger slot within a reservation.
    PassengerId
);

/// Coach class offered on a train.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum CoachClass {
    #[strum(serialize = "1A")]
    #[serde(rename = "1A")]
    FirstAc,
    #[strum(serialize = "2A")]
    #[serde(rename = "2A")]
    SecondAc,
    #[strum(serialize = "3A")]
    #[serde(rename = "3A")]
    ThirdAc,
    #[strum(serialize = "3E")]
    #[serde(rename = "3E")]
    ThirdEconomy,
    #[strum(serialize = "CC")]
    #[serde(rename = "CC")]
    ChairCar,
    #[strum(serialize = "SL")]
    #[serde(rename = "SL")]
    Sleeper,
    #[strum(serialize = "2S")]
    #[serde(rename = "2S")]
    SecondSitting,
}

impl CoachClass {
    /// Air-conditioned classes get the higher urgent surcharge cap and their own default window.
    pub fn is_air_conditioned(self) -> bool {
        !matches!(self, Self::Sleeper | Self::SecondSitting)
    }

    /// Multiplier applied to the per-km rate.
    pub fn fare_multiplier(self) -> f64 {
        match self {
            Self::FirstAc => 6.0,
            Self::SecondAc => 3.5,
            Self::ThirdAc => 2.5,
            Self::ThirdEconomy => 2.2,
            Self::ChairCar => 1.8,
            Self::Sleeper => 1.0,
            Self::SecondSitting => 0.6,
        }
    }

    /// Coach codes a seat in this class can be allocated in.
    pub fn coach_codes(self) -> &'static [&'static str] {
        match self {
            Self::FirstAc => &["H1", "H2"],
            Self::SecondAc => &["A1", "A2", "A3"],
            Self::ThirdAc => &["B1", "B2", "B3", "B4", "B5", "B6"],
            Self::ThirdEconomy => &["M1", "M2"],
            Self::ChairCar => &["C1", "C2", "C3", "C4", "C5"],
            Self::Sleeper => &["S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8"],
            Self::SecondSitting => &["D1", "D2", "D3", "D4"],
        }
    }

    /// Seat numbers per coach run `1..=seats_per_coach()`.
    pub fn seats_per_coach(self) -> u32 {
        match self {
            Self::FirstAc => 24,
            Self::SecondAc => 48,
            Self::ThirdAc => 64,
            Self::ThirdEconomy => 72,
            Self::ChairCar => 78,
            Self::Sleeper => 72,
            Self::SecondSitting => 108,
        }
    }

    /// Berth (or seat) types that exist in this class.
    pub fn berth_types(self) -> &'static [BerthType] {
        use BerthType::*;
        match self {
            Self::FirstAc => &[Lower, Upper],
            Self::SecondAc => &[Lower, Upper, SideLower, SideUpper],
            Self::ThirdAc | Self::ThirdEconomy | Self::Sleeper => {
                &[Lower, Middle, Upper, SideLower, SideUpper]
            }
            Self::ChairCar | Self::SecondSitting => &[Window, Center, Aisle],
        }
    }
}

/// Berth or seat position within a coach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum BerthType {
    #[strum(serialize = "LB")]
    #[serde(rename = "LB")]
    Lower,
    #[strum(serialize = "MB")]
    #[serde(rename = "MB")]
    Middle,
    #[strum(serialize = "UB")]
    #[serde(rename = "UB")]
    Upper,
    #[strum(serialize = "SL")]
    #[serde(rename = "SL")]
    SideLower,
    #[strum(serialize = "SU")]
    #[serde(rename = "SU")]
    SideUpper,
    #[strum(serialize = "WS")]
    #[serde(rename = "WS")]
    Window,
    #[strum(serialize = "MS")]
    #[serde(rename = "MS")]
    Center,
    #[strum(serialize = "AS")]
    #[serde(rename = "AS")]
    Aisle,
}

/// Named partition of a train's seats with independently tracked capacity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FareQuota {
    Standard,
    Urgent,
}

/// Lifecycle status of a reservation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    AwaitingPayment,
    Confirmed,
    Waitlisted,
    ContingencyConfirmed,
    Cancelled,
}

impl ReservationStatus {
    /// Statuses whose passengers count against quota capacity.
    pub fn holds_capacity(self) -> bool {
        matches!(self, Self::Confirmed | Self::ContingencyConfirmed)
    }
}

/// Waitlist bucket used for promotion priority. Declaration order is priority order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuotaSubtype {
    /// Boarding at the train's origin.
    General,
    /// Long segment starting at an intermediate station.
    RemoteLocation,
    /// Short segment starting at an intermediate station.
    Pooled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Phase of the chart for one (train, date). Advances monotonically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChartPhase {
    Pending,
    PreliminaryClosed,
    Final,
}

/// A train and its seat inventory parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    pub total_seats: u32,
    pub urgent_quota_seats: u32,
    pub standard_rate_per_km: f64,
    pub urgent_rate_per_km: f64,
    pub coach_classes: Vec<CoachClass>,
}

impl Train {
    pub fn validate(&self) -> Result<(), RailbookError> {
        if self.urgent_quota_seats > self.total_seats {
            return Err(RailbookError::Config(format!(
                "train {}: urgent_quota_seats ({}) exceeds total_seats ({})",
                self.id, self.urgent_quota_seats, self.total_seats
            )));
        }
        if self.coach_classes.is_empty() {
            return Err(RailbookError::Config(format!(
                "train {} offers no coach classes",
                self.id
            )));
        }
        Ok(())
    }

    pub fn offers(&self, class: CoachClass) -> bool {
        self.coach_classes.contains(&class)
    }

    /// Seats in the given (class, quota) pool. Zero for classes the train does not offer.
    ///
    /// `total_seats` and `urgent_quota_seats` are partitioned across
    /// `coach_classes` in listed order: every class gets an equal share and
    /// the remainder goes one seat each to the leading classes.
    pub fn quota_capacity(&self, class: CoachClass, quota: FareQuota) -> u32 {
        let Some(index) = self.coach_classes.iter().position(|&c| c == class) else {
            return 0;
        };
        let classes = self.coach_classes.len();
        let urgent = share(self.urgent_quota_seats, classes, index);
        match quota {
            FareQuota::Standard => share(self.total_seats, classes, index).saturating_sub(urgent),
            FareQuota::Urgent => urgent,
        }
    }
}

fn share(seats: u32, classes: usize, index: usize) -> u32 {
    let classes = u32::try_from(classes).unwrap_or(u32::MAX);
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    seats / classes + u32::from(index < seats % classes)
}

/// One stop on a train's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub train: TrainId,
    pub station: StationCode,
    pub sequence: u32,
    pub distance_km: f64,
    pub arrival: Option<NaiveTime>,
    pub departure: Option<NaiveTime>,
    /// Days after the origin departure date on which this stop is served.
    #[serde(default)]
    pub day_offset: u32,
}

/// Identifies the seat pool a reservation draws from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub train: TrainId,
    pub journey_date: NaiveDate,
    pub coach_class: CoachClass,
    pub fare_quota: FareQuota,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub locator: LocatorCode,
    pub owner: String,
    pub train: TrainId,
    pub from: StationCode,
    pub to: StationCode,
    pub journey_date: NaiveDate,
    pub passenger_count: u32,
    pub coach_class: CoachClass,
    pub fare_quota: FareQuota,
    pub status: ReservationStatus,
    pub subtype: QuotaSubtype,
    pub group_id: Option<String>,
    pub total_amount: f64,
    pub intent_id: IntentId,
    pub created_at: DateTime<Utc>,
    pub cancellation_charge: Option<f64>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn pool_key(&self) -> PoolKey {
        PoolKey {
            train: self.train.clone(),
            journey_date: self.journey_date,
            coach_class: self.coach_class,
            fare_quota: self.fare_quota,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerSlot {
    pub id: PassengerId,
    pub reservation_id: ReservationId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub berth_preference: Option<BerthType>,
    /// `<coach>-<number>`, e.g. `S3-42`. `None` until allocated.
    pub seat: Option<String>,
    pub berth: Option<BerthType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub reservation_id: ReservationId,
    pub train: TrainId,
    pub journey_date: NaiveDate,
    pub position: u32,
    pub subtype: QuotaSubtype,
    pub enqueued_at: DateTime<Utc>,
}

/// Passenger totals currently holding capacity in one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedCounts {
    pub confirmed: u32,
    pub contingency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub available: u32,
    pub contingency: u32,
    pub waitlisted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartState {
    pub train: TrainId,
    pub journey_date: NaiveDate,
    pub phase: ChartPhase,
    pub promoted: u32,
    pub cancelled: u32,
    pub seats_allocated: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChartState {
    pub fn pending(train: TrainId, journey_date: NaiveDate) -> Self {
        Self {
            train,
            journey_date,
            phase: ChartPhase::Pending,
            promoted: 0,
            cancelled: 0,
            seats_allocated: 0,
            updated_at: None,
        }
    }

    /// Whether new bookings are still accepted for this (train, date).
    pub fn is_open(&self) -> bool {
        self.phase == ChartPhase::Pending
    }
}

/// A concrete seat handed to a passenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub passenger_id: PassengerId,
    pub seat: String,
    pub berth: BerthType,
}

/// A named daily opening window for the urgent quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgentWindow {
    pub name: String,
    pub coach_classes: Vec<CoachClass>,
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub days_before: u32,
}

/// Administrative override that opens the urgent quota regardless of windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgentOverride {
    pub enabled: bool,
    /// Empty means every class.
    pub coach_classes: Vec<CoachClass>,
    /// Empty means every train.
    pub trains: Vec<TrainId>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UrgentOverride {
    pub fn applies(&self, class: CoachClass, train: &TrainId, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.expires_at.is_none_or(|at| now < at)
            && (self.coach_classes.is_empty() || self.coach_classes.contains(&class))
            && (self.trains.is_empty() || self.trains.contains(train))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrgentBookingPolicy {
    pub windows: Vec<UrgentWindow>,
    pub override_rule: Option<UrgentOverride>,
}
