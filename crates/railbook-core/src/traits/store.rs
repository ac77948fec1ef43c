// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence port for trains, reservations, the waitlist, chart state and
//! urgent-quota policy.
//!
//! The booking engine serializes decisions per train with its own lock; an
//! implementation only has to make each call atomic. Calls that touch several
//! rows (reservation + passengers + waitlist entry, promotion, cancellation)
//! must commit or roll back as a unit.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::RailbookError;
use crate::types::{
    ChartState, CoachClass, CommittedCounts, LocatorCode, IntentId, PassengerSlot, PoolKey,
    QuotaSubtype, Reservation, ReservationId, ReservationStatus, RouteStop, SeatAssignment, Train,
    TrainId, UrgentBookingPolicy, UrgentOverride, UrgentWindow, WaitlistEntry,
};

#[async_trait]
pub trait InventoryStore: Send + Sync {
    // --- Trains and routes ---

    async fn upsert_train(&self, train: &Train) -> Result<(), RailbookError>;

    async fn get_train(&self, id: &TrainId) -> Result<Option<Train>, RailbookError>;

    async fn list_trains(&self) -> Result<Vec<Train>, RailbookError>;

    /// Replaces every stop of the train in one transaction.
    async fn replace_route(&self, train: &TrainId, stops: &[RouteStop])
    -> Result<(), RailbookError>;

    /// Stops ordered by sequence.
    async fn route_stops(&self, train: &TrainId) -> Result<Vec<RouteStop>, RailbookError>;

    // --- Reservations ---

    /// Persists a reservation with its passengers.
    ///
    /// A `Waitlisted` reservation is appended to its waitlist bucket in the
    /// same transaction and the assigned position is returned. Fails with
    /// [`RailbookError::DuplicateLocator`] when the locator code is taken.
    async fn insert_reservation(
        &self,
        reservation: &Reservation,
        passengers: &[PassengerSlot],
    ) -> Result<Option<u32>, RailbookError>;

    async fn get_reservation(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, RailbookError>;

    async fn find_by_locator(
        &self,
        locator: &LocatorCode,
    ) -> Result<Option<Reservation>, RailbookError>;

    async fn find_by_intent(&self, intent: &IntentId)
    -> Result<Option<Reservation>, RailbookError>;

    /// Reservations for (train, date) in any of `statuses`, oldest first.
    async fn list_reservations(
        &self,
        train: &TrainId,
        date: NaiveDate,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, RailbookError>;

    async fn passengers(
        &self,
        reservation: &ReservationId,
    ) -> Result<Vec<PassengerSlot>, RailbookError>;

    /// Passenger totals of confirmed and contingency-confirmed reservations in the pool.
    async fn committed_counts(&self, key: &PoolKey) -> Result<CommittedCounts, RailbookError>;

    /// Seats held by confirmed or contingency-confirmed passengers.
    async fn taken_seats(
        &self,
        train: &TrainId,
        date: NaiveDate,
        class: CoachClass,
    ) -> Result<Vec<String>, RailbookError>;

    /// Seats already assigned to other live reservations sharing `group_id`.
    async fn group_seats(
        &self,
        train: &TrainId,
        date: NaiveDate,
        class: CoachClass,
        group_id: &str,
    ) -> Result<Vec<String>, RailbookError>;

    async fn assign_seats(&self, assignments: &[SeatAssignment]) -> Result<(), RailbookError>;

    /// Marks the reservation cancelled and drops any waitlist entry it holds,
    /// renumbering the rest of its bucket.
    async fn cancel_reservation(
        &self,
        id: &ReservationId,
        charge: f64,
        at: DateTime<Utc>,
    ) -> Result<(), RailbookError>;

    /// Flips every listed reservation to confirmed, removing waitlist entries
    /// (with renumbering) for those that were waitlisted. All or nothing.
    async fn confirm_reservations(&self, ids: &[ReservationId]) -> Result<(), RailbookError>;

    // --- Waitlist ---

    /// Appends to the (train, date, subtype) bucket and returns the 1-based position.
    async fn enqueue_waitlist(
        &self,
        reservation: &ReservationId,
        train: &TrainId,
        date: NaiveDate,
        subtype: QuotaSubtype,
        at: DateTime<Utc>,
    ) -> Result<u32, RailbookError>;

    /// Removes the entry and shifts every later entry in its bucket up by one.
    async fn remove_waitlist(&self, reservation: &ReservationId) -> Result<bool, RailbookError>;

    /// Entries for (train, date) ordered by subtype priority, then position.
    async fn waitlist_entries(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, RailbookError>;

    async fn waitlist_entry(
        &self,
        reservation: &ReservationId,
    ) -> Result<Option<WaitlistEntry>, RailbookError>;

    // --- Chart ---

    async fn chart_state(
        &self,
        train: &TrainId,
        date: NaiveDate,
    ) -> Result<Option<ChartState>, RailbookError>;

    async fn save_chart_state(&self, state: &ChartState) -> Result<(), RailbookError>;

    // --- Urgent policy ---

    async fn urgent_policy(&self) -> Result<UrgentBookingPolicy, RailbookError>;

    async fn save_urgent_window(&self, window: &UrgentWindow) -> Result<(), RailbookError>;

    async fn remove_urgent_window(&self, name: &str) -> Result<bool, RailbookError>;

    /// `None` clears the override.
    async fn set_urgent_override(
        &self,
        rule: Option<&UrgentOverride>,
    ) -> Result<(), RailbookError>;
}
