// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seat and berth assignment.
//!
//! Seats are `<coach>-<number>` with numbers `1..=seats_per_coach`. When a
//! bounded number of coaches turn out full the passenger gets a synthetic
//! overflow seat `<class>-X<k>` instead of an error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use railbook_core::types::{
    BerthType, CoachClass, PassengerSlot, Reservation, ReservationId, SeatAssignment,
};
use railbook_core::{InventoryStore, RailbookError};

pub struct SeatAllocator {
    store: Arc<dyn InventoryStore>,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl SeatAllocator {
    pub fn new(store: Arc<dyn InventoryStore>, max_attempts: u32) -> Self {
        Self::with_rng(store, max_attempts, StdRng::from_entropy())
    }

    /// Deterministic coach and berth choices for tests.
    pub fn with_seed(store: Arc<dyn InventoryStore>, max_attempts: u32, seed: u64) -> Self {
        Self::with_rng(store, max_attempts, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<dyn InventoryStore>, max_attempts: u32, rng: StdRng) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            rng: Mutex::new(rng),
        }
    }

    /// Seats every unseated passenger of a confirmed or contingency reservation.
    ///
    /// Returns only the assignments made by this call.
    pub async fn allocate(&self, id: &ReservationId) -> Result<Vec<SeatAssignment>, RailbookError> {
        let res = self
            .store
            .get_reservation(id)
            .await?
            .ok_or_else(|| RailbookError::ReservationNotFound(id.to_string()))?;
        self.allocate_for(&res).await
    }

    pub async fn allocate_for(
        &self,
        res: &Reservation,
    ) -> Result<Vec<SeatAssignment>, RailbookError> {
        if !res.status.holds_capacity() {
            debug!(reservation = %res.id, status = %res.status, "no seats for uncommitted reservation");
            return Ok(Vec::new());
        }

        let passengers = self.store.passengers(&res.id).await?;
        let (seated, unseated): (Vec<_>, Vec<_>) =
            passengers.into_iter().partition(|p| p.seat.is_some());
        if unseated.is_empty() {
            return Ok(Vec::new());
        }

        let mut taken: HashSet<String> = self
            .store
            .taken_seats(&res.train, res.journey_date, res.coach_class)
            .await?
            .into_iter()
            .collect();

        let mut preferred = None;
        if let Some(group) = &res.group_id {
            let group_seats = self
                .store
                .group_seats(&res.train, res.journey_date, res.coach_class, group)
                .await?;
            preferred = first_coach(res.coach_class, group_seats.iter().map(String::as_str));
        }
        if preferred.is_none() {
            preferred = first_coach(
                res.coach_class,
                seated.iter().filter_map(|p| p.seat.as_deref()),
            );
        }

        let plan = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            plan_seats(
                res.coach_class,
                &unseated,
                &mut taken,
                preferred,
                self.max_attempts,
                &mut *rng,
            )
        };
        if plan.overflowed > 0 {
            warn!(
                reservation = %res.id,
                train = %res.train,
                date = %res.journey_date,
                class = %res.coach_class,
                overflowed = plan.overflowed,
                "coaches exhausted, issued overflow seats"
            );
        }

        self.store.assign_seats(&plan.assignments).await?;
        debug!(
            reservation = %res.id,
            seats = plan.assignments.len(),
            "seats allocated"
        );
        Ok(plan.assignments)
    }
}

#[derive(Debug, Default)]
pub struct SeatPlan {
    pub assignments: Vec<SeatAssignment>,
    pub overflowed: u32,
}

fn first_coach<'a>(
    class: CoachClass,
    seats: impl Iterator<Item = &'a str>,
) -> Option<&'static str> {
    seats
        .filter_map(|seat| seat.split_once('-').map(|(coach, _)| coach))
        .find_map(|coach| class.coach_codes().iter().copied().find(|c| *c == coach))
}

/// Assigns seats to `passengers` in order, recording each taken seat in `taken`.
pub fn plan_seats<R: rand::Rng + ?Sized>(
    class: CoachClass,
    passengers: &[PassengerSlot],
    taken: &mut HashSet<String>,
    preferred_coach: Option<&'static str>,
    max_attempts: u32,
    rng: &mut R,
) -> SeatPlan {
    let mut plan = SeatPlan::default();
    let mut batch_coach = preferred_coach;

    for passenger in passengers {
        let mut seat = None;
        if let Some(coach) = batch_coach {
            seat = free_seat(class, coach, taken);
        }
        let mut attempts = 0;
        while seat.is_none() && attempts < max_attempts {
            attempts += 1;
            if let Some(&coach) = class.coach_codes().choose(rng) {
                seat = free_seat(class, coach, taken);
                if seat.is_some() {
                    batch_coach = Some(coach);
                }
            }
        }
        let seat = seat.unwrap_or_else(|| {
            plan.overflowed += 1;
            overflow_seat(class, taken)
        });
        taken.insert(seat.clone());

        let berth = berth_for(class, passenger.berth_preference, rng);
        plan.assignments.push(SeatAssignment {
            passenger_id: passenger.id.clone(),
            seat,
            berth,
        });
    }
    plan
}

fn free_seat(class: CoachClass, coach: &str, taken: &HashSet<String>) -> Option<String> {
    (1..=class.seats_per_coach())
        .map(|n| format!("{coach}-{n}"))
        .find(|seat| !taken.contains(seat))
}

fn overflow_seat(class: CoachClass, taken: &HashSet<String>) -> String {
    (1u32..)
        .map(|k| format!("{class}-X{k}"))
        .find(|seat| !taken.contains(seat))
        .unwrap_or_else(|| format!("{class}-X"))
}

fn berth_for<R: rand::Rng + ?Sized>(
    class: CoachClass,
    preference: Option<BerthType>,
    rng: &mut R,
) -> BerthType {
    let valid = class.berth_types();
    match preference {
        Some(berth) if valid.contains(&berth) => berth,
        _ => valid.choose(rng).copied().unwrap_or(valid[0]),
    }
}
