// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking engine for the Railbook reservation system.
//!
//! Ties route validation, fare computation, availability, the urgent-quota
//! gate, the persisted waitlist and seat allocation together behind
//! [`ReservationLedger`], which serializes every capacity decision per train.

pub mod allocator;
pub mod availability;
pub mod factory;
pub mod fare;
pub mod gate;
pub mod ledger;
pub mod locks;
pub mod request;
pub mod route;
pub mod time;
pub mod waitlist;

pub use allocator::SeatAllocator;
pub use availability::{AvailabilityEngine, PoolCapacity};
pub use fare::FareCalculator;
pub use gate::UrgentBookingGate;
pub use ledger::{Rebalance, ReservationLedger};
pub use locks::TrainLocks;
pub use request::{
    BookingReceipt, BookingRequest, CancellationReceipt, PassengerDetails, PaymentOutcome,
    StagedIntent,
};
pub use route::{RouteCache, RouteGraph};
pub use waitlist::WaitlistQueue;
