// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chart preparation for Railbook.
//!
//! [`ChartPipeline`] closes bookings for a (train, date) in two stages close
//! to departure; [`ChartScheduler`] triggers those stages from the timetable.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::ChartPipeline;
pub use scheduler::{ChartScheduler, TickReport};

#[cfg(test)]
mod testing;
