// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Railbook integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - temp SQLite store, manual clock, ledger and chart pipeline
//! - [`fixtures`] - a reference train, its route, and request builders

pub mod fixtures;
pub mod harness;

pub use harness::{TestHarness, TestHarnessBuilder};
