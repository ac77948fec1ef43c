// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait definitions implemented by storage adapters.
//!
//! Ports use `#[async_trait]` for dynamic dispatch compatibility, so the
//! engine can hold an `Arc<dyn InventoryStore>`.

pub mod store;

pub use store::InventoryStore;
