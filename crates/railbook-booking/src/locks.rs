// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Train-scoped exclusive locks.
//!
//! Every capacity decision that leads to a write happens while holding the
//! lock of its train. The map entry is cloned out before awaiting so no
//! DashMap shard guard is held across the await point.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use railbook_core::types::TrainId;

#[derive(Default)]
pub struct TrainLocks {
    locks: DashMap<TrainId, Arc<Mutex<()>>>,
}

impl TrainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, train: &TrainId) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(
            self.locks
                .entry(train.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        mutex.lock_owned().await
    }
}
