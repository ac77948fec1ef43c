// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chart state persistence.

use chrono::NaiveDate;
use railbook_core::RailbookError;
use railbook_core::types::{ChartState, TrainId};
use rusqlite::params;

use super::{parsed, parsed_opt, timestamp};
use crate::database::{Database, map_tr_err};

pub async fn get(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
) -> Result<Option<ChartState>, RailbookError> {
    let train = train.clone();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT train_id, journey_date, phase, promoted, cancelled, seats_allocated, updated_at
                 FROM chart_states WHERE train_id = ?1 AND journey_date = ?2",
                params![train.as_str(), date.to_string()],
                |row| {
                    Ok(ChartState {
                        train: TrainId(row.get(0)?),
                        journey_date: parsed(row, 1)?,
                        phase: parsed(row, 2)?,
                        promoted: row.get(3)?,
                        cancelled: row.get(4)?,
                        seats_allocated: row.get(5)?,
                        updated_at: parsed_opt(row, 6)?,
                    })
                },
            );
            match result {
                Ok(state) => Ok(Some(state)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the state. A stored phase is never moved backwards.
pub async fn save(db: &Database, state: &ChartState) -> Result<(), RailbookError> {
    let state = state.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = match tx.query_row(
                "SELECT phase FROM chart_states WHERE train_id = ?1 AND journey_date = ?2",
                params![state.train.as_str(), state.journey_date.to_string()],
                |row| row.get(0),
            ) {
                Ok(phase) => Some(phase),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };
            let regresses = current
                .and_then(|p| p.parse::<railbook_core::ChartPhase>().ok())
                .is_some_and(|stored| stored > state.phase);
            if !regresses {
                tx.execute(
                    "INSERT INTO chart_states
                         (train_id, journey_date, phase, promoted, cancelled, seats_allocated, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(train_id, journey_date) DO UPDATE SET
                         phase = excluded.phase,
                         promoted = excluded.promoted,
                         cancelled = excluded.cancelled,
                         seats_allocated = excluded.seats_allocated,
                         updated_at = excluded.updated_at",
                    params![
                        state.train.as_str(),
                        state.journey_date.to_string(),
                        state.phase.to_string(),
                        state.promoted,
                        state.cancelled,
                        state.seats_allocated,
                        state.updated_at.as_ref().map(timestamp),
                    ],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}
