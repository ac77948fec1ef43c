// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Urgent-quota window and override persistence.

use railbook_core::RailbookError;
use railbook_core::types::{TrainId, UrgentBookingPolicy, UrgentOverride, UrgentWindow};
use rusqlite::params;

use super::{decode_classes, encode_classes, parsed, parsed_opt, timestamp};
use crate::database::{Database, map_tr_err};

/// Load every window (by name) and the override, if one is stored.
pub async fn load(db: &Database) -> Result<UrgentBookingPolicy, RailbookError> {
    db.connection()
        .call(|conn| {
            let windows = {
                let mut stmt = conn.prepare(
                    "SELECT name, coach_classes, opens_at, closes_at, days_before
                     FROM urgent_windows ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(UrgentWindow {
                        name: row.get(0)?,
                        coach_classes: decode_classes(row, 1)?,
                        opens_at: parsed(row, 2)?,
                        closes_at: parsed(row, 3)?,
                        days_before: row.get(4)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let override_rule = match conn.query_row(
                "SELECT enabled, coach_classes, trains, expires_at FROM urgent_override WHERE id = 1",
                [],
                |row| {
                    let trains: String = row.get(2)?;
                    Ok(UrgentOverride {
                        enabled: row.get(0)?,
                        coach_classes: decode_classes(row, 1)?,
                        trains: trains
                            .split(',')
                            .filter(|s| !s.is_empty())
                            .map(TrainId::from)
                            .collect(),
                        expires_at: parsed_opt(row, 3)?,
                    })
                },
            ) {
                Ok(rule) => Some(rule),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            Ok(UrgentBookingPolicy {
                windows,
                override_rule,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a window by name.
pub async fn save_window(db: &Database, window: &UrgentWindow) -> Result<(), RailbookError> {
    let window = window.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO urgent_windows (name, coach_classes, opens_at, closes_at, days_before)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                     coach_classes = excluded.coach_classes,
                     opens_at = excluded.opens_at,
                     closes_at = excluded.closes_at,
                     days_before = excluded.days_before",
                params![
                    window.name,
                    encode_classes(&window.coach_classes),
                    window.opens_at.to_string(),
                    window.closes_at.to_string(),
                    window.days_before,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_window(db: &Database, name: &str) -> Result<bool, RailbookError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM urgent_windows WHERE name = ?1", params![name])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Store the override, or clear it with `None`.
pub async fn set_override(
    db: &Database,
    rule: Option<&UrgentOverride>,
) -> Result<(), RailbookError> {
    let rule = rule.cloned();
    db.connection()
        .call(move |conn| {
            match rule {
                Some(rule) => {
                    let trains = rule
                        .trains
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(",");
                    conn.execute(
                        "INSERT INTO urgent_override (id, enabled, coach_classes, trains, expires_at)
                         VALUES (1, ?1, ?2, ?3, ?4)
                         ON CONFLICT(id) DO UPDATE SET
                             enabled = excluded.enabled,
                             coach_classes = excluded.coach_classes,
                             trains = excluded.trains,
                             expires_at = excluded.expires_at",
                        params![
                            rule.enabled,
                            encode_classes(&rule.coach_classes),
                            trains,
                            rule.expires_at.as_ref().map(timestamp),
                        ],
                    )?;
                }
                None => {
                    conn.execute("DELETE FROM urgent_override", [])?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
