// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Train and route stop operations.

use railbook_core::RailbookError;
use railbook_core::types::{RouteStop, StationCode, Train, TrainId};
use rusqlite::{Row, params};

use super::{decode_classes, encode_classes, parsed_opt};
use crate::database::{Database, map_tr_err};

fn train_from_row(row: &Row<'_>) -> rusqlite::Result<Train> {
    Ok(Train {
        id: TrainId(row.get(0)?),
        name: row.get(1)?,
        total_seats: row.get(2)?,
        urgent_quota_seats: row.get(3)?,
        standard_rate_per_km: row.get(4)?,
        urgent_rate_per_km: row.get(5)?,
        coach_classes: decode_classes(row, 6)?,
    })
}

const TRAIN_COLUMNS: &str = "id, name, total_seats, urgent_quota_seats,
    standard_rate_per_km, urgent_rate_per_km, coach_classes";

/// Insert a train or replace every attribute of an existing one.
pub async fn upsert_train(db: &Database, train: &Train) -> Result<(), RailbookError> {
    let train = train.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO trains (id, name, total_seats, urgent_quota_seats,
                                     standard_rate_per_km, urgent_rate_per_km, coach_classes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     total_seats = excluded.total_seats,
                     urgent_quota_seats = excluded.urgent_quota_seats,
                     standard_rate_per_km = excluded.standard_rate_per_km,
                     urgent_rate_per_km = excluded.urgent_rate_per_km,
                     coach_classes = excluded.coach_classes",
                params![
                    train.id.as_str(),
                    train.name,
                    train.total_seats,
                    train.urgent_quota_seats,
                    train.standard_rate_per_km,
                    train.urgent_rate_per_km,
                    encode_classes(&train.coach_classes),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_train(db: &Database, id: &TrainId) -> Result<Option<Train>, RailbookError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TRAIN_COLUMNS} FROM trains WHERE id = ?1"))?;
            match stmt.query_row(params![id.as_str()], train_from_row) {
                Ok(train) => Ok(Some(train)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_trains(db: &Database) -> Result<Vec<Train>, RailbookError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TRAIN_COLUMNS} FROM trains ORDER BY id"))?;
            let rows = stmt.query_map([], train_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace every stop of a train atomically.
pub async fn replace_route(
    db: &Database,
    train: &TrainId,
    stops: &[RouteStop],
) -> Result<(), RailbookError> {
    let train = train.clone();
    let stops = stops.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM route_stops WHERE train_id = ?1",
                params![train.as_str()],
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO route_stops
                         (train_id, station, sequence, distance_km, arrival, departure, day_offset)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for stop in &stops {
                    insert.execute(params![
                        train.as_str(),
                        stop.station.as_str(),
                        stop.sequence,
                        stop.distance_km,
                        stop.arrival.map(|t| t.to_string()),
                        stop.departure.map(|t| t.to_string()),
                        stop.day_offset,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Stops of a train ordered by sequence.
pub async fn route_stops(db: &Database, train: &TrainId) -> Result<Vec<RouteStop>, RailbookError> {
    let train = train.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT train_id, station, sequence, distance_km, arrival, departure, day_offset
                 FROM route_stops WHERE train_id = ?1 ORDER BY sequence ASC",
            )?;
            let rows = stmt.query_map(params![train.as_str()], |row| {
                Ok(RouteStop {
                    train: TrainId(row.get(0)?),
                    station: StationCode(row.get(1)?),
                    sequence: row.get(2)?,
                    distance_km: row.get(3)?,
                    arrival: parsed_opt(row, 4)?,
                    departure: parsed_opt(row, 5)?,
                    day_offset: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
