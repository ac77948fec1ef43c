// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reservation and passenger operations.

use chrono::{DateTime, NaiveDate, Utc};
use railbook_core::RailbookError;
use railbook_core::types::{
    CoachClass, CommittedCounts, IntentId, LocatorCode, PassengerId, PassengerSlot, PoolKey,
    Reservation, ReservationId, ReservationStatus, SeatAssignment, StationCode, TrainId,
};
use rusqlite::{Row, params, params_from_iter};

use super::{is_unique_violation, parsed, parsed_opt, placeholders, timestamp, waitlist};
use crate::database::{Database, map_tr_err};

const RESERVATION_COLUMNS: &str = "id, locator, owner, train_id, from_station, to_station,
    journey_date, passenger_count, coach_class, fare_quota, status, subtype, group_id,
    total_amount, intent_id, created_at, cancellation_charge, cancelled_at";

const PASSENGER_COLUMNS: &str =
    "id, reservation_id, name, age, gender, berth_preference, seat, berth";

fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: ReservationId(row.get(0)?),
        locator: LocatorCode(row.get(1)?),
        owner: row.get(2)?,
        train: TrainId(row.get(3)?),
        from: StationCode(row.get(4)?),
        to: StationCode(row.get(5)?),
        journey_date: parsed(row, 6)?,
        passenger_count: row.get(7)?,
        coach_class: parsed(row, 8)?,
        fare_quota: parsed(row, 9)?,
        status: parsed(row, 10)?,
        subtype: parsed(row, 11)?,
        group_id: row.get(12)?,
        total_amount: row.get(13)?,
        intent_id: IntentId(row.get(14)?),
        created_at: parsed(row, 15)?,
        cancellation_charge: row.get(16)?,
        cancelled_at: parsed_opt(row, 17)?,
    })
}

fn passenger_from_row(row: &Row<'_>) -> rusqlite::Result<PassengerSlot> {
    Ok(PassengerSlot {
        id: PassengerId(row.get(0)?),
        reservation_id: ReservationId(row.get(1)?),
        name: row.get(2)?,
        age: row.get(3)?,
        gender: parsed(row, 4)?,
        berth_preference: parsed_opt(row, 5)?,
        seat: row.get(6)?,
        berth: parsed_opt(row, 7)?,
    })
}

/// Result of [`insert`] before it is mapped onto the error taxonomy.
enum InsertOutcome {
    Inserted(Option<u32>),
    LocatorTaken,
}

/// Persist a reservation, its passengers, and (when waitlisted) its waitlist entry.
pub async fn insert(
    db: &Database,
    reservation: &Reservation,
    passengers: &[PassengerSlot],
) -> Result<Option<u32>, RailbookError> {
    let r = reservation.clone();
    let passengers = passengers.to_vec();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO reservations ({RESERVATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    r.id.as_str(),
                    r.locator.as_str(),
                    r.owner,
                    r.train.as_str(),
                    r.from.as_str(),
                    r.to.as_str(),
                    r.journey_date.to_string(),
                    r.passenger_count,
                    r.coach_class.to_string(),
                    r.fare_quota.to_string(),
                    r.status.to_string(),
                    r.subtype.to_string(),
                    r.group_id,
                    r.total_amount,
                    r.intent_id.as_str(),
                    timestamp(&r.created_at),
                    r.cancellation_charge,
                    r.cancelled_at.as_ref().map(timestamp),
                ],
            );
            match inserted {
                Err(e) if is_unique_violation(&e, "reservations.locator") => {
                    return Ok(InsertOutcome::LocatorTaken);
                }
                other => {
                    other?;
                }
            }

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO passengers
                         (id, reservation_id, ordinal, name, age, gender, berth_preference, seat, berth)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for (ordinal, p) in passengers.iter().enumerate() {
                    stmt.execute(params![
                        p.id.as_str(),
                        r.id.as_str(),
                        ordinal as u32,
                        p.name,
                        p.age,
                        p.gender.to_string(),
                        p.berth_preference.map(|b| b.to_string()),
                        p.seat,
                        p.berth.map(|b| b.to_string()),
                    ])?;
                }
            }

            let position = if r.status == ReservationStatus::Waitlisted {
                Some(waitlist::append(
                    &tx,
                    r.id.as_str(),
                    r.train.as_str(),
                    r.journey_date,
                    r.subtype,
                    &r.created_at,
                )?)
            } else {
                None
            };
            tx.commit()?;
            Ok(InsertOutcome::Inserted(position))
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        InsertOutcome::Inserted(position) => Ok(position),
        InsertOutcome::LocatorTaken => Err(RailbookError::DuplicateLocator(
            reservation.locator.to_string(),
        )),
    }
}

async fn find_one(
    db: &Database,
    column: &'static str,
    value: String,
) -> Result<Option<Reservation>, RailbookError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE {column} = ?1"
            ))?;
            match stmt.query_row(params![value], reservation_from_row) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &ReservationId) -> Result<Option<Reservation>, RailbookError> {
    find_one(db, "id", id.to_string()).await
}

pub async fn by_locator(
    db: &Database,
    locator: &LocatorCode,
) -> Result<Option<Reservation>, RailbookError> {
    find_one(db, "locator", locator.to_string()).await
}

pub async fn by_intent(
    db: &Database,
    intent: &IntentId,
) -> Result<Option<Reservation>, RailbookError> {
    find_one(db, "intent_id", intent.to_string()).await
}

/// Reservations for (train, date) in any of `statuses`, oldest first.
pub async fn list(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
    statuses: &[ReservationStatus],
) -> Result<Vec<Reservation>, RailbookError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let mut args = vec![train.to_string(), date.to_string()];
    args.extend(statuses.iter().map(|s| s.to_string()));
    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations
         WHERE train_id = ?1 AND journey_date = ?2 AND status IN ({})
         ORDER BY created_at ASC, rowid ASC",
        placeholders(3, statuses.len())
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), reservation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn passengers(
    db: &Database,
    reservation: &ReservationId,
) -> Result<Vec<PassengerSlot>, RailbookError> {
    let reservation = reservation.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PASSENGER_COLUMNS} FROM passengers
                 WHERE reservation_id = ?1 ORDER BY ordinal ASC"
            ))?;
            let rows = stmt.query_map(params![reservation.as_str()], passenger_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn committed_counts(db: &Database, key: &PoolKey) -> Result<CommittedCounts, RailbookError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT
                     COALESCE(SUM(CASE WHEN status = ?5 THEN passenger_count END), 0),
                     COALESCE(SUM(CASE WHEN status = ?6 THEN passenger_count END), 0)
                 FROM reservations
                 WHERE train_id = ?1 AND journey_date = ?2 AND coach_class = ?3 AND fare_quota = ?4",
                params![
                    key.train.as_str(),
                    key.journey_date.to_string(),
                    key.coach_class.to_string(),
                    key.fare_quota.to_string(),
                    ReservationStatus::Confirmed.to_string(),
                    ReservationStatus::ContingencyConfirmed.to_string(),
                ],
                |row| {
                    Ok(CommittedCounts {
                        confirmed: row.get(0)?,
                        contingency: row.get(1)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

async fn seats_where(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
    class: CoachClass,
    group_id: Option<&str>,
) -> Result<Vec<String>, RailbookError> {
    let mut args = vec![
        train.to_string(),
        date.to_string(),
        class.to_string(),
        ReservationStatus::Confirmed.to_string(),
        ReservationStatus::ContingencyConfirmed.to_string(),
    ];
    let mut sql = "SELECT p.seat FROM passengers p
         JOIN reservations r ON r.id = p.reservation_id
         WHERE r.train_id = ?1 AND r.journey_date = ?2 AND r.coach_class = ?3
           AND r.status IN (?4, ?5) AND p.seat IS NOT NULL"
        .to_string();
    if let Some(group) = group_id {
        sql.push_str(" AND r.group_id = ?6");
        args.push(group.to_string());
    }
    sql.push_str(" ORDER BY r.created_at ASC, p.ordinal ASC");
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Seats held by confirmed or contingency passengers in a class.
pub async fn taken_seats(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
    class: CoachClass,
) -> Result<Vec<String>, RailbookError> {
    seats_where(db, train, date, class, None).await
}

/// Seats held by live reservations of a booking group, oldest first.
pub async fn group_seats(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
    class: CoachClass,
    group_id: &str,
) -> Result<Vec<String>, RailbookError> {
    seats_where(db, train, date, class, Some(group_id)).await
}

pub async fn assign_seats(
    db: &Database,
    assignments: &[SeatAssignment],
) -> Result<(), RailbookError> {
    let assignments = assignments.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("UPDATE passengers SET seat = ?1, berth = ?2 WHERE id = ?3")?;
                for a in &assignments {
                    stmt.execute(params![a.seat, a.berth.to_string(), a.passenger_id.as_str()])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark cancelled and drop any waitlist entry. Returns `false` if no row matched.
pub async fn cancel(
    db: &Database,
    id: &ReservationId,
    charge: f64,
    at: DateTime<Utc>,
) -> Result<bool, RailbookError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE reservations
                 SET status = ?1, cancellation_charge = ?2, cancelled_at = ?3
                 WHERE id = ?4",
                params![
                    ReservationStatus::Cancelled.to_string(),
                    charge,
                    timestamp(&at),
                    id.as_str()
                ],
            )?;
            waitlist::detach(&tx, id.as_str())?;
            tx.commit()?;
            Ok(updated == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Flip every listed reservation to confirmed in one transaction.
/// Returns how many rows changed.
pub async fn confirm(db: &Database, ids: &[ReservationId]) -> Result<usize, RailbookError> {
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for id in &ids {
                changed += tx.execute(
                    "UPDATE reservations SET status = ?1 WHERE id = ?2",
                    params![ReservationStatus::Confirmed.to_string(), id.as_str()],
                )?;
                waitlist::detach(&tx, id.as_str())?;
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}
