// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waitlist operations.
//!
//! Positions within a (train, date, subtype) bucket are kept contiguous from
//! 1. Removal shifts later entries up in two passes (negate, then restore
//! minus one) so the unique position index never sees a transient clash.

use chrono::{DateTime, NaiveDate, Utc};
use railbook_core::RailbookError;
use railbook_core::types::{QuotaSubtype, ReservationId, TrainId, WaitlistEntry};
use rusqlite::{Connection, Row, params};

use super::{parsed, timestamp};
use crate::database::{Database, map_tr_err};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<WaitlistEntry> {
    Ok(WaitlistEntry {
        reservation_id: ReservationId(row.get(0)?),
        train: TrainId(row.get(1)?),
        journey_date: parsed(row, 2)?,
        subtype: parsed(row, 3)?,
        position: row.get(4)?,
        enqueued_at: parsed(row, 5)?,
    })
}

const ENTRY_COLUMNS: &str = "reservation_id, train_id, journey_date, subtype, position, enqueued_at";

/// Append to the bucket tail inside an open transaction. Returns the new position.
pub(crate) fn append(
    conn: &Connection,
    reservation: &str,
    train: &str,
    date: NaiveDate,
    subtype: QuotaSubtype,
    at: &DateTime<Utc>,
) -> rusqlite::Result<u32> {
    let date = date.to_string();
    let subtype = subtype.to_string();
    let position: u32 = conn.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM waitlist
         WHERE train_id = ?1 AND journey_date = ?2 AND subtype = ?3",
        params![train, date, subtype],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO waitlist (reservation_id, train_id, journey_date, subtype, position, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![reservation, train, date, subtype, position, timestamp(at)],
    )?;
    Ok(position)
}

/// Delete an entry and close the gap it leaves. Returns whether an entry existed.
pub(crate) fn detach(conn: &Connection, reservation: &str) -> rusqlite::Result<bool> {
    let found = conn.query_row(
        "SELECT train_id, journey_date, subtype, position FROM waitlist WHERE reservation_id = ?1",
        params![reservation],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        },
    );
    let (train, date, subtype, position) = match found {
        Ok(key) => key,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
        Err(e) => return Err(e),
    };

    conn.execute(
        "DELETE FROM waitlist WHERE reservation_id = ?1",
        params![reservation],
    )?;
    conn.execute(
        "UPDATE waitlist SET position = -position
         WHERE train_id = ?1 AND journey_date = ?2 AND subtype = ?3 AND position > ?4",
        params![train, date, subtype, position],
    )?;
    conn.execute(
        "UPDATE waitlist SET position = -position - 1
         WHERE train_id = ?1 AND journey_date = ?2 AND subtype = ?3 AND position < 0",
        params![train, date, subtype],
    )?;
    Ok(true)
}

pub async fn enqueue(
    db: &Database,
    reservation: &ReservationId,
    train: &TrainId,
    date: NaiveDate,
    subtype: QuotaSubtype,
    at: DateTime<Utc>,
) -> Result<u32, RailbookError> {
    let reservation = reservation.clone();
    let train = train.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let position = append(&tx, reservation.as_str(), train.as_str(), date, subtype, &at)?;
            tx.commit()?;
            Ok(position)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove(db: &Database, reservation: &ReservationId) -> Result<bool, RailbookError> {
    let reservation = reservation.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = detach(&tx, reservation.as_str())?;
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}

/// Entries for (train, date) in promotion order: subtype priority, then position.
pub async fn entries(
    db: &Database,
    train: &TrainId,
    date: NaiveDate,
) -> Result<Vec<WaitlistEntry>, RailbookError> {
    let train = train.clone();
    let mut entries: Vec<WaitlistEntry> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM waitlist
                 WHERE train_id = ?1 AND journey_date = ?2"
            ))?;
            let rows = stmt.query_map(params![train.as_str(), date.to_string()], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;
    entries.sort_by_key(|e| (e.subtype, e.position));
    Ok(entries)
}

pub async fn entry(
    db: &Database,
    reservation: &ReservationId,
) -> Result<Option<WaitlistEntry>, RailbookError> {
    let reservation = reservation.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM waitlist WHERE reservation_id = ?1"
            ))?;
            match stmt.query_row(params![reservation.as_str()], entry_from_row) {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
