// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table group.
//!
//! Enumerations are stored as their text codes, dates as `YYYY-MM-DD`,
//! times of day as `HH:MM:SS` and instants as RFC 3339 UTC strings with
//! millisecond precision (lexicographically sortable).

pub mod charts;
pub mod policy;
pub mod reservations;
pub mod trains;
pub mod waitlist;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use railbook_core::CoachClass;
use rusqlite::Row;
use rusqlite::types::Type;

pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_text<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a text column and parse it with `FromStr`.
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    parse_text(idx, &raw)
}

/// Nullable variant of [`parsed`].
pub(crate) fn parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_text(idx, &s)).transpose()
}

pub(crate) fn encode_classes(classes: &[CoachClass]) -> String {
    classes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn decode_classes(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<CoachClass>> {
    let raw: String = row.get(idx)?;
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_text(idx, s))
        .collect()
}

/// Placeholders `?{start}, ?{start+1}, ...` for an `IN (...)` list.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(3, 3), "?3, ?4, ?5");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn class_codes_join() {
        assert_eq!(
            encode_classes(&[CoachClass::Sleeper, CoachClass::ThirdAc]),
            "SL,3A"
        );
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let b = DateTime::from_timestamp_millis(1_700_000_000_001).unwrap();
        assert!(timestamp(&a) < timestamp(&b));
        assert!(timestamp(&a).ends_with('Z'));
    }
}
