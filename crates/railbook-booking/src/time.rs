// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between UTC instants and railway local time.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use railbook_core::Clock;

/// Fixed offset for `minutes` east of UTC. Out-of-range values fall back to UTC.
pub fn local_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

pub fn to_local(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    at.with_timezone(&offset).naive_local()
}

/// Current local wall-clock time.
pub fn local_now(clock: &dyn Clock, offset: FixedOffset) -> NaiveDateTime {
    to_local(clock.now(), offset)
}

pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
