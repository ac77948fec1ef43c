// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening hours of the urgent quota.

use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use railbook_core::types::{CoachClass, TrainId, UrgentBookingPolicy, UrgentWindow};
use railbook_core::{Clock, InventoryStore, RailbookError};

use crate::time::to_local;

pub struct UrgentBookingGate {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    defaults: Vec<UrgentWindow>,
    offset: FixedOffset,
}

impl UrgentBookingGate {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        defaults: Vec<UrgentWindow>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            clock,
            defaults,
            offset,
        }
    }

    /// Whether urgent bookings for `journey_date` in `class` on `train` are accepted right now.
    pub async fn is_open(
        &self,
        journey_date: NaiveDate,
        class: CoachClass,
        train: &TrainId,
    ) -> Result<bool, RailbookError> {
        let policy = self.store.urgent_policy().await?;
        let open = evaluate(
            &policy,
            &self.defaults,
            self.clock.now(),
            self.offset,
            journey_date,
            class,
            train,
        );
        debug!(train = %train, date = %journey_date, %class, open, "urgent gate evaluated");
        Ok(open)
    }
}

/// Gate decision for a fixed instant.
///
/// Stored windows replace the defaults entirely when at least one exists.
pub fn evaluate(
    policy: &UrgentBookingPolicy,
    defaults: &[UrgentWindow],
    now: DateTime<Utc>,
    offset: FixedOffset,
    journey_date: NaiveDate,
    class: CoachClass,
    train: &TrainId,
) -> bool {
    if let Some(rule) = &policy.override_rule {
        if rule.applies(class, train, now) {
            return true;
        }
    }

    let windows = if policy.windows.is_empty() {
        defaults
    } else {
        &policy.windows
    };
    let local = to_local(now, offset);
    windows.iter().any(|w| {
        w.coach_classes.contains(&class)
            && journey_date.checked_sub_days(Days::new(u64::from(w.days_before)))
                == Some(local.date())
            && w.opens_at <= local.time()
            && local.time() < w.closes_at
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use railbook_core::types::UrgentOverride;

    use crate::time::local_offset;

    fn ac_window() -> UrgentWindow {
        UrgentWindow {
            name: "ac".into(),
            coach_classes: vec![CoachClass::SecondAc, CoachClass::ThirdAc],
            opens_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            closes_at: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            days_before: 1,
        }
    }

    fn policy() -> UrgentBookingPolicy {
        UrgentBookingPolicy {
            windows: vec![ac_window()],
            override_rule: None,
        }
    }

    fn ist(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        local_offset(330)
            .with_ymd_and_hms(2026, 3, 1, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn journey() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn check(policy: &UrgentBookingPolicy, now: DateTime<Utc>, class: CoachClass) -> bool {
        evaluate(
            policy,
            &[],
            now,
            local_offset(330),
            journey(),
            class,
            &"12951".into(),
        )
    }

    #[test]
    fn window_is_half_open() {
        let p = policy();
        assert!(!check(&p, ist(9, 59, 59), CoachClass::ThirdAc));
        assert!(check(&p, ist(10, 0, 0), CoachClass::ThirdAc));
        assert!(check(&p, ist(11, 59, 59), CoachClass::ThirdAc));
        assert!(!check(&p, ist(12, 0, 0), CoachClass::ThirdAc));
    }

    #[test]
    fn class_outside_window_stays_closed() {
        assert!(!check(&policy(), ist(10, 30, 0), CoachClass::Sleeper));
    }

    #[test]
    fn wrong_day_stays_closed() {
        let two_days_before = local_offset(330)
            .with_ymd_and_hms(2026, 2, 28, 10, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(!check(&policy(), two_days_before, CoachClass::ThirdAc));
    }

    #[test]
    fn override_opens_any_time_until_expiry() {
        let mut p = policy();
        p.override_rule = Some(UrgentOverride {
            enabled: true,
            coach_classes: vec![],
            trains: vec!["12951".into()],
            expires_at: Some(ist(8, 0, 0)),
        });
        assert!(check(&p, ist(7, 0, 0), CoachClass::Sleeper));
        assert!(!check(&p, ist(8, 30, 0), CoachClass::Sleeper));
    }

    #[test]
    fn disabled_override_is_ignored() {
        let mut p = policy();
        p.override_rule = Some(UrgentOverride {
            enabled: false,
            coach_classes: vec![],
            trains: vec![],
            expires_at: None,
        });
        assert!(!check(&p, ist(7, 0, 0), CoachClass::ThirdAc));
    }

    #[test]
    fn defaults_apply_without_stored_windows() {
        let defaults = vec![ac_window()];
        let open = evaluate(
            &UrgentBookingPolicy::default(),
            &defaults,
            ist(10, 0, 0),
            local_offset(330),
            journey(),
            CoachClass::SecondAc,
            &"12951".into(),
        );
        assert!(open);
    }
}
