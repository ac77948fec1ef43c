// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as fraction ranges, non-empty paths, and parseable window times.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::RailbookConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RailbookConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let booking = &config.booking;
    if booking.advance_booking_days == 0 {
        fail("booking.advance_booking_days must be at least 1".to_string());
    }
    if booking.max_passengers == 0 {
        fail("booking.max_passengers must be at least 1".to_string());
    }
    if booking.max_urgent_passengers == 0 || booking.max_urgent_passengers > booking.max_passengers
    {
        fail(format!(
            "booking.max_urgent_passengers must be between 1 and max_passengers ({}), got {}",
            booking.max_passengers, booking.max_urgent_passengers
        ));
    }
    if !(0.0..1.0).contains(&booking.contingency_fraction) {
        fail(format!(
            "booking.contingency_fraction must be in [0, 1), got {}",
            booking.contingency_fraction
        ));
    }
    if booking.utc_offset_minutes.abs() > 14 * 60 {
        fail(format!(
            "booking.utc_offset_minutes must be within +/-840, got {}",
            booking.utc_offset_minutes
        ));
    }
    if booking.intent_ttl_secs == 0 {
        fail("booking.intent_ttl_secs must be at least 1".to_string());
    }
    if booking.pooled_max_distance_km < 0.0 {
        fail(format!(
            "booking.pooled_max_distance_km must be non-negative, got {}",
            booking.pooled_max_distance_km
        ));
    }

    let fare = &config.fare;
    for (key, value) in [
        ("fare.tax_rate", fare.tax_rate),
        ("fare.urgent_surcharge_rate", fare.urgent_surcharge_rate),
        ("fare.child_rate", fare.child_rate),
        ("fare.senior_male_discount", fare.senior_male_discount),
        ("fare.senior_female_discount", fare.senior_female_discount),
    ] {
        if !(0.0..=1.0).contains(&value) {
            fail(format!("{key} must be in [0, 1], got {value}"));
        }
    }
    if fare.urgent_cap_ac < 0.0 || fare.urgent_cap_non_ac < 0.0 {
        fail("fare.urgent_cap_ac and fare.urgent_cap_non_ac must be non-negative".to_string());
    }
    if fare.child_free_below_age > fare.child_max_age {
        fail(format!(
            "fare.child_free_below_age ({}) must not exceed fare.child_max_age ({})",
            fare.child_free_below_age, fare.child_max_age
        ));
    }

    let mut seen_windows = HashSet::new();
    for (i, window) in config.urgent.default_windows.iter().enumerate() {
        if window.name.trim().is_empty() {
            fail(format!("urgent.default_windows[{i}].name must not be empty"));
        } else if !seen_windows.insert(window.name.as_str()) {
            fail(format!(
                "duplicate urgent window name `{}` in urgent.default_windows",
                window.name
            ));
        }
        match window.to_window() {
            Ok(parsed) if parsed.closes_at <= parsed.opens_at => fail(format!(
                "urgent window `{}` closes ({}) before it opens ({})",
                window.name, window.closes_at, window.opens_at
            )),
            Ok(_) => {}
            Err(message) => fail(format!("urgent window `{}`: {message}", window.name)),
        }
        if window.coach_classes.is_empty() {
            fail(format!("urgent window `{}` lists no coach classes", window.name));
        }
    }

    let chart = &config.chart;
    if chart.final_minutes_before >= chart.preliminary_hours_before * 60 {
        fail(format!(
            "chart.final_minutes_before ({}) must fall after the preliminary chart ({} hours before departure)",
            chart.final_minutes_before, chart.preliminary_hours_before
        ));
    }
    if chart.poll_interval_secs == 0 {
        fail("chart.poll_interval_secs must be at least 1".to_string());
    }

    if config.allocation.max_coach_attempts == 0 {
        fail("allocation.max_coach_attempts must be at least 1".to_string());
    }

    if config.availability.cache_ttl_secs > 3600 {
        fail(format!(
            "availability.cache_ttl_secs must be at most 3600, got {}",
            config.availability.cache_ttl_secs
        ));
    }

    let c = &config.cancellation;
    for (key, value) in [
        ("cancellation.waitlist_clerkage", c.waitlist_clerkage),
        ("cancellation.flat_first_ac", c.flat_first_ac),
        ("cancellation.flat_second_ac", c.flat_second_ac),
        ("cancellation.flat_third_ac", c.flat_third_ac),
        ("cancellation.flat_sleeper", c.flat_sleeper),
        ("cancellation.flat_second_sitting", c.flat_second_sitting),
    ] {
        if value < 0.0 {
            fail(format!("{key} must be non-negative, got {value}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &RailbookConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RailbookConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RailbookConfig::default();
        config.storage.database_path = "  ".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn contingency_fraction_out_of_range() {
        let mut config = RailbookConfig::default();
        config.booking.contingency_fraction = 1.0;
        assert!(
            messages(&config)
                .iter()
                .any(|m| m.contains("contingency_fraction"))
        );
    }

    #[test]
    fn urgent_party_larger_than_standard_party() {
        let mut config = RailbookConfig::default();
        config.booking.max_urgent_passengers = config.booking.max_passengers + 1;
        assert!(
            messages(&config)
                .iter()
                .any(|m| m.contains("max_urgent_passengers"))
        );
    }

    #[test]
    fn bad_window_time_is_reported() {
        let mut config = RailbookConfig::default();
        config.urgent.default_windows[0].opens_at = "ten".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("`ten`")));
    }

    #[test]
    fn final_chart_must_follow_preliminary() {
        let mut config = RailbookConfig::default();
        config.chart.preliminary_hours_before = 1;
        config.chart.final_minutes_before = 90;
        assert!(
            messages(&config)
                .iter()
                .any(|m| m.contains("final_minutes_before"))
        );
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = RailbookConfig::default();
        config.storage.database_path = String::new();
        config.fare.tax_rate = -0.1;
        config.allocation.max_coach_attempts = 0;
        assert_eq!(messages(&config).len(), 3);
    }
}
