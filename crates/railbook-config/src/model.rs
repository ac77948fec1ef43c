// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Railbook reservation engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use chrono::NaiveTime;
use railbook_core::types::{CoachClass, UrgentWindow};
use serde::{Deserialize, Serialize};

/// Top-level Railbook configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RailbookConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Acceptance rules: horizon, party size, waitlist and contingency pools.
    #[serde(default)]
    pub booking: BookingConfig,

    /// Fare rules: tax, urgent surcharge, concessions.
    #[serde(default)]
    pub fare: FareConfig,

    /// Availability snapshot cache.
    #[serde(default)]
    pub availability: AvailabilityConfig,

    /// Fallback urgent-quota windows used when no policy is stored.
    #[serde(default)]
    pub urgent: UrgentConfig,

    /// Chart preparation schedule.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Seat allocation.
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Cancellation charges.
    #[serde(default)]
    pub cancellation: CancellationConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "railbook".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "railbook.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Acceptance rules for new reservations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BookingConfig {
    /// How many days ahead of the journey booking opens.
    #[serde(default = "default_advance_booking_days")]
    pub advance_booking_days: u32,

    /// Maximum passengers on one standard-quota reservation.
    #[serde(default = "default_max_passengers")]
    pub max_passengers: u32,

    /// Maximum passengers on one urgent-quota reservation.
    #[serde(default = "default_max_urgent_passengers")]
    pub max_urgent_passengers: u32,

    /// Maximum waitlisted reservations per (train, date, class, quota).
    #[serde(default = "default_waitlist_limit")]
    pub waitlist_limit: u32,

    /// Share of each quota held back as contingency seats.
    #[serde(default = "default_contingency_fraction")]
    pub contingency_fraction: f64,

    /// Offset of railway local time from UTC, in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Intermediate-station segments up to this length join the pooled waitlist.
    #[serde(default = "default_pooled_max_distance_km")]
    pub pooled_max_distance_km: f64,

    /// Staged intents without a payment result are dropped after this many seconds.
    #[serde(default = "default_intent_ttl_secs")]
    pub intent_ttl_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            advance_booking_days: default_advance_booking_days(),
            max_passengers: default_max_passengers(),
            max_urgent_passengers: default_max_urgent_passengers(),
            waitlist_limit: default_waitlist_limit(),
            contingency_fraction: default_contingency_fraction(),
            utc_offset_minutes: default_utc_offset_minutes(),
            pooled_max_distance_km: default_pooled_max_distance_km(),
            intent_ttl_secs: default_intent_ttl_secs(),
        }
    }
}

fn default_advance_booking_days() -> u32 {
    120
}

fn default_max_passengers() -> u32 {
    6
}

fn default_max_urgent_passengers() -> u32 {
    4
}

fn default_waitlist_limit() -> u32 {
    200
}

fn default_contingency_fraction() -> f64 {
    0.1
}

fn default_utc_offset_minutes() -> i32 {
    330
}

fn default_intent_ttl_secs() -> u64 {
    900
}

fn default_pooled_max_distance_km() -> f64 {
    500.0
}

/// Fare rules applied by the fare calculator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FareConfig {
    /// Proportional tax applied to the summed fare.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// Urgent surcharge as a share of the per-head base fare.
    #[serde(default = "default_urgent_surcharge_rate")]
    pub urgent_surcharge_rate: f64,

    /// Ceiling on the per-head urgent surcharge in air-conditioned classes.
    #[serde(default = "default_urgent_cap_ac")]
    pub urgent_cap_ac: f64,

    /// Ceiling on the per-head urgent surcharge in non-AC classes.
    #[serde(default = "default_urgent_cap_non_ac")]
    pub urgent_cap_non_ac: f64,

    /// Passengers younger than this travel free.
    #[serde(default = "default_child_free_below_age")]
    pub child_free_below_age: u8,

    /// Upper bound (inclusive) of the child fare band.
    #[serde(default = "default_child_max_age")]
    pub child_max_age: u8,

    /// Share of the adult fare charged inside the child band.
    #[serde(default = "default_child_rate")]
    pub child_rate: f64,

    #[serde(default = "default_senior_male_age")]
    pub senior_male_age: u8,

    #[serde(default = "default_senior_female_age")]
    pub senior_female_age: u8,

    #[serde(default = "default_senior_male_discount")]
    pub senior_male_discount: f64,

    #[serde(default = "default_senior_female_discount")]
    pub senior_female_discount: f64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            urgent_surcharge_rate: default_urgent_surcharge_rate(),
            urgent_cap_ac: default_urgent_cap_ac(),
            urgent_cap_non_ac: default_urgent_cap_non_ac(),
            child_free_below_age: default_child_free_below_age(),
            child_max_age: default_child_max_age(),
            child_rate: default_child_rate(),
            senior_male_age: default_senior_male_age(),
            senior_female_age: default_senior_female_age(),
            senior_male_discount: default_senior_male_discount(),
            senior_female_discount: default_senior_female_discount(),
        }
    }
}

fn default_tax_rate() -> f64 {
    0.05
}

fn default_urgent_surcharge_rate() -> f64 {
    0.3
}

fn default_urgent_cap_ac() -> f64 {
    500.0
}

fn default_urgent_cap_non_ac() -> f64 {
    200.0
}

fn default_child_free_below_age() -> u8 {
    5
}

fn default_child_max_age() -> u8 {
    11
}

fn default_child_rate() -> f64 {
    0.5
}

fn default_senior_male_age() -> u8 {
    60
}

fn default_senior_female_age() -> u8 {
    58
}

fn default_senior_male_discount() -> f64 {
    0.4
}

fn default_senior_female_discount() -> f64 {
    0.5
}

/// Availability snapshot cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AvailabilityConfig {
    /// How long a computed snapshot is served before recomputation.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    30
}

/// Fallback urgent-quota windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UrgentConfig {
    #[serde(default = "default_urgent_windows")]
    pub default_windows: Vec<UrgentWindowConfig>,
}

impl Default for UrgentConfig {
    fn default() -> Self {
        Self {
            default_windows: default_urgent_windows(),
        }
    }
}

/// One urgent window as written in TOML. Times are `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UrgentWindowConfig {
    pub name: String,
    pub coach_classes: Vec<CoachClass>,
    pub opens_at: String,
    pub closes_at: String,
    #[serde(default = "default_days_before")]
    pub days_before: u32,
}

impl UrgentWindowConfig {
    /// Converts into the domain window, failing on unparseable times.
    pub fn to_window(&self) -> Result<UrgentWindow, String> {
        Ok(UrgentWindow {
            name: self.name.clone(),
            coach_classes: self.coach_classes.clone(),
            opens_at: parse_time_of_day(&self.opens_at)?,
            closes_at: parse_time_of_day(&self.closes_at)?,
            days_before: self.days_before,
        })
    }
}

impl UrgentConfig {
    /// Every default window in domain form. Invalid entries are reported by validation.
    pub fn windows(&self) -> Vec<UrgentWindow> {
        self.default_windows
            .iter()
            .filter_map(|w| w.to_window().ok())
            .collect()
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("`{value}` is not a valid time of day (expected HH:MM)"))
}

fn default_days_before() -> u32 {
    1
}

fn default_urgent_windows() -> Vec<UrgentWindowConfig> {
    vec![
        UrgentWindowConfig {
            name: "ac".to_string(),
            coach_classes: vec![
                CoachClass::FirstAc,
                CoachClass::SecondAc,
                CoachClass::ThirdAc,
                CoachClass::ThirdEconomy,
                CoachClass::ChairCar,
            ],
            opens_at: "10:00".to_string(),
            closes_at: "23:59:59".to_string(),
            days_before: 1,
        },
        UrgentWindowConfig {
            name: "non_ac".to_string(),
            coach_classes: vec![CoachClass::Sleeper, CoachClass::SecondSitting],
            opens_at: "11:00".to_string(),
            closes_at: "23:59:59".to_string(),
            days_before: 1,
        },
    ]
}

/// Chart preparation schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChartConfig {
    /// Preliminary chart fires this many hours before origin departure.
    #[serde(default = "default_preliminary_hours_before")]
    pub preliminary_hours_before: u32,

    /// Final chart fires this many minutes before origin departure.
    #[serde(default = "default_final_minutes_before")]
    pub final_minutes_before: u32,

    /// Scheduler tick interval.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Journey dates after today the scheduler considers on each tick.
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            preliminary_hours_before: default_preliminary_hours_before(),
            final_minutes_before: default_final_minutes_before(),
            poll_interval_secs: default_poll_interval_secs(),
            lookahead_days: default_lookahead_days(),
        }
    }
}

fn default_preliminary_hours_before() -> u32 {
    4
}

fn default_final_minutes_before() -> u32 {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_lookahead_days() -> u32 {
    1
}

/// Seat allocation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    /// Coaches tried per passenger before falling back to an overflow seat.
    #[serde(default = "default_max_coach_attempts")]
    pub max_coach_attempts: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_coach_attempts: default_max_coach_attempts(),
        }
    }
}

fn default_max_coach_attempts() -> u32 {
    5
}

/// Cancellation charge configuration. Amounts are per passenger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CancellationConfig {
    /// Flat charge for cancelling a waitlisted or contingency reservation.
    #[serde(default = "default_waitlist_clerkage")]
    pub waitlist_clerkage: f64,

    #[serde(default = "default_flat_first_ac")]
    pub flat_first_ac: f64,

    #[serde(default = "default_flat_second_ac")]
    pub flat_second_ac: f64,

    /// Applies to 3A, 3E and CC.
    #[serde(default = "default_flat_third_ac")]
    pub flat_third_ac: f64,

    #[serde(default = "default_flat_sleeper")]
    pub flat_sleeper: f64,

    #[serde(default = "default_flat_second_sitting")]
    pub flat_second_sitting: f64,
}

impl CancellationConfig {
    pub fn flat_charge(&self, class: CoachClass) -> f64 {
        match class {
            CoachClass::FirstAc => self.flat_first_ac,
            CoachClass::SecondAc => self.flat_second_ac,
            CoachClass::ThirdAc | CoachClass::ThirdEconomy | CoachClass::ChairCar => {
                self.flat_third_ac
            }
            CoachClass::Sleeper => self.flat_sleeper,
            CoachClass::SecondSitting => self.flat_second_sitting,
        }
    }
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            waitlist_clerkage: default_waitlist_clerkage(),
            flat_first_ac: default_flat_first_ac(),
            flat_second_ac: default_flat_second_ac(),
            flat_third_ac: default_flat_third_ac(),
            flat_sleeper: default_flat_sleeper(),
            flat_second_sitting: default_flat_second_sitting(),
        }
    }
}

fn default_waitlist_clerkage() -> f64 {
    60.0
}

fn default_flat_first_ac() -> f64 {
    240.0
}

fn default_flat_second_ac() -> f64 {
    200.0
}

fn default_flat_third_ac() -> f64 {
    180.0
}

fn default_flat_sleeper() -> f64 {
    120.0
}

fn default_flat_second_sitting() -> f64 {
    60.0
}
