// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fare computation.
//!
//! Rules, in order:
//! 1. per-head base = distance x per-km rate (urgent rate for urgent quota) x class multiplier
//! 2. urgent quota adds `min(base x surcharge_rate, cap)`; the cap is higher for AC classes
//! 3. each passenger pays base + surcharge scaled by their concession factor
//! 4. shares are summed, then tax is applied
//!
//! Results are rounded to two decimals.

use railbook_config::model::FareConfig;
use railbook_core::types::{CoachClass, FareQuota, Gender, Train};

/// Per-km rates used for one computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareRates {
    pub standard_per_km: f64,
    pub urgent_per_km: f64,
}

impl From<&Train> for FareRates {
    fn from(train: &Train) -> Self {
        Self {
            standard_per_km: train.standard_rate_per_km,
            urgent_per_km: train.urgent_rate_per_km,
        }
    }
}

/// Age and gender of one traveller, the only inputs concessions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FareProfile {
    pub age: u8,
    pub gender: Gender,
}

#[derive(Debug, Clone)]
pub struct FareCalculator {
    config: FareConfig,
}

impl FareCalculator {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    /// Total amount for a party. Never fails; ages are validated upstream.
    pub fn compute(
        &self,
        distance_km: f64,
        class: CoachClass,
        quota: FareQuota,
        rates: FareRates,
        passengers: &[FareProfile],
    ) -> f64 {
        let rate = match quota {
            FareQuota::Standard => rates.standard_per_km,
            FareQuota::Urgent => rates.urgent_per_km,
        };
        let base = distance_km * rate * class.fare_multiplier();
        let surcharge = match quota {
            FareQuota::Standard => 0.0,
            FareQuota::Urgent => {
                let cap = if class.is_air_conditioned() {
                    self.config.urgent_cap_ac
                } else {
                    self.config.urgent_cap_non_ac
                };
                (base * self.config.urgent_surcharge_rate).min(cap)
            }
        };
        let per_head = base + surcharge;

        let subtotal: f64 = passengers
            .iter()
            .map(|p| per_head * self.concession_factor(p))
            .sum();
        round_currency(subtotal * (1.0 + self.config.tax_rate))
    }

    /// Share of the full per-head fare this passenger pays.
    pub fn concession_factor(&self, passenger: &FareProfile) -> f64 {
        let c = &self.config;
        if passenger.age < c.child_free_below_age {
            return 0.0;
        }
        if passenger.age <= c.child_max_age {
            return c.child_rate;
        }
        let (senior_age, discount) = match passenger.gender {
            Gender::Female => (c.senior_female_age, c.senior_female_discount),
            Gender::Male | Gender::Other => (c.senior_male_age, c.senior_male_discount),
        };
        if passenger.age >= senior_age {
            1.0 - discount
        } else {
            1.0
        }
    }
}

pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
