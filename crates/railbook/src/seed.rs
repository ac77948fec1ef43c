// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TOML inventory files for `railbook seed`.
//!
//! Stops are listed in travel order; their sequence numbers come from that
//! order. Times use the same `HH:MM` format as the config file.

use std::path::Path;

use serde::Deserialize;

use railbook_config::model::parse_time_of_day;
use railbook_core::RailbookError;
use railbook_core::types::{CoachClass, RouteStop, StationCode, Train, TrainId};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub trains: Vec<SeedTrain>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedTrain {
    pub id: String,
    pub name: String,
    pub total_seats: u32,
    #[serde(default)]
    pub urgent_quota_seats: u32,
    pub standard_rate_per_km: f64,
    pub urgent_rate_per_km: f64,
    pub coach_classes: Vec<CoachClass>,
    pub stops: Vec<SeedStop>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedStop {
    pub station: String,
    pub distance_km: f64,
    pub arrival: Option<String>,
    pub departure: Option<String>,
    #[serde(default)]
    pub day_offset: u32,
}

impl SeedFile {
    pub fn parse(content: &str) -> Result<Self, RailbookError> {
        toml::from_str(content)
            .map_err(|e| RailbookError::Config(format!("invalid seed file: {e}")))
    }

    pub fn read(path: &Path) -> Result<Self, RailbookError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RailbookError::Config(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }
}

impl SeedTrain {
    /// Converts into the train definition and its numbered stop list.
    pub fn into_domain(self) -> Result<(Train, Vec<RouteStop>), RailbookError> {
        let id = TrainId::from(self.id.as_str());
        let time = |value: &Option<String>| {
            value
                .as_deref()
                .map(parse_time_of_day)
                .transpose()
                .map_err(|e| RailbookError::Config(format!("train {id}: {e}")))
        };

        let mut stops = Vec::with_capacity(self.stops.len());
        for (index, stop) in self.stops.iter().enumerate() {
            stops.push(RouteStop {
                train: id.clone(),
                station: StationCode(stop.station.trim().to_ascii_uppercase()),
                sequence: index as u32 + 1,
                distance_km: stop.distance_km,
                arrival: time(&stop.arrival)?,
                departure: time(&stop.departure)?,
                day_offset: stop.day_offset,
            });
        }

        let train = Train {
            id: id.clone(),
            name: self.name,
            total_seats: self.total_seats,
            urgent_quota_seats: self.urgent_quota_seats,
            standard_rate_per_km: self.standard_rate_per_km,
            urgent_rate_per_km: self.urgent_rate_per_km,
            coach_classes: self.coach_classes,
        };
        train.validate()?;
        Ok((train, stops))
    }
}
