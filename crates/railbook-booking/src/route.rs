// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-train route graphs and their cache.
//!
//! A train's route is a line: stops ordered by sequence number. A journey
//! from `a` to `b` exists iff `a` comes strictly before `b`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tracing::debug;

use railbook_core::types::{RouteStop, StationCode, TrainId};
use railbook_core::{InventoryStore, RailbookError};

/// Ordered stop list of one train with a station index.
#[derive(Debug, Clone)]
pub struct RouteGraph {
    train: TrainId,
    stops: Vec<RouteStop>,
    index: HashMap<StationCode, usize>,
}

impl RouteGraph {
    /// Build from stops in any order, checking sequence and distance invariants.
    pub fn build(train: &TrainId, mut stops: Vec<RouteStop>) -> Result<Self, RailbookError> {
        if stops.len() < 2 {
            return Err(RailbookError::Config(format!(
                "train {train}: a route needs at least two stops, got {}",
                stops.len()
            )));
        }
        stops.sort_by_key(|s| s.sequence);

        let mut index = HashMap::with_capacity(stops.len());
        for (i, stop) in stops.iter().enumerate() {
            if stop.train != *train {
                return Err(RailbookError::Config(format!(
                    "stop {} belongs to train {}, not {train}",
                    stop.station, stop.train
                )));
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &stops[p]) {
                if prev.sequence == stop.sequence {
                    return Err(RailbookError::Config(format!(
                        "train {train}: duplicate stop sequence {}",
                        stop.sequence
                    )));
                }
                if stop.distance_km < prev.distance_km {
                    return Err(RailbookError::Config(format!(
                        "train {train}: distance decreases from {} ({} km) to {} ({} km)",
                        prev.station, prev.distance_km, stop.station, stop.distance_km
                    )));
                }
            }
            if index.insert(stop.station.clone(), i).is_some() {
                return Err(RailbookError::Config(format!(
                    "train {train}: station {} appears twice",
                    stop.station
                )));
            }
        }

        Ok(Self {
            train: train.clone(),
            stops,
            index,
        })
    }

    pub fn train(&self) -> &TrainId {
        &self.train
    }

    pub fn stops(&self) -> &[RouteStop] {
        &self.stops
    }

    pub fn stop(&self, station: &StationCode) -> Option<&RouteStop> {
        self.index.get(station).map(|&i| &self.stops[i])
    }

    pub fn origin(&self) -> &RouteStop {
        &self.stops[0]
    }

    pub fn terminus(&self) -> &RouteStop {
        &self.stops[self.stops.len() - 1]
    }

    fn not_found(&self, from: &StationCode, to: &StationCode) -> RailbookError {
        RailbookError::RouteNotFound {
            train: self.train.clone(),
            from: from.clone(),
            to: to.clone(),
        }
    }

    /// Position of the station along the route, 0 at the origin.
    pub fn ordinal(&self, station: &StationCode) -> Result<usize, RailbookError> {
        self.index
            .get(station)
            .copied()
            .ok_or_else(|| self.not_found(station, station))
    }

    pub fn has_path(&self, from: &StationCode, to: &StationCode) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// Kilometres travelled between two stops in route order.
    pub fn distance(&self, from: &StationCode, to: &StationCode) -> Result<f64, RailbookError> {
        if !self.has_path(from, to) {
            return Err(self.not_found(from, to));
        }
        let a = &self.stops[self.index[from]];
        let b = &self.stops[self.index[to]];
        Ok(b.distance_km - a.distance_km)
    }

    /// Local departure time at `station` for a run that leaves the origin on `journey_date`.
    ///
    /// Falls back to the arrival time at stops without a departure.
    pub fn departure_local(
        &self,
        station: &StationCode,
        journey_date: NaiveDate,
    ) -> Option<NaiveDateTime> {
        let stop = self.stop(station)?;
        let time = stop.departure.or(stop.arrival)?;
        let date = journey_date.checked_add_days(Days::new(u64::from(stop.day_offset)))?;
        Some(date.and_time(time))
    }
}

/// Lazily built route graphs keyed by train.
#[derive(Default)]
pub struct RouteCache {
    graphs: DashMap<TrainId, Arc<RouteGraph>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached graph for `train`, loading it from the store on first use.
    pub async fn get(
        &self,
        store: &dyn InventoryStore,
        train: &TrainId,
    ) -> Result<Arc<RouteGraph>, RailbookError> {
        if let Some(graph) = self.graphs.get(train) {
            return Ok(Arc::clone(&graph));
        }
        let stops = store.route_stops(train).await?;
        if stops.is_empty() {
            return Err(RailbookError::Config(format!("train {train} has no route")));
        }
        let graph = Arc::new(RouteGraph::build(train, stops)?);
        debug!(train = %train, stops = graph.stops().len(), "route graph built");
        self.graphs.insert(train.clone(), Arc::clone(&graph));
        Ok(graph)
    }

    /// Validate, persist and cache a replacement stop list.
    pub async fn replace(
        &self,
        store: &dyn InventoryStore,
        train: &TrainId,
        stops: Vec<RouteStop>,
    ) -> Result<Arc<RouteGraph>, RailbookError> {
        let graph = Arc::new(RouteGraph::build(train, stops)?);
        store.replace_route(train, graph.stops()).await?;
        self.graphs.insert(train.clone(), Arc::clone(&graph));
        Ok(graph)
    }
}
