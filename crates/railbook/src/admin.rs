// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot administrative commands.
//!
//! Each command opens the database, does its work through the ledger or the
//! chart pipeline, and closes the database again. Output is colored when
//! stdout is a terminal, plain with `--plain`, and JSON with `--json`.

use std::io::IsTerminal;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::info;

use railbook_config::RailbookConfig;
use railbook_config::model::UrgentWindowConfig;
use railbook_core::RailbookError;
use railbook_core::types::{
    AvailabilitySnapshot, ChartPhase, CoachClass, FareQuota, LocatorCode, PassengerSlot,
    Reservation, StationCode, TrainId, UrgentBookingPolicy, UrgentOverride,
};

use crate::engine::Engine;
use crate::seed::SeedFile;
use crate::{ChartStage, UrgentAction};

pub struct AvailabilityQuery {
    pub train: String,
    pub from: String,
    pub to: String,
    pub date: NaiveDate,
    pub class: CoachClass,
    pub quota: FareQuota,
}

/// Structured availability output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct AvailabilityReport {
    pub train: String,
    pub from: String,
    pub to: String,
    pub date: NaiveDate,
    pub coach_class: CoachClass,
    pub fare_quota: FareQuota,
    pub status: String,
    #[serde(flatten)]
    pub snapshot: AvailabilitySnapshot,
}

/// Structured reservation output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct LookupReport {
    pub reservation: Reservation,
    pub passengers: Vec<PassengerSlot>,
    pub waitlist_position: Option<u32>,
    pub chart_phase: ChartPhase,
}

/// Short booking-counter label for a snapshot.
fn availability_label(snapshot: &AvailabilitySnapshot) -> String {
    if snapshot.available > 0 {
        format!("AVAILABLE {}", snapshot.available)
    } else if snapshot.contingency > 0 {
        format!("CONTINGENCY {}", snapshot.contingency)
    } else {
        format!("WAITLIST {}", snapshot.waitlisted + 1)
    }
}

fn station(code: &str) -> StationCode {
    StationCode(code.trim().to_ascii_uppercase())
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub async fn run_availability(
    config: &RailbookConfig,
    query: AvailabilityQuery,
    json: bool,
    plain: bool,
) -> Result<(), RailbookError> {
    let engine = Engine::open(config).await?;
    let result = engine
        .ledger
        .availability(
            &TrainId::from(query.train.as_str()),
            &station(&query.from),
            &station(&query.to),
            query.date,
            query.class,
            query.quota,
        )
        .await;
    engine.close().await?;
    let snapshot = result?;

    let report = AvailabilityReport {
        status: availability_label(&snapshot),
        train: query.train,
        from: query.from.to_ascii_uppercase(),
        to: query.to.to_ascii_uppercase(),
        date: query.date,
        coach_class: query.class,
        fare_quota: query.quota,
        snapshot,
    };
    if json {
        print_json(&report);
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_availability(&report, use_color);
    }
    Ok(())
}

fn print_availability(report: &AvailabilityReport, use_color: bool) {
    println!();
    println!(
        "  {} {} -> {} on {}",
        report.train, report.from, report.to, report.date
    );
    println!("  {}", "-".repeat(35));
    println!("    Class:       {} ({})", report.coach_class, report.fare_quota);

    if use_color {
        use colored::Colorize;
        let status = if report.snapshot.available > 0 {
            report.status.green()
        } else if report.snapshot.contingency > 0 {
            report.status.yellow()
        } else {
            report.status.red()
        };
        println!("    Status:      {status}");
    } else {
        println!("    Status:      {}", report.status);
    }

    println!("    Confirmable: {}", report.snapshot.available);
    println!("    Contingency: {}", report.snapshot.contingency);
    println!("    Waitlisted:  {}", report.snapshot.waitlisted);
    println!();
}

pub async fn run_chart(
    config: &RailbookConfig,
    train: &str,
    date: NaiveDate,
    stage: ChartStage,
) -> Result<(), RailbookError> {
    let engine = Engine::open(config).await?;
    let train = TrainId::from(train);
    let result = match stage {
        ChartStage::Preliminary => engine.pipeline.run_preliminary(&train, date).await,
        ChartStage::Final => engine.pipeline.run_final(&train, date).await,
    };
    engine.close().await?;
    let state = result?;

    println!(
        "chart {} {}: {} (promoted {}, cancelled {}, seated {})",
        state.train,
        state.journey_date,
        state.phase,
        state.promoted,
        state.cancelled,
        state.seats_allocated
    );
    Ok(())
}

pub async fn run_seed(config: &RailbookConfig, file: &Path) -> Result<(), RailbookError> {
    let seed = SeedFile::read(file)?;
    let mut converted = Vec::with_capacity(seed.trains.len());
    for train in seed.trains {
        converted.push(train.into_domain()?);
    }

    let engine = Engine::open(config).await?;
    let mut result = Ok(());
    for (train, stops) in converted.iter() {
        if let Err(e) = engine.ledger.register_train(train, stops.clone()).await {
            result = Err(e);
            break;
        }
        println!("registered {} {} ({} stops)", train.id, train.name, stops.len());
    }
    engine.close().await?;
    result?;

    info!(trains = converted.len(), file = %file.display(), "seed applied");
    Ok(())
}

pub async fn run_lookup(
    config: &RailbookConfig,
    locator: &str,
    json: bool,
) -> Result<(), RailbookError> {
    let engine = Engine::open(config).await?;
    let result = lookup(&engine, &LocatorCode::from(locator.trim())).await;
    engine.close().await?;
    let report = result?;

    if json {
        print_json(&report);
        return Ok(());
    }

    let res = &report.reservation;
    println!();
    println!("  {} {}", res.locator, res.status);
    println!("  {}", "-".repeat(35));
    println!(
        "    Journey:  {} {} -> {} on {}",
        res.train, res.from, res.to, res.journey_date
    );
    println!("    Class:    {} ({}, {})", res.coach_class, res.fare_quota, res.subtype);
    println!("    Amount:   {:.2}", res.total_amount);
    if let Some(position) = report.waitlist_position {
        println!("    Waitlist: {position}");
    }
    if let Some(charge) = res.cancellation_charge {
        println!("    Charge:   {charge:.2}");
    }
    println!("    Chart:    {}", report.chart_phase);
    for p in &report.passengers {
        let seat = match (&p.seat, p.berth) {
            (Some(seat), Some(berth)) => format!("{seat} {berth}"),
            (Some(seat), None) => seat.clone(),
            _ => "-".to_string(),
        };
        println!("    {:<20} {:>3} {:<7} {}", p.name, p.age, p.gender.to_string(), seat);
    }
    println!();
    Ok(())
}

async fn lookup(engine: &Engine, locator: &LocatorCode) -> Result<LookupReport, RailbookError> {
    let ledger = &engine.ledger;
    let reservation = ledger.by_locator(locator).await?;
    let passengers = ledger.store().passengers(&reservation.id).await?;
    let waitlist_position = ledger.waitlist_position(&reservation.id).await?;
    let chart_phase = ledger
        .chart_state(&reservation.train, reservation.journey_date)
        .await?
        .phase;
    Ok(LookupReport {
        reservation,
        passengers,
        waitlist_position,
        chart_phase,
    })
}

pub async fn run_cancel(config: &RailbookConfig, locator: &str) -> Result<(), RailbookError> {
    let engine = Engine::open(config).await?;
    let result = engine
        .ledger
        .cancel_by_locator(&LocatorCode::from(locator.trim()))
        .await;
    engine.close().await?;
    let receipt = result?;

    println!(
        "cancelled {}: charge {:.2}, refund {:.2}",
        receipt.locator, receipt.charge, receipt.refund
    );
    if !receipt.upgraded.is_empty() || !receipt.promoted.is_empty() {
        println!(
            "freed seats went to {} contingency and {} waitlisted reservations",
            receipt.upgraded.len(),
            receipt.promoted.len()
        );
    }
    Ok(())
}

pub async fn run_urgent(config: &RailbookConfig, action: UrgentAction) -> Result<(), RailbookError> {
    let engine = Engine::open(config).await?;
    let result = urgent(&engine, config, action).await;
    engine.close().await?;
    result
}

async fn urgent(
    engine: &Engine,
    config: &RailbookConfig,
    action: UrgentAction,
) -> Result<(), RailbookError> {
    let store = engine.ledger.store();
    match action {
        UrgentAction::Show => {
            let policy = store.urgent_policy().await?;
            print_policy(&policy, config);
        }
        UrgentAction::Window {
            name,
            classes,
            opens,
            closes,
            days_before,
        } => {
            let window = UrgentWindowConfig {
                name,
                coach_classes: classes,
                opens_at: opens,
                closes_at: closes,
                days_before,
            }
            .to_window()
            .map_err(RailbookError::InvalidRequest)?;
            if window.opens_at >= window.closes_at {
                return Err(RailbookError::InvalidRequest(format!(
                    "window `{}` must open before it closes",
                    window.name
                )));
            }
            store.save_urgent_window(&window).await?;
            info!(window = %window.name, "urgent window saved");
        }
        UrgentAction::RemoveWindow { name } => {
            if !store.remove_urgent_window(&name).await? {
                println!("no urgent window named `{name}`");
            }
        }
        UrgentAction::Override {
            classes,
            trains,
            hours,
        } => {
            let now = engine.ledger.clock().now();
            let rule = UrgentOverride {
                enabled: true,
                coach_classes: classes,
                trains: trains.iter().map(|t| TrainId::from(t.as_str())).collect(),
                expires_at: hours.map(|h| now + Duration::hours(i64::from(h))),
            };
            store.set_urgent_override(Some(&rule)).await?;
            info!(expires_at = ?rule.expires_at, "urgent override enabled");
        }
        UrgentAction::Clear => {
            store.set_urgent_override(None).await?;
            info!("urgent override cleared");
        }
    }
    Ok(())
}

fn print_policy(policy: &UrgentBookingPolicy, config: &RailbookConfig) {
    let windows = if policy.windows.is_empty() {
        println!("windows (configured defaults):");
        config.urgent.windows()
    } else {
        println!("windows:");
        policy.windows.clone()
    };
    for w in &windows {
        let classes: Vec<String> = w.coach_classes.iter().map(ToString::to_string).collect();
        println!(
            "  {:<10} {} {}-{} ({} day(s) before)",
            w.name,
            classes.join(","),
            w.opens_at.format("%H:%M"),
            w.closes_at.format("%H:%M:%S"),
            w.days_before
        );
    }
    match &policy.override_rule {
        Some(rule) if rule.enabled => {
            let scope = |items: Vec<String>| {
                if items.is_empty() {
                    "all".to_string()
                } else {
                    items.join(",")
                }
            };
            println!(
                "override: classes {} trains {} expires {}",
                scope(rule.coach_classes.iter().map(ToString::to_string).collect()),
                scope(rule.trains.iter().map(ToString::to_string).collect()),
                rule.expires_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        _ => println!("override: none"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(available: u32, contingency: u32, waitlisted: u32) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            available,
            contingency,
            waitlisted,
        }
    }

    #[test]
    fn label_prefers_confirmable_seats() {
        assert_eq!(availability_label(&snapshot(3, 1, 0)), "AVAILABLE 3");
        assert_eq!(availability_label(&snapshot(0, 1, 0)), "CONTINGENCY 1");
        assert_eq!(availability_label(&snapshot(0, 0, 4)), "WAITLIST 5");
    }

    #[test]
    fn availability_report_flattens_snapshot() {
        let report = AvailabilityReport {
            train: "12951".into(),
            from: "MMCT".into(),
            to: "NDLS".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            coach_class: CoachClass::ThirdAc,
            fare_quota: FareQuota::Standard,
            status: "AVAILABLE 2".into(),
            snapshot: snapshot(2, 1, 0),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"available\":2"));
        assert!(json.contains("\"coach_class\":\"3A\""));
        assert!(json.contains("\"fare_quota\":\"standard\""));
    }

    #[test]
    fn station_codes_are_uppercased() {
        assert_eq!(station(" ndls").as_str(), "NDLS");
    }
}
