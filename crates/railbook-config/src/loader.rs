// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./railbook.toml` > `~/.config/railbook/railbook.toml` > `/etc/railbook/railbook.toml`
//! with environment variable overrides via `RAILBOOK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::debug;

use crate::model::RailbookConfig;

/// Top-level sections an environment variable can address.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "booking",
    "fare",
    "availability",
    "chart",
    "allocation",
    "cancellation",
];

pub const SYSTEM_CONFIG_PATH: &str = "/etc/railbook/railbook.toml";
pub const LOCAL_CONFIG_FILE: &str = "railbook.toml";

/// `~/.config/railbook/railbook.toml` when a config dir is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("railbook").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/railbook/railbook.toml` (system-wide)
/// 3. `~/.config/railbook/railbook.toml` (user XDG config)
/// 4. `./railbook.toml` (local directory)
/// 5. `RAILBOOK_*` environment variables
pub fn load_config() -> Result<RailbookConfig, figment::Error> {
    let layers = [
        Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
        user_config_path(),
        Some(PathBuf::from(LOCAL_CONFIG_FILE)),
    ];
    for path in layers.iter().flatten().filter(|p| p.is_file()) {
        debug!(path = %path.display(), "reading config layer");
    }
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RailbookConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RailbookConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RailbookConfig, figment::Error> {
    debug!(path = %path.display(), "reading config file");
    Figment::new()
        .merge(Serialized::defaults(RailbookConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RailbookConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Only the first `<section>_` is turned into a dot so that
/// `RAILBOOK_BOOKING_MAX_PASSENGERS` maps to `booking.max_passengers`.
/// Figment hands the key over before lowercasing it.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("RAILBOOK_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(
            map_env_key("booking_max_passengers"),
            "booking.max_passengers"
        );
        assert_eq!(
            map_env_key("storage_database_path"),
            "storage.database_path"
        );
        assert_eq!(
            map_env_key("chart_final_minutes_before"),
            "chart.final_minutes_before"
        );
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn upper_case_env_keys_are_mapped() {
        assert_eq!(
            map_env_key("BOOKING_MAX_PASSENGERS"),
            "booking.max_passengers"
        );
        assert_eq!(map_env_key("Fare_Tax_Rate"), "fare.tax_rate");
        assert_eq!(map_env_key("SERVICE"), "service");
    }

    #[test]
    fn env_override_extracts_into_config() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RAILBOOK_BOOKING_MAX_PASSENGERS", "4");
            jail.set_env("RAILBOOK_CHART_POLL_INTERVAL_SECS", "15");
            let config: RailbookConfig = Figment::new()
                .merge(Serialized::defaults(RailbookConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.booking.max_passengers, 4);
            assert_eq!(config.chart.poll_interval_secs, 15);
            Ok(())
        });
    }
}
