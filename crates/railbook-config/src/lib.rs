// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Railbook reservation engine.
//!
//! Settings are layered from `/etc/railbook/railbook.toml`, the user config
//! directory, `./railbook.toml` and `RAILBOOK_*` environment variables.
//! Unknown keys are rejected and reported with a suggested correction.
//!
//! ```no_run
//! use railbook_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("booking horizon: {} days", config.booking.advance_booking_days);
//! ```

use std::path::{Path, PathBuf};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RailbookConfig;

/// Load configuration from the standard hierarchy and validate it.
pub fn load_and_validate() -> Result<RailbookConfig, Vec<ConfigError>> {
    checked(loader::load_config(), hierarchy_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<RailbookConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_sources([path.to_path_buf()])
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<RailbookConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validates a loaded config, or turns the figment error into diagnostics.
///
/// `sources` is only called on failure; it re-reads the TOML text so spans
/// can point at the offending key.
fn checked(
    loaded: Result<RailbookConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<RailbookConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn hierarchy_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join(loader::LOCAL_CONFIG_FILE))
        .unwrap_or_else(|_| PathBuf::from(loader::LOCAL_CONFIG_FILE));
    let candidates = [
        Some(local),
        loader::user_config_path(),
        Some(PathBuf::from(loader::SYSTEM_CONFIG_PATH)),
    ];
    read_sources(candidates.into_iter().flatten())
}

/// `(display path, content)` for every candidate that can be read.
fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
