// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for `railbook serve`.
//!
//! SIGINT and SIGTERM cancel a [`CancellationToken`] that the chart
//! scheduler loop watches.

use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
enum StopSignal {
    #[strum(serialize = "SIGINT")]
    Interrupt,
    #[cfg_attr(not(unix), allow(dead_code))]
    #[strum(serialize = "SIGTERM")]
    Terminate,
}

/// Spawns a task that cancels the returned token on the first stop signal.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(%signal, "stop requested, finishing the current scheduler tick");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() -> StopSignal {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM unavailable, only Ctrl+C will stop railbook");
            let _ = tokio::signal::ctrl_c().await;
            return StopSignal::Interrupt;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => StopSignal::Interrupt,
        _ = sigterm.recv() => StopSignal::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> StopSignal {
    let _ = tokio::signal::ctrl_c().await;
    StopSignal::Interrupt
}
