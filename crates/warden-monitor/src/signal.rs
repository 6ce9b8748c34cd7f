//! Process signal handling.

use tracing::{error, info, warn};

use crate::error::Result;
use crate::orchestrator::Monitor;

/// The signal that ended a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM.
    Terminate,
    /// SIGINT or Ctrl+C.
    Interrupt,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Waits for SIGINT or SIGTERM.
///
/// If the SIGTERM handler cannot be installed, only Ctrl+C is awaited.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        signal = wait_for_ctrl_c() => signal,
    }
}

/// Waits for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

/// Starts the monitor and runs until a shutdown signal, then stops it.
///
/// # Errors
///
/// Returns an error if the loops had to be aborted during shutdown.
pub async fn run_until_signal(monitor: &Monitor) -> Result<()> {
    monitor.start_default();
    let signal = wait_for_shutdown_signal().await;
    info!(%signal, "shutdown signal received");
    monitor.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_display() {
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
    }
}
