//! Shutdown policy and termination signal handling.
//!
//! Graceful drain runs only in production; development skips it to keep
//! iterative restarts fast. The drain itself is delegated to axum's
//! graceful-shutdown primitive; this module only decides the policy and
//! resolves when a termination signal arrives.

use crate::config::Environment;

/// How the listener terminates, selected once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Stop accepting on SIGINT/SIGTERM, let in-flight requests finish.
    Graceful,
    /// No signal handler; the process dies when the runtime does.
    Immediate,
}

impl ShutdownPolicy {
    /// Maps the runtime environment to a policy.
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::Graceful,
            Environment::Development => Self::Immediate,
        }
    }
}

/// Resolves when a termination signal arrives, logging it exactly once.
pub async fn wait_for_signal() {
    let signal = signal_name().await;
    tracing::info!(signal, "graceful shutdown, draining in-flight requests");
}

#[cfg(unix)]
async fn signal_name() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    // If the SIGTERM handler cannot install, fall back to SIGINT only.
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn signal_name() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
