//! # Termination signals.
//!
//! [`wait_for_termination`] completes when the host process is asked to stop.
//!
//! **Unix platforms:** `SIGINT`, `SIGTERM`, `SIGQUIT`.
//!
//! **Other platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Fails only if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "termination signal received");
    Ok(())
}

/// Waits for a termination signal.
///
/// Fails only if the signal handler cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "termination signal received");
    Ok(())
}
