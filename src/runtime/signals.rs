//! Termination signal listener.
//!
//! Each SIGTERM or SIGINT (Ctrl+C elsewhere) raises one interrupt on the
//! shared [`Interrupts`] counter. What an interrupt means is up to whoever is
//! waiting: the driver stops spawning on the first and escalates to a forced
//! kill on the second.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::Interrupts;

/// Install the listeners and spawn the task forwarding signals to `interrupts`.
///
/// Must be called from inside a tokio runtime. The listeners are registered
/// before this returns, so a signal delivered right after is not lost.
///
/// # Errors
///
/// Returns the I/O error from registering a signal listener.
#[cfg(unix)]
pub fn listen(interrupts: Interrupts) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                received = terminate.recv() => received.map(|()| "SIGTERM"),
                received = interrupt.recv() => received.map(|()| "SIGINT"),
            };
            let Some(name) = name else {
                warn!("signal stream closed, no longer listening");
                break;
            };
            info!(signal = name, "termination signal received");
            interrupts.raise();
        }
    }))
}

/// Install the listener and spawn the task forwarding Ctrl+C to `interrupts`.
///
/// # Errors
///
/// Never fails on this platform; listener errors end the task instead.
#[cfg(not(unix))]
pub fn listen(interrupts: Interrupts) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c listener failed");
                break;
            }
            info!(signal = "ctrl_c", "termination signal received");
            interrupts.raise();
        }
    }))
}
