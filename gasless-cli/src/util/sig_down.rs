//! Cancellation on shutdown signals.
//!
//! [`SigDown`] turns SIGTERM/SIGINT (Ctrl+C on Windows) into a
//! [`CancellationToken`]. The token is handed to every paymaster request so a
//! signal aborts whatever is in flight instead of killing the process mid-write.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Cancels a token when the process receives a shutdown signal.
#[derive(Debug)]
pub struct SigDown {
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)] // Result needed on Unix for signal registration
    pub fn try_new() -> Result<Self, std::io::Error> {
        let inner = CancellationToken::new();
        let outer = inner.clone();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, cancelling"),
                }
                inner.cancel();
            });
        }

        #[cfg(windows)]
        {
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received Ctrl-C, cancelling");
                inner.cancel();
            });
        }

        Ok(Self {
            cancellation_token: outer,
        })
    }

    /// Token cancelled on the first shutdown signal.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Whether a shutdown signal has been received.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
