use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Owns the session's cancellation token. Cancelled by an OS signal, by the
/// operator quitting, or by the session reaching its terminal state.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an externally created token, e.g. one the front end also cancels.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            tracing::info!(reason, "shutdown requested");
            self.token.cancel();
        }
    }

    /// Cancel the token on SIGTERM or Ctrl+C.
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = terminate() => tracing::info!("received SIGTERM, initiating shutdown"),
                _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, initiating shutdown"),
            }
            token.cancel();
        });
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
