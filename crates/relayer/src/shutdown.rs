use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Escalates from graceful to immediate shutdown on a repeated signal, mirroring the
/// double-Ctrl+C convention of interactive CLIs but driving a shared `CancellationToken`
/// instead of a bespoke event channel, since every relayer task already selects on one.
#[derive(Debug)]
pub struct ShutdownController {
    forced: AtomicU8,
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> ShutdownController {
        ShutdownController {
            forced: AtomicU8::new(0),
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn bump_forced(&self) -> u8 {
        self.forced.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn request_shutdown(&self) -> u8 {
        let n = self.bump_forced();
        self.token.cancel();
        n
    }
}

/// Spawns a task that cancels `shutdown`'s token on `SIGINT` or `SIGTERM`. A second signal
/// after the first is logged but otherwise has no further effect beyond the initial
/// cancellation; every task in this process already tears down as soon as the token fires.
pub fn spawn_signal_handler(shutdown: Arc<ShutdownController>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };

        loop {
            tokio::select! {
                ctrl_c = tokio::signal::ctrl_c() => {
                    if ctrl_c.is_err() {
                        return;
                    }
                }
                _ = sigterm.recv() => {}
            }

            let n = shutdown.request_shutdown();
            if n == 1 {
                tracing::info!("shutdown signal received, stopping gracefully");
            } else {
                tracing::warn!("second shutdown signal received, already stopping");
            }
        }
    });
}
