//! Key set refresh tasks.
//!
//! The request path never fetches keys. Rotation reaches the process through
//! these tasks only: a periodic reload (when configured) and an operator
//! reload on `SIGHUP`. A failed reload keeps the previous keys live.
//!
//! # Graceful Shutdown
//!
//! Both tasks exit when the cancellation token is triggered.

use crate::auth::KeySetCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Reload `key_set` every `period` until cancelled.
///
/// The first reload happens one period after start; the startup load is the
/// caller's job.
pub async fn start_key_set_refresh(
    key_set: Arc<KeySetCache>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    tracing::info!(
        target: "casting.task.jwks_refresh",
        period_seconds = period.as_secs(),
        "Key set refresh task started"
    );

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Failures are logged and counted by reload itself.
                let _ = key_set.reload().await;
            }
            _ = cancel_token.cancelled() => {
                tracing::info!(
                    target: "casting.task.jwks_refresh",
                    "Key set refresh task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Reload `key_set` whenever the process receives `SIGHUP`, until cancelled.
#[cfg(unix)]
pub async fn start_sighup_reload(key_set: Arc<KeySetCache>, cancel_token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(
                target: "casting.task.jwks_refresh",
                error = %e,
                "Failed to install SIGHUP handler, operator reload disabled"
            );
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!(target: "casting.task.jwks_refresh", "SIGHUP received, reloading key set");
                let _ = key_set.reload().await;
            }
            _ = cancel_token.cancelled() => {
                break;
            }
        }
    }
}

/// `SIGHUP` does not exist here; wait for shutdown only.
#[cfg(not(unix))]
pub async fn start_sighup_reload(_key_set: Arc<KeySetCache>, cancel_token: CancellationToken) {
    cancel_token.cancelled().await;
}
