//! Reconnecting supervisor
//!
//! Owns the connect / run / back-off cycle. Failures double the retry
//! delay up to a cap; a connection that ended in an expected way resets
//! it and reconnects after a short randomized pause.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::connection::GatewayConnection;

/// First retry delay after a failed connection
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Fixed part of the pause after a clean disconnect
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Random spread added to the pause after a clean disconnect
const RECONNECT_SPREAD_MS: u64 = 4_000;

/// Random spread added to each back-off delay
const BACKOFF_JITTER_MS: u64 = 1_000;

/// Keeps one gateway connection alive across restarts
pub struct Supervisor {
    connection: Arc<GatewayConnection>,
}

impl Supervisor {
    pub fn new(connection: Arc<GatewayConnection>) -> Self {
        Self { connection }
    }

    /// Whether the underlying connection is currently established
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Reconnect until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let delay = match self.connection.run(shutdown.child_token()).await {
                Ok(()) => {
                    if shutdown.is_cancelled() {
                        return;
                    }
                    backoff = INITIAL_BACKOFF;
                    let delay = RECONNECT_PAUSE + random_spread(RECONNECT_SPREAD_MS);
                    info!(
                        delay_ms = delay.as_millis() as u64,
                        "Connection ended, reconnecting"
                    );
                    delay
                }
                Err(e) => {
                    let delay = backoff + random_spread(BACKOFF_JITTER_MS);
                    backoff = next_backoff(backoff);
                    error!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Connection failed, backing off"
                    );
                    delay
                }
            };

            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Uniform random duration in [0, max_ms)
fn random_spread(max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Doubled retry delay, capped at [`MAX_BACKOFF`]
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
