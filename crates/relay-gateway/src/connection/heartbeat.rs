//! Heartbeat scheduling
//!
//! Sends heartbeats at the server-provided interval, starting after a
//! random fraction of it so reconnecting clients spread out. Every frame
//! carries the last persisted sequence number. A beat that was never
//! acknowledged marks the connection dead.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use relay_core::error::GatewayError;
use relay_core::protocol::GatewayMessage;
use relay_core::traits::SessionStore;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Liveness signals fed in from the receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// The server acknowledged the last heartbeat
    Ack,
    /// The server asked for an immediate heartbeat
    Request,
}

/// Drives the heartbeat schedule for one connection
pub struct HeartbeatScheduler {
    interval: Duration,
    sessions: Arc<dyn SessionStore>,
    outbound: mpsc::Sender<GatewayMessage>,
    signals: mpsc::Receiver<HeartbeatSignal>,
    acked: bool,
}

impl HeartbeatScheduler {
    pub fn new(
        interval: Duration,
        sessions: Arc<dyn SessionStore>,
        outbound: mpsc::Sender<GatewayMessage>,
        signals: mpsc::Receiver<HeartbeatSignal>,
    ) -> Self {
        Self {
            interval,
            sessions,
            outbound,
            signals,
            acked: true,
        }
    }

    /// Send heartbeats until cancellation, a send failure or a missed ack
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), GatewayError> {
        let first_delay = random_start_delay(self.interval);
        debug!(
            interval_ms = self.interval.as_millis() as u64,
            first_delay_ms = first_delay.as_millis() as u64,
            "Heartbeat schedule started"
        );

        let mut ticker = interval_at(Instant::now() + first_delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    self.beat().await?;
                }
                signal = self.signals.recv() => match signal {
                    Some(HeartbeatSignal::Ack) => {
                        trace!("Heartbeat acknowledged");
                        self.acked = true;
                    }
                    Some(HeartbeatSignal::Request) => {
                        debug!("Immediate heartbeat requested");
                        self.beat().await?;
                        ticker.reset();
                    }
                    // Receive loop is gone; the connection is tearing down
                    None => return Ok(()),
                },
            }
        }
    }

    async fn beat(&mut self) -> Result<(), GatewayError> {
        if !self.acked {
            return Err(GatewayError::Liveness(
                "heartbeat was never acknowledged".to_string(),
            ));
        }
        self.acked = false;

        let sequence = self.sessions.get().await?.map(|s| s.sequence_number);
        let frame = GatewayMessage::heartbeat(sequence);
        self.outbound
            .send(frame)
            .await
            .map_err(|_| GatewayError::Transport("outbound channel closed".to_string()))?;

        trace!(sequence = ?sequence, "Heartbeat sent");
        Ok(())
    }
}

/// Pick the initial delay uniformly from [0, interval)
fn random_start_delay(interval: Duration) -> Duration {
    let interval_ms = interval.as_millis() as u64;
    if interval_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..interval_ms))
}
