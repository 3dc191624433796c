//! # relay-gateway
//!
//! Long-lived gateway client: a persistent WebSocket connection with
//! session resume, heartbeat liveness, rate-limited REST access and a
//! durable outgoing message queue.

pub mod connection;
pub mod outbox;
pub mod rest;
pub mod supervisor;

pub use connection::{ConnectionConfig, GatewayConnection, HeartbeatScheduler, HeartbeatSignal};
pub use outbox::{Outbox, OutgoingSender};
pub use rest::{GatewayBotInfo, RateLimiter, RestClient};
pub use supervisor::Supervisor;
