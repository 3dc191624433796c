//! Event handler trait - application callback for dispatched events

use async_trait::async_trait;
use serde_json::Value;

/// Application-side consumer of gateway dispatch events
///
/// Called once per dispatch frame, after the frame's sequence number has
/// been persisted. Errors are logged by the receive loop and never tear
/// down the connection, so one bad event cannot wedge the stream.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a single named event with its raw payload
    async fn on_event(&self, name: &str, data: &Value) -> anyhow::Result<()>;
}
