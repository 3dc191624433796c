//! Gateway payload definitions
//!
//! Defines the payload structures carried inside the message envelope.

use serde::{Deserialize, Serialize};

use super::Intents;
use crate::entities::User;

/// Dispatch event name announcing a fresh session
pub const EVENT_READY: &str = "READY";

/// Dispatch event name closing a resume replay
pub const EVENT_RESUMED: &str = "RESUMED";

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Default heartbeat interval (45 seconds)
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 45_000;

    /// Create a new Hello payload with default interval
    #[must_use]
    pub fn new() -> Self {
        Self {
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Create a Hello payload with custom interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to open a brand new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot authentication token
    pub token: String,

    /// Optional client properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IdentifyProperties>,

    /// Event groups the client subscribes to
    pub intents: Intents,
}

impl IdentifyPayload {
    /// Create an Identify payload without client properties
    #[must_use]
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            properties: None,
            intents,
        }
    }

    /// Attach client properties
    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Browser or client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Device type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl IdentifyProperties {
    /// Create empty properties
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: None,
            browser: None,
            device: None,
        }
    }

    /// Properties describing the running client build
    #[must_use]
    pub fn current(client_name: &str) -> Self {
        Self {
            os: Some(std::env::consts::OS.to_string()),
            browser: Some(client_name.to_string()),
            device: Some(client_name.to_string()),
        }
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to resume a disconnected session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Bot authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: i64,
}

/// Payload of the READY dispatch event
///
/// The server's answer to a successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Gateway protocol version
    pub v: i32,

    /// The account this client authenticated as
    pub user: User,

    /// Session ID to use for resuming
    pub session_id: String,
}
