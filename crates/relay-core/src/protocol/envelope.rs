//! Gateway message envelope
//!
//! Every frame on the WebSocket connection is one `GatewayMessage`. The
//! receive path immediately converts incoming envelopes into the typed
//! [`GatewayEvent`] so the rest of the client never switches on raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HelloPayload, IdentifyPayload, OpCode, ResumePayload};
use crate::error::GatewayError;

/// Gateway message envelope
///
/// All messages sent over the WebSocket connection follow this format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event type (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<i64>,

    /// Event data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayMessage {
    // === Client Messages ===

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: IdentifyPayload) -> Self {
        Self {
            op: OpCode::Identify,
            t: None,
            s: None,
            d: Some(serde_json::to_value(payload).unwrap_or_default()),
        }
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: ResumePayload) -> Self {
        Self {
            op: OpCode::Resume,
            t: None,
            s: None,
            d: Some(serde_json::to_value(payload).unwrap_or_default()),
        }
    }

    /// Create a Heartbeat message (op=1) carrying the last persisted sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<i64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            t: None,
            s: None,
            d: last_sequence.map(|s| Value::Number(s.into())),
        }
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: i64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(payload: HelloPayload) -> Self {
        Self {
            op: OpCode::Hello,
            t: None,
            s: None,
            d: Some(serde_json::to_value(payload).unwrap_or_default()),
        }
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck,
            t: None,
            s: None,
            d: None,
        }
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            op: OpCode::Reconnect,
            t: None,
            s: None,
            d: None,
        }
    }

    /// Create an Invalid Session message (op=9)
    ///
    /// `resumable` mirrors the wire payload; the client drops its stored
    /// session and identifies fresh either way.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self {
            op: OpCode::InvalidSession,
            t: None,
            s: None,
            d: Some(Value::Bool(resumable)),
        }
    }

    // === Parsing Client Messages ===

    /// Try to parse as an Identify payload (op=2)
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        if self.op != OpCode::Identify {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse as a Resume payload (op=6)
    pub fn as_resume(&self) -> Option<ResumePayload> {
        if self.op != OpCode::Resume {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse the heartbeat sequence number (op=1)
    pub fn as_heartbeat_seq(&self) -> Option<Option<i64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_i64))
    }

    // === Classifying Server Messages ===

    /// Decode this envelope into a typed server event
    ///
    /// Op codes the client does not handle become [`GatewayEvent::Unknown`]
    /// so a newer server cannot take the connection down.
    pub fn into_event(self) -> Result<GatewayEvent, GatewayError> {
        match self.op {
            OpCode::Dispatch => {
                let name = self
                    .t
                    .ok_or_else(|| GatewayError::Protocol("dispatch frame without an event name".to_string()))?;
                Ok(GatewayEvent::Dispatch {
                    name,
                    seq: self.s,
                    data: self.d.unwrap_or(Value::Null),
                })
            }
            OpCode::Heartbeat => Ok(GatewayEvent::HeartbeatRequest),
            OpCode::Reconnect => Ok(GatewayEvent::Reconnect),
            OpCode::InvalidSession => Ok(GatewayEvent::InvalidSession),
            OpCode::Hello => {
                let data = self
                    .d
                    .ok_or_else(|| GatewayError::Protocol("hello frame without a payload".to_string()))?;
                let payload = serde_json::from_value(data)
                    .map_err(|e| GatewayError::Protocol(format!("malformed hello payload: {e}")))?;
                Ok(GatewayEvent::Hello(payload))
            }
            OpCode::HeartbeatAck => Ok(GatewayEvent::HeartbeatAck),
            op => Ok(GatewayEvent::Unknown { op: op.as_u8() }),
        }
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}

/// A server frame after op code classification
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// op=0 - a named event with its payload
    Dispatch {
        name: String,
        seq: Option<i64>,
        data: Value,
    },
    /// op=1 - the server wants a heartbeat right now
    HeartbeatRequest,
    /// op=7 - the server wants us to reconnect and resume
    Reconnect,
    /// op=9 - the session is gone; identify from scratch
    InvalidSession,
    /// op=10 - first frame after connecting
    Hello(HelloPayload),
    /// op=11 - heartbeat acknowledged
    HeartbeatAck,
    /// An op code this client does not speak
    Unknown { op: u8 },
}
