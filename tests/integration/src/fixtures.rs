//! Gateway frame fixtures
//!
//! Builders for the server-side frames tests feed to the client.

use serde_json::{json, Value};

/// Hello frame (op 10) with the given heartbeat interval
pub fn hello(heartbeat_interval_ms: u64) -> Value {
    json!({ "op": 10, "d": { "heartbeat_interval": heartbeat_interval_ms } })
}

/// READY dispatch establishing a fresh session
pub fn ready(session_id: &str, seq: i64) -> Value {
    json!({
        "op": 0,
        "t": "READY",
        "s": seq,
        "d": {
            "v": 9,
            "user": { "id": "u-1", "username": "relay-bot" },
            "session_id": session_id,
        },
    })
}

/// Dispatch frame (op 0) with an arbitrary payload
pub fn dispatch(name: &str, seq: i64, data: Value) -> Value {
    json!({ "op": 0, "t": name, "s": seq, "d": data })
}

/// RESUMED dispatch closing a replay
pub fn resumed(seq: i64) -> Value {
    dispatch("RESUMED", seq, json!({}))
}

/// Heartbeat request frame (op 1) from the server
pub fn heartbeat_request() -> Value {
    json!({ "op": 1 })
}

/// Reconnect order (op 7)
pub fn reconnect() -> Value {
    json!({ "op": 7, "d": null })
}

/// Invalid session verdict (op 9)
pub fn invalid_session(resumable: bool) -> Value {
    json!({ "op": 9, "d": resumable })
}

/// Heartbeat acknowledgement (op 11)
pub fn heartbeat_ack() -> Value {
    json!({ "op": 11 })
}
