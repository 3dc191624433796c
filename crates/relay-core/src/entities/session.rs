//! Gateway session entity - the durable identity of a connection

/// A stored gateway session
///
/// A single session survives any number of socket-level reconnects. The
/// sequence number records how far into the event stream this client has
/// read; it only ever moves forward while the session lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub session_id: String,
    pub sequence_number: i64,
}

impl GatewaySession {
    /// Create a new GatewaySession
    pub fn new(session_id: impl Into<String>, sequence_number: i64) -> Self {
        Self {
            session_id: session_id.into(),
            sequence_number,
        }
    }
}
