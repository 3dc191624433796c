//! Gateway protocol definitions
//!
//! Defines the WebSocket wire protocol: op codes, the message envelope,
//! payload structures, and intent flags.

mod envelope;
mod intents;
mod opcodes;
mod payloads;

pub use envelope::{GatewayEvent, GatewayMessage};
pub use intents::Intents;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload, EVENT_READY,
    EVENT_RESUMED,
};
