//! # relay-core
//!
//! Domain layer for the relay gateway client: wire protocol definitions,
//! persisted entities, store traits, and the shared error type.
//! This crate has zero dependencies on the runtime, database, or HTTP stack.

pub mod entities;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod traits;

// Re-export commonly used types at crate root
pub use entities::{ChatMessage, GatewaySession, OutgoingMessage, User};
pub use error::GatewayError;
pub use memory::{MemoryOutgoingStore, MemorySessionStore};
pub use protocol::{
    GatewayEvent, GatewayMessage, HelloPayload, IdentifyPayload, IdentifyProperties, Intents,
    OpCode, ReadyPayload, ResumePayload, EVENT_READY, EVENT_RESUMED,
};
pub use traits::{EventHandler, OutgoingMessageStore, SessionStore, StoreResult};
