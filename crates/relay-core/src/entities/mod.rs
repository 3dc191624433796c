//! Domain entities - the objects the client stores and exchanges

mod message;
mod outgoing;
mod session;

pub use message::{ChatMessage, User};
pub use outgoing::OutgoingMessage;
pub use session::GatewaySession;
