//! Store implementations
//!
//! PostgreSQL implementations of the store traits defined in relay-core.
//! The session store keeps the single active gateway session; the outgoing
//! store is a persistent queue drained by the sender loop.

mod error;
mod outgoing;
mod session;

pub use outgoing::PgOutgoingMessageStore;
pub use session::PgSessionStore;
