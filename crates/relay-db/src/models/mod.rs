//! Database models - SQLx-compatible structs for PostgreSQL tables

mod outgoing;
mod session;

pub use outgoing::OutgoingMessageModel;
pub use session::SessionModel;
