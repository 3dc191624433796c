//! Collaborator traits (ports) - what the client needs from its host

mod handler;
mod stores;

pub use handler::EventHandler;
pub use stores::{OutgoingMessageStore, SessionStore, StoreResult};
