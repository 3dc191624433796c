//! Entity to model mappers
//!
//! This module provides conversions between domain entities (relay-core) and
//! database models via `From<Model> for Entity` implementations.

mod outgoing;
mod session;
