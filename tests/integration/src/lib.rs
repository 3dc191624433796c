//! Integration test utilities for the relay gateway client
//!
//! This crate provides scriptable mock servers (a WebSocket gateway and a
//! REST API) on loopback ports, plus helpers for wiring the client under
//! test to them with in-memory stores.

pub mod helpers;
pub mod fixtures;

pub use helpers::*;
pub use fixtures::*;
