//! Error types for the client

mod gateway_error;

pub use gateway_error::GatewayError;
