//! Error types for calcwire
//!
//! Provides a unified error type for all operations. Field and framing
//! errors raised while parsing a message live in
//! [`ParseError`](crate::protocol::ParseError) instead, because they are
//! reported to the peer rather than propagated.

use thiserror::Error;

/// Result type alias using CalcError
pub type Result<T> = std::result::Result<T, CalcError>;

/// Unified error type for calcwire operations
#[derive(Debug, Error)]
pub enum CalcError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Service Errors
    // -------------------------------------------------------------------------
    #[error("Division by zero")]
    DivisionByZero,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out waiting for a response")]
    Timeout,

    #[error("Connection closed")]
    Disconnected,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
