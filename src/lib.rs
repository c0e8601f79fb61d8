//! # calcwire
//!
//! A calculator service speaking a small delimited text protocol:
//! - `$`-terminated, `#`-separated ASCII frames
//! - Incremental ring-buffer parser that tolerates arbitrary chunk boundaries
//! - Stream (TCP, UNIX stream) and datagram (UDP, UNIX datagram) transports
//! - Request/response correlation by request id
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │         Transport Adapters (stream / datagram)               │
//! │      thread per connection  |  single recv loop              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ byte chunks
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Ring-Buffer Deserializer                     │
//! │           (one per connection, never shared)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Request / ParseError
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Session                               │
//! │        (MessageHandler: compute, serialize, write)           │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │   CalcService   │               │    Serializer    │
//!   │ (memory: Mutex) │               │  (Response -> $) │
//!   └─────────────────┘               └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod service;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CalcError, Result};
pub use config::{ClientConfig, Config, TransportKind};
pub use service::{CalcService, Calculator};
pub use network::{Endpoint, Server};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of calcwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
