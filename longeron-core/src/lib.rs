//! Longeron Core
//!
//! This crate contains the engine's building blocks:
//! - Fixed-capacity cursor buffer with typed accessors (`buffer`)
//! - Connection state machine and control handle (`connection`)
//! - Callback hooks and the factory capability (`handler`)
//! - Per-connection pump tasks (`actor`)
//! - Worker pool and connection registry (`reactor`)
//! - Connecting endpoint with bounded retry (`client`)
//! - Accepting endpoint (`server`)
//! - Process-wide lifecycle and counters (`engine`, `stats`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod buffer;
pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod handler;
pub mod reactor;
pub mod server;
pub mod stats;
pub mod tcp;

mod actor;
mod sync;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::buffer::{Buffer, BufferError};
    pub use crate::client::Client;
    pub use crate::config::{ClientConfig, EngineConfig, ServerConfig};
    pub use crate::connection::{Conn, ConnectionEvent, ConnectionState};
    pub use crate::endpoint::{AddressFamily, Endpoint};
    pub use crate::engine::Engine;
    pub use crate::error::{EngineError, Result};
    pub use crate::handler::{ConnectionFactory, ConnectionHandler};
    pub use crate::server::Server;
    pub use crate::stats::Stats;
}
