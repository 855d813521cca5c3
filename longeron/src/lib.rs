//! # Longeron
//!
//! An asynchronous, multiplexed TCP I/O engine with callback-driven
//! connections, built on completion-based I/O.
//!
//! ## Architecture
//!
//! Longeron is structured as a small engine with clean layering:
//!
//! - **`longeron-core`**: cursor buffers, connection state machine,
//!   reactor worker pool, client/server endpoints
//! - **`longeron`**: public API surface (this crate)
//!
//! A fixed pool of worker threads multiplexes every connection; each
//! connection surfaces its life through five hooks (`on_init`,
//! `on_connect`, `on_read`, `on_write`, `on_close`) invoked with exclusive
//! access to that connection's buffer for the duration of the callback.
//!
//! ## Quick Start
//!
//! ### Echo server
//!
//! ```rust,no_run
//! use longeron::prelude::*;
//!
//! struct Echo {
//!     pending: Option<String>,
//! }
//!
//! impl ConnectionHandler for Echo {
//!     fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
//!         let line = data.get_string();
//!         if line == "QUIT" {
//!             conn.close(false);
//!         } else {
//!             self.pending = Some(line);
//!             conn.enable_write_interest();
//!         }
//!     }
//!
//!     fn on_write(&mut self, _conn: &Conn, data: &mut Buffer) {
//!         if let Some(line) = self.pending.take() {
//!             let _ = data.put_string(&line);
//!         }
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let engine = Engine::init(EngineConfig::default())?;
//!     let server = Server::new(
//!         &engine,
//!         ServerConfig::new().with_host("127.0.0.1").with_port(8080),
//!         || Box::new(Echo { pending: None }) as Box<dyn ConnectionHandler>,
//!     );
//!     server.start()?;
//!     server.join();
//!     engine.end();
//!     Ok(())
//! }
//! ```
//!
//! ### Client with bounded retry
//!
//! ```rust,no_run
//! use longeron::prelude::*;
//! use std::time::Duration;
//!
//! struct Hello;
//!
//! impl ConnectionHandler for Hello {
//!     fn on_connect(&mut self, conn: &Conn) {
//!         conn.enable_write_interest();
//!     }
//!
//!     fn on_write(&mut self, conn: &Conn, data: &mut Buffer) {
//!         let _ = data.put_string(if conn.closing() { "BYE" } else { "HELLO" });
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let engine = Engine::init(EngineConfig::default())?;
//!     let config = ClientConfig::new()
//!         .with_host("127.0.0.1")
//!         .with_port(8080)
//!         .with_retries(3)
//!         .with_retry_interval(Duration::from_secs(1));
//!     let client = Client::new(&engine, config, || {
//!         Box::new(Hello) as Box<dyn ConnectionHandler>
//!     });
//!     client.start()?;
//!     client.join();
//!     engine.end();
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//!
//! - One connection's callbacks are strictly ordered and never run
//!   concurrently with each other
//! - Distinct connections run in parallel across the worker pool
//! - `join()` on clients and servers is a cooperative wait, no polling
//! - `close(force)` is asynchronous; `on_close` is the completion signal

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core types
pub use bytes::Bytes;

pub use longeron_core::buffer::{Buffer, BufferError};
pub use longeron_core::client::Client;
pub use longeron_core::config::{ClientConfig, EngineConfig, ServerConfig, DEFAULT_BUFFER_SIZE};
pub use longeron_core::connection::{Conn, ConnectionEvent, ConnectionState};
pub use longeron_core::endpoint::{AddressFamily, Endpoint, EndpointError};
pub use longeron_core::engine::Engine;
pub use longeron_core::error::{EngineError, Result};
pub use longeron_core::handler::{ConnectionFactory, ConnectionHandler};
pub use longeron_core::server::Server;
pub use longeron_core::stats::Stats;

pub mod logging;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::logging::{self, Level};
    pub use longeron_core::prelude::*;
}
