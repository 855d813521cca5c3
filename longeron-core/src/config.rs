//! Configuration records for the engine, clients and servers.
//!
//! All three records are plain immutable data with builder-style `with_*`
//! constructors; once a [`Client`](crate::client::Client) or
//! [`Server`](crate::server::Server) starts, its configuration never
//! changes.

use std::time::Duration;

use crate::endpoint::{AddressFamily, Endpoint};

/// Default buffer capacity for network operations, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Process-wide engine configuration.
///
/// # Examples
///
/// ```
/// use longeron_core::config::EngineConfig;
///
/// let config = EngineConfig::new().with_workers(2);
/// assert_eq!(config.workers, 2);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of reactor worker threads.
    ///
    /// Defaults to the number of CPUs, capped at 8; connections are
    /// distributed across workers at registration time.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 8),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread count (minimum one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Client configuration.
///
/// Defaults: localhost:8080 over IPv4, 3 retries at 30 second intervals,
/// 8 KiB buffers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The address or host name the client connects to.
    pub host: String,

    /// The TCP port the client connects to.
    pub port: u16,

    /// The address family used for resolution.
    pub family: AddressFamily,

    /// Total connection attempts before the client gives up.
    ///
    /// Each failed attempt is followed by a [`retry_interval`] wait, so an
    /// unreachable peer costs about `retries * retry_interval` before
    /// `join()` returns.
    ///
    /// [`retry_interval`]: ClientConfig::retry_interval
    pub retries: u32,

    /// The wait between two connection attempts.
    pub retry_interval: Duration,

    /// Buffer capacity used for this client's network operations.
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8080,
            family: AddressFamily::Ipv4,
            retries: 3,
            retry_interval: Duration::from_secs(30),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host to connect to.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port to connect to.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the address family.
    #[must_use]
    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the total number of connection attempts.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the wait between connection attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the buffer capacity (minimum one byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// The endpoint this configuration points at.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.family)
    }
}

/// Server configuration.
///
/// Defaults: bind 0.0.0.0:8080 over IPv4 with 8 KiB buffers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address the server binds to.
    pub host: String,

    /// The TCP port the server listens on.
    pub port: u16,

    /// The address family used for resolution.
    pub family: AddressFamily,

    /// Buffer capacity used for accepted connections.
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            family: AddressFamily::Ipv4,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the address family.
    #[must_use]
    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the buffer capacity (minimum one byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// The endpoint this configuration binds.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.family)
    }
}
