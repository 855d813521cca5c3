//! Connection callback hooks and the factory capability.
//!
//! A [`ConnectionHandler`] is the fixed set of lifecycle hooks the engine
//! invokes for one connection. Every hook defaults to a no-op; implement
//! only what the application needs. One handler instance belongs to exactly
//! one connection and all of its hooks run serialized on that connection's
//! worker thread, so implementations keep plain `&mut self` state without
//! further synchronization.

use crate::buffer::Buffer;
use crate::connection::Conn;

/// Lifecycle hooks for one connection.
///
/// Ordering guarantee: `on_init` before `on_connect` before any
/// `on_read`/`on_write`, and `on_close` exactly once, last. Hooks of one
/// connection are never invoked concurrently with each other; hooks of
/// distinct connections may run in parallel on different workers.
pub trait ConnectionHandler: Send {
    /// Called once when the connection's storage is allocated, before any
    /// network activity.
    fn on_init(&mut self, conn: &Conn) {
        let _ = conn;
    }

    /// Called once when the connection is established, whether an outbound
    /// connect succeeded or an inbound accept completed.
    fn on_connect(&mut self, conn: &Conn) {
        let _ = conn;
    }

    /// Called when inbound data arrived. `data` is already flipped for
    /// reading; one callback is delivered per readiness wake-up with all
    /// currently available bytes visible, and bytes left unconsumed when
    /// the callback returns are discarded.
    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        let _ = (conn, data);
    }

    /// Called once per armed write interest with a writable buffer
    /// (`position = 0`, `limit = capacity`). Whatever the callback wrote is
    /// flushed when it returns. Use [`Conn::closing`] to emit a final
    /// goodbye payload instead of normal traffic.
    fn on_write(&mut self, conn: &Conn, data: &mut Buffer) {
        let _ = (conn, data);
    }

    /// Called exactly once when the connection reaches its terminal state,
    /// for any close reason. No further hooks fire afterwards.
    fn on_close(&mut self, conn: &Conn) {
        let _ = conn;
    }
}

/// Capability producing one new [`ConnectionHandler`] per accepted or
/// initiated socket.
///
/// Closures returning boxed handlers implement this directly:
///
/// ```
/// use longeron_core::handler::{ConnectionFactory, ConnectionHandler};
///
/// struct Echo;
/// impl ConnectionHandler for Echo {}
///
/// let factory = || Box::new(Echo) as Box<dyn ConnectionHandler>;
/// let _handler = factory.create();
/// ```
pub trait ConnectionFactory: Send + Sync {
    /// Produce the handler for one new connection.
    fn create(&self) -> Box<dyn ConnectionHandler>;
}

impl<F> ConnectionFactory for F
where
    F: Fn() -> Box<dyn ConnectionHandler> + Send + Sync,
{
    fn create(&self) -> Box<dyn ConnectionHandler> {
        self()
    }
}
