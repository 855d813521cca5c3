//! Connection identity, state machine and control handle.
//!
//! The engine owns each connection's socket and buffers inside its pump
//! tasks ([`crate::actor`]); callbacks and outside observers interact with
//! the connection through the cloneable [`Conn`] handle, which exposes the
//! published state and the two control operations (`enable_write_interest`
//! and `close`) as commands on the connection's channel.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Connection lifecycle states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Storage allocated, no network activity yet.
    Init = 0,
    /// Outbound connect in progress.
    Connecting = 1,
    /// Established; reading and writing enabled.
    Connected = 2,
    /// Graceful close requested; reading disabled, queued output flushing.
    Closing = 3,
    /// Terminal; the connection is deregistered after this.
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Init,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Control commands delivered to a connection's write pump.
#[derive(Debug)]
pub(crate) enum Command {
    /// Arm exactly one future `on_write` callback.
    WriteInterest,
    /// Begin closing; graceful unless `force`.
    Close { force: bool },
}

/// Lifecycle notifications a registrar can subscribe to.
///
/// The [`crate::client::Client`] drives its retry loop from these; they are
/// also the definitive completion signal for an asynchronous
/// [`Conn::close`].
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection reached `Connected`; the handle can be retained for
    /// control calls from outside callbacks.
    Connected(Conn),
    /// The connection reached `Closed` and was deregistered. `error` is
    /// true when the close was caused by a failure or an unexpected peer
    /// disconnect rather than a locally requested close.
    Closed { id: u64, error: bool },
}

pub(crate) struct Shared {
    id: u64,
    peer: String,
    state: AtomicU8,
    cmd_tx: flume::Sender<Command>,
}

/// Cloneable handle to one connection.
///
/// Handed to every [`ConnectionHandler`](crate::handler::ConnectionHandler)
/// hook; safe to retain and use from any thread. Control operations are
/// asynchronous: the state transition may not have completed when the call
/// returns, and the definitive completion signal is the `on_close` hook
/// (or the [`ConnectionEvent::Closed`] notification).
#[derive(Clone)]
pub struct Conn {
    shared: Arc<Shared>,
}

impl Conn {
    pub(crate) fn new(id: u64, peer: String) -> (Self, flume::Receiver<Command>) {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let conn = Self {
            shared: Arc::new(Shared {
                id,
                peer,
                state: AtomicU8::new(ConnectionState::Init as u8),
                cmd_tx,
            }),
        };
        (conn, cmd_rx)
    }

    /// Stable opaque identifier of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Printable peer address, `host:port` form.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// The connection's current published state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// `true` while the connection is in its graceful-close phase.
    ///
    /// Write callbacks use this to emit a final goodbye payload instead of
    /// normal traffic.
    #[must_use]
    pub fn closing(&self) -> bool {
        self.state() == ConnectionState::Closing
    }

    /// Arm exactly one future `on_write` callback with a writable buffer.
    ///
    /// Calls queue rather than coalesce: arming N times before the write
    /// opportunities arrive schedules N callbacks. Callers needing a
    /// particular ordering serialize their own calls.
    pub fn enable_write_interest(&self) {
        if self.state() >= ConnectionState::Closed {
            debug!(id = self.id(), peer = self.peer(), "write interest ignored on closed connection");
            return;
        }
        let _ = self.shared.cmd_tx.send(Command::WriteInterest);
    }

    /// Request the connection be closed.
    ///
    /// With `force` false the close is graceful: the connection enters
    /// `Closing` immediately (so `closing()` is observable from the very
    /// next callback), reading is disabled, output already queued is
    /// flushed, then the orderly TCP close sequence runs. With `force`
    /// true the close is abortive: unflushed output is discarded and the
    /// connection resets.
    ///
    /// Closing a connection that is already closing or closed is a no-op.
    /// The mechanics are asynchronous either way; `on_close` is the
    /// definitive completion signal.
    pub fn close(&self, force: bool) {
        if self.state() >= ConnectionState::Closing {
            return;
        }
        debug!(id = self.id(), peer = self.peer(), force, "close requested");
        if !force {
            self.advance(ConnectionState::Closing);
        }
        let _ = self.shared.cmd_tx.send(Command::Close { force });
    }

    /// Wake the write pump regardless of state; used by the engine when
    /// the read pump exits so both pumps wind down together.
    pub(crate) fn nudge(&self) {
        let _ = self.shared.cmd_tx.send(Command::Close { force: true });
    }

    /// Advance the published state, returning `false` when the connection
    /// already was at `target` or past it. The winner of the transition to
    /// a given state is the one that fires its callback, which is what
    /// makes `on_close` exactly-once.
    pub(crate) fn advance(&self, target: ConnectionState) -> bool {
        let mut current = self.shared.state.load(Ordering::Acquire);
        loop {
            if current >= target as u8 {
                return false;
            }
            match self.shared.state.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(
                        id = self.id(),
                        peer = self.peer(),
                        "connection [{}] -> [{}]",
                        ConnectionState::from_u8(current),
                        target
                    );
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id())
            .field("peer", &self.peer())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.peer())
    }
}
