//! Process-wide engine counters.
//!
//! Cheap atomic counters updated by the pumps; read them through
//! [`snapshot`]. Counters only ever grow, so `connections_opened -
//! connections_closed` is the number of currently live connections.

use std::sync::atomic::{AtomicU64, Ordering};

static CONNECTIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static CONNECTIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static BYTES_READ: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

/// A point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Connections that reached `Connected`.
    pub connections_opened: u64,
    /// Connections that reached `Closed`.
    pub connections_closed: u64,
    /// Total bytes received from the network.
    pub bytes_read: u64,
    /// Total bytes sent to the network.
    pub bytes_written: u64,
}

/// Read the current counter values.
#[must_use]
pub fn snapshot() -> Stats {
    Stats {
        connections_opened: CONNECTIONS_OPENED.load(Ordering::Relaxed),
        connections_closed: CONNECTIONS_CLOSED.load(Ordering::Relaxed),
        bytes_read: BYTES_READ.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
    }
}

pub(crate) fn record_connection_opened() {
    CONNECTIONS_OPENED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_connection_closed() {
    CONNECTIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_bytes_read(n: usize) {
    BYTES_READ.fetch_add(n as u64, Ordering::Relaxed);
}

pub(crate) fn record_bytes_written(n: usize) {
    BYTES_WRITTEN.fetch_add(n as u64, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_monotonic() {
        let before = snapshot();
        record_connection_opened();
        record_bytes_read(10);
        record_bytes_written(7);
        record_connection_closed();
        let after = snapshot();

        assert!(after.connections_opened >= before.connections_opened + 1);
        assert!(after.connections_closed >= before.connections_closed + 1);
        assert!(after.bytes_read >= before.bytes_read + 10);
        assert!(after.bytes_written >= before.bytes_written + 7);
    }
}
