//! The event loop: a pool of multiplexing workers.
//!
//! Each worker thread owns one single-threaded `compio` runtime and hosts
//! the pump tasks of the connections assigned to it. Registration picks a
//! worker round-robin; from then on everything about that connection
//! happens on that worker, which is what serializes a connection's
//! callbacks while letting distinct connections run in parallel.
//!
//! The only structure shared across workers is the connection registry, a
//! [`DashMap`] keyed by connection id; pumps insert on establishment and
//! remove on close, and shutdown walks it to force-close stragglers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::actor::{self, ConnectionSpec, Launch};
use crate::connection::Conn;
use crate::error::{EngineError, Result};

/// State shared between the reactor handle and the pump tasks.
pub(crate) struct ReactorShared {
    registry: DashMap<u64, Conn>,
    next_id: AtomicU64,
}

impl ReactorShared {
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn register(&self, id: u64, conn: Conn) {
        self.registry.insert(id, conn);
    }

    pub(crate) fn deregister(&self, id: u64) {
        self.registry.remove(&id);
    }
}

enum WorkerMsg {
    Run {
        launch: Launch,
        spec: ConnectionSpec,
    },
    Shutdown,
}

/// The worker pool plus the shared connection registry.
pub struct Reactor {
    shared: Arc<ReactorShared>,
    senders: Vec<flume::Sender<WorkerMsg>>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    next_worker: AtomicUsize,
}

impl Reactor {
    /// Spawn `workers` multiplexing threads (at least one).
    pub(crate) fn new(workers: usize) -> Result<Self> {
        let shared = Arc::new(ReactorShared {
            registry: DashMap::new(),
            next_id: AtomicU64::new(0),
        });

        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = flume::unbounded();
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("longeron-worker-{index}"))
                .spawn(move || worker_main(index, &shared, &rx))?;
            senders.push(tx);
            handles.push(handle);
        }

        Ok(Self {
            shared,
            senders,
            handles: Mutex::new(handles),
            next_worker: AtomicUsize::new(0),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Number of currently registered (established, not yet closed)
    /// connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Hand an accepted socket to a worker.
    pub(crate) fn register_inbound(
        &self,
        stream: compio::net::TcpStream,
        peer: SocketAddr,
        spec: ConnectionSpec,
    ) -> Result<()> {
        self.dispatch(WorkerMsg::Run {
            launch: Launch::Inbound { stream, peer },
            spec,
        })
    }

    /// Ask a worker to open an outbound connection.
    pub(crate) fn register_outbound(&self, addr: SocketAddr, spec: ConnectionSpec) -> Result<()> {
        self.dispatch(WorkerMsg::Run {
            launch: Launch::Outbound { addr },
            spec,
        })
    }

    fn dispatch(&self, msg: WorkerMsg) -> Result<()> {
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[index]
            .send(msg)
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Force-close every registered connection.
    pub(crate) fn close_all(&self) {
        for entry in self.shared.registry.iter() {
            entry.value().close(true);
        }
    }

    /// Force-close stragglers, give their pumps a moment to deregister,
    /// then stop and join the workers. Idempotent.
    pub(crate) fn shutdown(&self) {
        self.close_all();

        let deadline = Instant::now() + Duration::from_secs(1);
        while !self.shared.registry.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        for tx in &self.senders {
            let _ = tx.send(WorkerMsg::Shutdown);
        }
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_main(index: usize, shared: &Arc<ReactorShared>, rx: &flume::Receiver<WorkerMsg>) {
    debug!(worker = index, "starting");

    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker = index, "failed to create runtime: {e}");
            return;
        }
    };

    rt.block_on(async {
        loop {
            match rx.recv_async().await {
                Ok(WorkerMsg::Run { launch, spec }) => {
                    compio::runtime::spawn(actor::run_connection(shared.clone(), launch, spec))
                        .detach();
                }
                Ok(WorkerMsg::Shutdown) | Err(_) => break,
            }
        }
    });

    debug!(worker = index, "stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactor_spawns_requested_workers() {
        let reactor = Reactor::new(2).unwrap();
        assert_eq!(reactor.workers(), 2);
        assert_eq!(reactor.connection_count(), 0);
        reactor.shutdown();
    }

    #[test]
    fn test_worker_floor_is_one() {
        let reactor = Reactor::new(0).unwrap();
        assert_eq!(reactor.workers(), 1);
        reactor.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let reactor = Reactor::new(1).unwrap();
        reactor.shutdown();
        reactor.shutdown();
    }
}
