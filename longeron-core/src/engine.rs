//! Process-wide engine lifecycle.
//!
//! [`Engine::init`] establishes the worker pool exactly once before any
//! client or server use; [`Engine::end`] tears it down exactly once after
//! every client and server has joined. A second `init` while an engine is
//! live is an error; after `end` the process may initialize a fresh engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::reactor::Reactor;
use crate::stats::{self, Stats};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Handle to the process-wide engine state: the reactor worker pool and
/// the global counters.
pub struct Engine {
    reactor: Arc<Reactor>,
    ended: AtomicBool,
}

impl Engine {
    /// Establish the engine.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyInitialized`] while a previous engine is still
    /// live, or the error from spawning the worker pool.
    pub fn init(config: EngineConfig) -> Result<Self> {
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyInitialized);
        }

        let reactor = match Reactor::new(config.workers) {
            Ok(reactor) => Arc::new(reactor),
            Err(e) => {
                INITIALIZED.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(workers = reactor.workers(), "engine initialized");
        Ok(Self {
            reactor,
            ended: AtomicBool::new(false),
        })
    }

    /// Tear the engine down: force-close any remaining connections, stop
    /// the workers and release the process-wide guard.
    ///
    /// Call after every client and server has joined.
    pub fn end(self) {
        self.shutdown();
    }

    /// Number of currently established connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.reactor.connection_count()
    }

    /// A snapshot of the process-wide counters.
    #[must_use]
    pub fn stats(&self) -> Stats {
        stats::snapshot()
    }

    pub(crate) fn reactor(&self) -> Arc<Reactor> {
        self.reactor.clone()
    }

    fn shutdown(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reactor.shutdown();
        INITIALIZED.store(false, Ordering::SeqCst);
        info!("engine ended");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
