//! Accepting endpoint.
//!
//! A [`Server`] owns the listening socket on a dedicated accept thread;
//! every accepted socket produces a new handler through the factory and is
//! handed to the reactor as an inbound connection. Stopping the server only
//! stops accepting: established connections keep running their own
//! lifecycle on the reactor workers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use futures::future::{self, Either};
use futures::pin_mut;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::actor::ConnectionSpec;
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::handler::ConnectionFactory;
use crate::reactor::Reactor;
use crate::sync::Terminal;

/// A listening TCP endpoint fanning accepted connections out to the
/// reactor.
///
/// # Examples
///
/// ```no_run
/// use longeron_core::config::{EngineConfig, ServerConfig};
/// use longeron_core::engine::Engine;
/// use longeron_core::handler::ConnectionHandler;
/// use longeron_core::server::Server;
///
/// struct Quiet;
/// impl ConnectionHandler for Quiet {}
///
/// let engine = Engine::init(EngineConfig::default()).unwrap();
/// let config = ServerConfig::new().with_host("127.0.0.1").with_port(9000);
/// let server = Server::new(&engine, config, || {
///     Box::new(Quiet) as Box<dyn ConnectionHandler>
/// });
/// server.start().unwrap();
/// server.stop();
/// server.join();
/// engine.end();
/// ```
pub struct Server {
    config: ServerConfig,
    factory: Arc<dyn ConnectionFactory>,
    reactor: Arc<Reactor>,
    started: AtomicBool,
    stop_tx: Mutex<Option<flume::Sender<()>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    terminal: Arc<Terminal>,
}

impl Server {
    /// Create a server on `engine` with an immutable configuration and the
    /// factory producing one handler per accepted connection.
    pub fn new(
        engine: &Engine,
        config: ServerConfig,
        factory: impl ConnectionFactory + 'static,
    ) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            reactor: engine.reactor(),
            started: AtomicBool::new(false),
            stop_tx: Mutex::new(None),
            thread: Mutex::new(None),
            local_addr: Mutex::new(None),
            terminal: Arc::new(Terminal::default()),
        }
    }

    /// Bind and listen, then start accepting on a dedicated thread.
    ///
    /// The bind outcome is reported synchronously: when this returns `Ok`
    /// the listener is live (see [`Server::local_addr`] for the actual
    /// address, useful with port 0).
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyStarted`] on a second call, resolution errors
    /// for the configured endpoint, or the bind failure.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        let endpoint = self.config.endpoint();
        let addr = endpoint.resolve()?;

        let (ready_tx, ready_rx) = flume::bounded(1);
        let (stop_tx, stop_rx) = flume::bounded(1);
        *self.stop_tx.lock() = Some(stop_tx);

        let reactor = self.reactor.clone();
        let factory = self.factory.clone();
        let buffer_size = self.config.buffer_size;
        let terminal = self.terminal.clone();
        let handle = thread::Builder::new()
            .name("longeron-server".into())
            .spawn(move || {
                accept_loop(&reactor, addr, factory.as_ref(), buffer_size, &ready_tx, &stop_rx);
                terminal.signal();
            })?;
        *self.thread.lock() = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(local)) => {
                *self.local_addr.lock() = Some(local);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EngineError::ChannelClosed),
        }
    }

    /// The address the listener actually bound, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Stop accepting new connections. Established connections are left
    /// alone and complete their own lifecycle.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().as_ref() {
            let _ = tx.send(());
        }
    }

    /// Block the caller until the accept loop has fully terminated.
    /// Returns immediately when the server was never started.
    pub fn join(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        self.terminal.wait();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(
    reactor: &Reactor,
    addr: SocketAddr,
    factory: &dyn ConnectionFactory,
    buffer_size: usize,
    ready_tx: &flume::Sender<std::io::Result<SocketAddr>>,
    stop_rx: &flume::Receiver<()>,
) {
    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    rt.block_on(async {
        let listener = match compio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(local));
        info!(%local, "listening");

        loop {
            let accept = listener.accept();
            let stop = stop_rx.recv_async();
            pin_mut!(accept);
            pin_mut!(stop);

            match future::select(accept, stop).await {
                Either::Left((Ok((stream, peer)), _)) => {
                    debug!(%peer, "accepted");
                    let spec = ConnectionSpec {
                        handler: factory.create(),
                        buffer_size,
                        events: None,
                    };
                    if reactor.register_inbound(stream, peer, spec).is_err() {
                        warn!(%peer, "reactor unavailable, dropping accepted connection");
                        break;
                    }
                }
                Either::Left((Err(e), _)) => {
                    warn!(%local, "accept failed: {e}");
                }
                Either::Right(_) => {
                    info!(%local, "stopping accept loop");
                    break;
                }
            }
        }
    });
}
