//! Outbound endpoint with bounded reconnect retries.
//!
//! A [`Client`] drives one connection at a time from a dedicated thread.
//! Every attempt creates a fresh handler through the factory and registers
//! an outbound connection with the reactor; the thread then follows the
//! connection's lifecycle events. A failed attempt (or an established
//! connection dropping on an error) is retried after the configured
//! interval until the attempt budget is spent; a connection the
//! application closed, or an orderly close from the peer, is terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::actor::ConnectionSpec;
use crate::config::ClientConfig;
use crate::connection::{Conn, ConnectionEvent};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::handler::ConnectionFactory;
use crate::reactor::Reactor;
use crate::sync::Terminal;

/// A connecting TCP endpoint with bounded, fixed-interval retry.
///
/// # Examples
///
/// ```no_run
/// use longeron_core::client::Client;
/// use longeron_core::config::{ClientConfig, EngineConfig};
/// use longeron_core::engine::Engine;
/// use longeron_core::handler::ConnectionHandler;
///
/// struct Quiet;
/// impl ConnectionHandler for Quiet {}
///
/// let engine = Engine::init(EngineConfig::default()).unwrap();
/// let config = ClientConfig::new().with_host("127.0.0.1").with_port(9000);
/// let client = Client::new(&engine, config, || {
///     Box::new(Quiet) as Box<dyn ConnectionHandler>
/// });
/// client.start().unwrap();
/// client.join();
/// engine.end();
/// ```
pub struct Client {
    config: ClientConfig,
    factory: Arc<dyn ConnectionFactory>,
    reactor: Arc<Reactor>,
    started: AtomicBool,
    stop_tx: Mutex<Option<flume::Sender<()>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    terminal: Arc<Terminal>,
}

impl Client {
    /// Create a client on `engine` with an immutable configuration and the
    /// factory producing one handler per connection attempt.
    pub fn new(
        engine: &Engine,
        config: ClientConfig,
        factory: impl ConnectionFactory + 'static,
    ) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            reactor: engine.reactor(),
            started: AtomicBool::new(false),
            stop_tx: Mutex::new(None),
            thread: Mutex::new(None),
            terminal: Arc::new(Terminal::default()),
        }
    }

    /// Launch the client thread and open the first connection attempt.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyStarted`] on a second call, or an IO error if
    /// the thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        let (stop_tx, stop_rx) = flume::bounded(1);
        *self.stop_tx.lock() = Some(stop_tx);

        let reactor = self.reactor.clone();
        let config = self.config.clone();
        let factory = self.factory.clone();
        let terminal = self.terminal.clone();
        let handle = thread::Builder::new()
            .name("longeron-client".into())
            .spawn(move || {
                run(&reactor, &config, factory.as_ref(), &stop_rx);
                terminal.signal();
            })?;
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    /// Request the client stop: the current connection (if any) is closed
    /// abortively and no further attempts are made. Asynchronous; observe
    /// completion through [`Client::join`].
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().as_ref() {
            let _ = tx.send(());
        }
    }

    /// Block the caller until the client is terminal: its retries are
    /// exhausted, its connection ended cleanly, or [`Client::stop`] took
    /// effect. Returns immediately when the client was never started.
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

enum Waited {
    Event(ConnectionEvent),
    Stop,
}

fn run(
    reactor: &Reactor,
    config: &ClientConfig,
    factory: &dyn ConnectionFactory,
    stop_rx: &flume::Receiver<()>,
) {
    let endpoint = config.endpoint();
    if config.retries == 0 {
        warn!(%endpoint, "zero connection attempts configured, nothing to do");
        return;
    }

    let (event_tx, event_rx) = flume::unbounded();
    let mut attempt: u32 = 0;
    let mut current: Option<Conn> = None;

    loop {
        attempt += 1;
        info!(%endpoint, attempt, retries = config.retries, "connecting");

        let registered = endpoint.resolve().map_err(EngineError::from).and_then(|addr| {
            reactor.register_outbound(
                addr,
                ConnectionSpec {
                    handler: factory.create(),
                    buffer_size: config.buffer_size,
                    events: Some(event_tx.clone()),
                },
            )
        });

        let failed = match registered {
            Err(e) => {
                warn!(%endpoint, "connection attempt failed: {e}");
                true
            }
            Ok(()) => loop {
                let waited = flume::Selector::new()
                    .recv(&event_rx, |r| r.map(Waited::Event).unwrap_or(Waited::Stop))
                    .recv(stop_rx, |_| Waited::Stop)
                    .wait();
                match waited {
                    Waited::Event(ConnectionEvent::Connected(conn)) => {
                        info!(%endpoint, "connection established");
                        attempt = 0;
                        current = Some(conn);
                    }
                    Waited::Event(ConnectionEvent::Closed { error, .. }) => {
                        current = None;
                        break error;
                    }
                    Waited::Stop => {
                        info!(%endpoint, "stop requested");
                        if let Some(conn) = current.take() {
                            conn.close(true);
                        }
                        return;
                    }
                }
            },
        };

        if !failed {
            info!(%endpoint, "disconnected");
            return;
        }

        if attempt >= config.retries {
            // The interval elapses after every failed attempt, the final
            // one included, before the client turns terminal.
            wait_interval(stop_rx, config.retry_interval);
            error!(%endpoint, "retried {} times, giving up", config.retries);
            return;
        }

        warn!(
            %endpoint,
            "connection lost, retrying in {:?}", config.retry_interval
        );
        if !wait_interval(stop_rx, config.retry_interval) {
            info!(%endpoint, "stop requested");
            return;
        }
    }
}

/// Park for the retry interval; returns `false` when a stop arrived
/// instead of the timeout.
fn wait_interval(stop_rx: &flume::Receiver<()>, interval: Duration) -> bool {
    matches!(
        stop_rx.recv_timeout(interval),
        Err(flume::RecvTimeoutError::Timeout)
    )
}
