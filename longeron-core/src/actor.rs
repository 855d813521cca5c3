//! Per-connection pump tasks.
//!
//! One connection == one pair of tasks on its worker's runtime:
//!
//! - the read pump moves bytes kernel -> inbound [`Buffer`] -> `on_read`;
//! - the write pump turns queued write-interest commands into `on_write`
//!   callbacks and flushes what they produced kernel-ward.
//!
//! Both pumps share the handler through a `RefCell` on the worker's
//! single-threaded runtime, so one connection's callbacks are serialized
//! and never reentrant, while connections on other workers run in
//! parallel. The pumps own the socket (one `try_clone` half each) and the
//! two buffers; nothing else touches them.
//!
//! Close choreography: a graceful close flushes the write interests queued
//! ahead of it, sends FIN, and lets the read pump complete the sequence on
//! the peer's FIN. A forced close arms SO_LINGER(0) and aborts the read
//! pump, so dropping the socket resets the connection.

use std::cell::{Cell, RefCell};
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;

use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use compio::net::TcpStream;
use compio::runtime::TryClone;
use futures::future::{self, Either};
use futures::pin_mut;
use tracing::{debug, error, info, warn};

use crate::buffer::Buffer;
use crate::connection::{Command, Conn, ConnectionEvent, ConnectionState};
use crate::handler::ConnectionHandler;
use crate::reactor::ReactorShared;
use crate::stats;
use crate::tcp;

type SharedHandler = Rc<RefCell<Box<dyn ConnectionHandler>>>;

/// Everything a registrar supplies for one connection.
pub(crate) struct ConnectionSpec {
    pub(crate) handler: Box<dyn ConnectionHandler>,
    pub(crate) buffer_size: usize,
    pub(crate) events: Option<flume::Sender<ConnectionEvent>>,
}

/// How the socket comes to exist.
pub(crate) enum Launch {
    /// An accepted socket handed over by a server.
    Inbound { stream: TcpStream, peer: SocketAddr },
    /// An address a client wants connected.
    Outbound { addr: SocketAddr },
}

fn notify_closed(events: &Option<flume::Sender<ConnectionEvent>>, id: u64, error: bool) {
    if let Some(tx) = events {
        let _ = tx.send(ConnectionEvent::Closed { id, error });
    }
}

/// Run a callback hook, containing panics. Returns `false` when the hook
/// panicked; the caller then forces the connection closed.
fn invoke(conn: &Conn, hook: &'static str, f: impl FnOnce()) -> bool {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    if result.is_err() {
        error!(
            id = conn.id(),
            peer = conn.peer(),
            hook,
            "callback panicked, forcing close"
        );
    }
    result.is_ok()
}

/// Move the connection to `Closed` and fire `on_close` if this caller won
/// the transition. The state machine makes `on_close` exactly-once.
fn fire_close(conn: &Conn, handler: &SharedHandler) {
    if conn.advance(ConnectionState::Closed) {
        invoke(conn, "on_close", || handler.borrow_mut().on_close(conn));
    }
}

/// Drive one connection from launch to deregistration.
pub(crate) async fn run_connection(
    reactor: Arc<ReactorShared>,
    launch: Launch,
    spec: ConnectionSpec,
) {
    let ConnectionSpec {
        handler,
        buffer_size,
        events,
    } = spec;

    let peer = match &launch {
        Launch::Inbound { peer, .. } => *peer,
        Launch::Outbound { addr } => *addr,
    };
    let id = reactor.next_id();
    let (conn, cmd_rx) = Conn::new(id, peer.to_string());
    let handler: SharedHandler = Rc::new(RefCell::new(handler));

    let (mut inbound, outbound) =
        match (Buffer::allocate(buffer_size), Buffer::allocate(buffer_size)) {
            (Ok(i), Ok(o)) => (i, o),
            (Err(e), _) | (_, Err(e)) => {
                error!(id, %peer, "buffer allocation failed: {e}");
                notify_closed(&events, id, true);
                return;
            }
        };

    if !invoke(&conn, "on_init", || handler.borrow_mut().on_init(&conn)) {
        fire_close(&conn, &handler);
        notify_closed(&events, id, true);
        return;
    }

    let stream = match launch {
        Launch::Inbound { stream, .. } => stream,
        Launch::Outbound { addr } => {
            conn.advance(ConnectionState::Connecting);
            match TcpStream::connect(addr).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(id, %peer, "connect failed: {e}");
                    fire_close(&conn, &handler);
                    notify_closed(&events, id, true);
                    return;
                }
            }
        }
    };

    if let Err(e) = tcp::enable_tcp_nodelay(&stream) {
        debug!(id, %peer, "TCP_NODELAY not set: {e}");
    }

    conn.advance(ConnectionState::Connected);
    stats::record_connection_opened();
    debug!(id, %peer, "connection established");

    if !invoke(&conn, "on_connect", || handler.borrow_mut().on_connect(&conn)) {
        let _ = tcp::set_linger_zero(&stream);
        fire_close(&conn, &handler);
        stats::record_connection_closed();
        notify_closed(&events, id, true);
        return;
    }

    reactor.register(id, conn.clone());
    if let Some(tx) = &events {
        let _ = tx.send(ConnectionEvent::Connected(conn.clone()));
    }

    let failed = Rc::new(Cell::new(false));
    let (abort_tx, abort_rx) = flume::bounded(1);

    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            error!(id, %peer, "cannot clone stream: {e}");
            failed.set(true);
            let _ = tcp::set_linger_zero(&stream);
            fire_close(&conn, &handler);
            reactor.deregister(id);
            stats::record_connection_closed();
            notify_closed(&events, id, true);
            return;
        }
    };

    let writer = compio::runtime::spawn(write_pump(
        write_stream,
        conn.clone(),
        handler.clone(),
        outbound,
        cmd_rx,
        abort_tx,
        failed.clone(),
    ));
    read_pump(stream, &conn, &handler, &mut inbound, &abort_rx, &failed).await;

    // Wake the write pump if it is still parked on the command channel,
    // then wait for it so the socket halves drop together.
    conn.nudge();
    let _ = writer.await;

    reactor.deregister(id);
    stats::record_connection_closed();
    notify_closed(&events, id, failed.get());
    debug!(id, %peer, "connection deregistered");
}

async fn read_pump(
    mut stream: TcpStream,
    conn: &Conn,
    handler: &SharedHandler,
    inbound: &mut Buffer,
    abort_rx: &flume::Receiver<()>,
    failed: &Cell<bool>,
) {
    let mut slab: Vec<u8> = Vec::with_capacity(inbound.capacity());

    loop {
        if conn.state() >= ConnectionState::Closed {
            break;
        }

        slab.clear();
        slab.resize(inbound.capacity(), 0);
        let res = {
            let read = AsyncRead::read(&mut stream, std::mem::take(&mut slab));
            let abort = abort_rx.recv_async();
            pin_mut!(read);
            pin_mut!(abort);

            match future::select(read, abort).await {
                Either::Left((BufResult(res, returned), _)) => {
                    slab = returned;
                    Some(res)
                }
                // Forced close: dropping the in-flight read cancels it.
                Either::Right(_) => None,
            }
        };
        let Some(res) = res else { break };

        match res {
            Ok(0) => {
                if conn.state() >= ConnectionState::Closed {
                    break;
                }
                if conn.state() == ConnectionState::Closing {
                    debug!(id = conn.id(), peer = conn.peer(), "close sequence complete");
                } else {
                    info!(id = conn.id(), peer = conn.peer(), "peer closed the connection");
                }
                fire_close(conn, handler);
                break;
            }
            Ok(n) => {
                stats::record_bytes_read(n);
                // Reading is disabled once the close began; bytes still
                // arriving are drained and discarded.
                if conn.state() == ConnectionState::Connected {
                    inbound.reset();
                    inbound.fill_from(&slab[..n]);
                    inbound.flip();
                    if !invoke(conn, "on_read", || {
                        handler.borrow_mut().on_read(conn, inbound);
                    }) {
                        failed.set(true);
                        let _ = tcp::set_linger_zero(&stream);
                        fire_close(conn, handler);
                        break;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if conn.state() >= ConnectionState::Closed {
                    break;
                }
                error!(id = conn.id(), peer = conn.peer(), "read failed: {e}");
                failed.set(true);
                fire_close(conn, handler);
                break;
            }
        }
    }
}

async fn write_pump(
    mut stream: TcpStream,
    conn: Conn,
    handler: SharedHandler,
    mut outbound: Buffer,
    cmd_rx: flume::Receiver<Command>,
    abort_tx: flume::Sender<()>,
    failed: Rc<Cell<bool>>,
) {
    loop {
        let cmd = match cmd_rx.recv_async().await {
            Ok(cmd) => cmd,
            Err(_) => break,
        };

        match cmd {
            Command::WriteInterest => {
                if conn.state() >= ConnectionState::Closed {
                    break;
                }
                if conn.state() < ConnectionState::Connected {
                    debug!(
                        id = conn.id(),
                        peer = conn.peer(),
                        "write interest before establishment ignored"
                    );
                    continue;
                }
                if !flush_one(&mut stream, &conn, &handler, &mut outbound, &failed).await {
                    break;
                }
            }
            Command::Close { force: false } => {
                if conn.state() >= ConnectionState::Closed {
                    break;
                }
                conn.advance(ConnectionState::Closing);
                // Write interests queued ahead of the close still get their
                // callback; with `closing()` already true they typically
                // emit a goodbye payload. Then our FIN goes out and the
                // read pump finishes the sequence on the peer's FIN.
                let mut flushed = true;
                while let Ok(queued) = cmd_rx.try_recv() {
                    if matches!(queued, Command::WriteInterest)
                        && !flush_one(&mut stream, &conn, &handler, &mut outbound, &failed).await
                    {
                        flushed = false;
                        break;
                    }
                }
                if flushed {
                    let _ = tcp::shutdown(&stream, Shutdown::Write);
                }
                break;
            }
            Command::Close { force: true } => {
                if conn.state() < ConnectionState::Closed {
                    let _ = tcp::set_linger_zero(&stream);
                }
                fire_close(&conn, &handler);
                break;
            }
        }
    }

    // A terminal exit wakes the read pump; a graceful exit leaves it
    // waiting for the peer's FIN.
    if conn.state() >= ConnectionState::Closed {
        let _ = abort_tx.send(());
    }
}

/// One armed write: reset the outbound buffer, let the callback fill it,
/// flush whatever it produced. Returns `false` when the pump must stop.
async fn flush_one(
    stream: &mut TcpStream,
    conn: &Conn,
    handler: &SharedHandler,
    outbound: &mut Buffer,
    failed: &Cell<bool>,
) -> bool {
    outbound.reset();
    if !invoke(conn, "on_write", || {
        handler.borrow_mut().on_write(conn, outbound);
    }) {
        failed.set(true);
        let _ = tcp::set_linger_zero(stream);
        fire_close(conn, handler);
        return false;
    }
    outbound.flip();

    if !outbound.has_remaining() {
        return true;
    }

    let data = outbound.array();
    let len = data.len();
    let BufResult(res, _) = stream.write_all(data).await;
    match res {
        Ok(()) => {
            stats::record_bytes_written(len);
            true
        }
        Err(e) => {
            if conn.state() < ConnectionState::Closed {
                error!(id = conn.id(), peer = conn.peer(), "write failed: {e}");
                failed.set(true);
            }
            fire_close(conn, handler);
            false
        }
    }
}
