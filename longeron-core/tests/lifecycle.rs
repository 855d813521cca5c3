//! End-to-end lifecycle tests driving the engine with plain std-net peers.
//!
//! All tests share one process-wide engine; each starts its own server or
//! client on an ephemeral port.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use longeron_core::buffer::Buffer;
use longeron_core::client::Client;
use longeron_core::config::{ClientConfig, EngineConfig, ServerConfig};
use longeron_core::connection::Conn;
use longeron_core::engine::Engine;
use longeron_core::error::EngineError;
use longeron_core::handler::ConnectionHandler;
use longeron_core::server::Server;

fn engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| Engine::init(EngineConfig::new().with_workers(2)).unwrap())
}

fn start_server(factory: impl longeron_core::handler::ConnectionFactory + 'static) -> Server {
    let server = Server::new(
        engine(),
        ServerConfig::new().with_host("127.0.0.1").with_port(0),
        factory,
    );
    server.start().unwrap();
    server
}

fn connect(server: &Server) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Write a compact-encoded string (payload plus NUL terminator).
fn send_str(stream: &mut TcpStream, s: &str) {
    stream.write_all(s.as_bytes()).unwrap();
    stream.write_all(&[0]).unwrap();
}

/// Read until the connection ends, orderly (EOF) or abortive (reset).
/// The read timeout still fails the test.
fn recv_until_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => break,
            Err(e) => panic!("peer read failed: {e}"),
        }
    }
    collected
}

fn read_exact_with_timeout(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    stream.read_exact(&mut out).unwrap();
    out
}

fn wait_until(mut pred: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    pred()
}

/// Echoes every compact string back; `QUIT` triggers a graceful close
/// with a `BYE` goodbye.
struct EchoProbe {
    pending: Vec<String>,
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ConnectionHandler for EchoProbe {
    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        while data.has_remaining() {
            let line = data.get_string();
            if line == "QUIT" {
                conn.enable_write_interest();
                conn.close(false);
                return;
            }
            if line == "BOOM" {
                panic!("boom requested by peer");
            }
            if !line.is_empty() {
                self.pending.push(line);
                conn.enable_write_interest();
            }
        }
    }

    fn on_write(&mut self, conn: &Conn, data: &mut Buffer) {
        if conn.closing() {
            data.put_string("BYE").unwrap();
            return;
        }
        if !self.pending.is_empty() {
            let line = self.pending.remove(0);
            data.put_string(&line).unwrap();
        }
    }

    fn on_close(&mut self, _conn: &Conn) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn echo_factory(
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
) -> impl Fn() -> Box<dyn ConnectionHandler> + Send + Sync {
    move || {
        Box::new(EchoProbe {
            pending: Vec::new(),
            reads: reads.clone(),
            closes: closes.clone(),
        }) as Box<dyn ConnectionHandler>
    }
}

#[test]
fn test_server_echoes_strings() {
    let reads = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let server = start_server(echo_factory(reads.clone(), closes.clone()));

    let mut peer = connect(&server);
    send_str(&mut peer, "hello engine");
    let echoed = read_exact_with_timeout(&mut peer, "hello engine".len() + 1);
    assert_eq!(echoed, b"hello engine\0");

    drop(peer);
    assert!(wait_until(
        || closes.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));
    server.stop();
    server.join();
}

#[test]
fn test_quit_closes_gracefully_with_goodbye() {
    let reads = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let server = start_server(echo_factory(reads.clone(), closes.clone()));

    let mut peer = connect(&server);
    send_str(&mut peer, "QUIT");

    // Data sent after the close began is drained and discarded without a
    // callback.
    std::thread::sleep(Duration::from_millis(100));
    let _ = peer.write_all(b"ignored\0");

    let tail = recv_until_eof(&mut peer);
    assert_eq!(tail, b"BYE\0");

    drop(peer);
    assert!(wait_until(
        || closes.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));
    // Exactly one read callback: the QUIT itself.
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    server.stop();
    server.join();
}

/// Closes on the first read, twice over; `on_close` must still fire once.
struct DoubleCloser {
    closes: Arc<AtomicUsize>,
}

impl ConnectionHandler for DoubleCloser {
    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        let _ = data.get_string();
        conn.close(false);
        conn.close(false);
    }

    fn on_close(&mut self, _conn: &Conn) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_double_close_fires_on_close_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let factory = {
        let closes = closes.clone();
        move || {
            Box::new(DoubleCloser {
                closes: closes.clone(),
            }) as Box<dyn ConnectionHandler>
        }
    };
    let server = start_server(factory);

    let mut peer = connect(&server);
    send_str(&mut peer, "anything");
    let tail = recv_until_eof(&mut peer);
    assert!(tail.is_empty());
    drop(peer);

    assert!(wait_until(
        || closes.load(Ordering::SeqCst) >= 1,
        Duration::from_secs(3)
    ));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    server.stop();
    server.join();
}

/// Counts lifecycle hooks for client-side assertions.
struct CountingHandler {
    inits: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ConnectionHandler for CountingHandler {
    fn on_init(&mut self, _conn: &Conn) {
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connect(&mut self, _conn: &Conn) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_close(&mut self, _conn: &Conn) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_factory(
    inits: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
) -> impl Fn() -> Box<dyn ConnectionHandler> + Send + Sync {
    move || {
        Box::new(CountingHandler {
            inits: inits.clone(),
            connects: connects.clone(),
            closes: closes.clone(),
        }) as Box<dyn ConnectionHandler>
    }
}

#[test]
fn test_client_retries_exact_attempts_then_gives_up() {
    // A free port with nothing listening on it, so connects are refused.
    let port = portpicker::pick_unused_port().expect("no free port");

    let inits = Arc::new(AtomicUsize::new(0));
    let connects = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));

    let interval = Duration::from_millis(300);
    let config = ClientConfig::new()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_retries(3)
        .with_retry_interval(interval);
    let client = Client::new(
        engine(),
        config,
        counting_factory(inits.clone(), connects.clone(), closes.clone()),
    );

    let started = Instant::now();
    client.start().unwrap();
    client.join();
    let elapsed = started.elapsed();

    assert_eq!(inits.load(Ordering::SeqCst), 3, "three attempts total");
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert!(
        elapsed >= interval * 3 - Duration::from_millis(50),
        "one interval per failed attempt, got {elapsed:?}"
    );
    assert!(elapsed < Duration::from_secs(3), "gave up late: {elapsed:?}");
}

#[test]
fn test_client_clean_peer_close_is_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let inits = Arc::new(AtomicUsize::new(0));
    let connects = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));

    // A long interval: if the clean close wrongly retried, join would
    // stall far past the test's deadline below.
    let config = ClientConfig::new()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_retries(3)
        .with_retry_interval(Duration::from_secs(30));
    let client = Arc::new(Client::new(
        engine(),
        config,
        counting_factory(inits.clone(), connects.clone(), closes.clone()),
    ));
    client.start().unwrap();

    let (peer, _) = listener.accept().unwrap();
    assert!(wait_until(
        || connects.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));
    // Orderly close from the peer.
    drop(peer);

    let joiner = {
        let client = client.clone();
        std::thread::spawn(move || client.join())
    };
    let joined = wait_until(|| joiner.is_finished(), Duration::from_secs(5));
    assert!(joined, "client did not turn terminal on a clean peer close");
    joiner.join().unwrap();

    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

/// Arms several write interests up front; each one writes one sequenced
/// byte.
struct BurstWriter {
    seq: u8,
    arm: usize,
}

impl ConnectionHandler for BurstWriter {
    fn on_connect(&mut self, conn: &Conn) {
        for _ in 0..self.arm {
            conn.enable_write_interest();
        }
    }

    fn on_write(&mut self, _conn: &Conn, data: &mut Buffer) {
        data.put_u8(self.seq).unwrap();
        self.seq += 1;
    }
}

#[test]
fn test_write_interest_arms_one_callback_per_call() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = ClientConfig::new()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_retries(1)
        .with_retry_interval(Duration::from_millis(100));
    let client = Client::new(engine(), config, || {
        Box::new(BurstWriter { seq: 0, arm: 3 }) as Box<dyn ConnectionHandler>
    });
    client.start().unwrap();

    let (mut peer, _) = listener.accept().unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let bytes = read_exact_with_timeout(&mut peer, 3);
    assert_eq!(bytes, vec![0, 1, 2]);

    drop(peer);
    client.join();
}

#[test]
fn test_server_stop_leaves_established_connections() {
    let reads = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let server = start_server(echo_factory(reads.clone(), closes.clone()));
    let addr = server.local_addr().unwrap();

    let mut peer = connect(&server);
    send_str(&mut peer, "before stop");
    assert_eq!(
        read_exact_with_timeout(&mut peer, "before stop".len() + 1),
        b"before stop\0"
    );

    server.stop();
    server.join();

    // The established connection keeps echoing.
    send_str(&mut peer, "after stop");
    assert_eq!(
        read_exact_with_timeout(&mut peer, "after stop".len() + 1),
        b"after stop\0"
    );

    // New connections are no longer accepted.
    assert!(TcpStream::connect(addr).is_err());

    drop(peer);
    assert!(wait_until(
        || closes.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));
}

#[test]
fn test_callback_panic_closes_only_that_connection() {
    let reads = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let server = start_server(echo_factory(reads.clone(), closes.clone()));

    let mut victim = connect(&server);
    let mut bystander = connect(&server);

    send_str(&mut victim, "BOOM");
    let tail = recv_until_eof(&mut victim);
    assert!(tail.is_empty(), "no goodbye on a forced close");
    assert!(wait_until(
        || closes.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));

    // The other connection is unaffected.
    send_str(&mut bystander, "still here");
    assert_eq!(
        read_exact_with_timeout(&mut bystander, "still here".len() + 1),
        b"still here\0"
    );

    drop(bystander);
    drop(victim);
    server.stop();
    server.join();
}

#[test]
fn test_second_init_is_rejected_while_live() {
    let _ = engine();
    match Engine::init(EngineConfig::default()) {
        Err(EngineError::AlreadyInitialized) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second init succeeded"),
    }
}

#[test]
fn test_stats_counters_advance_with_traffic() {
    let reads = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let before = engine().stats();

    let server = start_server(echo_factory(reads.clone(), closes.clone()));
    let mut peer = connect(&server);
    send_str(&mut peer, "count me");
    let _ = read_exact_with_timeout(&mut peer, "count me".len() + 1);
    drop(peer);

    assert!(wait_until(
        || closes.load(Ordering::SeqCst) == 1,
        Duration::from_secs(3)
    ));
    let after = engine().stats();
    assert!(after.connections_opened > before.connections_opened);
    assert!(after.connections_closed > before.connections_closed);
    assert!(after.bytes_read >= before.bytes_read + "count me".len() as u64 + 1);
    assert!(after.bytes_written >= before.bytes_written + "count me".len() as u64 + 1);

    server.stop();
    server.join();
}
