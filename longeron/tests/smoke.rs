//! Facade-level smoke test: the public surface drives a full echo
//! exchange.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use longeron::prelude::*;

struct Echo {
    pending: Option<String>,
}

impl ConnectionHandler for Echo {
    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        let line = data.get_string();
        if line == "QUIT" {
            conn.close(false);
        } else {
            self.pending = Some(line);
            conn.enable_write_interest();
        }
    }

    fn on_write(&mut self, _conn: &Conn, data: &mut Buffer) {
        if let Some(line) = self.pending.take() {
            data.put_string(&line).unwrap();
        }
    }
}

#[test]
fn test_facade_echo_round_trip() {
    logging::init(Level::Debug);

    let engine = Engine::init(EngineConfig::new().with_workers(1)).unwrap();
    let server = Server::new(
        &engine,
        ServerConfig::new().with_host("127.0.0.1").with_port(0),
        || Box::new(Echo { pending: None }) as Box<dyn ConnectionHandler>,
    );
    server.start().unwrap();

    let mut peer = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    peer.write_all(b"ping\0").unwrap();

    let mut echoed = [0u8; 5];
    peer.read_exact(&mut echoed).unwrap();
    assert_eq!(&echoed, b"ping\0");

    peer.write_all(b"QUIT\0").unwrap();
    let mut tail = Vec::new();
    peer.read_to_end(&mut tail).unwrap();
    assert!(tail.is_empty());

    drop(peer);
    server.stop();
    server.join();
    engine.end();
}
