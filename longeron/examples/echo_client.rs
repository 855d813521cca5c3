//! Echo client demo.
//!
//! Sends `PING <seq>` lines, checks the echoes, then asks the server to
//! close with `QUIT`. Pair it with the `echo_server` example.

use std::time::Duration;

use longeron::prelude::*;

const ROUNDS: i32 = 5;

struct PingConnection {
    seq: i32,
}

impl ConnectionHandler for PingConnection {
    fn on_connect(&mut self, conn: &Conn) {
        println!("[client] connected to {}", conn.peer());
        conn.enable_write_interest();
    }

    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        while data.has_remaining() {
            let line = data.get_string();
            if line.is_empty() {
                continue;
            }
            println!("[client] <- {line:?}");
        }
        conn.enable_write_interest();
    }

    fn on_write(&mut self, conn: &Conn, data: &mut Buffer) {
        if conn.closing() {
            return;
        }
        if self.seq >= ROUNDS {
            let _ = data.put_string("QUIT");
            return;
        }
        self.seq += 1;
        let _ = data.put_string(&format!("PING {}", self.seq));
    }

    fn on_close(&mut self, conn: &Conn) {
        println!("[client] {} closed after {} pings", conn.peer(), self.seq);
    }
}

fn main() -> Result<()> {
    logging::init(Level::Info);

    let engine = Engine::init(EngineConfig::default())?;
    let config = ClientConfig::new()
        .with_host("127.0.0.1")
        .with_port(11111)
        .with_retries(3)
        .with_retry_interval(Duration::from_secs(1));
    let client = Client::new(&engine, config, || {
        Box::new(PingConnection { seq: 0 }) as Box<dyn ConnectionHandler>
    });

    client.start()?;
    client.join();
    engine.end();
    Ok(())
}
