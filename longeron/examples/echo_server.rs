//! Echo server demo.
//!
//! Echoes every line back to the peer; a line reading `QUIT` triggers a
//! graceful close with a final `BYE` payload. Run with:
//!
//! ```sh
//! cargo run --example echo_server
//! cargo run --example echo_client
//! ```

use longeron::prelude::*;

struct EchoConnection {
    pending: Vec<String>,
}

impl ConnectionHandler for EchoConnection {
    fn on_connect(&mut self, conn: &Conn) {
        println!("[server] {} connected", conn.peer());
    }

    fn on_read(&mut self, conn: &Conn, data: &mut Buffer) {
        while data.has_remaining() {
            let line = data.get_string();
            if line.is_empty() {
                continue;
            }
            println!("[server] {} -> {line:?}", conn.peer());
            if line == "QUIT" {
                conn.enable_write_interest();
                conn.close(false);
                return;
            }
            self.pending.push(line);
            conn.enable_write_interest();
        }
    }

    fn on_write(&mut self, conn: &Conn, data: &mut Buffer) {
        if conn.closing() {
            let _ = data.put_string("BYE");
            return;
        }
        if self.pending.is_empty() {
            return;
        }
        let line = self.pending.remove(0);
        if data.put_string(&line).is_err() {
            conn.close(true);
        }
    }

    fn on_close(&mut self, conn: &Conn) {
        println!("[server] {} closed", conn.peer());
    }
}

fn main() -> Result<()> {
    logging::init(Level::Info);

    let engine = Engine::init(EngineConfig::default())?;
    let server = Server::new(
        &engine,
        ServerConfig::new().with_host("127.0.0.1").with_port(11111),
        || {
            Box::new(EchoConnection {
                pending: Vec::new(),
            }) as Box<dyn ConnectionHandler>
        },
    );

    server.start()?;
    println!("[server] listening on {:?}, ctrl-c to exit", server.local_addr());
    server.join();
    engine.end();
    Ok(())
}
