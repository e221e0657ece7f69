//! Minimal echo server — accepts peers through the multiplexer and echoes
//! every message back with its header.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:4980 \
//!     --header '{"op":"ping"}' --data hello --wait

use std::sync::Arc;
use std::thread;

use jhtp::mux::{Multiplexer, MuxEvent};
use jhtp::peer::Server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind("127.0.0.1:4980".parse()?)?;
    eprintln!("Listening on {}", server.local_addr());

    let mux = Multiplexer::new();
    mux.set_handler(
        |peer, event| match event {
            MuxEvent::Message { head, body } => {
                eprintln!(
                    "Received {} bytes from {:?}",
                    body.len(),
                    peer.remote_addr()
                );
                if let Err(err) = peer.send(head.as_ref(), &body) {
                    eprintln!("Echo reply failed: {err}");
                }
            }
            MuxEvent::Closed => {
                eprintln!("Peer disconnected: {:?}", peer.remote_addr());
            }
        },
        false,
    );

    let accept_mux = mux.clone();
    thread::spawn(move || server.run(move |peer| accept_mux.add(Arc::new(peer))));

    mux.run()?;
    Ok(())
}
