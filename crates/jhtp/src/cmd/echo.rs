use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use jhtp_mux::{Multiplexer, MuxEvent};
use jhtp_peer::Server;

use crate::cmd::EchoArgs;
use crate::exit::{mux_error, peer_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let server = Server::bind(args.addr).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %server.local_addr(), "echo server listening");

    let mux = Multiplexer::new();
    mux.set_handler(
        |peer, event| match event {
            MuxEvent::Message { head, body } => {
                if let Err(err) = peer.send(head.as_ref(), &body) {
                    warn!(%err, "echo reply failed");
                }
            }
            MuxEvent::Closed => {
                info!(remote = ?peer.remote_addr(), "peer disconnected");
            }
        },
        args.concurrent,
    );

    let signal_mux = mux.clone();
    let server_stop = server.stop_handle();
    ctrlc::set_handler(move || {
        signal_mux.stop();
        server_stop.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let accept_mux = mux.clone();
    let _accept = thread::spawn(move || server.run(move |peer| accept_mux.add(Arc::new(peer))));

    mux.run().map_err(|err| mux_error("reactor failed", err))?;
    Ok(SUCCESS)
}
