use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tracing::info;

use jhtp_mux::{Multiplexer, MuxEvent};
use jhtp_peer::Server;

use crate::cmd::ListenArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let server = Server::bind(args.addr).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %server.local_addr(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    let mux = Multiplexer::new();
    install_ctrlc_handler(running.clone(), mux.clone(), server.stop_handle())?;

    let (tx, rx) = mpsc::channel();
    mux.set_handler(
        move |peer, event| {
            let _ = tx.send((peer.remote_addr(), event));
        },
        args.concurrent,
    );

    let accept_mux = mux.clone();
    let _accept = thread::spawn(move || server.run(move |peer| accept_mux.add(Arc::new(peer))));
    let reactor_mux = mux.clone();
    let _reactor = thread::spawn(move || reactor_mux.run());

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok((remote, MuxEvent::Message { head, body })) => {
                print_message(head.as_ref(), &body, remote, format);
                printed = printed.saturating_add(1);
                if let Some(count) = args.count {
                    if printed >= count {
                        break;
                    }
                }
            }
            Ok((remote, MuxEvent::Closed)) => {
                info!(?remote, "peer disconnected");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    mux.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    mux: Multiplexer,
    server_stop: jhtp_peer::StopHandle,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        mux.stop();
        server_stop.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
