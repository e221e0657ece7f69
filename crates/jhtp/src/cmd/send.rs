use std::fs;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use jhtp_frame::Header;
use jhtp_peer::{Client, Peer, PeerError};
use jhtp_transport::TcpTransport;

use crate::cmd::SendArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let header = resolve_header(&args)?;
    let body = resolve_body(&args)?;
    let peer = establish(&args)?;

    peer.send(header.as_ref(), &body)
        .map_err(|err| peer_error("send failed", err))?;

    if args.wait {
        let timeout = parse_duration(&args.wait_timeout)?;
        let (head, body) = wait_for_response(&peer, timeout)?;
        print_message(head.as_ref(), &body, peer.remote_addr(), format);
    }

    Ok(SUCCESS)
}

/// Connect once, or keep retrying at the given interval while the remote
/// refuses.
fn establish(args: &SendArgs) -> CliResult<Arc<Peer>> {
    match &args.retry {
        None => {
            let client = Client::connect(args.addr)
                .map_err(|err| peer_error("connect failed", err))?;
            Ok(client.peer())
        }
        Some(interval) => {
            let backoff = parse_duration(interval)?;
            let transport = TcpTransport::reconnect(args.addr, backoff)
                .map_err(|err| peer_error("connect failed", PeerError::Transport(err)))?;
            let peer = Peer::from_transport(Box::new(transport))
                .map_err(|err| peer_error("connect failed", err))?;
            Ok(Arc::new(peer))
        }
    }
}

fn resolve_header(args: &SendArgs) -> CliResult<Option<Header>> {
    let Some(raw) = &args.header else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| CliError::new(USAGE, format!("--header is not valid JSON: {err}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => Err(CliError::new(USAGE, "--header must be a JSON object")),
    }
}

fn resolve_body(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

/// Blocking receive on a helper thread, bounded by `timeout`.
fn wait_for_response(
    peer: &Arc<Peer>,
    timeout: Duration,
) -> CliResult<(Option<Header>, bytes::Bytes)> {
    let (tx, rx) = mpsc::channel();
    let receiver = Arc::clone(peer);
    thread::spawn(move || {
        let _ = tx.send(receiver.recv());
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(message)) => Ok(message),
        Ok(Err(err)) => Err(peer_error("receive failed", err)),
        Err(_) => Err(CliError::new(TIMEOUT, "timed out waiting for response")),
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> SendArgs {
        SendArgs {
            addr: "127.0.0.1:4980".parse().unwrap(),
            header: None,
            data: None,
            file: None,
            wait: false,
            wait_timeout: "5s".to_string(),
            retry: None,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn header_must_be_json_object() {
        let mut args = base_args();
        args.header = Some(r#"["not","an","object"]"#.to_string());
        let err = resolve_header(&args).unwrap_err();
        assert_eq!(err.code, USAGE);

        args.header = Some(r#"{"op":"ping"}"#.to_string());
        let head = resolve_header(&args).unwrap().unwrap();
        assert_eq!(head["op"], serde_json::json!("ping"));
    }

    #[test]
    fn body_defaults_to_empty() {
        let args = base_args();
        assert!(resolve_body(&args).unwrap().is_empty());
    }
}
