use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use jhtp_frame::Header;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    header: Option<&'a Header>,
    body_size: usize,
    body: String,
    remote: Option<SocketAddr>,
    timestamp: String,
}

pub fn print_message(
    head: Option<&Header>,
    body: &[u8],
    remote: Option<SocketAddr>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                header: head,
                body_size: body.len(),
                body: body_preview(body),
                remote,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REMOTE", "HEADER", "SIZE", "BODY"])
                .add_row(vec![
                    remote.map_or_else(|| "-".to_string(), |addr| addr.to_string()),
                    header_preview(head),
                    body.len().to_string(),
                    body_preview(body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "remote={} header={} size={} body={}",
                remote.map_or_else(|| "-".to_string(), |addr| addr.to_string()),
                header_preview(head),
                body.len(),
                body_preview(body)
            );
        }
        OutputFormat::Raw => {
            print_raw(body);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn header_preview(head: Option<&Header>) -> String {
    match head {
        Some(map) => serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string()),
        None => "-".to_string(),
    }
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
