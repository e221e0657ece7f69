use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port; port 0 selects an ephemeral port).
    pub addr: SocketAddr,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Dispatch each message on a worker thread instead of the reactor.
    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (host:port; port 0 selects an ephemeral port).
    pub addr: SocketAddr,
    /// Dispatch each message on a worker thread instead of the reactor.
    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    pub addr: SocketAddr,
    /// Application header as a JSON object.
    #[arg(long)]
    pub header: Option<String>,
    /// Raw string body.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read body from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one response message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Keep retrying at this interval while the remote refuses (e.g. 1s).
    #[arg(long, value_name = "INTERVAL")]
    pub retry: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
