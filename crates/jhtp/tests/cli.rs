#![cfg(all(unix, feature = "cli"))]

use std::process::Command;

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_jhtp"))
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_includes_protocol() {
    let output = Command::new(env!("CARGO_BIN_EXE_jhtp"))
        .args(["version", "--extended"])
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protocol version: 0.1"));
}

#[test]
fn send_to_refused_port_fails_cleanly() {
    // Reserve an ephemeral port, then free it so the connect is refused.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let addr = addr.to_string();
    let output = Command::new(env!("CARGO_BIN_EXE_jhtp"))
        .args(["--log-level", "error", "send", addr.as_str(), "--data", "x"])
        .output()
        .expect("send command should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
}

#[test]
fn bad_usage_exits_with_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_jhtp"))
        .args(["send", "not-an-address"])
        .output()
        .expect("send command should run");

    assert!(!output.status.success());
}
