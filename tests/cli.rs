//! Runs the built binary the way a user would.
use std::io::Read;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

const TIMEOUT: Duration = Duration::from_secs(60);

struct Output {
    success: bool,
    code: Option<i32>,
    stdout: String,
}

fn portscout(args: &[&str]) -> Output {
    portscout_in(Path::new(env!("CARGO_MANIFEST_DIR")), args)
}

fn portscout_in(dir: &Path, args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_portscout"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let Some(status) = child.wait_timeout(TIMEOUT).unwrap() else {
        child.kill().unwrap();
        panic!("portscout did not finish within {TIMEOUT:?}");
    };

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut stdout)
        .unwrap();

    Output {
        success: status.success(),
        code: status.code(),
        stdout,
    }
}

fn loopback_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    (listener, port)
}

#[test]
fn help_runs() {
    assert!(portscout(&["--help"]).success);
}

#[test]
fn greppable_scan_lists_open_ports() {
    let (_listener, port) = loopback_listener();

    let output = portscout(&["-n", "-g", "-a", "127.0.0.1", "-p", &port, "-t", "1"]);

    assert!(output.success);
    assert_eq!(output.stdout.trim(), format!("127.0.0.1 -> [{port}]"));
}

#[test]
fn accessible_scan_prints_each_open_port() {
    let (_listener, port) = loopback_listener();

    let output = portscout(&["-n", "--accessible", "-a", "127.0.0.1", "-p", &port]);

    assert!(output.success);
    assert!(output.stdout.contains("[+] Scanning for host 127.0.0.1"));
    assert!(output.stdout.contains(&format!("[+] Port {port} is open")));
    assert!(output.stdout.contains("Scan complete"));
}

#[test]
fn ports_file_is_used() {
    let output = portscout(&[
        "-n",
        "-g",
        "-a",
        "127.0.0.1",
        "--ports-file",
        "fixtures/ports.txt",
        "-t",
        "0.2",
    ]);

    assert!(output.success);
}

#[test]
fn default_ports_file_is_used() {
    let output = portscout(&["-n", "-g", "-a", "127.0.0.1", "-t", "0.2", "-w", "64"]);

    assert!(output.success);
}

#[test]
fn built_in_ports_are_used_outside_the_repository() {
    let output = portscout_in(
        &std::env::temp_dir(),
        &["-n", "-g", "-a", "127.0.0.1", "-t", "0.2", "-w", "64"],
    );

    assert!(output.success);
}

#[test]
fn out_of_range_timeout_is_rejected_without_panicking() {
    let output = portscout(&["-n", "-g", "-a", "127.0.0.1", "-p", "80", "-t", "1e20"]);

    assert!(!output.success);
    // clap usage errors exit with 2, a panic would exit with 101.
    assert_eq!(output.code, Some(2));
}

#[test]
fn invalid_host_aborts_before_scanning() {
    let output = portscout(&["-n", "--accessible", "-a", "10.0.0.9-1", "-p", "80"]);

    assert!(!output.success);
    assert!(output.stdout.contains("Invalid host specification '10.0.0.9-1'"));
    assert!(!output.stdout.contains("Scanning for host"));
}

#[test]
fn invalid_port_aborts_before_scanning() {
    let output = portscout(&["-n", "--accessible", "-a", "127.0.0.1", "-p", "1-70000"]);

    assert!(!output.success);
    assert!(output.stdout.contains("Invalid port specification '1-70000'"));
    assert!(!output.stdout.contains("Scanning for host"));
}

#[test]
fn missing_ports_file_aborts() {
    let output = portscout(&[
        "-n",
        "--accessible",
        "-a",
        "127.0.0.1",
        "--ports-file",
        "fixtures/no_such_ports.txt",
    ]);

    assert!(!output.success);
    assert!(output.stdout.contains("Ports file not found"));
}

#[test]
fn no_hosts_aborts() {
    let output = portscout(&["-n", "--accessible", "-p", "80"]);

    assert!(!output.success);
    assert!(output.stdout.contains("No hosts were given"));
}
