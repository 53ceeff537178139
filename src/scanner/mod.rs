//! Core functionality for actual scanning behaviour.
//!
//! Hosts are scanned one after another. The ports of the current host are
//! probed concurrently, at most `workers` at a time, and every probe of a
//! host finishes before the next host starts.
mod sink;
pub use sink::{ResultSink, ScanResult};

use std::{
    collections::HashSet,
    net::{Ipv4Addr, SocketAddrV4},
    num::NonZero,
    time::Duration,
};

use futures::{stream, StreamExt};
use log::{debug, warn};
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// Number of probes in flight when the caller does not pick one.
pub const DEFAULT_WORKERS: usize = 8;

/// Distinct probe errors kept per host for the debug log.
const MAX_RECORDED_ERRORS: usize = 1000;

#[derive(Debug)]
struct ScannerConnector {
    timeout: Duration,
}

impl ScannerConnector {
    /// Probes a socket exactly once.
    ///
    /// `Ok` means the handshake completed within the timeout and the port is
    /// open. Refusals, timeouts and unreachable hosts all come back as `Err`
    /// with the host appended to the message.
    async fn scan_socket(&self, socket: SocketAddrV4) -> io::Result<SocketAddrV4> {
        match self.connect(socket).await {
            Ok(tcp_stream) => {
                debug!("Connection was successful, shutting down stream {socket}");
                if let Err(e) = { tcp_stream }.shutdown().await {
                    debug!("Shutdown stream error {e}");
                }
                Ok(socket)
            }
            Err(e) => {
                let error_string = e.to_string();
                if error_string.to_lowercase().contains("too many open files") {
                    warn!("Too many open files while probing {socket}. Lower --workers or raise --ulimit.");
                }
                Err(io::Error::new(e.kind(), format!("{error_string} {}", socket.ip())))
            }
        }
    }

    /// Performs the connection to the socket with timeout.
    async fn connect(&self, socket: SocketAddrV4) -> io::Result<TcpStream> {
        time::timeout(self.timeout, TcpStream::connect(socket)).await?
    }
}

/// The TCP connect scanner.
///
/// ```rust
/// # use std::{net::Ipv4Addr, time::Duration};
/// # use portscout::scanner::{ScanResult, Scanner};
/// # #[tokio::main]
/// # async fn main() {
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
/// let port = listener.local_addr().unwrap().port();
///
/// let scanner = Scanner::new(&[Ipv4Addr::LOCALHOST], &[port], Duration::from_secs(1));
/// let mut open = Vec::new();
/// scanner.run(&mut |result: ScanResult| open.push(result)).await;
///
/// assert_eq!(open, [ScanResult::new(Ipv4Addr::LOCALHOST, port)]);
/// # }
/// ```
#[derive(Debug)]
pub struct Scanner {
    hosts: Box<[Ipv4Addr]>,
    ports: Box<[u16]>,
    workers: NonZero<usize>,
    connector: ScannerConnector,
}

impl Scanner {
    /// Creates a scanner with the default worker count.
    pub fn new(hosts: &[Ipv4Addr], ports: &[u16], timeout: Duration) -> Self {
        Self {
            hosts: Box::from(hosts),
            ports: Box::from(ports),
            workers: NonZero::new(DEFAULT_WORKERS).unwrap_or(NonZero::<usize>::MIN),
            connector: ScannerConnector { timeout },
        }
    }

    /// Sets how many probes may be in flight at once. Zero is corrected to one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = NonZero::new(workers).unwrap_or(NonZero::<usize>::MIN);
        self
    }

    /// How many probes may be in flight at once.
    pub const fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Probes every (host, port) pair and reports open ports to `sink`.
    ///
    /// Returns once the last host's probes have finished. Probe failures
    /// are not reported.
    pub async fn run<S: ResultSink + ?Sized>(&self, sink: &mut S) {
        debug!(
            "Start scanning sockets. \nWorkers {}\nNumber of hosts {}\nNumber of ports {}\nTargets all together {} ",
            self.workers,
            self.hosts.len(),
            self.ports.len(),
            self.hosts.len() * self.ports.len()
        );

        for &host in &*self.hosts {
            self.scan_host(host, sink).await;
        }
    }

    async fn scan_host<S: ResultSink + ?Sized>(&self, host: Ipv4Addr, sink: &mut S) {
        sink.host_started(host);

        let connector = &self.connector;
        let mut probes = stream::iter(self.ports.iter().copied())
            .map(move |port| connector.scan_socket(SocketAddrV4::new(host, port)))
            .buffer_unordered(self.workers.get());

        let mut open = 0_usize;
        let mut errors: HashSet<String> = HashSet::new();
        while let Some(result) = probes.next().await {
            match result {
                Ok(socket) => {
                    open += 1;
                    sink.open_port(ScanResult::from(socket));
                }
                Err(err) => {
                    if errors.len() < MAX_RECORDED_ERRORS {
                        errors.insert(err.to_string());
                    }
                }
            }
        }

        debug!("Typical socket connection errors for {host}: {errors:?}");
        debug!("Open ports found on {host}: {open}");
        sink.host_finished(host);
    }
}
