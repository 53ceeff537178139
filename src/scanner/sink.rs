use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// An open port discovered on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanResult {
    /// The probed host.
    pub host: Ipv4Addr,
    /// The port that accepted the connection.
    pub port: u16,
}

impl ScanResult {
    /// Creates a result for `host:port`.
    pub const fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    /// The result as a socket address.
    pub fn socket(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

impl From<SocketAddrV4> for ScanResult {
    fn from(socket: SocketAddrV4) -> Self {
        Self::new(*socket.ip(), socket.port())
    }
}

/// Receives scan events.
///
/// The scanner drives a sink from a single task and holds `&mut` for each
/// call, so implementations need no synchronisation of their own.
///
/// Any `FnMut(ScanResult)` closure is a sink that only cares about open
/// ports.
pub trait ResultSink {
    /// Called before the first probe of `host` is sent.
    fn host_started(&mut self, _host: Ipv4Addr) {}

    /// Called once per probe that completed the TCP handshake.
    fn open_port(&mut self, result: ScanResult);

    /// Called after every probe of `host` has finished.
    fn host_finished(&mut self, _host: Ipv4Addr) {}
}

impl<F> ResultSink for F
where
    F: FnMut(ScanResult),
{
    fn open_port(&mut self, result: ScanResult) {
        self(result);
    }
}
