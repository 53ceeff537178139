//! This crate exposes the internal functionality of the portscout TCP
//! connect scanner.
//!
//! ## Architecture Overview
//!
//! A scan runs in two phases:
//!
//! 1. **Resolution**: host tokens are expanded by
//!    [`address::parse_addresses`] and port tokens by
//!    [`ports::PortSource`]. Any malformed token aborts the run here,
//!    before a single packet is sent.
//! 2. **Scanning**: [`Scanner`](crate::scanner::Scanner) walks the hosts one
//!    at a time and probes the ports of each host through a bounded pool of
//!    concurrent connects. Every completed handshake is handed to a
//!    [`ResultSink`](crate::scanner::ResultSink).
//!
//! Closed, filtered and unreachable ports are not errors and are never
//! reported.
//!
//! ## Basic Usage Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use portscout::address::parse_addresses;
//! use portscout::ports::PortSource;
//! use portscout::scanner::{ScanResult, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hosts = parse_addresses(&["127.0.0.1"], None).await?;
//!     let ports = PortSource::pick(Some(vec!["1-1000".to_owned()]), None)?.resolve()?;
//!
//!     let scanner = Scanner::new(&hosts, &ports, Duration::from_millis(200)).with_workers(16);
//!     scanner
//!         .run(&mut |result: ScanResult| println!("Open {}", result.socket()))
//!         .await;
//!
//!     Ok(())
//! }
//! ```
#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]

pub mod tui;

pub mod error;

pub mod input;

pub mod address;

pub mod ports;

pub mod scanner;
