//! Provides functions to expand port specifications into port numbers.
//!
//! Ports come either from explicit tokens (`80`, `1-1024`, `22,80,443`)
//! or from a file holding one comma-separated token list per line.
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;

use crate::error::{Result, ScanError};

const LOWEST_PORT_NUMBER: u16 = 0;
const TOP_PORT_NUMBER: u16 = 65535;

/// Ports file used when the caller names no ports at all.
pub const DEFAULT_PORTS_FILE: &str = "data/ports.txt";

/// Copy of the default ports file built into the binary, used when the
/// file is not found relative to the working directory.
const BUILTIN_PORTS: &str = include_str!("../data/ports.txt");

/// Where the ports to scan come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSource {
    /// Explicit tokens such as `80`, `1-1024` or `22,443`.
    Tokens(Vec<String>),
    /// A ports file.
    File(PathBuf),
    /// The default ports file, or the built-in copy when it is missing.
    Default,
}

impl PortSource {
    /// Picks the port source. Tokens win when both are given.
    ///
    /// ```rust
    /// # use portscout::ports::PortSource;
    /// let source = PortSource::pick(Some(vec!["22".to_owned(), "80-82".to_owned()]), None).unwrap();
    /// assert_eq!(source.resolve().unwrap(), [22, 80, 81, 82]);
    ///
    /// assert!(PortSource::pick(None, None).is_err());
    /// ```
    pub fn pick(tokens: Option<Vec<String>>, file: Option<PathBuf>) -> Result<Self> {
        match (tokens, file) {
            (Some(tokens), _) if !tokens.is_empty() => Ok(Self::Tokens(tokens)),
            (_, Some(path)) => Ok(Self::File(path)),
            _ => Err(ScanError::MissingPortSpec),
        }
    }

    /// Expands the source into port numbers.
    pub fn resolve(&self) -> Result<Vec<u16>> {
        match self {
            Self::Tokens(tokens) => parse_ports(tokens),
            Self::File(path) => parse_ports_file(path),
            Self::Default => default_ports(),
        }
    }
}

/// Expands port tokens in order. Each token may itself be a comma list.
/// Duplicates are kept.
pub fn parse_ports<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<u16>> {
    if tokens.is_empty() {
        return Err(ScanError::MissingPortSpec);
    }

    let mut ports = Vec::new();
    for token in tokens {
        parse_port_list(token.as_ref(), &mut ports)?;
    }

    Ok(ports)
}

/// Reads a ports file, one comma-separated token list per line.
///
/// The file must exist before any line is parsed. Blank lines are skipped.
pub fn parse_ports_file(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScanError::PortsFileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ScanError::PortsFileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let ports = parse_ports_lines(&content, &path.display().to_string())?;
    debug!("Read {} port(s) from {}", ports.len(), path.display());
    Ok(ports)
}

/// Reads `data/ports.txt` when it is reachable from the working directory
/// and falls back to the copy built into the binary otherwise.
pub fn default_ports() -> Result<Vec<u16>> {
    if Path::new(DEFAULT_PORTS_FILE).exists() {
        return parse_ports_file(DEFAULT_PORTS_FILE);
    }

    debug!("{DEFAULT_PORTS_FILE} not found, using the built-in port list");
    parse_ports_lines(BUILTIN_PORTS, "built-in port list")
}

fn parse_ports_lines(content: &str, origin: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        parse_port_list(line, &mut ports)?;
    }

    if ports.is_empty() {
        return Err(ScanError::port(origin, "the ports file holds no ports"));
    }

    Ok(ports)
}

fn parse_port_list(list: &str, ports: &mut Vec<u16>) -> Result<()> {
    for part in list.split(',').map(str::trim) {
        if part.contains('-') {
            ports.extend(parse_port_range(part)?);
        } else {
            ports.push(parse_single_port(part)?);
        }
    }

    Ok(())
}

fn parse_port_range(range_str: &str) -> Result<Vec<u16>> {
    let Some((start, end)) = range_str.split('-').collect_tuple() else {
        return Err(ScanError::port(
            range_str,
            "expected 'start-end', for example 1-1000",
        ));
    };

    let start = parse_number(start, range_str)?;
    let end = parse_number(end, range_str)?;

    if end < start {
        return Err(ScanError::port(
            range_str,
            format!("start port {start} is greater than end port {end}"),
        ));
    }

    let start = check_bounds(start, range_str)?;
    let end = check_bounds(end, range_str)?;

    Ok((start..=end).collect())
}

fn parse_single_port(port_str: &str) -> Result<u16> {
    let port = parse_number(port_str, port_str)?;
    check_bounds(port, port_str)
}

fn parse_number(text: &str, token: &str) -> Result<i64> {
    text.trim()
        .parse()
        .map_err(|_| ScanError::port(token, format!("'{text}' is not a port number")))
}

fn check_bounds(port: i64, token: &str) -> Result<u16> {
    u16::try_from(port).map_err(|_| {
        ScanError::port(
            token,
            format!("port {port} must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}"),
        )
    })
}
