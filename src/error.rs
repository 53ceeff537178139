//! Errors raised while turning host and port specifications into targets.
//!
//! All of these surface before the first probe is sent. Probe failures are
//! not errors and never appear here.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by the resolvers.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Everything that can stop a run before the first probe.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A CIDR, range or IP token could not be parsed.
    #[error("Invalid host specification '{token}': {reason}")]
    InvalidHostSpec {
        /// The offending token, as given.
        token: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A hostname did not resolve to any IPv4 address.
    #[error("Host '{0}' could not be resolved")]
    NameResolution(String),

    /// A port or port range token could not be parsed.
    #[error("Invalid port specification '{token}': {reason}")]
    InvalidPortSpec {
        /// The offending token, as given.
        token: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Neither port tokens nor a ports file were supplied.
    #[error("No ports were given. Pass --ports or --ports-file")]
    MissingPortSpec,

    /// The host token list was empty.
    #[error("No hosts were given. Pass --addresses")]
    MissingHostSpec,

    /// The ports file does not exist.
    #[error("Ports file not found: {}", .0.display())]
    PortsFileNotFound(PathBuf),

    /// The ports file exists but could not be read.
    #[error("Failed to read ports file {}: {source}", path.display())]
    PortsFileRead {
        /// Path of the ports file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub(crate) fn host(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidHostSpec {
            token: token.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn port(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPortSpec {
            token: token.to_owned(),
            reason: reason.into(),
        }
    }
}
