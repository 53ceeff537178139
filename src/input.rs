//! Provides a means to read, parse and hold configuration options for scans.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::ports::PortSource;
use crate::scanner::DEFAULT_WORKERS;

/// Parses `--timeout`: a positive number of seconds, fractions allowed.
fn parse_timeout(input: &str) -> Result<f64, String> {
    let seconds: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("Invalid timeout '{input}'. Expected a number of seconds"))?;

    check_timeout(seconds)?;
    Ok(seconds)
}

/// The timeout must be positive and small enough to fit a `Duration`.
fn check_timeout(seconds: f64) -> Result<Duration, String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("Timeout must be a positive number of seconds, got '{seconds}'"));
    }

    Duration::try_from_secs_f64(seconds)
        .map_err(|e| format!("Timeout of {seconds} seconds is out of range: {e}"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "portscout",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Concurrent TCP connect port scanner.
/// Reports every port on every host that completes a TCP handshake.
pub struct Opts {
    /// Hosts to scan: IPs, hostnames, ranges (192.168.1.10-20) or CIDRs (10.0.0.0/24).
    #[arg(short, long, alias = "host", num_args = 1.., value_delimiter = ',')]
    pub addresses: Vec<String>,

    /// Ports and/or port ranges to scan. Examples: 80 443 or 1-1024 or 22,80-90
    #[arg(short, long, num_args = 1.., conflicts_with = "ports_file")]
    pub ports: Option<Vec<String>>,

    /// File holding one comma-separated list of ports or ranges per line.
    #[arg(long, value_parser)]
    pub ports_file: Option<PathBuf>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output one `host -> [ports]` line per host with open ports.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// A comma-delimited list or file of DNS resolvers.
    #[arg(long)]
    pub resolver: Option<String>,

    /// How many probes may be in flight at once.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS as u16, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// The timeout in seconds before a port is assumed to be closed.
    #[arg(short, long, default_value = "1", value_parser = parse_timeout)]
    pub timeout: f64,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Parses the command line.
    pub fn read() -> Self {
        Self::parse()
    }

    /// The per-probe timeout.
    ///
    /// Values that were never validated, such as one set directly on the
    /// struct, saturate instead of panicking.
    pub fn timeout(&self) -> Duration {
        check_timeout(self.timeout).unwrap_or(Duration::MAX)
    }

    /// The ports to scan. Falls back to the default ports when no ports
    /// were named.
    pub fn port_source(&self) -> PortSource {
        match (&self.ports, &self.ports_file) {
            (Some(ports), _) if !ports.is_empty() => PortSource::Tokens(ports.clone()),
            (_, Some(path)) => PortSource::File(path.clone()),
            _ => PortSource::Default,
        }
    }

    /// Reads the command line arguments into an Opts struct and merge
    /// values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(addresses, greppable, accessible, workers, timeout);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        // Ports from the config only apply when the command line named none.
        if self.ports.is_none() && self.ports_file.is_none() {
            if config.ports.is_some() {
                self.ports = config.ports.clone();
            } else {
                self.ports_file = config.ports_file.clone();
            }
        }

        merge_optional!(resolver, ulimit);
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            addresses: vec![],
            ports: None,
            ports_file: None,
            greppable: true,
            workers: 8,
            timeout: 1.0,
            ulimit: None,
            accessible: false,
            resolver: None,
            no_config: true,
            no_banner: false,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    addresses: Option<Vec<String>>,
    ports: Option<Vec<String>>,
    ports_file: Option<PathBuf>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    workers: Option<u16>,
    timeout: Option<f64>,
    ulimit: Option<u64>,
    resolver: Option<String>,
}

#[cfg(not(tarpaulin_include))]
#[allow(clippy::doc_link_with_quotes)]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// addresses = ["127.0.0.1", "10.0.0.0/30"]
    /// ports = ["22", "80-90"]
    /// ports_file = "data/ports.txt"
    /// greppable = true
    /// workers = 16
    /// timeout = 0.5
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, String> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).unwrap_or_default();
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(content).map_err(|e| format!("Found {e} in configuration file."))?;

        if let Some(workers) = config.workers {
            if workers == 0 {
                return Err("Found workers = 0 in configuration file.".to_owned());
            }
        }
        if let Some(timeout) = config.timeout {
            check_timeout(timeout).map_err(|e| format!("{e} in configuration file."))?;
        }

        Ok(config)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".portscout.toml");
    Some(config_path)
}
