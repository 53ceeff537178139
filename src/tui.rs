//! Utilities for terminal output during scanning.
//!
//! The macros take optional `greppable` and `accessible` flags: greppable
//! mode silences them, accessible mode drops the coloured symbols.
use std::net::Ipv4Addr;

use colored::Colorize;
use itertools::Itertools;

use crate::input::Opts;
use crate::scanner::{ResultSink, ScanResult};

/// Prints a red `[!]` line.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", ::colored::Colorize::bold(::colored::Colorize::red("[!]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::red("[!]")),
                    $name
                );
            }
        }
    };
}

/// Prints a blue `[~]` line.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", ::colored::Colorize::bold(::colored::Colorize::blue("[~]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::blue("[~]")),
                    $name
                );
            }
        }
    };
}

/// Prints a green `[+]` line.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!("{} {}", ::colored::Colorize::bold(::colored::Colorize::green("[+]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("[+] {}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::green("[+]")),
                    $name
                );
            }
        }
    };
}

const RULE_WIDTH: usize = 30;

/// Prints the opening banner and the settings of this run.
#[cfg(not(tarpaulin_include))]
pub fn print_opening(opts: &Opts) {
    let banner = r"
 ___  ___  ___ _____ ___  ___ ___  _   _ _____
| _ \/ _ \| _ \_   _/ __|/ __/ _ \| | | |_   _|
|  _/ (_) |   / | | \__ \ (_| (_) | |_| | | |
|_|  \___/|_|_\ |_| |___/\___\___/ \___/  |_|";
    println!("{}", banner.cyan());
    println!("{}", "Concurrent TCP connect scanning.\n".italic());

    detail!(
        format!(
            "Timeout {}s, {} worker(s).",
            opts.timeout,
            opts.workers
        ),
        opts.greppable,
        opts.accessible
    );
}

/// Prints open ports as they are found, grouped under a banner per host.
///
/// In greppable mode nothing is printed while a host is scanned; once its
/// probes are done a single `host -> [ports]` line is written if any port
/// was open.
#[derive(Debug, Default)]
pub struct TerminalSink {
    greppable: bool,
    accessible: bool,
    found: Vec<u16>,
}

impl TerminalSink {
    /// Creates a sink printing in the given output mode.
    pub const fn new(greppable: bool, accessible: bool) -> Self {
        Self {
            greppable,
            accessible,
            found: Vec::new(),
        }
    }

    fn rule(&self) {
        if !self.greppable {
            println!("{}", "*".repeat(RULE_WIDTH));
        }
    }
}

impl ResultSink for TerminalSink {
    fn host_started(&mut self, host: Ipv4Addr) {
        self.found.clear();
        self.rule();
        output!(
            format!("Scanning for host {host}"),
            self.greppable,
            self.accessible
        );
    }

    fn open_port(&mut self, result: ScanResult) {
        if self.greppable {
            self.found.push(result.port);
        } else if self.accessible {
            println!("[+] Port {} is open", result.port);
        } else {
            println!(
                "{} Port {} is open",
                "[+]".green().bold(),
                result.port.to_string().purple()
            );
        }
    }

    fn host_finished(&mut self, host: Ipv4Addr) {
        if self.greppable {
            if !self.found.is_empty() {
                println!("{host} -> [{}]", self.found.iter().join(","));
            }
        } else {
            self.rule();
        }
    }
}
