#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use anyhow::Context;
use log::debug;
use portscout::address::parse_addresses;
use portscout::input::{Config, Opts};
use portscout::scanner::Scanner;
use portscout::tui::{print_opening, TerminalSink};
use portscout::{detail, output, warning};

use std::process;
use std::time::Instant;

/// Descriptors kept free for everything that is not a probe.
#[cfg(unix)]
const RESERVED_DESCRIPTORS: u64 = 100;

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = match Config::read(opts.config_path.clone()) {
        Ok(config) => config,
        Err(e) => {
            warning!(format!("{e}\nAborting scan."));
            process::exit(1);
        }
    };
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    if !opts.greppable && !opts.accessible && !opts.no_banner {
        print_opening(&opts);
    }

    if let Err(e) = run(&opts).await {
        warning!(format!("{e:#}"));
        process::exit(1);
    }
}

async fn run(opts: &Opts) -> anyhow::Result<()> {
    let hosts = parse_addresses(&opts.addresses, opts.resolver.as_deref())
        .await
        .context("Could not resolve the hosts to scan")?;
    let ports = opts
        .port_source()
        .resolve()
        .context("Could not resolve the ports to scan")?;

    #[cfg(unix)]
    let workers = infer_workers(opts, adjust_ulimit_size(opts));

    #[cfg(not(unix))]
    let workers = usize::from(opts.workers);

    detail!(
        format!("Scanning {} host(s) x {} port(s).", hosts.len(), ports.len()),
        opts.greppable,
        opts.accessible
    );

    let scanner = Scanner::new(&hosts, &ports, opts.timeout()).with_workers(workers);
    let mut sink = TerminalSink::new(opts.greppable, opts.accessible);

    let started = Instant::now();
    scanner.run(&mut sink).await;
    debug!("Scan took {:?}", started.elapsed());

    output!("Scan complete", opts.greppable, opts.accessible);
    Ok(())
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE.get().map_or(u64::MAX, |(soft, _)| soft)
}

/// Lowers the worker count when the open file limit cannot hold that many
/// sockets at once.
#[cfg(unix)]
fn infer_workers(opts: &Opts, ulimit: u64) -> usize {
    let requested = u64::from(opts.workers);
    let available = ulimit.saturating_sub(RESERVED_DESCRIPTORS).max(1);

    let workers = if requested > available {
        warning!(
            format!("File limit {ulimit} is too low for {requested} workers. Using {available} instead."),
            opts.greppable,
            opts.accessible
        );
        warning!(
            "Raise it with --ulimit to scan with more workers.",
            opts.greppable,
            opts.accessible
        );
        available
    } else {
        requested
    };

    usize::try_from(workers).unwrap_or(usize::MAX)
}
