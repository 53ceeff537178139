//! Provides functions to expand host specifications into IPv4 addresses.
//!
//! A host token is one of:
//!
//! - a CIDR block, `10.0.0.0/24`
//! - a last-octet range, `192.168.1.10-20`
//! - an IPv4 literal, `192.168.1.5`
//! - a hostname, `example.com`
//!
//! Only hostnames touch the network. Everything else is expanded locally.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use cidr_utils::cidr::Ipv4Inet;
use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use itertools::Itertools;
use log::{debug, info};
use tokio::sync::OnceCell;
use tokio::{fs, io};

use crate::error::{Result, ScanError};

/// Parses the host tokens into the addresses to scan.
///
/// Tokens are expanded left to right and the expansions concatenated.
/// Duplicates are kept. The first malformed or unresolvable token aborts
/// the whole call.
///
/// ```rust
/// # use std::net::Ipv4Addr;
/// # use portscout::address::parse_addresses;
/// # #[tokio::main]
/// # async fn main() {
/// let tokens = vec!["10.0.0.1-3".to_owned()];
/// let hosts = parse_addresses(&tokens, None).await.unwrap();
///
/// assert_eq!(
///     hosts,
///     [
///         Ipv4Addr::new(10, 0, 0, 1),
///         Ipv4Addr::new(10, 0, 0, 2),
///         Ipv4Addr::new(10, 0, 0, 3),
///     ]
/// );
/// # }
/// ```
pub async fn parse_addresses<S: AsRef<str>>(
    tokens: &[S],
    resolver: Option<&str>,
) -> Result<Vec<Ipv4Addr>> {
    if tokens.is_empty() {
        return Err(ScanError::MissingHostSpec);
    }

    // Only built once a hostname shows up.
    let backup_resolver = OnceCell::new();
    let mut hosts = Vec::new();

    for token in tokens {
        let token = token.as_ref().trim();
        match parse_address(token)? {
            Some(addresses) => hosts.extend(addresses),
            None => {
                let dns = backup_resolver
                    .get_or_init(|| get_resolver(resolver))
                    .await;
                hosts.push(resolve_host(token, dns).await?);
            }
        }
    }

    info!("{} host(s) parsed from {} token(s)", hosts.len(), tokens.len());
    Ok(hosts)
}

/// Expands a token that needs no name resolution.
///
/// Returns `Ok(None)` when the token should be treated as a hostname.
///
/// ```rust
/// # use std::net::Ipv4Addr;
/// # use portscout::address::parse_address;
/// let hosts = parse_address("192.168.0.0/30").unwrap().unwrap();
/// assert_eq!(hosts, [Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(192, 168, 0, 2)]);
///
/// assert!(parse_address("example.com").unwrap().is_none());
/// ```
pub fn parse_address(token: &str) -> Result<Option<Vec<Ipv4Addr>>> {
    if token.is_empty() {
        return Err(ScanError::host(token, "empty host"));
    }
    if token.contains('/') {
        return parse_cidr(token).map(Some);
    }
    if token.contains('-') {
        return parse_range(token).map(Some);
    }

    match IpAddr::from_str(token) {
        Ok(IpAddr::V4(ip)) => Ok(Some(vec![ip])),
        Ok(IpAddr::V6(_)) => Err(ScanError::host(token, "only IPv4 hosts can be scanned")),
        Err(_) => Ok(None),
    }
}

/// Every usable host of the block, in ascending order.
///
/// Host bits in the address are ignored, so `10.0.0.7/24` is `10.0.0.0/24`.
/// A /31 has no network or broadcast address and yields both addresses, a
/// /32 yields the single address.
fn parse_cidr(token: &str) -> Result<Vec<Ipv4Addr>> {
    let Some((address, prefix)) = token.split('/').collect_tuple() else {
        return Err(ScanError::host(token, "expected the form A.B.C.D/N"));
    };

    // The address must be a full dotted quad, `10.0.0/24` is not a block.
    let address = Ipv4Addr::from_str(address)
        .map_err(|_| ScanError::host(token, format!("'{address}' is not an IPv4 address")))?;
    let prefix = parse_prefix(prefix).ok_or_else(|| {
        ScanError::host(token, format!("'{prefix}' is not a prefix length between 0 and 32"))
    })?;

    let inet = Ipv4Inet::new(address, prefix).map_err(|e| ScanError::host(token, e.to_string()))?;
    let network = inet.network();

    let first = u32::from(network.first_address());
    let last = u32::from(network.last_address());
    let (start, end) = match network.network_length() {
        31 | 32 => (first, last),
        _ => (first + 1, last - 1),
    };

    debug!("CIDR {token} expands to {} host(s)", end - start + 1);
    Ok((start..=end).map(Ipv4Addr::from).collect())
}

/// Plain decimal digits only: no sign, no zero padding.
fn parse_prefix(prefix: &str) -> Option<u8> {
    let digits_only = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (prefix.len() > 1 && prefix.starts_with('0')) {
        return None;
    }

    prefix.parse::<u8>().ok().filter(|&length| length <= 32)
}

/// `A.B.C.D-E`: the first three octets are fixed and the last one runs
/// from D to E inclusive.
fn parse_range(token: &str) -> Result<Vec<Ipv4Addr>> {
    let Some((base, end)) = token.split('-').collect_tuple() else {
        return Err(ScanError::host(token, "expected the form A.B.C.D-E"));
    };
    let Some((a, b, c, start)) = base.split('.').collect_tuple() else {
        return Err(ScanError::host(token, "range start must be a dotted quad"));
    };

    let octet = |text: &str| {
        text.parse::<u8>()
            .map_err(|_| ScanError::host(token, format!("'{text}' is not a valid octet")))
    };
    let (a, b, c) = (octet(a)?, octet(b)?, octet(c)?);
    let (start, end) = (octet(start)?, octet(end)?);

    if end < start {
        return Err(ScanError::host(
            token,
            format!("range end {end} is lower than range start {start}"),
        ));
    }

    Ok((start..=end).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
}

/// Uses DNS to get the first IPv4 address of a host.
///
/// The system resolver is asked first, the backup resolver second.
async fn resolve_host(host: &str, backup_resolver: &TokioAsyncResolver) -> Result<Ipv4Addr> {
    if let Ok(addrs) = tokio::net::lookup_host((host, 80)).await {
        if let Some(ip) = first_ipv4(addrs.map(|addr| addr.ip())) {
            debug!("{host} resolved to {ip} by the system resolver");
            return Ok(ip);
        }
    }

    if let Ok(lookup) = backup_resolver.lookup_ip(host).await {
        if let Some(ip) = first_ipv4(lookup.iter()) {
            debug!("{host} resolved to {ip} by the backup resolver");
            return Ok(ip);
        }
    }

    Err(ScanError::NameResolution(host.to_owned()))
}

fn first_ipv4(addrs: impl Iterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs
        .filter_map(|ip| match ip {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
}

/// Derive a DNS resolver.
///
/// 1. if the `resolver` parameter has been set:
///     1. assume the parameter is a path and attempt to read IPs.
///     2. parse the input as a comma-separated list of IPs.
/// 2. if `resolver` is not set:
///    1. attempt to derive a resolver from the system config. (e.g.
///       `/etc/resolv.conf` on *nix).
///    2. finally, build a CloudFlare-based resolver.
async fn get_resolver(resolver: Option<&str>) -> TokioAsyncResolver {
    match resolver {
        Some(r) => {
            let mut config = ResolverConfig::new();
            let resolver_ips = match read_resolver_from_file(r).await {
                Ok(ips) => ips,
                Err(_) => r
                    .split(',')
                    .filter_map(|r| IpAddr::from_str(r.trim()).ok())
                    .collect::<Vec<_>>(),
            };
            for ip in resolver_ips {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(ip, 53),
                    Protocol::Udp,
                ));
            }
            TokioAsyncResolver::tokio(config, ResolverOpts::default())
        }
        None => TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(ResolverConfig::cloudflare_tls(), ResolverOpts::default())
        }),
    }
}

/// Parses a file of DNS server IPs, one per line.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::{parse_address, parse_addresses, parse_prefix, read_resolver_from_file};
    use crate::error::ScanError;
    use parameterized::parameterized;
    use std::net::{IpAddr, Ipv4Addr};

    fn tokens(input: &[&str]) -> Vec<String> {
        input.iter().map(|&t| t.to_owned()).collect()
    }

    #[tokio::test]
    async fn parse_correct_addresses() {
        let ips = parse_addresses(&tokens(&["127.0.0.1", "192.168.0.0/30"]), None)
            .await
            .unwrap();

        assert_eq!(
            ips,
            [
                Ipv4Addr::new(127, 0, 0, 1),
                Ipv4Addr::new(192, 168, 0, 1),
                Ipv4Addr::new(192, 168, 0, 2),
            ]
        );
    }

    #[tokio::test]
    async fn duplicates_across_tokens_are_kept() {
        let ips = parse_addresses(&tokens(&["10.0.0.1-2", "10.0.0.2", "10.0.0.1/32"]), None)
            .await
            .unwrap();

        assert_eq!(
            ips,
            [
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 1),
            ]
        );
    }

    #[tokio::test]
    async fn resolving_twice_gives_the_same_hosts() {
        let input = tokens(&["10.1.1.0/29", "10.2.2.5-9", "172.16.0.1"]);
        let first = parse_addresses(&input, None).await.unwrap();
        let second = parse_addresses(&input, None).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn parse_localhost() {
        let ips = parse_addresses(&tokens(&["localhost"]), None).await.unwrap();

        assert_eq!(ips.len(), 1);
        assert!(ips[0].is_loopback());
    }

    #[tokio::test]
    async fn unresolvable_host_aborts() {
        let result = parse_addresses(&tokens(&["127.0.0.1", "im_wrong.invalid"]), None).await;

        assert!(matches!(result, Err(ScanError::NameResolution(host)) if host == "im_wrong.invalid"));
    }

    #[tokio::test]
    async fn malformed_token_aborts_before_later_tokens() {
        let result = parse_addresses(&tokens(&["10.0.0.9-1", "localhost"]), None).await;

        assert!(matches!(result, Err(ScanError::InvalidHostSpec { .. })));
    }

    #[tokio::test]
    async fn no_tokens_is_an_error() {
        let result = parse_addresses::<String>(&[], None).await;

        assert!(matches!(result, Err(ScanError::MissingHostSpec)));
    }

    #[parameterized(prefix = { 30, 29, 28, 26, 24, 22, 20 })]
    fn cidr_excludes_network_and_broadcast(prefix: u32) {
        let token = format!("10.20.0.0/{prefix}");
        let ips = parse_address(&token).unwrap().unwrap();

        let network = u32::from(Ipv4Addr::new(10, 20, 0, 0));
        let broadcast = network + (1 << (32 - prefix)) - 1;

        assert_eq!(ips.len(), (1 << (32 - prefix)) - 2);
        assert!(ips.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ips
            .iter()
            .map(|&ip| u32::from(ip))
            .all(|ip| network < ip && ip < broadcast));
    }

    #[test]
    fn cidr_ignores_host_bits() {
        let ips = parse_address("192.168.7.77/30").unwrap().unwrap();

        assert_eq!(
            ips,
            [Ipv4Addr::new(192, 168, 7, 77), Ipv4Addr::new(192, 168, 7, 78)]
        );
    }

    #[test]
    fn cidr_point_to_point_and_host_route() {
        let pair = parse_address("10.0.0.4/31").unwrap().unwrap();
        let single = parse_address("10.0.0.4/32").unwrap().unwrap();

        assert_eq!(pair, [Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(10, 0, 0, 5)]);
        assert_eq!(single, [Ipv4Addr::new(10, 0, 0, 4)]);
    }

    #[parameterized(token = { "10.0.0.0/24", "10.0.0.0/9", "10.0.0.0/0" }, length = { 24, 9, 0 })]
    fn prefix_lengths_are_plain_decimals(token: &str, length: u8) {
        let prefix = token.split('/').nth(1).unwrap();

        assert_eq!(super::parse_prefix(prefix), Some(length));
    }

    #[test]
    fn short_form_block_is_not_expanded() {
        let result = parse_address("10.0.0/24");

        assert!(matches!(
            result,
            Err(ScanError::InvalidHostSpec { token, reason }) if token == "10.0.0/24" && reason.contains("'10.0.0'")
        ));
    }

    #[test]
    fn range_expands_last_octet() {
        let ips = parse_address("192.168.1.10-13").unwrap().unwrap();

        assert_eq!(
            ips,
            (10..=13)
                .map(|d| Ipv4Addr::new(192, 168, 1, d))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn range_with_equal_bounds_is_a_single_host() {
        let ips = parse_address("10.0.0.5-5").unwrap().unwrap();

        assert_eq!(ips, [Ipv4Addr::new(10, 0, 0, 5)]);
    }

    #[test]
    fn single_ip_is_returned_as_is() {
        let ips = parse_address("8.8.4.4").unwrap().unwrap();

        assert_eq!(ips, [Ipv4Addr::new(8, 8, 4, 4)]);
    }

    #[parameterized(token = {
        "10.0.0.0/33",
        "10.0.0/24",
        "10/8",
        "10.0.0.0.0/24",
        "010.0.0.0/24",
        "10.0.0.0/030",
        "10.0.0.0/+24",
        "10.0.0.0/24/8",
        "10.0.0.0/ 24",
        "10.0.0.0/",
        "abc/24",
        "10.0.0.9-1",
        "10.0.0-5",
        "10.0.0.1-2-3",
        "10.0.0.a-5",
        "10.0.0.1-b",
        "10.0.0.1-256",
        "300.0.0.1-5",
        "::1",
        "",
    })]
    fn malformed_hosts_are_rejected(token: &str) {
        let result = parse_address(token);

        assert!(matches!(result, Err(ScanError::InvalidHostSpec { .. })), "{token}");
    }

    #[test]
    fn hostnames_are_left_for_resolution() {
        assert!(parse_address("example.com").unwrap().is_none());
        assert!(parse_address("localhost").unwrap().is_none());
    }

    #[tokio::test]
    async fn resolver_file_is_parsed() {
        let ips = read_resolver_from_file("fixtures/resolvers.txt").await.unwrap();

        assert_eq!(
            ips,
            [
                "1.1.1.1".parse::<IpAddr>().unwrap(),
                "8.8.8.8".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_resolver_file_is_an_error() {
        assert!(read_resolver_from_file("fixtures/no_such_file.txt").await.is_err());
    }
}
