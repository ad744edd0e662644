//! Delegation resolver: NS sets for root, registry and domain, plus the
//! address lookup that turns the first usable NS hostname into a target
//! for the next level.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tracing::{debug, warn};
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::options::CheckOptions;
use crate::query::{Lookup, QueryError, fqdn};

pub const DNS_PORT: u16 = 53;

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("no nameservers found for '{zone}': {source}")]
    Query {
        zone: String,
        #[source]
        source: QueryError,
    },
    #[error("no nameservers found for '{zone}'")]
    Empty { zone: String },
}

impl DelegationError {
    pub fn zone(&self) -> &str {
        match self {
            Self::Query { zone, .. } | Self::Empty { zone } => zone,
        }
    }
}

/// NS hostnames for `zone`, asked of `server`.
///
/// Answer-section NS records are used when present. With `follow_referrals`
/// an answer-less referral counts too: an authority NS set owned by `zone`
/// is the answer, and one owned by a closer ancestor (`uk` when asking the
/// root for `co.uk`) sends the same question to the first of its servers
/// that `resolver` can place. Each hop must go at least one label deeper,
/// so the walk ends after `zone`'s label count. Zero hostnames is an error.
pub fn resolve_ns<L: Lookup + ?Sized, H: HostResolver + ?Sized>(
    lookup: &L,
    resolver: &H,
    zone: &str,
    server: SocketAddr,
    follow_referrals: bool,
) -> Result<Vec<String>, DelegationError> {
    let query_error = |source: QueryError| DelegationError::Query {
        zone: zone.to_string(),
        source,
    };
    let target = fqdn(zone).map_err(query_error)?;

    let mut server = server;
    let mut depth = 0u8;
    for _ in 0..=target.num_labels() {
        let response = lookup
            .lookup(zone, RecordType::NS, server)
            .map_err(query_error)?;

        let hosts = ns_hosts(response.answers(), None);
        if !hosts.is_empty() {
            return Ok(hosts);
        }
        if !follow_referrals {
            break;
        }

        let Some(owner) = closest_referral(response.name_servers(), &target) else {
            break;
        };
        let hosts = ns_hosts(response.name_servers(), Some(&owner));
        if owner == target {
            debug!(%zone, %server, count = hosts.len(), "nameservers taken from referral");
            return Ok(hosts);
        }
        if owner.num_labels() <= depth {
            debug!(%zone, %server, %owner, "referral makes no progress");
            break;
        }
        depth = owner.num_labels();

        let Some((host, next)) = first_address(resolver, &hosts) else {
            break;
        };
        debug!(%zone, %owner, %host, %next, "following referral");
        server = next;
    }

    Err(DelegationError::Empty {
        zone: zone.to_string(),
    })
}

/// Deepest authority NS owner that is `target` or one of its ancestors.
fn closest_referral(records: &[Record], target: &Name) -> Option<Name> {
    records
        .iter()
        .filter(|record| record.record_type() == RecordType::NS && record.name().zone_of(target))
        .map(Record::name)
        .max_by_key(|name| name.num_labels())
        .cloned()
}

fn ns_hosts(records: &[Record], owner: Option<&Name>) -> Vec<String> {
    records
        .iter()
        .filter(|record| owner.is_none_or(|owner| record.name() == owner))
        .filter_map(|record| match record.data() {
            Some(RData::NS(ns)) => Some(normalize_host(&ns.0.to_ascii())),
            _ => None,
        })
        .collect()
}

pub(crate) fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Address lookup for nameserver hostnames.
pub trait HostResolver {
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

impl HostResolver for Resolver {
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match self.lookup_ip(host) {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

impl<H: HostResolver + ?Sized> HostResolver for &H {
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        (**self).resolve_host(host)
    }
}

/// A resolver that asks the bootstrap server (UDP, then TCP) and nothing
/// else, with the check's timeout and a single attempt.
pub fn bootstrap_resolver(options: &CheckOptions) -> Result<Resolver, std::io::Error> {
    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(options.resolver, Protocol::Udp));
    config.add_name_server(NameServerConfig::new(options.resolver, Protocol::Tcp));

    let mut opts = ResolverOpts::default();
    opts.timeout = options.timeout();
    opts.attempts = 1;
    Resolver::new(config, opts)
}

/// First hostname, in order, that resolves; paired with its first address
/// on port 53.
pub fn first_address<H: HostResolver + ?Sized>(
    resolver: &H,
    hosts: &[String],
) -> Option<(String, SocketAddr)> {
    for host in hosts {
        match resolver.resolve_host(host) {
            Ok(addrs) => {
                if let Some(ip) = addrs.first() {
                    return Some((host.clone(), SocketAddr::new(*ip, DNS_PORT)));
                }
                debug!(%host, "nameserver has no address");
            }
            Err(err) => warn!(%host, error = %err, "nameserver address lookup failed"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::{IpAddr, SocketAddr};
    use std::time::Duration;

    use trust_dns_proto::rr::RecordType;
    use trust_dns_resolver::error::ResolveError;

    use super::{DelegationError, HostResolver, first_address, normalize_host, resolve_ns};
    use crate::query::QueryClient;
    use crate::query::stub::{Reply, StubExchange, ns_record};

    fn server() -> SocketAddr {
        "198.51.100.1:53".parse().expect("addr")
    }

    fn client(stub: &StubExchange) -> QueryClient<&StubExchange> {
        QueryClient::with_exchange(stub, Duration::from_millis(50))
    }

    fn no_hosts() -> StubHosts {
        StubHosts(HashMap::new())
    }

    #[test]
    fn answer_section_ns_records_are_returned_in_order() {
        let stub = StubExchange::new().route(
            server(),
            ".",
            RecordType::NS,
            Reply::answers(vec![
                ns_record(".", "A.ROOT-SERVERS.NET."),
                ns_record(".", "b.root-servers.net."),
            ]),
        );

        let hosts = resolve_ns(&client(&stub), &no_hosts(), ".", server(), true).expect("root ns");
        assert_eq!(hosts, vec!["a.root-servers.net", "b.root-servers.net"]);
    }

    #[test]
    fn referral_is_followed_only_for_the_queried_zone() {
        let stub = StubExchange::new().route(
            server(),
            "com",
            RecordType::NS,
            Reply::referral(vec![
                ns_record("com", "a.gtld-servers.net"),
                ns_record("net", "a.gtld-servers.net"),
            ]),
        );

        let hosts = resolve_ns(&client(&stub), &no_hosts(), "com", server(), true).expect("referral");
        assert_eq!(hosts, vec!["a.gtld-servers.net"]);
    }

    #[test]
    fn referral_is_ignored_in_answers_only_mode() {
        let stub = StubExchange::new().route(
            server(),
            "com",
            RecordType::NS,
            Reply::referral(vec![ns_record("com", "a.gtld-servers.net")]),
        );

        let err = resolve_ns(&client(&stub), &no_hosts(), "com", server(), false).expect_err("no answers");
        assert!(matches!(err, DelegationError::Empty { .. }));
        assert_eq!(err.zone(), "com");
    }

    #[test]
    fn query_failure_is_no_nameservers() {
        let stub = StubExchange::new();
        let err = resolve_ns(&client(&stub), &no_hosts(), "example.com", server(), true)
            .expect_err("timeout");
        assert!(matches!(err, DelegationError::Query { .. }));
    }

    struct StubHosts(HashMap<&'static str, Vec<IpAddr>>);

    impl HostResolver for StubHosts {
        fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
            self.0
                .get(host)
                .cloned()
                .ok_or_else(|| ResolveError::from("unknown host"))
        }
    }

    #[test]
    fn ancestor_referral_is_followed_to_the_next_server() {
        let uk_server: SocketAddr = "156.154.100.3:53".parse().expect("addr");
        let stub = StubExchange::new()
            .route(
                server(),
                "co.uk",
                RecordType::NS,
                Reply::referral(vec![
                    ns_record("uk", "nsa.nic.uk"),
                    ns_record("uk", "nsb.nic.uk"),
                ]),
            )
            .route(
                uk_server,
                "co.uk",
                RecordType::NS,
                Reply::answers(vec![ns_record("co.uk", "dns1.nic.uk")]),
            );
        let mut map = HashMap::new();
        map.insert("nsa.nic.uk", vec![uk_server.ip()]);

        let hosts = resolve_ns(&client(&stub), &StubHosts(map), "co.uk", server(), true)
            .expect("descends to uk");
        assert_eq!(hosts, vec!["dns1.nic.uk"]);
        assert_eq!(stub.calls(RecordType::NS), 2);
    }

    #[test]
    fn ancestor_referral_needs_follow_referrals() {
        let stub = StubExchange::new().route(
            server(),
            "co.uk",
            RecordType::NS,
            Reply::referral(vec![ns_record("uk", "nsa.nic.uk")]),
        );
        let err = resolve_ns(&client(&stub), &no_hosts(), "co.uk", server(), false)
            .expect_err("answers only");
        assert!(matches!(err, DelegationError::Empty { .. }));
        assert_eq!(stub.calls(RecordType::NS), 1);
    }

    #[test]
    fn referral_loop_stops_without_progress() {
        // the uk server refers back to uk instead of answering
        let uk_server: SocketAddr = "156.154.100.3:53".parse().expect("addr");
        let referral = || Reply::referral(vec![ns_record("uk", "nsa.nic.uk")]);
        let stub = StubExchange::new()
            .route(server(), "example.co.uk", RecordType::NS, referral())
            .route(uk_server, "example.co.uk", RecordType::NS, referral());
        let mut map = HashMap::new();
        map.insert("nsa.nic.uk", vec![uk_server.ip()]);

        let err = resolve_ns(&client(&stub), &StubHosts(map), "example.co.uk", server(), true)
            .expect_err("no progress");
        assert!(matches!(err, DelegationError::Empty { .. }));
        assert_eq!(stub.calls(RecordType::NS), 2);
    }

    #[test]
    fn unreachable_referral_servers_end_the_walk() {
        let stub = StubExchange::new().route(
            server(),
            "co.uk",
            RecordType::NS,
            Reply::referral(vec![ns_record("uk", "nsa.nic.uk")]),
        );
        let err = resolve_ns(&client(&stub), &no_hosts(), "co.uk", server(), true)
            .expect_err("no address");
        assert!(matches!(err, DelegationError::Empty { .. }));
    }

    #[test]
    fn first_address_skips_unresolvable_hosts() {
        let mut map = HashMap::new();
        map.insert("ns2.example.net", vec!["203.0.113.2".parse().expect("ip")]);
        map.insert("ns3.example.net", Vec::new());
        let hosts = StubHosts(map);

        let names = vec![
            "ns1.example.net".to_string(),
            "ns3.example.net".to_string(),
            "ns2.example.net".to_string(),
        ];
        let (host, addr) = first_address(&hosts, &names).expect("one resolves");
        assert_eq!(host, "ns2.example.net");
        assert_eq!(addr, "203.0.113.2:53".parse::<SocketAddr>().expect("addr"));
    }

    #[test]
    fn normalize_host_trims_dot_and_lowercases() {
        assert_eq!(normalize_host("NS1.Example.NET."), "ns1.example.net");
    }
}
