use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::delegation::DNS_PORT;
use super::types::DsRecord;
use crate::query::EDNS_PAYLOAD;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Which digest types the DS recomputation uses.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestPolicy {
    /// Only the digest type of the first published DS.
    #[default]
    FirstPublished,
    /// Every distinct digest type in the published set, in order of first
    /// appearance.
    AllPublished,
}

impl DigestPolicy {
    pub fn digest_types(self, published: &[DsRecord]) -> Vec<u8> {
        match self {
            Self::FirstPublished => published.iter().take(1).map(|ds| ds.digest_type).collect(),
            Self::AllPublished => {
                let mut types: Vec<u8> = Vec::new();
                for ds in published {
                    if !types.contains(&ds.digest_type) {
                        types.push(ds.digest_type);
                    }
                }
                types
            }
        }
    }
}

/// Configuration knobs for [`check_dnssec`](crate::check_dnssec).
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    /// Recursive resolver used for the SOA health query, the root NS query and
    /// nameserver address lookups.
    pub resolver: SocketAddr,
    pub timeout_ms: u64,
    /// Budget for the whole run; `None` leaves only the per-query timeout.
    pub deadline_ms: Option<u64>,
    pub edns_payload: u16,
    pub digest_policy: DigestPolicy,
    /// Fetch DS and DNSKEY concurrently.
    pub parallel_fetch: bool,
    pub follow_referrals: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            resolver: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), DNS_PORT),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            deadline_ms: None,
            edns_payload: EDNS_PAYLOAD,
            digest_policy: DigestPolicy::FirstPublished,
            parallel_fetch: true,
            follow_referrals: true,
        }
    }
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: SocketAddr) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: Option<u64>) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn with_digest_policy(mut self, policy: DigestPolicy) -> Self {
        self.digest_policy = policy;
        self
    }

    pub fn parallel_fetch(mut self, value: bool) -> Self {
        self.parallel_fetch = value;
        self
    }

    pub fn follow_referrals(mut self, value: bool) -> Self {
        self.follow_referrals = value;
        self
    }

    /// Per-query timeout. Zero falls back to the default: queries are never
    /// unbounded.
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms == 0 {
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Parse `"8.8.8.8"`, `"8.8.8.8:5353"`, `"2001:db8::1"` or
/// `"[2001:db8::1]:53"`; the port defaults to 53.
pub fn parse_resolver(input: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    let trimmed = input.trim();
    match trimmed.parse::<SocketAddr>() {
        Ok(addr) => Ok(addr),
        Err(err) => {
            let bare = trimmed.trim_start_matches('[').trim_end_matches(']');
            match bare.parse::<IpAddr>() {
                Ok(ip) => Ok(SocketAddr::new(ip, DNS_PORT)),
                Err(_) => Err(err),
            }
        }
    }
}

/// Cooperative cancellation shared between a caller and a running check.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
