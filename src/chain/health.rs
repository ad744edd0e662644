//! Zone health: one SOA query at the bootstrap resolver decides
//! whether the rest of the chain is worth walking.

use std::fmt;
use std::net::SocketAddr;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::RecordType;

use crate::query::Lookup;

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "UPPERCASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneStatus {
    Ok,
    #[cfg_attr(feature = "with-serde", serde(rename = "NXDOMAIN"))]
    NxDomain,
    #[cfg_attr(feature = "with-serde", serde(rename = "SERVFAIL"))]
    ServFail,
    Refused,
    Unreachable,
}

impl ZoneStatus {
    /// Any code other than SERVFAIL, NXDOMAIN and REFUSED counts as healthy.
    pub fn from_response_code(code: ResponseCode) -> Self {
        match code {
            ResponseCode::ServFail => Self::ServFail,
            ResponseCode::NXDomain => Self::NxDomain,
            ResponseCode::Refused => Self::Refused,
            _ => Self::Ok,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ServFail => {
                "500, 502, The name server encountered an internal failure while processing this request (SERVFAIL)"
            }
            Self::NxDomain => "500, 503, Some name that ought to exist, does not exist (NXDOMAIN)",
            Self::Refused => {
                "500, 505, The name server refuses to perform the specified operation for policy or security reasons (REFUSED)"
            }
            Self::Unreachable => "500, 501, DNS server could not be reached",
        }
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::NxDomain => f.write_str("NXDOMAIN"),
            Self::ServFail => f.write_str("SERVFAIL"),
            Self::Refused => f.write_str("REFUSED"),
            Self::Unreachable => f.write_str("UNREACHABLE"),
        }
    }
}

/// Ask `resolver` for the SOA of `domain` and classify the outcome.
///
/// Truncated answers are retried over TCP by the query client, once; any
/// transport failure (including a second truncation) is `Unreachable`.
pub fn zone_health<L: Lookup + ?Sized>(
    lookup: &L,
    domain: &str,
    resolver: SocketAddr,
) -> ZoneStatus {
    match lookup.lookup(domain, RecordType::SOA, resolver) {
        Ok(response) => {
            let status = ZoneStatus::from_response_code(response.response_code());
            debug!(%domain, %resolver, %status, "zone health");
            status
        }
        Err(err) => {
            warn!(%domain, %resolver, error = %err, "zone health query failed");
            ZoneStatus::Unreachable
        }
    }
}
