//! Wire query client: one question, one server, UDP first and TCP only when
//! the UDP answer comes back truncated.
//!
//! The client is a plain value with no shared state; build one per check
//! (or clone it) and hand it the server address on every call.

mod error;
mod exchange;

pub use error::QueryError;
pub use exchange::{Exchange, NetExchange};

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};
use trust_dns_proto::op::{Edns, Message, MessageType, OpCode, Query};
use trust_dns_proto::rr::{Name, RecordType};

/// Advertised EDNS0 payload, large enough for typical DNSKEY sets.
pub const EDNS_PAYLOAD: u16 = 4096;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("UDP"),
            Self::Tcp => f.write_str("TCP"),
        }
    }
}

/// Transports tried in order. A truncated TCP answer ends the loop.
const ATTEMPTS: [Transport; 2] = [Transport::Udp, Transport::Tcp];

#[derive(Debug, Clone)]
pub struct QueryClient<E = NetExchange> {
    exchange: E,
    timeout: Duration,
    edns_payload: u16,
}

impl QueryClient<NetExchange> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_exchange(NetExchange, timeout)
    }
}

impl<E: Exchange> QueryClient<E> {
    pub fn with_exchange(exchange: E, timeout: Duration) -> Self {
        Self {
            exchange,
            timeout,
            edns_payload: EDNS_PAYLOAD,
        }
    }

    pub fn with_edns_payload(mut self, payload: u16) -> Self {
        self.edns_payload = payload;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query `name`/`record_type` at `server` with the client's own timeout.
    ///
    /// The full response is returned uninterpreted; callers pick the
    /// sections and record types they need.
    pub fn query(
        &self,
        name: &str,
        record_type: RecordType,
        server: SocketAddr,
    ) -> Result<Message, QueryError> {
        self.query_within(name, record_type, server, self.timeout)
    }

    /// Same as [`QueryClient::query`] with an explicit per-attempt timeout,
    /// used when an overall deadline leaves less than the default.
    pub fn query_within(
        &self,
        name: &str,
        record_type: RecordType,
        server: SocketAddr,
        timeout: Duration,
    ) -> Result<Message, QueryError> {
        let qname = fqdn(name)?;
        let id: u16 = rand::random();
        let request = build_request(id, qname.clone(), record_type, self.edns_payload);
        let wire = request
            .to_vec()
            .map_err(|source| QueryError::Encode { source })?;

        for (attempt, transport) in ATTEMPTS.into_iter().enumerate() {
            debug!(%server, %name, ?record_type, %transport, attempt, "dns exchange");
            let raw = self.exchange.exchange(&wire, server, transport, timeout)?;
            let response =
                Message::from_vec(&raw).map_err(|source| QueryError::Decode { server, source })?;
            if response.id() != id {
                return Err(QueryError::IdMismatch {
                    server,
                    expected: id,
                    got: response.id(),
                });
            }
            if !echoes_question(&response, &qname, record_type) {
                return Err(QueryError::QuestionMismatch {
                    server,
                    name: name.to_string(),
                    record_type,
                });
            }
            if !response.truncated() {
                return Ok(response);
            }
            warn!(%server, %name, ?record_type, %transport, "truncated response");
        }

        Err(QueryError::Truncated {
            server,
            attempts: ATTEMPTS.len(),
        })
    }
}

/// One question to one server. The pipeline components only see this
/// trait, so callers can wrap the client with cancellation or deadlines.
pub trait Lookup {
    fn lookup(
        &self,
        name: &str,
        record_type: RecordType,
        server: SocketAddr,
    ) -> Result<Message, QueryError>;
}

impl<E: Exchange> Lookup for QueryClient<E> {
    fn lookup(
        &self,
        name: &str,
        record_type: RecordType,
        server: SocketAddr,
    ) -> Result<Message, QueryError> {
        self.query(name, record_type, server)
    }
}

/// The response repeats the question that was asked (name compared without
/// regard to case).
fn echoes_question(response: &Message, name: &Name, record_type: RecordType) -> bool {
    response
        .queries()
        .first()
        .is_some_and(|query| query.name() == name && query.query_type() == record_type)
}

/// Absolute name for `zone`; `"."` and `""` are the root.
pub fn fqdn(zone: &str) -> Result<Name, QueryError> {
    let trimmed = zone.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Ok(Name::root());
    }
    Name::from_ascii(format!("{trimmed}."))
        .map_err(|source| QueryError::invalid_name(zone, source))
}

pub(crate) fn build_request(
    id: u16,
    name: Name,
    record_type: RecordType,
    payload: u16,
) -> Message {
    let mut edns = Edns::new();
    edns.set_max_payload(payload);
    edns.set_version(0);
    edns.set_dnssec_ok(true);

    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, record_type));
    request.set_edns(edns);
    request
}

#[cfg(test)]
pub(crate) mod stub;
