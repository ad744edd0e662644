use std::net::SocketAddr;

use thiserror::Error;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::rr::RecordType;

use super::Transport;

/// Failures of a single DNS round trip.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: ProtoError,
    },
    #[error("failed to encode query: {source}")]
    Encode {
        #[source]
        source: ProtoError,
    },
    #[error("malformed response from {server}: {source}")]
    Decode {
        server: SocketAddr,
        #[source]
        source: ProtoError,
    },
    #[error("{transport} exchange with {server} failed: {source}")]
    Io {
        server: SocketAddr,
        transport: Transport,
        #[source]
        source: std::io::Error,
    },
    #[error("{transport} query to {server} timed out")]
    Timeout {
        server: SocketAddr,
        transport: Transport,
    },
    #[error("response from {server} still truncated after {attempts} attempts")]
    Truncated { server: SocketAddr, attempts: usize },
    #[error("response id {got} from {server} does not match query id {expected}")]
    IdMismatch {
        server: SocketAddr,
        expected: u16,
        got: u16,
    },
    #[error("response from {server} does not answer {name} {record_type}")]
    QuestionMismatch {
        server: SocketAddr,
        name: String,
        record_type: RecordType,
    },
    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    pub(crate) fn invalid_name(name: impl Into<String>, source: ProtoError) -> Self {
        Self::InvalidName {
            name: name.into(),
            source,
        }
    }

    pub(crate) fn io(server: SocketAddr, transport: Transport, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::Timeout { server, transport }
            }
            _ => Self::Io {
                server,
                transport,
                source,
            },
        }
    }

    /// True for failures where the server never produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::Truncated { .. }
        )
    }
}
