use thiserror::Error;

use super::delegation::DelegationError;
use super::health::ZoneStatus;
use super::types::{FailureKind, ZoneLevel};
use crate::domain::DomainError;

/// Terminal failures: the run stops and the report is marked Failed with
/// this error's message.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{}", .source.job_message())]
    InvalidDomain {
        #[source]
        source: DomainError,
    },
    #[error("Resolver initialization failed")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("{}", .status.message())]
    ZoneUnhealthy { status: ZoneStatus },
    #[error("No nameservers found")]
    NoNameservers {
        level: ZoneLevel,
        #[source]
        source: DelegationError,
    },
    #[error("No address found for the {level} nameservers of '{zone}'")]
    NoAddress { level: ZoneLevel, zone: String },
    #[error("Job cancelled")]
    Cancelled,
    #[error("Job deadline exceeded")]
    DeadlineExceeded,
}

impl CheckError {
    pub(crate) fn no_address(level: ZoneLevel, zone: impl Into<String>) -> Self {
        Self::NoAddress {
            level,
            zone: zone.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidDomain { .. } => FailureKind::InvalidDomain,
            Self::ResolverInit { .. } => FailureKind::ResolverInit,
            Self::ZoneUnhealthy { status } => FailureKind::ZoneUnhealthy(*status),
            Self::NoNameservers { level, .. } => FailureKind::NoNameservers(*level),
            Self::NoAddress { level, .. } => FailureKind::NoAddress(*level),
            Self::Cancelled => FailureKind::Cancelled,
            Self::DeadlineExceeded => FailureKind::DeadlineExceeded,
        }
    }
}
