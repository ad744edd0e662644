#![forbid(unsafe_code)]
//! dnssec_check: DNSSEC delegation chain check
//!
//! For a registrable domain: SOA health query at a bootstrap resolver, NS
//! walk root → registry → domain, DS from the registry nameserver, DNSKEY
//! from the domain nameserver, DS recomputation (RFC 4034) and matching.

pub mod chain;
pub mod domain;
pub mod query;

pub use chain::{
    Answer, CalculatedDs, CancelToken, ChainState, CheckError, CheckOptions, DigestPolicy,
    DnskeyRecord, DnssecChecker, DsRecord, FailureKind, JobStatus, Matching, Nameservers,
    Question, Registry, Report, Warning, WarningStage, ZoneLevel, ZoneStatus, check_dnssec,
    check_dnssec_with_cancel, parse_resolver,
};
pub use domain::{DomainError, NormalizedDomain, normalize_domain};
pub use query::{QueryClient, QueryError, Transport};
