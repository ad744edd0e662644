use std::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::digest;
use super::health::ZoneStatus;

/// A DS record, either published by the parent zone or recomputed from a
/// DNSKEY. The digest is upper-case hex.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsRecord {
    pub algorithm: u8,
    pub digest: String,
    #[cfg_attr(feature = "with-serde", serde(rename = "digesttype"))]
    pub digest_type: u8,
    #[cfg_attr(feature = "with-serde", serde(rename = "keytag"))]
    pub key_tag: u16,
}

impl DsRecord {
    pub fn new(key_tag: u16, algorithm: u8, digest_type: u8, digest: &[u8]) -> Self {
        Self {
            algorithm,
            digest: hex::encode_upper(digest),
            digest_type,
            key_tag,
        }
    }

    /// Wire RDATA: key tag (2), algorithm (1), digest type (1), digest.
    pub(crate) fn from_rdata(rdata: &[u8]) -> Option<Self> {
        if rdata.len() < 4 {
            return None;
        }
        let key_tag = u16::from_be_bytes([rdata[0], rdata[1]]);
        Some(Self::new(key_tag, rdata[2], rdata[3], &rdata[4..]))
    }

    /// Cryptographic match: same digest type and same digest bytes. The key
    /// tag is not part of the comparison.
    pub fn same_digest(&self, other: &DsRecord) -> bool {
        self.digest_type == other.digest_type && self.digest.eq_ignore_ascii_case(&other.digest)
    }
}

impl fmt::Display for DsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.key_tag, self.algorithm, self.digest_type, self.digest
        )
    }
}

/// A DNSKEY as published by the child zone.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnskeyRecord {
    pub algorithm: u8,
    pub flags: u16,
    pub protocol: u8,
    #[cfg_attr(
        feature = "with-serde",
        serde(rename = "publickey", with = "base64_key")
    )]
    pub public_key: Vec<u8>,
    #[cfg_attr(feature = "with-serde", serde(rename = "keytag"))]
    pub key_tag: u16,
    /// Set on matched keys: the DS computed from this key.
    #[cfg_attr(
        feature = "with-serde",
        serde(
            rename = "calculatedds",
            default,
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub calculated_ds: Option<DsRecord>,
}

impl DnskeyRecord {
    pub fn new(flags: u16, protocol: u8, algorithm: u8, public_key: Vec<u8>) -> Self {
        let key_tag = digest::key_tag(flags, protocol, algorithm, &public_key);
        Self {
            algorithm,
            flags,
            protocol,
            public_key,
            key_tag,
            calculated_ds: None,
        }
    }

    /// Wire RDATA: flags (2), protocol (1), algorithm (1), public key.
    pub(crate) fn from_rdata(rdata: &[u8]) -> Option<Self> {
        if rdata.len() < 4 {
            return None;
        }
        let flags = u16::from_be_bytes([rdata[0], rdata[1]]);
        Some(Self::new(flags, rdata[2], rdata[3], rdata[4..].to_vec()))
    }

    pub fn to_rdata(&self) -> Vec<u8> {
        let mut rdata = Vec::with_capacity(4 + self.public_key.len());
        rdata.extend_from_slice(&self.flags.to_be_bytes());
        rdata.push(self.protocol);
        rdata.push(self.algorithm);
        rdata.extend_from_slice(&self.public_key);
        rdata
    }

    pub fn public_key_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.public_key)
    }

    /// Zone Key flag (bit 7).
    pub fn is_zone_key(&self) -> bool {
        self.flags & 0x0100 != 0
    }

    /// Secure Entry Point flag (bit 15), set on key-signing keys.
    pub fn is_secure_entry_point(&self) -> bool {
        self.flags & 0x0001 != 0
    }
}

/// A recomputed DS together with the DNSKEY it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatedDs {
    pub ds: DsRecord,
    pub dnskey: DnskeyRecord,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    #[cfg_attr(feature = "with-serde", serde(rename = "OK"))]
    Ok,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// Levels of the delegation chain walked by the checker.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneLevel {
    Root,
    Registry,
    Domain,
}

impl fmt::Display for ZoneLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Registry => f.write_str("registry"),
            Self::Domain => f.write_str("domain"),
        }
    }
}

/// Machine-readable reason for a Failed job.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidDomain,
    ResolverInit,
    ZoneUnhealthy(ZoneStatus),
    NoNameservers(ZoneLevel),
    NoAddress(ZoneLevel),
    Cancelled,
    DeadlineExceeded,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningStage {
    DsFetch,
    DnskeyFetch,
    Calculation,
}

/// A non-terminal problem; the job still finishes with status OK.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub stage: WarningStage,
    pub message: String,
}

impl Warning {
    pub(crate) fn new(stage: WarningStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub domain: String,
    pub status: JobStatus,
    pub message: String,
    pub time: DateTime<Utc>,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    pub tld: String,
    pub icann: bool,
}

/// Nameserver hostnames per delegation level, in answer order.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nameservers {
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub root: Vec<String>,
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub registry: Vec<String>,
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub domain: Vec<String>,
}

/// Matched pairs: `ds[i]` was computed from `dnskey[i]`.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matching {
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub ds: Vec<DsRecord>,
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub dnskey: Vec<DnskeyRecord>,
}

impl Matching {
    pub(crate) fn push(&mut self, ds: DsRecord, dnskey: DnskeyRecord) {
        self.ds.push(ds);
        self.dnskey.push(dnskey);
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&DsRecord, &DnskeyRecord)> {
        self.ds.iter().zip(self.dnskey.iter())
    }
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    #[cfg_attr(feature = "with-serde", serde(rename = "tld", default))]
    pub registry: Registry,
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub nameservers: Nameservers,
    #[cfg_attr(feature = "with-serde", serde(rename = "dsrecordcount", default))]
    pub ds_record_count: usize,
    #[cfg_attr(feature = "with-serde", serde(rename = "dnskeyrecordcount", default))]
    pub dnskey_record_count: usize,
    #[cfg_attr(feature = "with-serde", serde(rename = "dsrecords", default))]
    pub ds_records: Vec<DsRecord>,
    #[cfg_attr(feature = "with-serde", serde(rename = "dnskeyrecords", default))]
    pub dnskey_records: Vec<DnskeyRecord>,
    #[cfg_attr(feature = "with-serde", serde(rename = "calculatedds", default))]
    pub calculated_ds: Vec<DsRecord>,
    #[cfg_attr(feature = "with-serde", serde(default))]
    pub matching: Matching,
}

/// How the published DS set relates to the published keys.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// No DS at the parent: the delegation is not signed.
    Unsigned,
    /// At least one published DS matches a published DNSKEY.
    Secure,
    /// DS published but no DNSKEY produces it.
    Broken,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned => f.write_str("unsigned"),
            Self::Secure => f.write_str("secure"),
            Self::Broken => f.write_str("broken"),
        }
    }
}

/// Result of one check. Built fresh per run and not mutated afterwards.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub question: Question,
    pub answer: Answer,
    #[cfg_attr(
        feature = "with-serde",
        serde(rename = "zonestatus", default, skip_serializing_if = "Option::is_none")
    )]
    pub zone_status: Option<ZoneStatus>,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub warnings: Vec<Warning>,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub failure: Option<FailureKind>,
}

impl Report {
    pub(crate) fn started(domain: impl Into<String>) -> Self {
        Self {
            question: Question {
                domain: domain.into(),
                status: JobStatus::Failed,
                message: String::new(),
                time: Utc::now(),
            },
            answer: Answer::default(),
            zone_status: None,
            warnings: Vec::new(),
            failure: None,
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.question.status = JobStatus::Ok;
        self.question.message = "Job done!".to_string();
        self.failure = None;
    }

    pub(crate) fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.question.status = JobStatus::Failed;
        self.question.message = message.into();
        self.failure = Some(kind);
    }

    pub fn is_ok(&self) -> bool {
        self.question.status == JobStatus::Ok
    }

    pub fn chain_state(&self) -> ChainState {
        if self.answer.ds_record_count == 0 {
            ChainState::Unsigned
        } else if self.answer.matching.is_empty() {
            ChainState::Broken
        } else {
            ChainState::Secure
        }
    }
}

#[cfg(feature = "with-serde")]
mod base64_key {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
