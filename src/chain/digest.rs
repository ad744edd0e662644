//! DS recomputation (RFC 4034 5.1.4) and DNSKEY key tags (RFC 4034
//! appendix B).

use std::fmt;
use std::net::SocketAddr;

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};
use thiserror::Error;
use tracing::debug;
use trust_dns_proto::rr::RecordType;

use super::fetch::dnskeys_in;
use super::types::{CalculatedDs, DnskeyRecord, DsRecord};
use crate::query::{Lookup, QueryError, fqdn};

/// DS digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    Sha1 = 1,
    Sha256 = 2,
    /// GOST R 34.11-94, CryptoPro parameters (RFC 5933).
    Gost94 = 3,
    Sha384 = 4,
}

impl DigestType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Gost94 => 32,
            Self::Sha384 => 48,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Gost94 => gost94::Gost94CryptoPro::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("SHA-1"),
            Self::Sha256 => f.write_str("SHA-256"),
            Self::Gost94 => f.write_str("GOST R 34.11-94"),
            Self::Sha384 => f.write_str("SHA-384"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("unsupported DS digest type {digest_type}")]
    UnsupportedDigest { digest_type: u8 },
    #[error("DNSKEY lookup for DS calculation failed: {source}")]
    Query {
        #[source]
        source: QueryError,
    },
}

/// RFC 4034 appendix B checksum over the DNSKEY RDATA. Algorithm 1
/// (RSA/MD5) uses the low 16 bits of the modulus instead.
pub fn key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    if algorithm == 1 {
        return match public_key.len() {
            n if n >= 3 => u16::from_be_bytes([public_key[n - 3], public_key[n - 2]]),
            _ => 0,
        };
    }

    let mut rdata = Vec::with_capacity(4 + public_key.len());
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(protocol);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);

    let mut acc: u32 = 0;
    for (i, byte) in rdata.iter().enumerate() {
        if i % 2 == 0 {
            acc += u32::from(*byte) << 8;
        } else {
            acc += u32::from(*byte);
        }
    }
    acc += (acc >> 16) & 0xFFFF;
    (acc & 0xFFFF) as u16
}

/// Canonical (lower-case, uncompressed) wire form of an owner name.
pub fn canonical_owner(owner: &str) -> Result<Vec<u8>, QueryError> {
    let name = fqdn(owner)?.to_lowercase();
    let mut wire = Vec::with_capacity(owner.len() + 2);
    for label in name.iter() {
        wire.push(label.len() as u8);
        wire.extend_from_slice(label);
    }
    wire.push(0);
    Ok(wire)
}

/// The DS the parent should publish for `dnskey` under `digest_type`:
/// digest over owner name | DNSKEY RDATA.
pub fn derive_ds(
    owner: &str,
    dnskey: &DnskeyRecord,
    digest_type: u8,
) -> Result<DsRecord, DigestError> {
    let algorithm = DigestType::from_u8(digest_type)
        .ok_or(DigestError::UnsupportedDigest { digest_type })?;
    let mut input = canonical_owner(owner).map_err(|source| DigestError::Query { source })?;
    input.extend_from_slice(&dnskey.to_rdata());

    let digest = algorithm.digest(&input);
    Ok(DsRecord::new(
        dnskey.key_tag,
        dnskey.algorithm,
        digest_type,
        &digest,
    ))
}

/// Fetch the DNSKEY set again from `server` and derive one DS per key.
///
/// Every result keeps the key that produced it, so matching never relies
/// on positions.
pub fn calculate_ds<L: Lookup + ?Sized>(
    lookup: &L,
    domain: &str,
    digest_type: u8,
    server: SocketAddr,
) -> Result<Vec<CalculatedDs>, DigestError> {
    if DigestType::from_u8(digest_type).is_none() {
        return Err(DigestError::UnsupportedDigest { digest_type });
    }

    let response = lookup
        .lookup(domain, RecordType::DNSKEY, server)
        .map_err(|source| DigestError::Query { source })?;

    let mut calculated = Vec::new();
    for dnskey in dnskeys_in(&response) {
        let ds = derive_ds(domain, &dnskey, digest_type)?;
        debug!(%domain, key_tag = ds.key_tag, digest_type, "calculated DS");
        calculated.push(CalculatedDs { ds, dnskey });
    }
    Ok(calculated)
}
