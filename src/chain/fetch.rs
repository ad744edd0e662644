//! DS records from the parent's nameserver, DNSKEY records from the
//! child's. Empty sets are valid answers for unsigned zones.

use std::net::SocketAddr;

use tracing::debug;
use trust_dns_proto::op::Message;
use trust_dns_proto::rr::RecordType;
use trust_dns_proto::serialize::binary::BinEncodable;

use super::types::{DnskeyRecord, DsRecord};
use crate::query::{Lookup, QueryError};

/// DS set for `domain` as published by a nameserver of its parent zone.
pub fn fetch_ds<L: Lookup + ?Sized>(
    lookup: &L,
    domain: &str,
    registry_server: SocketAddr,
) -> Result<Vec<DsRecord>, QueryError> {
    let response = lookup.lookup(domain, RecordType::DS, registry_server)?;
    let records = ds_in(&response);
    debug!(%domain, server = %registry_server, count = records.len(), "DS fetched");
    Ok(records)
}

/// DNSKEY set for `domain` as published by one of its own nameservers.
pub fn fetch_dnskey<L: Lookup + ?Sized>(
    lookup: &L,
    domain: &str,
    domain_server: SocketAddr,
) -> Result<Vec<DnskeyRecord>, QueryError> {
    let response = lookup.lookup(domain, RecordType::DNSKEY, domain_server)?;
    let records = dnskeys_in(&response);
    debug!(%domain, server = %domain_server, count = records.len(), "DNSKEY fetched");
    Ok(records)
}

pub(crate) fn ds_in(response: &Message) -> Vec<DsRecord> {
    answer_rdata(response, RecordType::DS)
        .iter()
        .filter_map(|rdata| DsRecord::from_rdata(rdata))
        .collect()
}

pub(crate) fn dnskeys_in(response: &Message) -> Vec<DnskeyRecord> {
    answer_rdata(response, RecordType::DNSKEY)
        .iter()
        .filter_map(|rdata| DnskeyRecord::from_rdata(rdata))
        .collect()
}

/// Raw RDATA of the answer records of one type; other sections and types
/// (RRSIG, CNAME, ...) are skipped.
fn answer_rdata(response: &Message, record_type: RecordType) -> Vec<Vec<u8>> {
    response
        .answers()
        .iter()
        .filter(|record| record.record_type() == record_type)
        .filter_map(|record| record.data())
        .filter_map(|rdata| rdata.to_bytes().ok())
        .collect()
}
