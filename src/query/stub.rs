//! Test doubles for the wire layer.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use trust_dns_proto::op::{Message, MessageType, OpCode, ResponseCode};
use trust_dns_proto::rr::dnssec::Algorithm;
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, RRSIG};
use trust_dns_proto::rr::rdata::NS;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinDecoder, Restrict};

use super::{Exchange, QueryError, Transport};

/// What a stubbed server does with one question.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Answer {
        rcode: ResponseCode,
        answers: Vec<Record>,
        authority: Vec<Record>,
    },
    Truncated,
    /// Truncated over UDP, full answer over TCP.
    TruncatedOverUdp(Vec<Record>),
    Timeout,
}

impl Reply {
    pub(crate) fn answers(answers: Vec<Record>) -> Self {
        Self::Answer {
            rcode: ResponseCode::NoError,
            answers,
            authority: Vec::new(),
        }
    }

    pub(crate) fn referral(authority: Vec<Record>) -> Self {
        Self::Answer {
            rcode: ResponseCode::NoError,
            answers: Vec::new(),
            authority,
        }
    }

    pub(crate) fn rcode(rcode: ResponseCode) -> Self {
        Self::Answer {
            rcode,
            answers: Vec::new(),
            authority: Vec::new(),
        }
    }
}

type Route = (SocketAddr, String, RecordType);

/// Answers by (server, lower-case qname without root dot, qtype); anything
/// unrouted times out. Every exchange is logged.
#[derive(Default)]
pub(crate) struct StubExchange {
    routes: Vec<(Route, Reply)>,
    pub(crate) log: Mutex<Vec<(SocketAddr, String, RecordType, Transport)>>,
}

impl StubExchange {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(
        mut self,
        server: SocketAddr,
        name: &str,
        record_type: RecordType,
        reply: Reply,
    ) -> Self {
        self.routes.push(((server, key(name), record_type), reply));
        self
    }

    pub(crate) fn transports(&self) -> Vec<Transport> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .map(|(_, _, _, transport)| *transport)
            .collect()
    }

    pub(crate) fn calls(&self, record_type: RecordType) -> usize {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .filter(|(_, _, rt, _)| *rt == record_type)
            .count()
    }
}

impl Exchange for StubExchange {
    fn exchange(
        &self,
        request: &[u8],
        server: SocketAddr,
        transport: Transport,
        _timeout: Duration,
    ) -> Result<Vec<u8>, QueryError> {
        let query = Message::from_vec(request).expect("client sends valid messages");
        let question = query.queries().first().expect("one question").clone();
        let name = key(&question.name().to_ascii());
        let record_type = question.query_type();
        self.log
            .lock()
            .expect("log lock")
            .push((server, name.clone(), record_type, transport));

        let reply = self
            .routes
            .iter()
            .find(|((s, n, rt), _)| *s == server && *n == name && *rt == record_type)
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Timeout);

        match reply {
            Reply::Timeout => Err(QueryError::Timeout { server, transport }),
            Reply::Truncated => Ok(respond(&query, ResponseCode::NoError, true, vec![], vec![])),
            Reply::TruncatedOverUdp(answers) => match transport {
                Transport::Udp => Ok(respond(&query, ResponseCode::NoError, true, vec![], vec![])),
                Transport::Tcp => Ok(respond(&query, ResponseCode::NoError, false, answers, vec![])),
            },
            Reply::Answer {
                rcode,
                answers,
                authority,
            } => Ok(respond(&query, rcode, false, answers, authority)),
        }
    }
}

fn key(name: &str) -> String {
    let trimmed = name.trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed
    }
}

pub(crate) fn respond(
    query: &Message,
    rcode: ResponseCode,
    truncated: bool,
    answers: Vec<Record>,
    authority: Vec<Record>,
) -> Vec<u8> {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true)
        .set_response_code(rcode)
        .set_truncated(truncated);
    response.add_queries(query.queries().to_vec());
    for record in answers {
        response.add_answer(record);
    }
    for record in authority {
        response.add_name_server(record);
    }
    response.to_vec().expect("stub response encodes")
}

pub(crate) fn name(value: &str) -> Name {
    super::fqdn(value).expect("valid test name")
}

pub(crate) fn ns_record(zone: &str, host: &str) -> Record {
    Record::from_rdata(name(zone), 3600, RData::NS(NS(name(host))))
}

/// A record whose RDATA is given in wire form, decoded into the typed
/// RDATA a real response carries (DS, DNSKEY, ...).
pub(crate) fn raw_record(owner: &str, record_type: RecordType, rdata: Vec<u8>) -> Record {
    let length = u16::try_from(rdata.len()).expect("short rdata");
    let mut decoder = BinDecoder::new(&rdata);
    let data = RData::read(&mut decoder, record_type, Restrict::new(length))
        .expect("valid test rdata");
    Record::from_rdata(name(owner), 3600, data)
}

/// Signature over the `covered` set, as a DO query gets next to the answer.
pub(crate) fn rrsig_record(owner: &str, covered: RecordType) -> Record {
    let sig = RRSIG::new(
        covered,
        Algorithm::ECDSAP256SHA256,
        2,
        3600,
        1_700_086_400,
        1_700_000_000,
        12345,
        name(owner),
        vec![0xAB; 64],
    );
    Record::from_rdata(name(owner), 3600, RData::DNSSEC(DNSSECRData::RRSIG(sig)))
}
