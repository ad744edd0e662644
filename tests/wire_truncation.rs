//! Real UDP/TCP transport against a local server that truncates.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dnssec_check::{QueryClient, QueryError};
use trust_dns_proto::op::{Message, MessageType, OpCode, ResponseCode};
use trust_dns_proto::rr::rdata::NS;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};

const IO_TIMEOUT: Duration = Duration::from_secs(3);

struct MockServer {
    addr: SocketAddr,
    udp_hits: Arc<AtomicUsize>,
    tcp_hits: Arc<AtomicUsize>,
    threads: Vec<JoinHandle<()>>,
}

impl MockServer {
    /// UDP and TCP on the same loopback port. UDP always answers
    /// truncated; TCP answers truncated unless `tcp_complete`.
    fn start(tcp_complete: bool) -> Self {
        let (udp, tcp) = bind_pair();
        let addr = udp.local_addr().expect("udp addr");
        let udp_hits = Arc::new(AtomicUsize::new(0));
        let tcp_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&udp_hits);
        let udp_thread = thread::spawn(move || {
            udp.set_read_timeout(Some(IO_TIMEOUT)).expect("udp timeout");
            let mut buf = [0u8; 4096];
            if let Ok((len, peer)) = udp.recv_from(&mut buf) {
                hits.fetch_add(1, Ordering::SeqCst);
                let reply = reply_to(&buf[..len], true);
                udp.send_to(&reply, peer).expect("udp send");
            }
        });

        let hits = Arc::clone(&tcp_hits);
        let tcp_thread = thread::spawn(move || {
            let Ok((mut stream, _)) = tcp.accept() else {
                return;
            };
            stream.set_read_timeout(Some(IO_TIMEOUT)).expect("tcp timeout");
            let mut len = [0u8; 2];
            if stream.read_exact(&mut len).is_err() {
                return;
            }
            let mut request = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut request).expect("tcp request");
            hits.fetch_add(1, Ordering::SeqCst);

            let reply = reply_to(&request, !tcp_complete);
            let len = u16::try_from(reply.len()).expect("short reply");
            stream.write_all(&len.to_be_bytes()).expect("tcp len");
            stream.write_all(&reply).expect("tcp reply");
        });

        Self {
            addr,
            udp_hits,
            tcp_hits,
            threads: vec![udp_thread, tcp_thread],
        }
    }

    fn hits(self) -> (usize, usize) {
        for thread in self.threads {
            thread.join().expect("mock server thread");
        }
        (
            self.udp_hits.load(Ordering::SeqCst),
            self.tcp_hits.load(Ordering::SeqCst),
        )
    }
}

fn bind_pair() -> (UdpSocket, TcpListener) {
    for _ in 0..16 {
        let udp = UdpSocket::bind("127.0.0.1:0").expect("udp bind");
        let port = udp.local_addr().expect("udp addr").port();
        if let Ok(tcp) = TcpListener::bind(("127.0.0.1", port)) {
            return (udp, tcp);
        }
    }
    panic!("no free port for both UDP and TCP");
}

fn reply_to(request: &[u8], truncated: bool) -> Vec<u8> {
    let query = Message::from_vec(request).expect("valid query");
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_response_code(ResponseCode::NoError)
        .set_truncated(truncated);
    response.add_queries(query.queries().to_vec());
    if !truncated {
        let owner = Name::from_ascii("example.com.").expect("owner");
        let host = Name::from_ascii("ns1.example.com.").expect("host");
        response.add_answer(Record::from_rdata(owner, 300, RData::NS(NS(host))));
    }
    response.to_vec().expect("encode reply")
}

#[test]
fn persistent_truncation_stops_after_one_tcp_retry() {
    let server = MockServer::start(false);
    let addr = server.addr;

    let err = QueryClient::new(IO_TIMEOUT)
        .query("example.com", RecordType::NS, addr)
        .expect_err("always truncated");

    assert!(
        matches!(err, QueryError::Truncated { attempts: 2, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(server.hits(), (1, 1));
}

#[test]
fn truncated_udp_answer_is_completed_over_tcp() {
    let server = MockServer::start(true);
    let addr = server.addr;

    let response = QueryClient::new(IO_TIMEOUT)
        .query("example.com", RecordType::NS, addr)
        .expect("tcp answer");

    assert!(!response.truncated());
    assert_eq!(response.answers().len(), 1);
    assert_eq!(server.hits(), (1, 1));
}
