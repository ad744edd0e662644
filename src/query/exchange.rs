use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use super::{QueryError, Transport};

const MAX_MESSAGE: usize = u16::MAX as usize;

/// Moves one encoded DNS message to a server and returns the raw reply.
///
/// Implementations must honour `timeout`; the query client never waits on
/// its own.
pub trait Exchange {
    fn exchange(
        &self,
        request: &[u8],
        server: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<u8>, QueryError>;
}

impl<E: Exchange + ?Sized> Exchange for &E {
    fn exchange(
        &self,
        request: &[u8],
        server: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<u8>, QueryError> {
        (**self).exchange(request, server, transport, timeout)
    }
}

/// Plain sockets, a fresh one per exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetExchange;

impl Exchange for NetExchange {
    fn exchange(
        &self,
        request: &[u8],
        server: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<u8>, QueryError> {
        match transport {
            Transport::Udp => udp_exchange(request, server, timeout),
            Transport::Tcp => tcp_exchange(request, server, timeout),
        }
    }
}

fn udp_exchange(
    request: &[u8],
    server: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>, QueryError> {
    let err = |source| QueryError::io(server, Transport::Udp, source);
    let local: SocketAddr = if server.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).map_err(err)?;
    socket.connect(server).map_err(err)?;
    socket.set_read_timeout(Some(timeout)).map_err(err)?;
    socket.set_write_timeout(Some(timeout)).map_err(err)?;
    socket.send(request).map_err(err)?;

    let mut buf = vec![0u8; MAX_MESSAGE];
    let read = socket.recv(&mut buf).map_err(err)?;
    buf.truncate(read);
    Ok(buf)
}

fn tcp_exchange(
    request: &[u8],
    server: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>, QueryError> {
    let err = |source| QueryError::io(server, Transport::Tcp, source);
    let len = u16::try_from(request.len()).map_err(|_| {
        err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "query exceeds 65535 bytes",
        ))
    })?;

    let mut stream = TcpStream::connect_timeout(&server, timeout).map_err(err)?;
    stream.set_read_timeout(Some(timeout)).map_err(err)?;
    stream.set_write_timeout(Some(timeout)).map_err(err)?;
    stream.set_nodelay(true).map_err(err)?;

    // RFC 1035 4.2.2: two-byte length prefix
    let mut framed = Vec::with_capacity(request.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(request);
    stream.write_all(&framed).map_err(err)?;
    stream.flush().map_err(err)?;

    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).map_err(err)?;
    let mut buf = vec![0u8; usize::from(u16::from_be_bytes(prefix))];
    stream.read_exact(&mut buf).map_err(err)?;
    Ok(buf)
}
