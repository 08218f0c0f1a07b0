use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::util::net::{read_tcp_bytes, send_tcp_bytes};

/// The largest UDP response which will be read.
pub const UDP_RECV_BUFFER_SIZE: usize = 4096;

/// Which protocol a message was sent over.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
}

/// Sends serialised messages to nameservers and returns the
/// serialised responses.  The resolver never opens sockets itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a datagram and wait for one datagram in reply.
    async fn send_udp(&self, request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError>;

    /// Send a message over a fresh TCP connection, with the 2-octet
    /// length prefix, and read one length-prefixed message back.
    async fn send_tcp(&self, request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError>;
}

/// A `Transport` using tokio sockets.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NetworkTransport {
    timeout: Duration,
}

impl NetworkTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for NetworkTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn send_udp(&self, request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError> {
        match timeout(self.timeout, send_udp_notimeout(request, address)).await {
            Ok(res) => res,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn send_tcp(&self, request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError> {
        match timeout(self.timeout, send_tcp_notimeout(request, address)).await {
            Ok(res) => res,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

/// Timeout-less version of `send_udp`.
async fn send_udp_notimeout(request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError> {
    let bind_address = if address.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };

    let sock = UdpSocket::bind(bind_address).await?;
    // connecting means datagrams from other addresses are dropped
    sock.connect(address).await?;
    sock.send(request).await?;

    let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];
    let size = sock.recv(&mut buf).await?;
    Ok(Bytes::copy_from_slice(&buf[..size]))
}

/// Timeout-less version of `send_tcp`.
async fn send_tcp_notimeout(request: &[u8], address: SocketAddr) -> Result<Bytes, TransportError> {
    let mut stream = TcpStream::connect(address).await?;
    send_tcp_bytes(&mut stream, request).await?;
    let bytes = read_tcp_bytes(&mut stream).await?;
    Ok(bytes.freeze())
}

/// An error that can occur when sending a message.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Io(error) => write!(f, "I/O error: {error}"),
            TransportError::Timeout => write!(f, "timed out"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(error) => Some(error),
            TransportError::Timeout => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io(error)
    }
}
