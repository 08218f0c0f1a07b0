use bytes::BytesMut;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::transport::TransportError;

/// Read a DNS message from a TCP stream.
///
/// A DNS TCP message is slightly different to a DNS UDP message: it
/// has a big-endian u16 prefix giving the total length of the
/// message.  This is redundant (since the header is fixed-size and
/// says how many fields there are, and the fields contain length
/// information), but it means the entire message can be read before
/// parsing begins.
pub async fn read_tcp_bytes<R: AsyncRead + Unpin>(stream: &mut R) -> Result<BytesMut, TcpError> {
    match stream.read_u16().await {
        Ok(size) => {
            let expected = size as usize;
            let mut bytes = BytesMut::with_capacity(expected);
            while bytes.len() < expected {
                // never read past the end of this message
                let remaining = (expected - bytes.len()) as u64;
                match (&mut *stream).take(remaining).read_buf(&mut bytes).await {
                    Ok(0) if bytes.len() < expected => {
                        return Err(TcpError::TooShort {
                            id: message_id(&bytes),
                            expected,
                            actual: bytes.len(),
                        });
                    }
                    Err(err) => {
                        return Err(TcpError::IO {
                            id: message_id(&bytes),
                            error: err,
                        });
                    }
                    _ => (),
                }
            }
            Ok(bytes)
        }
        Err(err) => Err(TcpError::IO {
            id: None,
            error: err,
        }),
    }
}

fn message_id(bytes: &[u8]) -> Option<u16> {
    if bytes.len() >= 2 {
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    } else {
        None
    }
}

/// An error that can occur when reading a DNS TCP message.
#[derive(Debug)]
pub enum TcpError {
    TooShort {
        id: Option<u16>,
        expected: usize,
        actual: usize,
    },
    IO {
        id: Option<u16>,
        error: io::Error,
    },
}

impl fmt::Display for TcpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TcpError::TooShort {
                expected, actual, ..
            } => write!(f, "expected {expected} octets, got {actual}"),
            TcpError::IO { error, .. } => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for TcpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TcpError::TooShort { .. } => None,
            TcpError::IO { error, .. } => Some(error),
        }
    }
}

impl From<TcpError> for TransportError {
    fn from(error: TcpError) -> Self {
        match error {
            TcpError::TooShort { .. } => {
                TransportError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, error))
            }
            TcpError::IO { error, .. } => TransportError::Io(error),
        }
    }
}

/// Write a serialised message to a TCP channel.  This sends a
/// two-byte length prefix (big-endian u16).
pub async fn send_tcp_bytes<W: AsyncWrite + Unpin>(
    stream: &mut W,
    bytes: &[u8],
) -> Result<(), io::Error> {
    let Ok(len) = u16::try_from(bytes.len()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message too long for TCP",
        ));
    };

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;

    Ok(())
}
