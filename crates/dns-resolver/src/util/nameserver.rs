use std::net::SocketAddr;

use dns_types::protocol::types::*;

use crate::transport::Transport;
use crate::ResolutionError;

/// Requests larger than this are not sent over UDP.
pub const UDP_MAX_REQUEST_LEN: usize = 512;

/// Send a message to a remote nameserver, returning the response.
///
/// The request goes over UDP, unless it is too large, in which case
/// it goes over TCP.  If the UDP response is truncated the same
/// request is sent over TCP, once, and that response is used even if
/// it is also truncated.
///
/// The response is checked with `response_matches_request`, but is
/// otherwise not validated.
pub async fn query_nameserver(
    transport: &dyn Transport,
    request: &Message,
    address: SocketAddr,
) -> Result<Message, ResolutionError> {
    let serialised_request = request.to_octets()?;

    if serialised_request.len() > UDP_MAX_REQUEST_LEN {
        tracing::trace!(length = %serialised_request.len(), "request too long for UDP");
        let octets = transport.send_tcp(&serialised_request, address).await?;
        return check_response(request, decode_response(&octets)?, address);
    }

    let octets = transport.send_udp(&serialised_request, address).await?;
    let udp_response = check_response(request, decode_response(&octets)?, address)?;
    if !udp_response.header.is_truncated {
        return Ok(udp_response);
    }

    tracing::debug!("response truncated, retrying over TCP");
    let octets = transport.send_tcp(&serialised_request, address).await?;
    check_response(request, decode_response(&octets)?, address)
}

fn check_response(
    request: &Message,
    response: Message,
    address: SocketAddr,
) -> Result<Message, ResolutionError> {
    if response_matches_request(request, &response) {
        Ok(response)
    } else {
        tracing::warn!(request_id = %request.header.id, response_id = %response.header.id, "response does not match request");
        Err(ResolutionError::Mismatched { address })
    }
}

fn decode_response(octets: &[u8]) -> Result<Message, ResolutionError> {
    Message::from_octets(octets).map_err(|error| {
        tracing::warn!(%error, "could not deserialise response");
        ResolutionError::Malformed(error)
    })
}

/// Very basic validation that a nameserver response matches a
/// message:
///
/// - Check the ID, opcode, and questions match the question.
///
/// - Check it is a response.
///
/// The response code and the TC flag are left to the caller.
pub fn response_matches_request(request: &Message, response: &Message) -> bool {
    if request.header.id != response.header.id {
        return false;
    }
    if !response.header.is_response {
        return false;
    }
    if request.header.opcode != response.header.opcode {
        return false;
    }
    if request.questions != response.questions {
        return false;
    }

    true
}
