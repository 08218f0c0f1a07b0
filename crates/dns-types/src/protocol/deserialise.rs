//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;
        let id = wire_header.header.id;

        // the counts come off the wire, so don't trust them for
        // preallocation beyond what the buffer could possibly hold
        let max_records = buffer.remaining();
        let mut questions = Vec::with_capacity(max_records.min(wire_header.qdcount.into()));
        let mut answers = Vec::with_capacity(max_records.min(wire_header.ancount.into()));
        let mut authority = Vec::with_capacity(max_records.min(wire_header.nscount.into()));
        let mut additional = Vec::with_capacity(max_records.min(wire_header.arcount.into()));

        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(id, buffer)?);
        }

        if buffer.remaining() > 0 {
            tracing::trace!(
                %id,
                trailing = %buffer.remaining(),
                "ignoring octets after last section"
            );
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

/// A `Header` as it appears on the wire, with the section counts.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WireHeader {
    pub header: Header,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl WireHeader {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & HEADER_MASK_QR != 0,
                opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
                is_authoritative: flags1 & HEADER_MASK_AA != 0,
                is_truncated: flags1 & HEADER_MASK_TC != 0,
                recursion_desired: flags1 & HEADER_MASK_RD != 0,
                recursion_available: flags2 & HEADER_MASK_RA != 0,
                rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = QueryType::deserialise(id, buffer)?;
        let qclass = QueryClass::deserialise(id, buffer)?;

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = RecordType::deserialise(id, buffer)?;
        let rclass = RecordClass::deserialise(id, buffer)?;
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;

        let rdata_start = buffer.position;
        let rdata_stop = rdata_start + usize::from(rdlength);
        if rdata_stop > buffer.octets.len() {
            return Err(Error::ResourceRecordTooShort(id));
        }

        // for records which include domain names, deserialise them to
        // expand pointers.
        let rtype_with_data = match rtype {
            RecordType::A => RecordTypeWithData::A {
                address: Ipv4Addr::from(
                    buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                ),
            },
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MD => RecordTypeWithData::MD {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MF => RecordTypeWithData::MF {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::SOA => RecordTypeWithData::SOA {
                mname: DomainName::deserialise(id, buffer)?,
                rname: DomainName::deserialise(id, buffer)?,
                serial: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                refresh: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                retry: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                expire: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                minimum: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
            },
            RecordType::MB => RecordTypeWithData::MB {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MG => RecordTypeWithData::MG {
                mdmname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MR => RecordTypeWithData::MR {
                newname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::NULL => RecordTypeWithData::NULL {
                octets: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::WKS => RecordTypeWithData::WKS {
                octets: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::HINFO => RecordTypeWithData::HINFO {
                octets: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::MINFO => RecordTypeWithData::MINFO {
                rmailbx: DomainName::deserialise(id, buffer)?,
                emailbx: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MX => RecordTypeWithData::MX {
                preference: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                exchange: DomainName::deserialise(id, buffer)?,
            },
            RecordType::TXT => RecordTypeWithData::TXT {
                octets: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::AAAA => {
                let octets = buffer.take(16).ok_or(Error::ResourceRecordTooShort(id))?;
                let mut address = [0; 16];
                address.copy_from_slice(octets);
                RecordTypeWithData::AAAA {
                    address: Ipv6Addr::from(address),
                }
            }
            RecordType::SRV => RecordTypeWithData::SRV {
                priority: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                weight: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                port: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                target: DomainName::deserialise(id, buffer)?,
            },
            RecordType::DS => RecordTypeWithData::DS {
                key_tag: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                algorithm: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                digest_type: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                digest: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::RRSIG => RecordTypeWithData::RRSIG {
                type_covered: RecordType::deserialise(id, buffer)?,
                algorithm: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                labels: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                original_ttl: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                signature_expiration: buffer
                    .next_u32()
                    .ok_or(Error::ResourceRecordTooShort(id))?,
                signature_inception: buffer
                    .next_u32()
                    .ok_or(Error::ResourceRecordTooShort(id))?,
                key_tag: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                signer_name: DomainName::deserialise(id, buffer)?,
                signature: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::DNSKEY => RecordTypeWithData::DNSKEY {
                flags: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                protocol: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                algorithm: buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?,
                public_key: buffer.rest_of_rdata(id, rdata_stop)?,
            },
            RecordType::SVCB => RecordTypeWithData::SVCB {
                priority: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                target: DomainName::deserialise(id, buffer)?,
                params: SvcParam::deserialise_all(id, buffer, rdata_stop)?,
            },
            RecordType::HTTPS => RecordTypeWithData::HTTPS {
                priority: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                target: DomainName::deserialise(id, buffer)?,
                params: SvcParam::deserialise_all(id, buffer, rdata_stop)?,
            },
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: buffer.rest_of_rdata(id, rdata_stop)?,
            },
        };

        if buffer.position == rdata_stop {
            Ok(Self {
                name,
                rtype_with_data,
                rclass,
                ttl,
            })
        } else {
            Err(Error::ResourceRecordInvalid(id))
        }
    }
}

impl SvcParam {
    /// Parse (key, length, value) triples until the end of the RDATA.
    ///
    /// # Errors
    ///
    /// If a parameter runs past the end of the RDATA.
    pub fn deserialise_all(
        id: u16,
        buffer: &mut ConsumableBuffer,
        rdata_stop: usize,
    ) -> Result<Vec<Self>, Error> {
        let mut params = Vec::new();
        while buffer.position < rdata_stop {
            let key = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
            let len = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
            if buffer.position + usize::from(len) > rdata_stop {
                return Err(Error::ResourceRecordInvalid(id));
            }
            let value = buffer
                .take(len.into())
                .ok_or(Error::ResourceRecordTooShort(id))?;
            params.push(SvcParam {
                key,
                value: Bytes::copy_from_slice(value),
            });
        }
        Ok(params)
    }
}

impl DomainName {
    /// Parse a possibly-compressed name.
    ///
    /// Pointers are followed iteratively.  Each pointer target is
    /// recorded, and a repeated target is a loop: this catches
    /// pointers to themselves, pointers forward, and longer cycles.
    ///
    /// # Errors
    ///
    /// If the domain cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut labels = Vec::<Label>::with_capacity(5);
        let mut len = 0;

        let mut visited = HashSet::new();
        // where the name continues in `buffer` after the first pointer
        let mut resume_at = None;
        let mut cursor = buffer.at_offset(buffer.position);

        loop {
            let size = cursor.next_u8().ok_or(Error::DomainTooShort(id))?;

            if usize::from(size) <= LABEL_MAX_LEN {
                len += 1 + usize::from(size);
                if len > DOMAINNAME_MAX_LEN || labels.len() >= DOMAINNAME_MAX_LABELS {
                    return Err(Error::DomainTooLong(id));
                }

                if size == 0 {
                    labels.push(Label::new());
                    break;
                }

                let os = cursor
                    .take(size.into())
                    .ok_or(Error::DomainTooShort(id))?;
                labels.push(Label::try_from(os).map_err(|_| Error::DomainLabelInvalid(id))?);
            } else if size & 0b1100_0000 == 0b1100_0000 {
                let hi = size & 0b0011_1111;
                let lo = cursor.next_u8().ok_or(Error::DomainTooShort(id))?;
                let ptr = usize::from(u16::from_be_bytes([hi, lo]));

                if !visited.insert(ptr) {
                    return Err(Error::DomainCompressionLoop(id));
                }
                if resume_at.is_none() {
                    resume_at = Some(cursor.position);
                }
                cursor = buffer.at_offset(ptr);
            } else {
                return Err(Error::DomainLabelInvalid(id));
            }
        }

        buffer.position = resume_at.unwrap_or(cursor.position);
        Ok(DomainName { labels, len })
    }
}

impl QueryType {
    /// # Errors
    ///
    /// If the query type is too short.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl QueryClass {
    /// # Errors
    ///
    /// If the query class is too short.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl RecordType {
    /// # Errors
    ///
    /// If the record type is too short.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl RecordClass {
    /// # Errors
    ///
    /// If the record class is too short.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(Self::from(value))
    }
}

/// Errors encountered when parsing a datagram.  In all the errors
/// which have a `u16` parameter, that is the ID from the header - so
/// that an error response can be sent.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The datagram is not even 2 octets long, so it doesn't even
    /// contain a valid ID.  An error cannot even be sent back to the
    /// client in this case as, without an ID, it cannot be linked
    /// with the correct query.
    CompletelyBusted,

    /// The header is missing one or more required fields.
    HeaderTooShort(u16),

    /// A question ends with an incomplete field.
    QuestionTooShort(u16),

    /// A resource record ends with an incomplete field.
    ResourceRecordTooShort(u16),

    /// A resource record is the wrong format.
    ResourceRecordInvalid(u16),

    /// A domain is incomplete.
    DomainTooShort(u16),

    /// A domain is over 255 octets in size.
    DomainTooLong(u16),

    /// Following the compression pointers of a domain visits the same
    /// offset twice.
    DomainCompressionLoop(u16),

    /// A domain label is longer than 63 octets, but not a pointer.
    DomainLabelInvalid(u16),
}

impl Error {
    pub fn id(self) -> Option<u16> {
        match self {
            Error::CompletelyBusted => None,
            Error::HeaderTooShort(id)
            | Error::QuestionTooShort(id)
            | Error::ResourceRecordTooShort(id)
            | Error::ResourceRecordInvalid(id)
            | Error::DomainTooShort(id)
            | Error::DomainTooLong(id)
            | Error::DomainCompressionLoop(id)
            | Error::DomainLabelInvalid(id) => Some(id),
        }
    }

    pub fn is_compression_loop(self) -> bool {
        matches!(self, Error::DomainCompressionLoop(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CompletelyBusted => write!(f, "message too short to contain an ID"),
            Error::HeaderTooShort(_) => write!(f, "header too short"),
            Error::QuestionTooShort(_) => write!(f, "question too short"),
            Error::ResourceRecordTooShort(_) => write!(f, "resource record too short"),
            Error::ResourceRecordInvalid(_) => write!(f, "resource record invalid"),
            Error::DomainTooShort(_) => write!(f, "domain too short"),
            Error::DomainTooLong(_) => write!(f, "domain too long"),
            Error::DomainCompressionLoop(_) => write!(f, "domain compression pointers loop"),
            Error::DomainLabelInvalid(_) => write!(f, "domain label invalid"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.octets.len().saturating_sub(self.position)
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        if self.octets.len() > self.position {
            let a = self.octets[self.position];
            self.position += 1;
            Some(a)
        } else {
            None
        }
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        if self.octets.len() > self.position + 1 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            self.position += 2;
            Some(u16::from_be_bytes([a, b]))
        } else {
            None
        }
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        if self.octets.len() > self.position + 3 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            let c = self.octets[self.position + 2];
            let d = self.octets[self.position + 3];
            self.position += 4;
            Some(u32::from_be_bytes([a, b, c, d]))
        } else {
            None
        }
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    /// Everything from the current position to the end of the RDATA.
    ///
    /// # Errors
    ///
    /// If the fixed fields before this have already run past the end.
    pub fn rest_of_rdata(&mut self, id: u16, rdata_stop: usize) -> Result<Bytes, Error> {
        if self.position > rdata_stop {
            return Err(Error::ResourceRecordInvalid(id));
        }
        self.take(rdata_stop - self.position)
            .map(Bytes::copy_from_slice)
            .ok_or(Error::ResourceRecordTooShort(id))
    }

    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;

    /// A response header with the given section counts.
    #[rustfmt::skip]
    fn header(qdcount: u8, ancount: u8) -> Vec<u8> {
        vec![
            0x12, 0x34, // ID
            0b1000_0000, 0, // QR, NoError
            0, qdcount,
            0, ancount,
            0, 0,
            0, 0,
        ]
    }

    #[test]
    fn too_short_for_id() {
        assert_eq!(Err(Error::CompletelyBusted), Message::from_octets(&[1]));
    }

    #[test]
    fn too_short_for_header() {
        assert_eq!(
            Err(Error::HeaderTooShort(0x1234)),
            Message::from_octets(&[0x12, 0x34, 0, 0, 0])
        );
    }

    #[test]
    fn section_counts_must_match() {
        // claims a question, but has none
        assert_eq!(
            Err(Error::DomainTooShort(0x1234)),
            Message::from_octets(&header(1, 0))
        );
    }

    #[test]
    #[rustfmt::skip]
    fn compression_pointer_to_self() {
        let mut octets = header(1, 0);
        // offset 12: a pointer to offset 12
        octets.extend_from_slice(&[0b1100_0000, 12, 0, 1, 0, 1]);

        assert_eq!(
            Err(Error::DomainCompressionLoop(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn compression_pointer_cycle() {
        let mut octets = header(1, 0);
        // offset 12: "a", then a pointer to offset 16
        octets.extend_from_slice(&[1, b'a', 0b1100_0000, 16]);
        // offset 16: "b", then a pointer to offset 12
        octets.extend_from_slice(&[1, b'b', 0b1100_0000, 12]);

        assert_eq!(
            Err(Error::DomainCompressionLoop(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn compression_pointer_forward_is_followed() {
        let mut octets = header(1, 0);
        // offset 12: "www", then a pointer to offset 22
        octets.extend_from_slice(&[3, b'w', b'w', b'w', 0b1100_0000, 22]);
        // offset 18: QTYPE, QCLASS
        octets.extend_from_slice(&[0, 1, 0, 1]);
        // offset 22: "com"
        octets.extend_from_slice(&[3, b'c', b'o', b'm', 0]);

        let message = Message::from_octets(&octets).unwrap();
        assert_eq!(domain("www.com."), message.questions[0].name);
        assert_eq!(QueryType::Record(RecordType::A), message.questions[0].qtype);
    }

    #[test]
    #[rustfmt::skip]
    fn compression_pointer_resumes_after_pointer() {
        let mut octets = header(1, 1);
        // offset 12: question "example.com" A IN
        octets.extend_from_slice(&[7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0]);
        octets.extend_from_slice(&[0, 1, 0, 1]);
        // answer: "www" + pointer to offset 12, A IN 300 1.2.3.4
        octets.extend_from_slice(&[3, b'w', b'w', b'w', 0b1100_0000, 12]);
        octets.extend_from_slice(&[0, 1, 0, 1, 0, 0, 1, 44, 0, 4, 1, 2, 3, 4]);

        let message = Message::from_octets(&octets).unwrap();
        assert_eq!(
            vec![a_record("www.example.com.", Ipv4Addr::new(1, 2, 3, 4))],
            message.answers
        );
    }

    #[test]
    fn label_length_with_reserved_bits() {
        for size in [0b0100_0000, 0b1000_0000] {
            let mut octets = header(1, 0);
            octets.extend_from_slice(&[size, 0, 0, 1, 0, 1]);

            assert_eq!(
                Err(Error::DomainLabelInvalid(0x1234)),
                Message::from_octets(&octets)
            );
        }
    }

    #[test]
    fn domain_over_255_octets() {
        let mut octets = header(1, 0);
        for _ in 0..4 {
            octets.push(63);
            octets.extend_from_slice(&[b'a'; 63]);
        }
        octets.extend_from_slice(&[0, 0, 1, 0, 1]);

        assert_eq!(
            Err(Error::DomainTooLong(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn domain_over_255_octets_through_pointers() {
        let mut octets = header(1, 0);
        // offset 12: 63 octet label, pointer to self
        octets.push(63);
        octets.extend_from_slice(&[b'a'; 63]);
        octets.extend_from_slice(&[0b1100_0000, 12]);

        // the loop is found before the length overflows
        assert_eq!(
            Err(Error::DomainCompressionLoop(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn rdlength_mismatch() {
        let mut octets = header(0, 1);
        // root, A IN 300, RDLENGTH 5
        octets.extend_from_slice(&[0, 0, 1, 0, 1, 0, 0, 1, 44, 0, 5, 1, 2, 3, 4, 5]);

        assert_eq!(
            Err(Error::ResourceRecordInvalid(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn rdlength_past_end() {
        let mut octets = header(0, 1);
        // root, TXT IN 300, RDLENGTH 10, but only 2 octets
        octets.extend_from_slice(&[0, 0, 16, 0, 1, 0, 0, 1, 44, 0, 10, 1, b'a']);

        assert_eq!(
            Err(Error::ResourceRecordTooShort(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    #[rustfmt::skip]
    fn svcb_param_past_rdata() {
        let mut octets = header(0, 1);
        // root, SVCB IN 300, RDLENGTH 9
        octets.extend_from_slice(&[0, 0, 64, 0, 1, 0, 0, 1, 44, 0, 9]);
        // priority 1, root target, key 1 claiming 4 octets but with 2
        octets.extend_from_slice(&[0, 1, 0, 0, 1, 0, 4, b'h', b'2']);
        // the next record's worth of padding
        octets.extend_from_slice(&[0, 0, 0, 0]);

        assert_eq!(
            Err(Error::ResourceRecordInvalid(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    fn octets_after_last_section_are_ignored() {
        let original = Message::from_question(
            0x1234,
            Question {
                name: domain("www.example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            },
        );
        let mut octets = original.to_octets().unwrap().to_vec();
        octets.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        assert_eq!(Ok(original), Message::from_octets(&octets));
    }

    #[test]
    fn decode_preserves_case() {
        let mut octets = header(1, 0);
        octets.extend_from_slice(&[2, b'C', b'S', 3, b'f', b'a', b'u', 2, b'd', b'e', 0]);
        octets.extend_from_slice(&[0, 1, 0, 1]);

        let message = Message::from_octets(&octets).unwrap();
        assert_eq!("CS.fau.de.", message.questions[0].name.to_dotted_string());
        assert_eq!(domain("cs.fau.de."), message.questions[0].name);
    }

    #[test]
    fn roundtrip_arbitrary_message() {
        for _ in 0..100 {
            let original = arbitrary_message();
            let octets = original.to_octets().unwrap();

            assert_eq!(Ok(original), Message::from_octets(&octets));
        }
    }

    #[test]
    fn roundtrip_arbitrary_resourcerecord() {
        for _ in 0..100 {
            let original = arbitrary_resourcerecord();
            let mut message = Message::from_question(
                1,
                Question {
                    name: original.name.clone(),
                    qtype: QueryType::Record(original.rtype_with_data.rtype()),
                    qclass: QueryClass::Record(original.rclass),
                },
            )
            .make_response();
            message.answers.push(original.clone());
            let octets = message.to_octets().unwrap();

            let deserialised = Message::from_octets(&octets).unwrap();
            assert_eq!(vec![original], deserialised.answers);
        }
    }

    #[test]
    fn error_ids() {
        assert_eq!(None, Error::CompletelyBusted.id());
        assert_eq!(Some(1), Error::DomainCompressionLoop(1).id());
        assert!(Error::DomainCompressionLoop(1).is_compression_loop());
        assert!(!Error::DomainTooLong(1).is_compression_loop());
    }
}
