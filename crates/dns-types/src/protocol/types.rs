use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

pub use crate::protocol::name::{
    DomainName, DomainNameError, Label, LabelError, LabelKind, DOMAINNAME_MAX_LABELS,
    DOMAINNAME_MAX_LEN, LABEL_MAX_LEN,
};

/// Octet mask for the QR flag being set (response).
pub const HEADER_MASK_QR: u8 = 0b1000_0000;

/// Octet mask for the opcode field.
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;

/// Offset for the opcode field.
pub const HEADER_OFFSET_OPCODE: usize = 3;

/// Octet mask for the AA flag being set (authoritative)
pub const HEADER_MASK_AA: u8 = 0b0000_0100;

/// Octet mask for the TC flag being set (truncated)
pub const HEADER_MASK_TC: u8 = 0b0000_0010;

/// Octet mask for the RD flag being set (desired)
pub const HEADER_MASK_RD: u8 = 0b0000_0001;

/// Octet mask for the RA flag being set (available)
pub const HEADER_MASK_RA: u8 = 0b1000_0000;

/// Octet mask for the rcode field.
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// Offset for the rcode field.
pub const HEADER_OFFSET_RCODE: usize = 0;

/// A DNS message: a header and four sections (RFC 1035 section 4.1).
/// Queries and responses share the format.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    fn with_header(header: Header, questions: Vec<Question>) -> Self {
        Self {
            header,
            questions,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// An empty response to this message, with the same ID, opcode,
    /// questions, and RD flag.
    pub fn make_response(&self) -> Self {
        Self::with_header(
            Header {
                is_response: true,
                opcode: self.header.opcode,
                recursion_available: true,
                ..Header::query(self.header.id, self.header.recursion_desired)
            },
            self.questions.clone(),
        )
    }

    /// The reply to a message which could not be parsed beyond its ID.
    pub fn make_format_error_response(id: u16) -> Self {
        Self::with_header(
            Header {
                is_response: true,
                recursion_available: true,
                rcode: Rcode::FormatError,
                ..Header::query(id, false)
            },
            Vec::new(),
        )
    }

    /// A standard query, without recursion desired.
    pub fn from_question(id: u16, question: Question) -> Self {
        Self::with_header(Header::query(id, false), vec![question])
    }
}

/// The fixed part of a message (RFC 1035 section 4.1.1).  The section
/// counts are not stored: they come from the `Message` when it is
/// serialised.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Header {
    /// Chosen by the sender of a query, and copied into the response.
    pub id: u16,

    /// QR
    pub is_response: bool,

    pub opcode: Opcode,

    /// AA: the responding server is an authority for the question
    /// name.
    pub is_authoritative: bool,

    /// TC: the response did not fit in the transport.  Over UDP this
    /// means retry over TCP.
    pub is_truncated: bool,

    /// RD
    pub recursion_desired: bool,

    /// RA
    pub recursion_available: bool,

    pub rcode: Rcode,
}

impl Header {
    fn query(id: u16, recursion_desired: bool) -> Self {
        Self {
            id,
            is_response: false,
            opcode: Opcode::Standard,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired,
            recursion_available: false,
            rcode: Rcode::NoError,
        }
    }
}

/// One entry of the question section (RFC 1035 section 4.1.2).  This
/// is also the key responses are cached under.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Question {
    pub name: DomainName,
    pub qtype: QueryType,
    pub qclass: QueryClass,
}

impl Question {
    pub fn is_unknown(&self) -> bool {
        self.qtype.is_unknown() || self.qclass.is_unknown()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.name.to_dotted_string(),
            self.qclass,
            self.qtype
        )
    }
}

/// A record from the answer, authority, or additional section (RFC
/// 1035 section 4.1.3).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct ResourceRecord {
    /// The owner name.
    pub name: DomainName,

    /// TYPE and RDATA.
    pub rtype_with_data: RecordTypeWithData,

    pub rclass: RecordClass,

    /// Seconds this record may be cached for.  0 means it may only be
    /// used for the current transaction.
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn is_unknown(&self) -> bool {
        self.rtype_with_data.is_unknown() || self.rclass.is_unknown()
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.rtype_with_data.matches(question.qtype) && self.rclass.matches(question.qclass)
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.rclass,
            self.rtype_with_data.rtype(),
            self.rtype_with_data
        )
    }
}

/// A record type with its associated, deserialised, data.
///
/// Names in RDATA are written uncompressed.  Types whose data is not
/// needed for resolution are kept as opaque octets.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordTypeWithData {
    /// An IPv4 host address.
    A { address: Ipv4Addr },

    /// A host authoritative for the owner's zone.
    NS { nsdname: DomainName },

    /// Obsolete, see `MX`.
    MD { madname: DomainName },

    /// Obsolete, see `MX`.
    MF { madname: DomainName },

    /// The owner is an alias for `cname`.
    CNAME { cname: DomainName },

    /// Start of a zone of authority.  The times are in seconds, and
    /// `minimum` is the TTL of negative responses from the zone.
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },

    /// A mailbox host.
    MB { madname: DomainName },

    /// A mail group member.
    MG { mdmname: DomainName },

    /// A mailbox rename.
    MR { newname: DomainName },

    NULL { octets: Bytes },

    WKS { octets: Bytes },

    /// Reverse lookups.
    PTR { ptrdname: DomainName },

    HINFO { octets: Bytes },

    /// Mailing list owner and error mailboxes.
    MINFO {
        rmailbx: DomainName,
        emailbx: DomainName,
    },

    /// A mail exchange, lower preferences are tried first.
    MX {
        preference: u16,
        exchange: DomainName,
    },

    /// The character strings, with their length octets.
    TXT { octets: Bytes },

    /// An IPv6 host address (RFC 3596).
    AAAA { address: Ipv6Addr },

    /// A service location (RFC 2782).
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },

    /// A digest of a child zone's `DNSKEY` (RFC 4034 section 5).
    DS {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Bytes,
    },

    /// A signature over the `type_covered` records at the owner name
    /// (RFC 4034 section 3).  Signatures are carried, not checked.
    RRSIG {
        type_covered: RecordType,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        signature_expiration: u32,
        signature_inception: u32,
        key_tag: u16,
        signer_name: DomainName,
        signature: Bytes,
    },

    /// A zone signing key (RFC 4034 section 2).
    DNSKEY {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Bytes,
    },

    /// A service binding (RFC 9460).  Priority 0 is alias mode.
    SVCB {
        priority: u16,
        target: DomainName,
        params: Vec<SvcParam>,
    },

    /// `SVCB` for HTTP origins.
    HTTPS {
        priority: u16,
        target: DomainName,
        params: Vec<SvcParam>,
    },

    Unknown {
        tag: RecordTypeUnknown,
        octets: Bytes,
    },
}

impl RecordTypeWithData {
    pub fn is_unknown(&self) -> bool {
        self.rtype().is_unknown()
    }

    pub fn matches(&self, qtype: QueryType) -> bool {
        self.rtype().matches(qtype)
    }

    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::NS { .. } => RecordType::NS,
            RecordTypeWithData::MD { .. } => RecordType::MD,
            RecordTypeWithData::MF { .. } => RecordType::MF,
            RecordTypeWithData::CNAME { .. } => RecordType::CNAME,
            RecordTypeWithData::SOA { .. } => RecordType::SOA,
            RecordTypeWithData::MB { .. } => RecordType::MB,
            RecordTypeWithData::MG { .. } => RecordType::MG,
            RecordTypeWithData::MR { .. } => RecordType::MR,
            RecordTypeWithData::NULL { .. } => RecordType::NULL,
            RecordTypeWithData::WKS { .. } => RecordType::WKS,
            RecordTypeWithData::PTR { .. } => RecordType::PTR,
            RecordTypeWithData::HINFO { .. } => RecordType::HINFO,
            RecordTypeWithData::MINFO { .. } => RecordType::MINFO,
            RecordTypeWithData::MX { .. } => RecordType::MX,
            RecordTypeWithData::TXT { .. } => RecordType::TXT,
            RecordTypeWithData::AAAA { .. } => RecordType::AAAA,
            RecordTypeWithData::SRV { .. } => RecordType::SRV,
            RecordTypeWithData::DS { .. } => RecordType::DS,
            RecordTypeWithData::RRSIG { .. } => RecordType::RRSIG,
            RecordTypeWithData::DNSKEY { .. } => RecordType::DNSKEY,
            RecordTypeWithData::SVCB { .. } => RecordType::SVCB,
            RecordTypeWithData::HTTPS { .. } => RecordType::HTTPS,
            RecordTypeWithData::Unknown { tag, .. } => RecordType::Unknown(*tag),
        }
    }
}

/// Presentation format of the RDATA, as it would appear in a zone
/// file.  Binary fields (keys, digests, signatures) are shown in hex.
impl fmt::Display for RecordTypeWithData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordTypeWithData::A { address } => write!(f, "{address}"),
            RecordTypeWithData::NS { nsdname } => write!(f, "{nsdname}"),
            RecordTypeWithData::MD { madname } => write!(f, "{madname}"),
            RecordTypeWithData::MF { madname } => write!(f, "{madname}"),
            RecordTypeWithData::CNAME { cname } => write!(f, "{cname}"),
            RecordTypeWithData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            RecordTypeWithData::MB { madname } => write!(f, "{madname}"),
            RecordTypeWithData::MG { mdmname } => write!(f, "{mdmname}"),
            RecordTypeWithData::MR { newname } => write!(f, "{newname}"),
            RecordTypeWithData::NULL { octets }
            | RecordTypeWithData::WKS { octets }
            | RecordTypeWithData::HINFO { octets }
            | RecordTypeWithData::TXT { octets } => write!(f, "{}", escape_octets(octets, true)),
            RecordTypeWithData::PTR { ptrdname } => write!(f, "{ptrdname}"),
            RecordTypeWithData::MINFO { rmailbx, emailbx } => write!(f, "{rmailbx} {emailbx}"),
            RecordTypeWithData::MX {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            RecordTypeWithData::AAAA { address } => write!(f, "{address}"),
            RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            RecordTypeWithData::DS {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => write!(f, "{key_tag} {algorithm} {digest_type} {}", hex(digest)),
            RecordTypeWithData::RRSIG {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                signature_expiration,
                signature_inception,
                key_tag,
                signer_name,
                signature,
            } => write!(
                f,
                "{type_covered} {algorithm} {labels} {original_ttl} {signature_expiration} {signature_inception} {key_tag} {signer_name} {}",
                hex(signature)
            ),
            RecordTypeWithData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => write!(f, "{flags} {protocol} {algorithm} {}", hex(public_key)),
            RecordTypeWithData::SVCB {
                priority,
                target,
                params,
            }
            | RecordTypeWithData::HTTPS {
                priority,
                target,
                params,
            } => {
                write!(f, "{priority} {target}")?;
                for param in params {
                    write!(f, " key{}={}", param.key, escape_octets(&param.value, true))?;
                }
                Ok(())
            }
            RecordTypeWithData::Unknown { octets, .. } => {
                write!(f, "\\# {} {}", octets.len(), hex(octets))
            }
        }
    }
}

/// Escape a string of octets for display, quoting it if asked.
fn escape_octets(octets: &[u8], quoted: bool) -> String {
    let mut out = String::with_capacity(2 + octets.len());

    if quoted {
        out.push('"');
    }

    for octet in octets {
        if *octet == b'"' || *octet == b'\\' || *octet == b';' || *octet == b'(' || *octet == b')' {
            out.push('\\');
            out.push(char::from(*octet));
        } else if *octet < 32 || *octet > 126 || (*octet == 32 && !quoted) {
            out.push_str(&format!("\\{octet:03}"));
        } else {
            out.push(char::from(*octet));
        }
    }

    if quoted {
        out.push('"');
    }

    out
}

fn hex(octets: &[u8]) -> String {
    octets.iter().map(|octet| format!("{octet:02x}")).collect()
}

/// A single SVCB / HTTPS service parameter.  The value is kept
/// uninterpreted.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SvcParam {
    pub key: u16,
    pub value: Bytes,
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for SvcParam {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self {
            key: u.arbitrary()?,
            value: arbitrary_octets(u, 32)?,
        })
    }
}

#[cfg(any(feature = "test-util", test))]
fn arbitrary_octets(u: &mut arbitrary::Unstructured<'_>, max_len: usize) -> arbitrary::Result<Bytes> {
    let len = u.int_in_range(0..=max_len)?;
    Ok(Bytes::copy_from_slice(u.bytes(len)?))
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordTypeWithData {
    // a uniform `u16` would almost never be a known type, so those
    // are picked from directly most of the time
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        use RecordTypeWithData as D;

        let rtype = if u.ratio(1, 4)? {
            RecordType::from(u.arbitrary::<u16>()?)
        } else {
            *u.choose(RecordType::KNOWN)?
        };

        Ok(match rtype {
            RecordType::A => D::A { address: u.arbitrary()? },
            RecordType::NS => D::NS { nsdname: u.arbitrary()? },
            RecordType::MD => D::MD { madname: u.arbitrary()? },
            RecordType::MF => D::MF { madname: u.arbitrary()? },
            RecordType::CNAME => D::CNAME { cname: u.arbitrary()? },
            RecordType::MB => D::MB { madname: u.arbitrary()? },
            RecordType::MG => D::MG { mdmname: u.arbitrary()? },
            RecordType::MR => D::MR { newname: u.arbitrary()? },
            RecordType::PTR => D::PTR { ptrdname: u.arbitrary()? },
            RecordType::AAAA => D::AAAA { address: u.arbitrary()? },
            RecordType::NULL => D::NULL { octets: arbitrary_octets(u, 128)? },
            RecordType::WKS => D::WKS { octets: arbitrary_octets(u, 128)? },
            RecordType::HINFO => D::HINFO { octets: arbitrary_octets(u, 128)? },
            RecordType::TXT => D::TXT { octets: arbitrary_octets(u, 128)? },
            RecordType::SOA => {
                let (mname, rname) = u.arbitrary()?;
                let (serial, refresh, retry, expire, minimum) = u.arbitrary()?;
                D::SOA { mname, rname, serial, refresh, retry, expire, minimum }
            }
            RecordType::MINFO => {
                let (rmailbx, emailbx) = u.arbitrary()?;
                D::MINFO { rmailbx, emailbx }
            }
            RecordType::MX => {
                let (preference, exchange) = u.arbitrary()?;
                D::MX { preference, exchange }
            }
            RecordType::SRV => {
                let (priority, weight, port, target) = u.arbitrary()?;
                D::SRV { priority, weight, port, target }
            }
            RecordType::DS => {
                let (key_tag, algorithm, digest_type) = u.arbitrary()?;
                let digest = arbitrary_octets(u, 64)?;
                D::DS { key_tag, algorithm, digest_type, digest }
            }
            RecordType::RRSIG => {
                let (type_covered, algorithm, labels, original_ttl) = u.arbitrary()?;
                let (signature_expiration, signature_inception, key_tag) = u.arbitrary()?;
                let signer_name = u.arbitrary()?;
                let signature = arbitrary_octets(u, 128)?;
                D::RRSIG {
                    type_covered,
                    algorithm,
                    labels,
                    original_ttl,
                    signature_expiration,
                    signature_inception,
                    key_tag,
                    signer_name,
                    signature,
                }
            }
            RecordType::DNSKEY => {
                let (flags, protocol, algorithm) = u.arbitrary()?;
                let public_key = arbitrary_octets(u, 128)?;
                D::DNSKEY { flags, protocol, algorithm, public_key }
            }
            RecordType::SVCB | RecordType::HTTPS => {
                let priority = u.arbitrary()?;
                let target = u.arbitrary()?;
                let num_params = u.int_in_range::<usize>(0..=4)?;
                let params = (0..num_params)
                    .map(|_| u.arbitrary())
                    .collect::<arbitrary::Result<Vec<_>>>()?;
                if rtype == RecordType::SVCB {
                    D::SVCB { priority, target, params }
                } else {
                    D::HTTPS { priority, target, params }
                }
            }
            RecordType::Unknown(tag) => D::Unknown {
                tag,
                octets: arbitrary_octets(u, 128)?,
            },
        })
    }
}

/// Define a 4-bit header field: an enum of the assigned values, with
/// every other value kept in a `Reserved` variant.
macro_rules! header_code {
    (
        $(#[$meta:meta])*
        $name:ident, $reserved:ident {
            $($variant:ident = $value:literal => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum $name {
            $($variant,)*
            Reserved($reserved),
        }

        /// An unassigned value, which can only be made by parsing one.
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $reserved(u8);

        impl $name {
            pub fn is_reserved(&self) -> bool {
                matches!(self, $name::Reserved(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str($text),)*
                    $name::Reserved(_) => f.write_str("reserved"),
                }
            }
        }

        /// Only the low 4 bits are used.
        impl From<u8> for $name {
            fn from(octet: u8) -> Self {
                match octet & 0b0000_1111 {
                    $($value => $name::$variant,)*
                    other => $name::Reserved($reserved(other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value,)*
                    $name::Reserved($reserved(octet)) => octet,
                }
            }
        }

        #[cfg(any(feature = "test-util", test))]
        impl<'a> arbitrary::Arbitrary<'a> for $name {
            fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
                Ok(Self::from(u.arbitrary::<u8>()?))
            }
        }
    };
}

header_code! {
    /// What sort of query this is.
    Opcode, OpcodeReserved {
        Standard = 0 => "query",
        Inverse = 1 => "inverse-query",
        Status = 2 => "status",
    }
}

header_code! {
    /// What sort of response this is.
    Rcode, RcodeReserved {
        NoError = 0 => "no-error",
        FormatError = 1 => "format-error",
        ServerFailure = 2 => "server-failure",
        NameError = 3 => "name-error",
        NotImplemented = 4 => "not-implemented",
        Refused = 5 => "refused",
    }
}

/// Query types are a superset of record types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryType {
    Record(RecordType),
    AXFR,
    MAILB,
    MAILA,
    Wildcard,
}

impl QueryType {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryType::Record(rtype) => rtype.is_unknown(),
            _ => false,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => rtype.fmt(f),
            QueryType::AXFR => write!(f, "AXFR"),
            QueryType::MAILA => write!(f, "MAILA"),
            QueryType::MAILB => write!(f, "MAILB"),
            QueryType::Wildcard => write!(f, "ANY"),
        }
    }
}

impl FromStr for QueryType {
    type Err = RecordTypeFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AXFR" => Ok(QueryType::AXFR),
            "MAILA" => Ok(QueryType::MAILA),
            "MAILB" => Ok(QueryType::MAILB),
            "ANY" => Ok(QueryType::Wildcard),
            _ => RecordType::from_str(s).map(QueryType::Record),
        }
    }
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            252 => QueryType::AXFR,
            253 => QueryType::MAILB,
            254 => QueryType::MAILA,
            255 => QueryType::Wildcard,
            _ => QueryType::Record(RecordType::from(value)),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::AXFR => 252,
            QueryType::MAILB => 253,
            QueryType::MAILA => 254,
            QueryType::Wildcard => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Query classes are a superset of record classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    Wildcard,
}

impl QueryClass {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryClass::Record(rclass) => rclass.is_unknown(),
            QueryClass::Wildcard => false,
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => rclass.fmt(f),
            QueryClass::Wildcard => write!(f, "ANY"),
        }
    }
}

impl FromStr for QueryClass {
    type Err = RecordClassFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANY" => Ok(QueryClass::Wildcard),
            _ => RecordClass::from_str(s).map(QueryClass::Record),
        }
    }
}

impl From<u16> for QueryClass {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryClass::Wildcard,
            _ => QueryClass::Record(RecordClass::from(value)),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Wildcard => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Define `RecordType` from a table of mnemonics and type numbers,
/// along with its conversions to and from `u16` and strings.
macro_rules! record_types {
    ($($(#[$doc:meta])* $name:ident = $value:literal,)*) => {
        /// Record types are used by resource records and by queries.
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum RecordType {
            $($(#[$doc])* $name,)*
            Unknown(RecordTypeUnknown),
        }

        impl RecordType {
            /// Every type other than `Unknown`, in type number order.
            pub const KNOWN: &'static [RecordType] = &[$(RecordType::$name,)*];

            fn mnemonic(self) -> Option<&'static str> {
                match self {
                    $(RecordType::$name => Some(stringify!($name)),)*
                    RecordType::Unknown(_) => None,
                }
            }

            fn from_mnemonic(s: &str) -> Option<Self> {
                match s {
                    $(stringify!($name) => Some(RecordType::$name),)*
                    _ => None,
                }
            }
        }

        impl From<u16> for RecordType {
            fn from(value: u16) -> Self {
                match value {
                    $($value => RecordType::$name,)*
                    _ => RecordType::Unknown(RecordTypeUnknown(value)),
                }
            }
        }

        impl From<RecordType> for u16 {
            fn from(value: RecordType) -> Self {
                match value {
                    $(RecordType::$name => $value,)*
                    RecordType::Unknown(RecordTypeUnknown(value)) => value,
                }
            }
        }
    };
}

record_types! {
    A = 1,
    NS = 2,
    MD = 3,
    MF = 4,
    CNAME = 5,
    SOA = 6,
    MB = 7,
    MG = 8,
    MR = 9,
    NULL = 10,
    WKS = 11,
    PTR = 12,
    HINFO = 13,
    MINFO = 14,
    MX = 15,
    TXT = 16,
    /// RFC 3596
    AAAA = 28,
    /// RFC 2782
    SRV = 33,
    /// RFC 4034
    DS = 43,
    /// RFC 4034
    RRSIG = 46,
    /// RFC 4034
    DNSKEY = 48,
    /// RFC 9460
    SVCB = 64,
    /// RFC 9460
    HTTPS = 65,
}

/// A type number with no `RecordType` variant.  The constructor is
/// private so that known types always use their variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }

    pub fn matches(&self, qtype: QueryType) -> bool {
        match qtype {
            QueryType::Wildcard => true,
            QueryType::Record(rtype) => rtype == *self,
            _ => false,
        }
    }
}

/// Mnemonics, or the RFC 3597 `TYPE<n>` form for unknown types.
impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => f.write_str(mnemonic),
            None => write!(f, "TYPE{}", u16::from(*self)),
        }
    }
}

impl FromStr for RecordType {
    type Err = RecordTypeFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rtype) = Self::from_mnemonic(s) {
            return Ok(rtype);
        }

        let number = s.strip_prefix("TYPE").ok_or(RecordTypeFromStr::NoParse)?;
        u16::from_str(number)
            .map(RecordType::from)
            .map_err(|_| RecordTypeFromStr::BadType)
    }
}

/// Errors that can arise when converting a `&str` into a `RecordType`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeFromStr {
    BadType,
    NoParse,
}

impl fmt::Display for RecordTypeFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordTypeFromStr::BadType => write!(f, "TYPE<num> number must be a u16"),
            RecordTypeFromStr::NoParse => write!(f, "could not parse string to type"),
        }
    }
}

impl std::error::Error for RecordTypeFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordClassUnknown(u16);

impl RecordClass {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordClass::Unknown(_))
    }

    pub fn matches(&self, qclass: QueryClass) -> bool {
        match qclass {
            QueryClass::Wildcard => true,
            QueryClass::Record(rclass) => rclass == *self,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "CLASS{n}"),
        }
    }
}

impl FromStr for RecordClass {
    type Err = RecordClassFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "IN" {
            return Ok(RecordClass::IN);
        }

        let number = s.strip_prefix("CLASS").ok_or(RecordClassFromStr::NoParse)?;
        u16::from_str(number)
            .map(RecordClass::from)
            .map_err(|_| RecordClassFromStr::BadClass)
    }
}

/// Errors that can arise when converting a `&str` into a `RecordClass`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClassFromStr {
    BadClass,
    NoParse,
}

impl fmt::Display for RecordClassFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClassFromStr::BadClass => write!(f, "CLASS<num> number must be a u16"),
            RecordClassFromStr::NoParse => write!(f, "could not parse string to class"),
        }
    }
}

impl std::error::Error for RecordClassFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(RecordClassUnknown(value)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}


#[cfg(any(feature = "test-util", test))]
#[allow(clippy::missing_panics_doc)]
pub mod test_util {
    use super::*;

    use arbitrary::{Arbitrary, Unstructured};
    use rand::Rng;

    /// Generate a value from random input, retrying with more input
    /// if it runs out.
    fn arbitrary_value<T: for<'a> Arbitrary<'a>>() -> T {
        let mut rng = rand::rng();
        for size in [256, 1024, 4096, 16384] {
            let entropy: Vec<u8> = (0..size).map(|_| rng.random()).collect();
            if let Ok(value) = T::arbitrary(&mut Unstructured::new(&entropy)) {
                return value;
            }
        }

        panic!("could not generate arbitrary value!");
    }

    pub fn arbitrary_resourcerecord() -> ResourceRecord {
        arbitrary_value()
    }

    pub fn arbitrary_message() -> Message {
        arbitrary_value()
    }

    pub fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    /// An `IN` record with a TTL of 300.
    pub fn record(name: &str, rtype_with_data: RecordTypeWithData) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data,
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        record(name, RecordTypeWithData::A { address })
    }

    pub fn aaaa_record(name: &str, address: Ipv6Addr) -> ResourceRecord {
        record(name, RecordTypeWithData::AAAA { address })
    }

    pub fn cname_record(name: &str, target: &str) -> ResourceRecord {
        record(name, RecordTypeWithData::CNAME { cname: domain(target) })
    }

    pub fn ns_record(zone: &str, nameserver: &str) -> ResourceRecord {
        record(zone, RecordTypeWithData::NS { nsdname: domain(nameserver) })
    }

    /// An `SOA` whose negative-caching TTL is 300.
    pub fn soa_record(zone: &str) -> ResourceRecord {
        record(
            zone,
            RecordTypeWithData::SOA {
                mname: domain("ns.example."),
                rname: domain("hostmaster.example."),
                serial: 1,
                refresh: 3600,
                retry: 600,
                expire: 86400,
                minimum: 300,
            },
        )
    }

    /// A record of type 100, which has no structured form.
    pub fn unknown_record(name: &str, octets: &[u8]) -> ResourceRecord {
        record(
            name,
            RecordTypeWithData::Unknown {
                tag: RecordTypeUnknown(100),
                octets: Bytes::copy_from_slice(octets),
            },
        )
    }
}
