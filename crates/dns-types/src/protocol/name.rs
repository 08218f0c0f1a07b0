use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::protocol::punycode;

#[cfg(any(feature = "test-util", test))]
use bytes::{BufMut, BytesMut};

/// Maximum encoded length of a domain name.  The number of labels
/// plus sum of the lengths of the labels.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum number of labels in a domain name, including the root.
/// Every non-root label takes at least two octets, so no name within
/// `DOMAINNAME_MAX_LEN` can exceed this.
pub const DOMAINNAME_MAX_LABELS: usize = 128;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// The ASCII-compatible encoding prefix of an internationalised label.
pub const IDN_PREFIX: &[u8] = b"xn--";

/// A domain name is a sequence of labels, where each label is a
/// length octet followed by that number of octets.
///
/// A label must be 63 octets or shorter.  A name must be 255 octets
/// or shorter in total, including both length and label octets.
///
/// Labels are stored leaf-first, always ending with the empty root
/// label.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
    // INVARIANT: len == len(labels) + sum(map(len, labels))
    pub len: usize,
}

impl DomainName {
    pub fn root_domain() -> Self {
        DomainName {
            labels: vec![Label::new()],
            len: 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.len == 1 && self.labels[0].is_empty()
    }

    /// A name is a subdomain of itself.
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.ends_with(&other.labels)
    }

    /// Number of labels, not counting the root.
    pub fn label_count(&self) -> usize {
        self.labels.len() - 1
    }

    /// Append `suffix` to this name: `www` + `example.com.` is
    /// `www.example.com.`.
    ///
    /// # Errors
    ///
    /// If the combined name is too long.
    pub fn concat(&self, suffix: &Self) -> Result<Self, DomainNameError> {
        let mut labels = self.labels.clone();
        labels.pop();
        labels.extend_from_slice(&suffix.labels);
        DomainName::from_labels(labels)
    }

    /// Keep only the last `keep` non-root labels: stripping
    /// `www.example.com.` to 2 gives `example.com.`, and to 0 gives
    /// the root.
    pub fn strip_to(&self, keep: usize) -> Self {
        if keep >= self.label_count() {
            return self.clone();
        }

        let labels = self.labels[self.labels.len() - 1 - keep..].to_vec();
        let len = labels.iter().map(|label| 1 + usize::from(label.len())).sum();
        DomainName { labels, len }
    }

    /// The immediately enclosing name, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(self.strip_to(self.label_count() - 1))
        }
    }

    /// The wire form as a dotted string, in its original case and with
    /// a trailing dot.  Internationalised labels are shown in their
    /// `xn--` form.
    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.len);
        let mut first = true;
        for label in &self.labels {
            if first {
                first = false;
            } else {
                out.push('.');
            }
            for octet in label.octets() {
                out.push(char::from(*octet));
            }
        }

        out
    }

    /// Like `to_dotted_string`, but internationalised labels are shown
    /// in their unicode form.
    pub fn to_unicode_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        self.labels
            .iter()
            .map(Label::to_unicode)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Parse a dotted string.  The empty string and `"."` are both the
    /// root, and the trailing dot is optional: all names are treated as
    /// absolute.  Labels containing non-ASCII characters are converted
    /// to their `xn--` form.
    ///
    /// # Errors
    ///
    /// `InvalidLabel` if a label is over 63 octets or the whole name
    /// is over 255 octets, `InvalidName` if there is an empty label.
    pub fn from_dotted_string(s: &str) -> Result<Self, DomainNameError> {
        if s.is_empty() || s == "." {
            return Ok(Self::root_domain());
        }

        let s = s.strip_suffix('.').unwrap_or(s);
        let mut labels = Vec::with_capacity(s.len() / 4 + 1);

        for chunk in s.split('.') {
            if chunk.is_empty() {
                return Err(DomainNameError::InvalidName);
            }
            labels.push(Label::from_unicode(chunk).map_err(|_| DomainNameError::InvalidLabel)?);
        }
        labels.push(Label::new());

        Self::from_labels(labels)
    }

    /// Build a name from its labels.  The root label is appended if
    /// missing.
    ///
    /// # Errors
    ///
    /// `InvalidLabel` if the name is over 255 octets, `InvalidName` if
    /// there is an empty label before the end.
    pub fn from_labels(mut labels: Vec<Label>) -> Result<Self, DomainNameError> {
        if !labels.last().is_some_and(Label::is_empty) {
            labels.push(Label::new());
        }

        let mut len = 0;
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() && i != labels.len() - 1 {
                return Err(DomainNameError::InvalidName);
            }
            len += 1 + usize::from(label.len());
        }

        if len > DOMAINNAME_MAX_LEN || labels.len() > DOMAINNAME_MAX_LABELS {
            return Err(DomainNameError::InvalidLabel);
        }

        Ok(Self { labels, len })
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.to_dotted_string())
    }
}

impl FromStr for DomainName {
    type Err = DomainNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::from_dotted_string(s)
    }
}

/// Errors that can arise when constructing a `DomainName`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DomainNameError {
    /// A label is longer than 63 octets, or the name is longer than
    /// 255.
    InvalidLabel,
    /// The name has an empty label somewhere other than the root.
    InvalidName,
}

impl fmt::Display for DomainNameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DomainNameError::InvalidLabel => write!(f, "label or name too long"),
            DomainNameError::InvalidName => write!(f, "name has an empty label"),
        }
    }
}

impl std::error::Error for DomainNameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for DomainName {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_labels = u.int_in_range::<usize>(0..=10)?;
        let mut labels = Vec::new();
        for _ in 0..num_labels {
            labels.push(u.arbitrary()?);
        }
        labels.push(Label::new());
        DomainName::from_labels(labels).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

/// A label is just a sequence of octets, which are compared as
/// case-insensitive ASCII.  A label can be no longer than 63 octets.
///
/// The octets are kept in their original case, so a name survives a
/// round trip through the wire format unchanged.
#[derive(Clone)]
pub struct Label {
    /// Private to this module so constructing an invalid `Label` is
    /// impossible.
    octets: Bytes,
    kind: LabelKind,
    unicode: OnceLock<String>,
}

/// What sort of label this is, determined once from the octets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LabelKind {
    /// The empty label at the end of every name.
    Root,
    /// `*`
    Wildcard,
    /// Letters, digits, and interior hyphens.
    Ldh,
    /// An LDH label with the `xn--` prefix.
    Idn,
    /// Letters, digits, and hyphens, but starting or ending with a
    /// hyphen.
    LeadingOrTrailingHyphen,
    /// Starts with `_`, like `_sip` or `_tcp`.
    Underscore,
    /// Anything else.
    NonLdh,
}

impl LabelKind {
    fn classify(octets: &[u8]) -> Self {
        let Some((first, last)) = octets.first().zip(octets.last()) else {
            return LabelKind::Root;
        };

        if octets == b"*" {
            LabelKind::Wildcard
        } else if *first == b'_' {
            LabelKind::Underscore
        } else if !octets
            .iter()
            .all(|octet| octet.is_ascii_alphanumeric() || *octet == b'-')
        {
            LabelKind::NonLdh
        } else if *first == b'-' || *last == b'-' {
            LabelKind::LeadingOrTrailingHyphen
        } else if octets.len() > IDN_PREFIX.len()
            && octets[..IDN_PREFIX.len()].eq_ignore_ascii_case(IDN_PREFIX)
        {
            LabelKind::Idn
        } else {
            LabelKind::Ldh
        }
    }
}

impl Label {
    /// Create a new, empty, label.
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
            kind: LabelKind::Root,
            unicode: OnceLock::new(),
        }
    }

    pub fn wildcard() -> Self {
        Self {
            octets: Bytes::from_static(b"*"),
            kind: LabelKind::Wildcard,
            unicode: OnceLock::new(),
        }
    }

    /// Make a label from user input.  ASCII input is taken as-is,
    /// anything else is lowercased and punycode-encoded with the
    /// `xn--` prefix.
    ///
    /// # Errors
    ///
    /// If the encoded label is over 63 octets.
    pub fn from_unicode(s: &str) -> Result<Self, LabelError> {
        if s.is_ascii() {
            return Label::try_from(s.as_bytes());
        }

        let lowercase = s.to_lowercase();
        let encoded = punycode::encode(&lowercase).ok_or(LabelError::NotEncodable)?;

        let mut octets = Vec::with_capacity(IDN_PREFIX.len() + encoded.len());
        octets.extend_from_slice(IDN_PREFIX);
        octets.extend_from_slice(encoded.as_bytes());

        let label = Label::try_from(&octets[..])?;
        _ = label.unicode.set(lowercase);
        Ok(label)
    }

    pub fn len(&self) -> u8 {
        // safe as construction ensures a label is <= 63 octets
        #[allow(clippy::cast_possible_truncation)]
        let len = self.octets.len() as u8;
        len
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == LabelKind::Wildcard
    }

    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    /// The octets, in their original case.
    pub fn octets(&self) -> &Bytes {
        &self.octets
    }

    /// The display form of the label: the decoded U-label for an
    /// `xn--` label, and the octets as-is for anything else.  Computed
    /// on first use.
    pub fn to_unicode(&self) -> &str {
        self.unicode.get_or_init(|| {
            let ace = self
                .octets
                .iter()
                .map(|octet| char::from(*octet))
                .collect::<String>();
            if self.kind == LabelKind::Idn {
                if let Some(decoded) = punycode::decode(&ace[IDN_PREFIX.len()..]) {
                    return decoded;
                }
            }
            ace
        })
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.octets.len());
        for octet in &self.octets {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.octets
            .iter()
            .map(u8::to_ascii_lowercase)
            .cmp(other.octets.iter().map(u8::to_ascii_lowercase))
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label")
            .field("octets", &String::from_utf8_lossy(&self.octets))
            .field("kind", &self.kind)
            .finish()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = LabelError;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        if octets.len() > LABEL_MAX_LEN {
            return Err(LabelError::TooLong);
        }

        Ok(Self {
            octets: Bytes::copy_from_slice(octets),
            kind: LabelKind::classify(octets),
            unicode: OnceLock::new(),
        })
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Label {
    // only generates non-empty labels
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Label> {
        let label_len = u.int_in_range::<u8>(1..=20)?;
        let mut octets = BytesMut::with_capacity(label_len.into());
        let bs = u.bytes(label_len.into())?;
        for b in bs {
            let ascii_byte = if b.is_ascii() { *b } else { *b % 128 };
            octets.put_u8(
                if ascii_byte == b'.'
                    || ascii_byte == b'*'
                    || ascii_byte == b'@'
                    || ascii_byte == b'#'
                    || (ascii_byte as char).is_whitespace()
                {
                    b'x'
                } else {
                    ascii_byte
                },
            );
        }
        Label::try_from(&octets.freeze()[..]).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

/// Errors that can arise when constructing a `Label`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LabelError {
    TooLong,
    NotEncodable,
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LabelError::TooLong => write!(f, "label longer than {LABEL_MAX_LEN} octets"),
            LabelError::NotEncodable => write!(f, "label cannot be punycode-encoded"),
        }
    }
}

impl std::error::Error for LabelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use std::collections::HashSet;

    use super::*;

    fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    fn label(s: &str) -> Label {
        Label::try_from(s.as_bytes()).unwrap()
    }

    #[test]
    fn domainname_root_conversions() {
        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::from_dotted_string(".")
        );

        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::from_dotted_string("")
        );

        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::from_labels(vec![Label::new()])
        );

        assert_eq!(1, DomainName::root_domain().labels.len());
        assert_eq!(".", DomainName::root_domain().to_dotted_string());
    }

    #[test]
    fn domainname_trailing_dot_is_optional() {
        assert_eq!(domain("example.com."), domain("example.com"));
        assert_eq!(13, domain("example.com").len);
    }

    #[test]
    fn domainname_is_case_insensitive() {
        assert_eq!(domain("CS.fau.de"), domain("cs.fau.de"));

        let mut set = HashSet::new();
        set.insert(domain("CS.fau.de"));
        assert!(set.contains(&domain("cs.FAU.de")));
    }

    #[test]
    fn domainname_preserves_case_for_display() {
        assert_eq!("CS.fau.de.", domain("CS.fau.de").to_dotted_string());
    }

    #[test]
    fn domainname_rejects_long_label() {
        let name = format!("{}.com", "a".repeat(64));
        assert_eq!(
            Err(DomainNameError::InvalidLabel),
            DomainName::from_dotted_string(&name)
        );

        let name = format!("{}.com", "a".repeat(63));
        assert!(DomainName::from_dotted_string(&name).is_ok());
    }

    #[test]
    fn domainname_rejects_long_name() {
        // 4 * (1 + 63) + 1 = 257 octets
        let name = vec!["a".repeat(63); 4].join(".");
        assert_eq!(
            Err(DomainNameError::InvalidLabel),
            DomainName::from_dotted_string(&name)
        );

        // 3 * (1 + 63) + (1 + 61) + 1 = 255 octets
        let name = format!("{}.{}", vec!["a".repeat(63); 3].join("."), "a".repeat(61));
        assert_eq!(Ok(255), DomainName::from_dotted_string(&name).map(|d| d.len));
    }

    #[test]
    fn domainname_rejects_empty_interior_label() {
        assert_eq!(
            Err(DomainNameError::InvalidName),
            DomainName::from_dotted_string("www..example.com.")
        );
        assert_eq!(
            Err(DomainNameError::InvalidName),
            DomainName::from_dotted_string(".example.com")
        );
        assert_eq!(
            Err(DomainNameError::InvalidName),
            DomainName::from_labels(vec![label("www"), Label::new(), label("com")])
        );
    }

    #[test]
    fn from_labels_appends_root() {
        assert_eq!(
            Ok(domain("www.example.com.")),
            DomainName::from_labels(vec![label("www"), label("example"), label("com")])
        );
    }

    #[test]
    fn concat_is_subdomain() {
        let sub = domain("foo.");
        let apex = domain("bar.");
        let combined = sub.concat(&apex);

        assert_eq!(Ok(domain("foo.bar.")), combined);
        assert!(combined.unwrap().is_subdomain_of(&apex));
    }

    #[test]
    fn concat_rejects_long_result() {
        let long = domain(&vec!["a".repeat(63); 3].join("."));
        assert_eq!(Err(DomainNameError::InvalidLabel), long.concat(&long));
    }

    #[test]
    fn strip_to_keeps_suffix() {
        let name = domain("www.example.com.");

        assert_eq!(DomainName::root_domain(), name.strip_to(0));
        assert_eq!(domain("com."), name.strip_to(1));
        assert_eq!(domain("example.com."), name.strip_to(2));
        assert_eq!(name, name.strip_to(3));
        assert_eq!(name, name.strip_to(10));
        assert_eq!(domain("example.com.").len, name.strip_to(2).len);
    }

    #[test]
    fn parent_walks_to_root() {
        let name = domain("www.example.com.");
        assert_eq!(Some(domain("example.com.")), name.parent());
        assert_eq!(None, DomainName::root_domain().parent());
    }

    #[test]
    fn is_subdomain_of_ignores_case() {
        assert!(domain("www.EXAMPLE.com.").is_subdomain_of(&domain("example.COM.")));
        assert!(domain("example.com.").is_subdomain_of(&domain("example.com.")));
        assert!(domain("example.com.").is_subdomain_of(&DomainName::root_domain()));
        assert!(!domain("example.com.").is_subdomain_of(&domain("www.example.com.")));
        assert!(!domain("badexample.com.").is_subdomain_of(&domain("example.com.")));
    }

    #[test]
    fn label_classification() {
        assert_eq!(LabelKind::Root, Label::new().kind());
        assert_eq!(LabelKind::Wildcard, label("*").kind());
        assert_eq!(LabelKind::Ldh, label("www").kind());
        assert_eq!(LabelKind::Ldh, label("a-b-c").kind());
        assert_eq!(LabelKind::Idn, label("xn--mller-kva").kind());
        assert_eq!(LabelKind::Idn, label("XN--mller-kva").kind());
        assert_eq!(LabelKind::LeadingOrTrailingHyphen, label("-abc").kind());
        assert_eq!(LabelKind::LeadingOrTrailingHyphen, label("abc-").kind());
        assert_eq!(LabelKind::Underscore, label("_sip").kind());
        assert_eq!(LabelKind::NonLdh, label("a b").kind());
        assert!(Label::wildcard().is_wildcard());
        assert_eq!(label("*"), Label::wildcard());
    }

    #[test]
    fn unicode_input_is_ace_encoded() {
        let name = domain("müller.de");
        assert_eq!("xn--mller-kva.de.", name.to_dotted_string());
        assert_eq!("müller.de.", name.to_unicode_string());
        assert_eq!(LabelKind::Idn, name.labels[0].kind());
    }

    #[test]
    fn ace_input_displays_as_unicode() {
        let name = domain("xn--mller-kva.de");
        assert_eq!("müller.de.", name.to_unicode_string());
        assert_eq!(domain("müller.de"), name);
    }

    #[test]
    fn invalid_ace_displays_as_is() {
        let name = domain("xn--mller-kv!a.de");
        assert_eq!(name.to_dotted_string(), name.to_unicode_string());
    }

    #[test]
    fn label_too_long() {
        assert_eq!(
            Err(LabelError::TooLong),
            Label::try_from("a".repeat(64).as_bytes())
        );
    }

    #[test]
    fn label_ordering_ignores_case() {
        assert_eq!(Ordering::Equal, label("ABC").cmp(&label("abc")));
        assert_eq!(Ordering::Less, label("abc").cmp(&label("ABD")));
    }

    #[test]
    fn domainname_conversions() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let labels_len = rng.random_range(0..5);

            let mut dotted_string_input = String::new();
            let mut labels_input = Vec::with_capacity(labels_len);
            let mut output = String::new();

            for i in 0..labels_len {
                let label_len = rng.random_range(1..10);

                if i > 0 {
                    dotted_string_input.push('.');
                    output.push('.');
                }

                let mut octets = Vec::with_capacity(label_len);
                for _ in 0..label_len {
                    let mut chr = rng.random_range(32..126);

                    if chr == b'.'
                        || chr == b'*'
                        || chr == b'@'
                        || chr == b'#'
                        || (chr as char).is_whitespace()
                    {
                        chr = b'X';
                    }

                    octets.push(chr);
                    dotted_string_input.push(chr as char);
                    output.push(chr as char);
                }
                labels_input.push(Label::try_from(&octets[..]).unwrap());
            }

            labels_input.push(Label::new());
            dotted_string_input.push('.');
            output.push('.');

            assert_eq!(
                Ok(output.clone()),
                DomainName::from_dotted_string(&dotted_string_input).map(|d| d.to_dotted_string())
            );

            assert_eq!(
                Ok(output),
                DomainName::from_labels(labels_input.clone()).map(|d| d.to_dotted_string())
            );

            assert_eq!(
                DomainName::from_dotted_string(&dotted_string_input),
                DomainName::from_labels(labels_input)
            );
        }
    }
}
