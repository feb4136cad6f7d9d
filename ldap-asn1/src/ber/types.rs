//! BER identifier and length primitives

use bytes::BufMut;
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};

/// Universal tag numbers used by the LBER subset
pub mod universal {
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const ENUMERATED: u32 = 10;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const NUMERIC_STRING: u32 = 18;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const TELETEX_STRING: u32 = 20;
    pub const VIDEOTEX_STRING: u32 = 21;
    pub const IA5_STRING: u32 = 22;
    pub const GRAPHIC_STRING: u32 = 25;
    pub const VISIBLE_STRING: u32 = 26;
    pub const GENERAL_STRING: u32 = 27;
}

/// Largest number of length octets accepted in long form
const MAX_LENGTH_OCTETS: usize = 4;

/// BER Tag Class
///
/// ASN.1 defines four tag classes:
/// - **Universal**: Standard ASN.1 types (INTEGER, OCTET STRING, etc.)
/// - **Application**: Application-specific types (LDAP protocol operations)
/// - **Context-specific**: Context-dependent types (fields inside SEQUENCE/CHOICE)
/// - **Private**: Private/implementation-specific types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl TagClass {
    /// Get tag class from bits 8-7 of an identifier octet
    pub fn from_bits(octet: u8) -> Self {
        match (octet >> 6) & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    /// Convert tag class to bits (for encoding)
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// ASN.1 identifier (tag)
///
/// # Encoding Format
///
/// Low tag number form (tag number 0-30):
/// ```text
/// Bits: 8 7 6 5 4 3 2 1
///       C C P T T T T T
/// ```
///
/// High tag number form (tag number >= 31):
/// ```text
/// First octet:      C C P 1 1 1 1 1
/// Following octets: 1 T T T T T T T  (last octet has bit 8 = 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    class: TagClass,
    constructed: bool,
    number: u32,
}

impl Identifier {
    pub fn new(class: TagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Create a Universal class identifier
    pub fn universal(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::Universal, constructed, number)
    }

    /// Create an Application class identifier
    pub fn application(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::Application, constructed, number)
    }

    /// Create a Context-specific class identifier
    pub fn context_specific(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::ContextSpecific, constructed, number)
    }

    /// Create a Private class identifier
    pub fn private(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::Private, constructed, number)
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Check class and number, ignoring the constructed bit
    pub fn matches(&self, class: TagClass, number: u32) -> bool {
        self.class == class && self.number == number
    }

    /// Encode identifier to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Append the identifier octets to a buffer
    ///
    /// # Arguments
    /// * `buf` - Any [`BufMut`], typically the encoder's `BytesMut`
    ///
    /// # Encoding Process
    /// 1. Class in bits 8-7, constructed flag in bit 6
    /// 2. Tag numbers up to 30 go in bits 5-1 of the same octet
    /// 3. Larger numbers set bits 5-1 to `0x1F` and follow as base-128
    ///    groups, most significant first, with bit 8 set on all but the last
    ///
    /// # Why Write Into a Buffer?
    /// The encoder appends header and content to one growing buffer, so no
    /// temporary `Vec` is allocated per value. [`encode`](Self::encode)
    /// wraps this for callers that want owned octets.
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        let class_bits = self.class.to_bits();
        let constructed_bit = if self.constructed { 0x20 } else { 0x00 };

        if self.number <= 30 {
            buf.put_u8(class_bits | constructed_bit | (self.number as u8 & 0x1F));
            return;
        }

        buf.put_u8(class_bits | constructed_bit | 0x1F);

        // base-128, most significant group first
        let mut groups = Vec::with_capacity(5);
        let mut remaining = self.number;
        while remaining > 0 {
            groups.push((remaining & 0x7F) as u8);
            remaining >>= 7;
        }
        for (i, &group) in groups.iter().rev().enumerate() {
            if i < groups.len() - 1 {
                buf.put_u8(group | 0x80);
            } else {
                buf.put_u8(group);
            }
        }
    }

    /// Number of octets this identifier occupies on the wire
    pub fn encoded_len(&self) -> usize {
        if self.number <= 30 {
            1
        } else {
            let bits = 32 - self.number.leading_zeros() as usize;
            1 + bits.div_ceil(7)
        }
    }

    /// Decode an identifier from the start of `data`
    ///
    /// # Returns
    /// Returns `Ok((Identifier, octets_consumed))`
    ///
    /// # Errors
    /// - `TruncatedStream` if the data ends before the last continuation octet
    /// - `MalformedStructure` if the tag number does not fit in 32 bits
    pub fn decode(data: &[u8]) -> LdapResult<(Self, usize)> {
        let Some(&first) = data.first() else {
            return Err(LdapError::TruncatedStream(
                "empty buffer for identifier".to_string(),
            ));
        };

        let class = TagClass::from_bits(first);
        let constructed = (first & 0x20) != 0;
        let low_bits = first & 0x1F;

        if low_bits < 0x1F {
            return Ok((Self::new(class, constructed, low_bits as u32), 1));
        }

        let mut number = 0u32;
        let mut pos = 1;
        loop {
            let Some(&octet) = data.get(pos) else {
                return Err(LdapError::TruncatedStream(format!(
                    "identifier ends after {} octets inside high tag number form",
                    pos
                )));
            };
            if number > (u32::MAX >> 7) {
                return Err(LdapError::MalformedStructure(
                    "tag number exceeds 32 bits".to_string(),
                ));
            }
            number = (number << 7) | (octet & 0x7F) as u32;
            pos += 1;
            if octet & 0x80 == 0 {
                break;
            }
        }

        Ok((Self::new(class, constructed, number), pos))
    }
}

/// BER length field
///
/// Short form for 0-127, long form `0x80 | n` followed by `n` big-endian
/// octets otherwise. The single octet `0x80` denotes the indefinite form,
/// which the LBER codec rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    /// Short form: length 0-127
    Short(u8),
    /// Long form: length encoded with length-of-length
    Long(usize),
    /// Indefinite form (`0x80`)
    Indefinite,
}

impl Length {
    /// Create a definite length, choosing the short form when it fits
    pub fn new(length: usize) -> Self {
        if length < 0x80 {
            Length::Short(length as u8)
        } else {
            Length::Long(length)
        }
    }

    /// The definite length value, or `UnsupportedLengthForm` for indefinite
    pub fn definite(&self) -> LdapResult<usize> {
        match self {
            Length::Short(l) => Ok(*l as usize),
            Length::Long(l) => Ok(*l),
            Length::Indefinite => Err(LdapError::UnsupportedLengthForm(
                "indefinite length encoding".to_string(),
            )),
        }
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, Length::Indefinite)
    }

    /// Encode length to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Append the length octets to a buffer
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        match *self {
            Length::Short(length) => buf.put_u8(length),
            Length::Long(length) => {
                let num_octets = Self::long_form_octets(length);
                buf.put_u8(0x80 | num_octets as u8);
                for i in (0..num_octets).rev() {
                    buf.put_u8(((length >> (i * 8)) & 0xFF) as u8);
                }
            }
            Length::Indefinite => buf.put_u8(0x80),
        }
    }

    /// Number of octets this length field occupies on the wire
    pub fn encoded_len(&self) -> usize {
        match *self {
            Length::Short(_) | Length::Indefinite => 1,
            Length::Long(length) => 1 + Self::long_form_octets(length),
        }
    }

    fn long_form_octets(length: usize) -> usize {
        let mut num_octets = 0;
        let mut temp = length;
        while temp > 0 {
            num_octets += 1;
            temp >>= 8;
        }
        num_octets.max(1)
    }

    /// Decode a length field from the start of `data`
    ///
    /// # Returns
    /// Returns `Ok((Length, octets_consumed))`
    ///
    /// # Errors
    /// - `TruncatedStream` if the data ends inside the length field
    /// - `UnsupportedLengthForm` for the reserved `0xFF` octet or more than
    ///   4 length octets
    pub fn decode(data: &[u8]) -> LdapResult<(Self, usize)> {
        let Some(&first) = data.first() else {
            return Err(LdapError::TruncatedStream(
                "empty buffer for length".to_string(),
            ));
        };

        if first & 0x80 == 0 {
            return Ok((Length::Short(first), 1));
        }

        let num_octets = (first & 0x7F) as usize;
        if num_octets == 0 {
            return Ok((Length::Indefinite, 1));
        }
        if num_octets == 0x7F {
            return Err(LdapError::UnsupportedLengthForm(
                "reserved length octet 0xFF".to_string(),
            ));
        }
        if num_octets > MAX_LENGTH_OCTETS {
            return Err(LdapError::UnsupportedLengthForm(format!(
                "{} length octets (max {})",
                num_octets, MAX_LENGTH_OCTETS
            )));
        }
        if data.len() < 1 + num_octets {
            return Err(LdapError::TruncatedStream(format!(
                "long form length needs {} octets, got {}",
                1 + num_octets,
                data.len()
            )));
        }

        let length = data[1..=num_octets]
            .iter()
            .fold(0usize, |acc, &octet| (acc << 8) | octet as usize);

        Ok((Length::Long(length), 1 + num_octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_short_form() {
        let id = Identifier::universal(false, universal::INTEGER);
        assert_eq!(id.encode(), vec![0x02]);
    }

    #[test]
    fn test_identifier_constructed_application() {
        let id = Identifier::application(true, 3);
        assert_eq!(id.encode(), vec![0x63]);
    }

    #[test]
    fn test_identifier_high_tag_number() {
        let id = Identifier::context_specific(false, 200);
        let encoded = id.encode();
        assert_eq!(encoded, vec![0x9F, 0x81, 0x48]);
        assert_eq!(id.encoded_len(), 3);
        let (decoded, consumed) = Identifier::decode(&encoded).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_identifier_31_uses_high_form() {
        let encoded = Identifier::universal(false, 31).encode();
        assert_eq!(encoded, vec![0x1F, 0x1F]);
    }

    #[test]
    fn test_identifier_decode() {
        let (id, consumed) = Identifier::decode(&[0xA3, 0x00]).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(id.class(), TagClass::ContextSpecific);
        assert!(id.is_constructed());
        assert_eq!(id.number(), 3);
    }

    #[test]
    fn test_identifier_truncated_continuation() {
        let err = Identifier::decode(&[0x1F, 0x81]).unwrap_err();
        assert!(matches!(err, LdapError::TruncatedStream(_)));
        let err = Identifier::decode(&[]).unwrap_err();
        assert!(matches!(err, LdapError::TruncatedStream(_)));
    }

    #[test]
    fn test_identifier_overflow() {
        let err = Identifier::decode(&[0x1F, 0x8F, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]).unwrap_err();
        assert!(matches!(err, LdapError::MalformedStructure(_)));
    }

    #[test]
    fn test_length_boundaries() {
        assert_eq!(Length::new(0).encode(), vec![0x00]);
        assert_eq!(Length::new(127).encode(), vec![0x7F]);
        assert_eq!(Length::new(128).encode(), vec![0x81, 0x80]);
        assert_eq!(Length::new(255).encode(), vec![0x81, 0xFF]);
        assert_eq!(Length::new(65535).encode(), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(Length::new(65536).encoded_len(), 4);
    }

    #[test]
    fn test_length_decode() {
        assert_eq!(Length::decode(&[100]).unwrap(), (Length::Short(100), 1));
        assert_eq!(
            Length::decode(&[0x82, 0x01, 0x00]).unwrap(),
            (Length::Long(256), 3)
        );
    }

    #[test]
    fn test_length_indefinite_is_recognised_then_rejected() {
        let (length, consumed) = Length::decode(&[0x80]).unwrap();
        assert_eq!(consumed, 1);
        assert!(length.is_indefinite());
        assert!(matches!(
            length.definite(),
            Err(LdapError::UnsupportedLengthForm(_))
        ));
    }

    #[test]
    fn test_length_truncated_and_oversized() {
        assert!(matches!(
            Length::decode(&[0x82, 0x01]),
            Err(LdapError::TruncatedStream(_))
        ));
        assert!(matches!(
            Length::decode(&[0x85, 0, 0, 0, 0, 1]),
            Err(LdapError::UnsupportedLengthForm(_))
        ));
        assert!(matches!(
            Length::decode(&[0xFF]),
            Err(LdapError::UnsupportedLengthForm(_))
        ));
    }
}
