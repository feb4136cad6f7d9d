//! LBER encoder
//!
//! # Usage Example
//!
//! ```rust
//! use ldap_asn1::ber::{BerEncoder, Node};
//!
//! let mut encoder = BerEncoder::new();
//! encoder.encode_node(&Node::sequence(vec![Node::integer(1), Node::text("cn=admin")]));
//! let bytes = encoder.into_bytes();
//! assert_eq!(bytes[0], 0x30);
//! ```

use crate::ber::node::Node;
use crate::ber::types::{universal, Identifier, Length};
use bytes::{BufMut, Bytes, BytesMut};
use ldap_core::LdapResult;
use std::io::Write;

/// LBER encoder
///
/// Follows the restricted BER profile required by LDAP:
/// - definite lengths only, in minimal form
/// - primitive OCTET STRING only
/// - BOOLEAN true encoded as `0xFF`
/// - INTEGER/ENUMERATED in minimal two's complement
///
/// Encoding a well-formed [`Node`] tree into memory cannot fail; the only
/// fallible operation is [`BerEncoder::write_to`].
pub struct BerEncoder {
    buffer: BytesMut,
}

impl BerEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Encode a TLV (Tag-Length-Value) triplet
    ///
    /// # Arguments
    /// * `identifier` - Class, constructed bit and tag number
    /// * `value` - Content octets (already encoded)
    ///
    /// # Encoding Process
    /// 1. Write the identifier octets (high tag number form above 30)
    /// 2. Write the definite length, short form below 128
    /// 3. Append the content octets
    ///
    /// # Why This Method?
    /// Every typed `encode_*` method and [`encode_node`](Self::encode_node)
    /// ends here, so all output shares one header layout and always uses
    /// the definite length form LDAP requires.
    pub fn encode_tlv(&mut self, identifier: &Identifier, value: &[u8]) {
        identifier.encode_into(&mut self.buffer);
        Length::new(value.len()).encode_into(&mut self.buffer);
        self.buffer.put_slice(value);
    }

    /// BOOLEAN: one content octet, `0xFF` or `0x00`
    pub fn encode_boolean(&mut self, value: bool) {
        let id = Identifier::universal(false, universal::BOOLEAN);
        self.encode_tlv(&id, &[boolean_octet(value)]);
    }

    /// INTEGER in minimal two's complement
    pub fn encode_integer(&mut self, value: i64) {
        let id = Identifier::universal(false, universal::INTEGER);
        self.encode_tlv(&id, &integer_octets(value));
    }

    /// ENUMERATED, same content rules as INTEGER
    pub fn encode_enumerated(&mut self, value: i64) {
        let id = Identifier::universal(false, universal::ENUMERATED);
        self.encode_tlv(&id, &integer_octets(value));
    }

    /// NULL: zero-length content
    pub fn encode_null(&mut self) {
        let id = Identifier::universal(false, universal::NULL);
        self.encode_tlv(&id, &[]);
    }

    /// OCTET STRING, primitive form
    pub fn encode_octet_string(&mut self, value: &[u8]) {
        let id = Identifier::universal(false, universal::OCTET_STRING);
        self.encode_tlv(&id, value);
    }

    /// Encode a node as identifier + length + content
    ///
    /// Structured values are the only recursive case: their children are
    /// encoded into a temporary buffer in list order first, so the length
    /// is known before anything is written.
    pub fn encode_node(&mut self, node: &Node) {
        match node {
            Node::Choice(alternative) => self.encode_node(alternative),
            Node::Boolean(v) => self.encode_boolean(*v),
            Node::Integer(v) => self.encode_integer(*v),
            Node::Enumerated(v) => self.encode_enumerated(*v),
            Node::Null => self.encode_null(),
            Node::OctetString(v) => self.encode_octet_string(v),
            Node::CharString(_, s) => self.encode_tlv(&node.identifier(), s.as_bytes()),
            Node::Sequence(_) | Node::Set(_) | Node::Tagged(_) => {
                let mut content = BerEncoder::new();
                content.encode_content(node);
                self.encode_tlv(&node.identifier(), content.as_bytes());
            }
        }
    }

    /// Encode only the content octets of a node, without tag and length
    ///
    /// This is what an implicit tag writes after its own tag and length.
    pub fn encode_content(&mut self, node: &Node) {
        match node {
            Node::Boolean(v) => self.buffer.put_u8(boolean_octet(*v)),
            Node::Integer(v) | Node::Enumerated(v) => self.buffer.put_slice(&integer_octets(*v)),
            Node::Null => {}
            Node::OctetString(v) => self.buffer.put_slice(v),
            Node::CharString(_, s) => self.buffer.put_slice(s.as_bytes()),
            Node::Sequence(children) | Node::Set(children) => {
                for child in children {
                    self.encode_node(child);
                }
            }
            Node::Choice(alternative) => self.encode_content(alternative),
            Node::Tagged(tagged) => {
                if tagged.is_explicit() {
                    self.encode_node(tagged.inner());
                } else {
                    self.encode_content(tagged.inner());
                }
            }
        }
    }

    /// Write the accumulated encoding to a byte sink
    pub fn write_to<W: Write>(&self, writer: &mut W) -> LdapResult<()> {
        writer.write_all(&self.buffer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Get the encoded bytes without copying
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Get a reference to the encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BerEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a node tree to LBER octets
pub fn encode(node: &Node) -> Vec<u8> {
    node.to_ber()
}

fn boolean_octet(value: bool) -> u8 {
    if value { 0xFF } else { 0x00 }
}

/// Minimal two's complement content octets of an integer
///
/// Octets are produced least significant first by shifting right 8 bits at
/// a time, stopping as soon as the remaining value is pure sign extension
/// of the last octet emitted.
pub fn integer_octets(value: i64) -> Vec<u8> {
    let mut octets = Vec::with_capacity(8);
    let mut remaining = value;
    loop {
        let octet = (remaining & 0xFF) as u8;
        octets.push(octet);
        remaining >>= 8;
        let sign_bit_set = octet & 0x80 != 0;
        if (remaining == 0 && !sign_bit_set) || (remaining == -1 && sign_bit_set) {
            break;
        }
    }
    octets.reverse(); // big-endian
    octets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::node::Tagged;
    use crate::ber::types::TagClass;

    #[test]
    fn test_integer_minimal_octet_counts() {
        let cases: [(i64, usize); 8] = [
            (0, 1),
            (-1, 1),
            (127, 1),
            (128, 2),
            (-128, 1),
            (-129, 2),
            (2147483647, 4),
            (-2147483648, 4),
        ];
        for (value, expected) in cases {
            assert_eq!(integer_octets(value).len(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_integer_octets_values() {
        assert_eq!(integer_octets(0), vec![0x00]);
        assert_eq!(integer_octets(128), vec![0x00, 0x80]);
        assert_eq!(integer_octets(-129), vec![0xFF, 0x7F]);
        assert_eq!(integer_octets(256), vec![0x01, 0x00]);
        assert_eq!(integer_octets(i64::MIN).len(), 8);
        assert_eq!(integer_octets(i64::MAX).len(), 8);
    }

    #[test]
    fn test_boolean_canonical_form() {
        assert_eq!(encode(&Node::boolean(true)), vec![0x01, 0x01, 0xFF]);
        assert_eq!(encode(&Node::boolean(false)), vec![0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_null_and_octet_string() {
        assert_eq!(encode(&Node::null()), vec![0x05, 0x00]);
        assert_eq!(encode(&Node::text("Hello")), b"\x04\x05Hello".to_vec());
    }

    #[test]
    fn test_sequence_encodes_children_in_order() {
        let node = Node::sequence(vec![Node::integer(1), Node::text("a")]);
        assert_eq!(encode(&node), vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, b'a']);
    }

    #[test]
    fn test_long_content_uses_long_form_length() {
        let node = Node::octet_string(vec![0u8; 200]);
        let bytes = encode(&node);
        assert_eq!(&bytes[..3], &[0x04, 0x81, 200]);
        assert_eq!(bytes.len(), 203);
    }

    #[test]
    fn test_implicit_tag_suppresses_inner_tag() {
        let node = Node::tagged(Tagged::context(0, Node::text("x")));
        assert_eq!(encode(&node), vec![0x80, 0x01, b'x']);
    }

    #[test]
    fn test_explicit_tag_wraps_inner_encoding() {
        let node = Node::tagged(Tagged::explicit(TagClass::ContextSpecific, 0, Node::text("x")));
        assert_eq!(encode(&node), vec![0xA0, 0x03, 0x04, 0x01, b'x']);
    }

    #[test]
    fn test_choice_encodes_as_alternative() {
        let choice = Node::choice(Node::tagged(Tagged::context(7, Node::text("uid"))));
        assert_eq!(encode(&choice), vec![0x87, 0x03, b'u', b'i', b'd']);
    }

    #[test]
    fn test_write_to_sink() {
        let mut encoder = BerEncoder::new();
        encoder.encode_integer(5);
        let mut sink = Vec::new();
        encoder.write_to(&mut sink).unwrap();
        assert_eq!(sink, vec![0x02, 0x01, 0x05]);
    }

    #[test]
    fn test_freeze_shares_encoding() {
        let mut encoder = BerEncoder::new();
        encoder.encode_node(&Node::sequence(vec![Node::null()]));
        assert_eq!(encoder.len(), 4);
        let bytes = encoder.freeze();
        assert_eq!(&bytes[..], &[0x30, 0x02, 0x05, 0x00]);
    }
}
