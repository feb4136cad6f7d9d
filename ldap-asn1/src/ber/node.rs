//! Tagged-value node taxonomy
//!
//! A [`Node`] is one ASN.1 value in the LBER subset. Scalars carry their
//! native value, structured variants own their children in wire order,
//! `Choice` delegates its identifier to the selected alternative and
//! `Tagged` carries an explicit or implicit context/application tag.

use crate::ber::decoder::{BerDecoder, DecoderOptions};
use crate::ber::encoder::BerEncoder;
use crate::ber::types::{universal, Identifier, TagClass};
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};

/// Restricted character string types
///
/// All of them are OCTET STRING on the wire apart from their tag; the
/// content is carried as UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharStringKind {
    Utf8,
    Numeric,
    Printable,
    Teletex,
    Videotex,
    Ia5,
    Graphic,
    Visible,
    General,
}

impl CharStringKind {
    /// Universal tag number of this string type
    pub fn tag_number(self) -> u32 {
        match self {
            CharStringKind::Utf8 => universal::UTF8_STRING,
            CharStringKind::Numeric => universal::NUMERIC_STRING,
            CharStringKind::Printable => universal::PRINTABLE_STRING,
            CharStringKind::Teletex => universal::TELETEX_STRING,
            CharStringKind::Videotex => universal::VIDEOTEX_STRING,
            CharStringKind::Ia5 => universal::IA5_STRING,
            CharStringKind::Graphic => universal::GRAPHIC_STRING,
            CharStringKind::Visible => universal::VISIBLE_STRING,
            CharStringKind::General => universal::GENERAL_STRING,
        }
    }

    pub fn from_tag_number(number: u32) -> Option<Self> {
        match number {
            universal::UTF8_STRING => Some(CharStringKind::Utf8),
            universal::NUMERIC_STRING => Some(CharStringKind::Numeric),
            universal::PRINTABLE_STRING => Some(CharStringKind::Printable),
            universal::TELETEX_STRING => Some(CharStringKind::Teletex),
            universal::VIDEOTEX_STRING => Some(CharStringKind::Videotex),
            universal::IA5_STRING => Some(CharStringKind::Ia5),
            universal::GRAPHIC_STRING => Some(CharStringKind::Graphic),
            universal::VISIBLE_STRING => Some(CharStringKind::Visible),
            universal::GENERAL_STRING => Some(CharStringKind::General),
            _ => None,
        }
    }
}

/// One ASN.1 value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// BOOLEAN
    Boolean(bool),
    /// INTEGER
    Integer(i64),
    /// ENUMERATED
    Enumerated(i64),
    /// NULL
    Null,
    /// OCTET STRING (primitive form only)
    OctetString(Vec<u8>),
    /// Restricted character string
    CharString(CharStringKind, String),
    /// SEQUENCE and SEQUENCE OF
    Sequence(Vec<Node>),
    /// SET and SET OF
    Set(Vec<Node>),
    /// CHOICE, identified by its selected alternative
    Choice(Box<Node>),
    /// Context, application or private tag around another node
    Tagged(Tagged),
}

impl Node {
    pub fn boolean(value: bool) -> Self {
        Node::Boolean(value)
    }

    pub fn integer(value: i64) -> Self {
        Node::Integer(value)
    }

    pub fn enumerated(value: i64) -> Self {
        Node::Enumerated(value)
    }

    pub fn null() -> Self {
        Node::Null
    }

    pub fn octet_string(value: impl Into<Vec<u8>>) -> Self {
        Node::OctetString(value.into())
    }

    /// OCTET STRING carrying UTF-8 text (LDAPString, LDAPDN, ...)
    pub fn text(value: &str) -> Self {
        Node::OctetString(value.as_bytes().to_vec())
    }

    pub fn char_string(kind: CharStringKind, value: impl Into<String>) -> Self {
        Node::CharString(kind, value.into())
    }

    pub fn sequence(children: Vec<Node>) -> Self {
        Node::Sequence(children)
    }

    /// SEQUENCE OF: same wire form as SEQUENCE
    pub fn sequence_of(children: Vec<Node>) -> Self {
        Node::Sequence(children)
    }

    pub fn new_set(children: Vec<Node>) -> Self {
        Node::Set(children)
    }

    /// SET OF: same wire form as SET, transmitted in list order
    pub fn set_of(children: Vec<Node>) -> Self {
        Node::Set(children)
    }

    pub fn choice(alternative: Node) -> Self {
        Node::Choice(Box::new(alternative))
    }

    pub fn tagged(tagged: Tagged) -> Self {
        Node::Tagged(tagged)
    }

    /// Identifier written in front of this node's content
    pub fn identifier(&self) -> Identifier {
        match self {
            Node::Boolean(_) => Identifier::universal(false, universal::BOOLEAN),
            Node::Integer(_) => Identifier::universal(false, universal::INTEGER),
            Node::Enumerated(_) => Identifier::universal(false, universal::ENUMERATED),
            Node::Null => Identifier::universal(false, universal::NULL),
            Node::OctetString(_) => Identifier::universal(false, universal::OCTET_STRING),
            Node::CharString(kind, _) => Identifier::universal(false, kind.tag_number()),
            Node::Sequence(_) => Identifier::universal(true, universal::SEQUENCE),
            Node::Set(_) => Identifier::universal(true, universal::SET),
            Node::Choice(alternative) => alternative.identifier(),
            Node::Tagged(tagged) => tagged.identifier(),
        }
    }

    /// Write the full TLV encoding of this node
    pub fn encode(&self, encoder: &mut BerEncoder) {
        encoder.encode_node(self);
    }

    /// Full TLV encoding as a fresh buffer
    pub fn to_ber(&self) -> Vec<u8> {
        let mut encoder = BerEncoder::new();
        encoder.encode_node(self);
        encoder.into_bytes()
    }

    /// Short ASN.1 type name, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Boolean(_) => "BOOLEAN",
            Node::Integer(_) => "INTEGER",
            Node::Enumerated(_) => "ENUMERATED",
            Node::Null => "NULL",
            Node::OctetString(_) => "OCTET STRING",
            Node::CharString(..) => "character string",
            Node::Sequence(_) => "SEQUENCE",
            Node::Set(_) => "SET",
            Node::Choice(_) => "CHOICE",
            Node::Tagged(_) => "tagged value",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Node::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enumerated(&self) -> Option<i64> {
        match self {
            Node::Enumerated(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw octets of an OCTET STRING or character string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Node::OctetString(v) => Some(v),
            Node::CharString(_, s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Text content of an OCTET STRING or character string
    ///
    /// # Errors
    /// - `InvalidTextEncoding` if the octets are not UTF-8
    /// - `MalformedStructure` if this node carries no string content
    pub fn to_text(&self) -> LdapResult<String> {
        match self {
            Node::OctetString(bytes) => String::from_utf8(bytes.clone())
                .map_err(|e| LdapError::InvalidTextEncoding(e.to_string())),
            Node::CharString(_, s) => Ok(s.clone()),
            other => Err(LdapError::MalformedStructure(format!(
                "expected string content, got {}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Node::Tagged(t) => Some(t),
            _ => None,
        }
    }

    /// Children of a SEQUENCE or SET
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(c) | Node::Set(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Node::Sequence(_) | Node::Set(_))
    }

    fn children_mut(&mut self) -> LdapResult<&mut Vec<Node>> {
        match self {
            Node::Sequence(c) | Node::Set(c) => Ok(c),
            other => Err(LdapError::MalformedStructure(format!(
                "{} has no elements",
                other.kind_name()
            ))),
        }
    }

    /// Element `index` of a SEQUENCE or SET
    pub fn get(&self, index: usize) -> LdapResult<&Node> {
        let children = self.children().ok_or_else(|| {
            LdapError::MalformedStructure(format!("{} has no elements", self.kind_name()))
        })?;
        children.get(index).ok_or(LdapError::IndexOutOfRange {
            index,
            len: children.len(),
        })
    }

    /// Replace element `index` of a SEQUENCE or SET
    pub fn set(&mut self, index: usize, node: Node) -> LdapResult<()> {
        let children = self.children_mut()?;
        let len = children.len();
        let slot = children
            .get_mut(index)
            .ok_or(LdapError::IndexOutOfRange { index, len })?;
        *slot = node;
        Ok(())
    }

    /// Append an element to a SEQUENCE or SET
    pub fn push(&mut self, node: Node) -> LdapResult<()> {
        self.children_mut()?.push(node);
        Ok(())
    }

    /// Number of elements of a SEQUENCE or SET; 0 for other variants
    pub fn len(&self) -> usize {
        self.children().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Boolean(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Integer(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::Integer(value as i64)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::text(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::OctetString(value.into_bytes())
    }
}

impl From<Vec<u8>> for Node {
    fn from(value: Vec<u8>) -> Self {
        Node::OctetString(value)
    }
}

impl From<&[u8]> for Node {
    fn from(value: &[u8]) -> Self {
        Node::OctetString(value.to_vec())
    }
}

impl From<Tagged> for Node {
    fn from(value: Tagged) -> Self {
        Node::Tagged(value)
    }
}

/// A node carrying its own tag
///
/// Explicit tagging wraps the complete inner TLV in a new constructed
/// tag. Implicit tagging replaces the inner tag, writing only the inner
/// content.
///
/// The decoder cannot know what an application or context tag stands
/// for, so it produces implicit `Tagged` values whose inner node is an
/// OCTET STRING holding the raw content octets. [`Tagged::decode_children`]
/// and [`Tagged::decode_explicit`] reinterpret that content once the
/// caller knows the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagged {
    identifier: Identifier,
    explicit: bool,
    inner: Box<Node>,
}

impl Tagged {
    /// Explicit tag: always constructed
    pub fn explicit(class: TagClass, number: u32, inner: Node) -> Self {
        Self {
            identifier: Identifier::new(class, true, number),
            explicit: true,
            inner: Box::new(inner),
        }
    }

    /// Implicit tag: constructed exactly when the inner value is
    pub fn implicit(class: TagClass, number: u32, inner: Node) -> Self {
        let constructed = inner.identifier().is_constructed();
        Self {
            identifier: Identifier::new(class, constructed, number),
            explicit: false,
            inner: Box::new(inner),
        }
    }

    /// `[number] IMPLICIT` in the context-specific class
    pub fn context(number: u32, inner: Node) -> Self {
        Self::implicit(TagClass::ContextSpecific, number, inner)
    }

    /// `[APPLICATION number] IMPLICIT`
    pub fn application(number: u32, inner: Node) -> Self {
        Self::implicit(TagClass::Application, number, inner)
    }

    /// Raw content as produced by the decoder for a non-universal tag
    pub fn opaque(identifier: Identifier, content: Vec<u8>) -> Self {
        Self {
            identifier,
            explicit: false,
            inner: Box::new(Node::OctetString(content)),
        }
    }

    pub fn identifier(&self) -> Identifier {
        self.identifier
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn inner(&self) -> &Node {
        &self.inner
    }

    pub fn into_inner(self) -> Node {
        *self.inner
    }

    /// Check class and number of the wrapper tag
    pub fn is(&self, class: TagClass, number: u32) -> bool {
        self.identifier.matches(class, number)
    }

    /// Content octets as they appear on the wire after tag and length
    pub fn content_octets(&self) -> Vec<u8> {
        let mut encoder = BerEncoder::new();
        if self.explicit {
            encoder.encode_node(&self.inner);
        } else {
            encoder.encode_content(&self.inner);
        }
        encoder.into_bytes()
    }

    /// Content interpreted as UTF-8 text (`[n] IMPLICIT LDAPString`)
    pub fn content_text(&self) -> LdapResult<String> {
        String::from_utf8(self.content_octets())
            .map_err(|e| LdapError::InvalidTextEncoding(e.to_string()))
    }

    /// Content interpreted as a list of TLVs (`[n] IMPLICIT SEQUENCE`)
    pub fn decode_children(&self) -> LdapResult<Vec<Node>> {
        self.decode_children_with(DecoderOptions::default())
    }

    pub fn decode_children_with(&self, options: DecoderOptions) -> LdapResult<Vec<Node>> {
        self.decode_children_at(options, 0)
    }

    /// Content interpreted as a list of TLVs, for a tagged value found at
    /// nesting level `depth`
    ///
    /// The tagged value counts as one constructed level: `max_depth` and
    /// `max_length` apply exactly as if the decoder had known the inner
    /// type on the first pass.
    ///
    /// # Errors
    /// * `DepthExceeded` when `depth` already reaches `options.max_depth`
    pub fn decode_children_at(&self, options: DecoderOptions, depth: usize) -> LdapResult<Vec<Node>> {
        if depth >= options.max_depth {
            return Err(LdapError::DepthExceeded {
                limit: options.max_depth,
            });
        }
        let content = self.content_octets();
        BerDecoder::nested(&content, options, depth + 1).decode_all()
    }

    /// Content interpreted as exactly one TLV (`[n] EXPLICIT T`)
    pub fn decode_explicit(&self) -> LdapResult<Node> {
        self.decode_explicit_at(DecoderOptions::default(), 0)
    }

    pub fn decode_explicit_at(&self, options: DecoderOptions, depth: usize) -> LdapResult<Node> {
        let mut children = self.decode_children_at(options, depth)?;
        if children.len() != 1 {
            return Err(LdapError::MalformedStructure(format!(
                "explicit tag [{}] must hold exactly one value, found {}",
                self.identifier.number(),
                children.len()
            )));
        }
        Ok(children.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_delegates_identifier() {
        let choice = Node::choice(Node::integer(5));
        assert_eq!(choice.identifier(), Identifier::universal(false, universal::INTEGER));
    }

    #[test]
    fn test_implicit_tag_inherits_constructed_bit() {
        let primitive = Tagged::context(7, Node::text("cn"));
        assert!(!primitive.identifier().is_constructed());
        let constructed = Tagged::context(3, Node::sequence(vec![]));
        assert!(constructed.identifier().is_constructed());
        let explicit = Tagged::explicit(TagClass::ContextSpecific, 2, Node::null());
        assert!(explicit.identifier().is_constructed());
    }

    #[test]
    fn test_structured_accessors() {
        let mut seq = Node::sequence(vec![Node::integer(1)]);
        seq.push(Node::text("a")).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get(1).unwrap(), &Node::text("a"));
        seq.set(0, Node::boolean(true)).unwrap();
        assert_eq!(seq.get(0).unwrap(), &Node::Boolean(true));
        assert!(matches!(
            seq.get(2),
            Err(LdapError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            seq.set(5, Node::null()),
            Err(LdapError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_accessors_on_scalar_fail() {
        let mut scalar = Node::integer(3);
        assert!(matches!(scalar.push(Node::null()), Err(LdapError::MalformedStructure(_))));
        assert!(matches!(scalar.get(0), Err(LdapError::MalformedStructure(_))));
        assert_eq!(scalar.len(), 0);
    }

    #[test]
    fn test_text_round_trip_and_invalid_utf8() {
        assert_eq!(Node::text("José").to_text().unwrap(), "José");
        let bad = Node::octet_string(vec![0xC3, 0x28]);
        assert!(matches!(bad.to_text(), Err(LdapError::InvalidTextEncoding(_))));
    }

    #[test]
    fn test_content_octets_explicit_vs_implicit() {
        let implicit = Tagged::context(0, Node::text("x"));
        assert_eq!(implicit.content_octets(), b"x".to_vec());
        let explicit = Tagged::explicit(TagClass::ContextSpecific, 0, Node::text("x"));
        assert_eq!(explicit.content_octets(), vec![0x04, 0x01, b'x']);
        assert_eq!(explicit.decode_explicit().unwrap(), Node::text("x"));
    }

    #[test]
    fn test_decode_children_of_opaque_content() {
        let tagged = Tagged::opaque(
            Identifier::application(true, 1),
            vec![0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00],
        );
        let children = tagged.decode_children().unwrap();
        assert_eq!(
            children,
            vec![Node::enumerated(0), Node::text(""), Node::text("")]
        );
    }

    #[test]
    fn test_reinterpreting_content_counts_toward_depth() {
        let tagged = Tagged::opaque(
            Identifier::application(true, 8),
            vec![0x04, 0x01, b'a', 0x30, 0x03, 0x04, 0x01, b'b'],
        );
        let options = DecoderOptions::default().with_max_depth(2);
        assert_eq!(tagged.decode_children_at(options, 0).unwrap().len(), 2);
        // the SEQUENCE inside now sits one level deeper than allowed
        assert!(matches!(
            tagged.decode_children_at(options, 1),
            Err(LdapError::DepthExceeded { limit: 2 })
        ));
        assert!(matches!(
            tagged.decode_children_at(DecoderOptions::default().with_max_length(1), 0),
            Err(LdapError::MalformedStructure(_))
        ));
    }
}
