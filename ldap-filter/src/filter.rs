//! Filter AST and its CHOICE encoding
//!
//! ```text
//! Filter ::= CHOICE {
//!     and             [0] SET OF Filter,
//!     or              [1] SET OF Filter,
//!     not             [2] Filter,
//!     equalityMatch   [3] AttributeValueAssertion,
//!     substrings      [4] SubstringFilter,
//!     greaterOrEqual  [5] AttributeValueAssertion,
//!     lessOrEqual     [6] AttributeValueAssertion,
//!     present         [7] AttributeDescription,
//!     approxMatch     [8] AttributeValueAssertion,
//!     extensibleMatch [9] MatchingRuleAssertion }
//! ```
//!
//! `not` is the only explicitly tagged alternative, since its content is
//! itself a CHOICE.

use crate::escape::escape_filter_value;
use ldap_asn1::ber::{DecoderOptions, Node, NodeCursor, TagClass, Tagged};
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context tag numbers of the `Filter` alternatives
pub mod tags {
    pub const AND: u32 = 0;
    pub const OR: u32 = 1;
    pub const NOT: u32 = 2;
    pub const EQUALITY_MATCH: u32 = 3;
    pub const SUBSTRINGS: u32 = 4;
    pub const GREATER_OR_EQUAL: u32 = 5;
    pub const LESS_OR_EQUAL: u32 = 6;
    pub const PRESENT: u32 = 7;
    pub const APPROX_MATCH: u32 = 8;
    pub const EXTENSIBLE_MATCH: u32 = 9;

    pub const SUBSTRING_INITIAL: u32 = 0;
    pub const SUBSTRING_ANY: u32 = 1;
    pub const SUBSTRING_FINAL: u32 = 2;

    pub const MATCHING_RULE: u32 = 1;
    pub const MATCH_TYPE: u32 = 2;
    pub const MATCH_VALUE: u32 = 3;
    pub const DN_ATTRIBUTES: u32 = 4;
}

/// Maximum nesting of `and`/`or`/`not` accepted when parsing or decoding
pub const MAX_FILTER_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValueAssertion {
    pub attribute: String,
    pub value: Vec<u8>,
}

impl AttributeValueAssertion {
    pub fn new(attribute: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.attribute),
            Node::octet_string(self.value.clone()),
        ])
    }

    fn from_tagged(tagged: &Tagged, options: DecoderOptions, depth: usize) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("AttributeValueAssertion", tagged, options, depth)?;
        let attribute = cursor.next_string("attributeDesc")?;
        let value = cursor.next_octet_string("assertionValue")?;
        cursor.finish();
        Ok(Self { attribute, value })
    }
}

/// One component of a substring assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Substring {
    Initial(Vec<u8>),
    Any(Vec<u8>),
    Final(Vec<u8>),
}

impl Substring {
    fn tag_number(&self) -> u32 {
        match self {
            Substring::Initial(_) => tags::SUBSTRING_INITIAL,
            Substring::Any(_) => tags::SUBSTRING_ANY,
            Substring::Final(_) => tags::SUBSTRING_FINAL,
        }
    }

    pub fn value(&self) -> &[u8] {
        match self {
            Substring::Initial(v) | Substring::Any(v) | Substring::Final(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringFilter {
    pub attribute: String,
    pub substrings: Vec<Substring>,
}

impl SubstringFilter {
    fn to_node(&self) -> Node {
        let components = self
            .substrings
            .iter()
            .map(|s| {
                Node::choice(Node::tagged(Tagged::context(
                    s.tag_number(),
                    Node::octet_string(s.value().to_vec()),
                )))
            })
            .collect();
        Node::sequence(vec![
            Node::text(&self.attribute),
            Node::sequence_of(components),
        ])
    }

    fn from_tagged(tagged: &Tagged, options: DecoderOptions, depth: usize) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("SubstringFilter", tagged, options, depth)?;
        let attribute = cursor.next_string("type")?;
        let mut substrings = Vec::new();
        for component in cursor.next_sequence("substrings")? {
            let t = match component {
                Node::Tagged(t) => t,
                other => {
                    return Err(LdapError::MalformedStructure(format!(
                        "SubstringFilter.substrings: expected tagged value, got {}",
                        other.kind_name()
                    )));
                }
            };
            let value = t.content_octets();
            let substring = match t.identifier().number() {
                tags::SUBSTRING_INITIAL => Substring::Initial(value),
                tags::SUBSTRING_ANY => Substring::Any(value),
                tags::SUBSTRING_FINAL => Substring::Final(value),
                other => {
                    return Err(LdapError::MalformedStructure(format!(
                        "SubstringFilter.substrings: unknown component [{}]",
                        other
                    )));
                }
            };
            substrings.push(substring);
        }
        if substrings.is_empty() {
            return Err(LdapError::MalformedStructure(
                "SubstringFilter.substrings: empty sequence".to_string(),
            ));
        }
        cursor.finish();
        Ok(Self {
            attribute,
            substrings,
        })
    }
}

/// `extensibleMatch`: `(attr:dn:rule:=value)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRuleAssertion {
    pub matching_rule: Option<String>,
    pub attribute: Option<String>,
    pub value: Vec<u8>,
    pub dn_attributes: bool,
}

impl MatchingRuleAssertion {
    fn to_node(&self) -> Node {
        let mut fields = Vec::with_capacity(4);
        if let Some(rule) = &self.matching_rule {
            fields.push(Node::tagged(Tagged::context(tags::MATCHING_RULE, Node::text(rule))));
        }
        if let Some(attribute) = &self.attribute {
            fields.push(Node::tagged(Tagged::context(tags::MATCH_TYPE, Node::text(attribute))));
        }
        fields.push(Node::tagged(Tagged::context(
            tags::MATCH_VALUE,
            Node::octet_string(self.value.clone()),
        )));
        // dnAttributes BOOLEAN DEFAULT FALSE
        if self.dn_attributes {
            fields.push(Node::tagged(Tagged::context(tags::DN_ATTRIBUTES, Node::boolean(true))));
        }
        Node::sequence(fields)
    }

    fn from_tagged(tagged: &Tagged, options: DecoderOptions, depth: usize) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("MatchingRuleAssertion", tagged, options, depth)?;
        let matching_rule = cursor
            .next_tagged_if(TagClass::ContextSpecific, tags::MATCHING_RULE)
            .map(|t| t.content_text())
            .transpose()?;
        let attribute = cursor
            .next_tagged_if(TagClass::ContextSpecific, tags::MATCH_TYPE)
            .map(|t| t.content_text())
            .transpose()?;
        let value = cursor
            .next_tagged_if(TagClass::ContextSpecific, tags::MATCH_VALUE)
            .ok_or_else(|| {
                LdapError::MalformedStructure("MatchingRuleAssertion.matchValue: missing".to_string())
            })?
            .content_octets();
        let dn_attributes = cursor
            .next_tagged_if(TagClass::ContextSpecific, tags::DN_ATTRIBUTES)
            .is_some_and(|t| t.content_octets().first().is_some_and(|&b| b != 0));
        cursor.finish();
        Ok(Self {
            matching_rule,
            attribute,
            value,
            dn_attributes,
        })
    }
}

/// Search filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    EqualityMatch(AttributeValueAssertion),
    Substrings(SubstringFilter),
    GreaterOrEqual(AttributeValueAssertion),
    LessOrEqual(AttributeValueAssertion),
    Present(String),
    ApproxMatch(AttributeValueAssertion),
    ExtensibleMatch(MatchingRuleAssertion),
}

impl Filter {
    pub fn equality(attribute: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Filter::EqualityMatch(AttributeValueAssertion::new(attribute, value))
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present(attribute.into())
    }

    /// Context tag number of this alternative
    pub fn tag_number(&self) -> u32 {
        match self {
            Filter::And(_) => tags::AND,
            Filter::Or(_) => tags::OR,
            Filter::Not(_) => tags::NOT,
            Filter::EqualityMatch(_) => tags::EQUALITY_MATCH,
            Filter::Substrings(_) => tags::SUBSTRINGS,
            Filter::GreaterOrEqual(_) => tags::GREATER_OR_EQUAL,
            Filter::LessOrEqual(_) => tags::LESS_OR_EQUAL,
            Filter::Present(_) => tags::PRESENT,
            Filter::ApproxMatch(_) => tags::APPROX_MATCH,
            Filter::ExtensibleMatch(_) => tags::EXTENSIBLE_MATCH,
        }
    }

    /// Build the `Filter` CHOICE node
    pub fn to_node(&self) -> Node {
        let number = self.tag_number();
        let tagged = match self {
            Filter::And(filters) | Filter::Or(filters) => Tagged::context(
                number,
                Node::set_of(filters.iter().map(Filter::to_node).collect()),
            ),
            Filter::Not(inner) => Tagged::explicit(TagClass::ContextSpecific, number, inner.to_node()),
            Filter::EqualityMatch(ava)
            | Filter::GreaterOrEqual(ava)
            | Filter::LessOrEqual(ava)
            | Filter::ApproxMatch(ava) => Tagged::context(number, ava.to_node()),
            Filter::Substrings(substrings) => Tagged::context(number, substrings.to_node()),
            Filter::Present(attribute) => Tagged::context(number, Node::text(attribute)),
            Filter::ExtensibleMatch(mra) => Tagged::context(number, mra.to_node()),
        };
        Node::choice(Node::tagged(tagged))
    }

    /// Rebuild a filter from its CHOICE node
    ///
    /// Accepts both freshly built trees and decoder output, where every
    /// context tag is opaque.
    pub fn from_node(node: &Node) -> LdapResult<Self> {
        Self::from_node_with(node, DecoderOptions::default(), 0)
    }

    /// Rebuild a filter found at nesting level `depth` of a message
    /// decoded with `options`
    ///
    /// Opaque `and`, `or`, `not` and assertion contents are decoded under
    /// the same limits as the enclosing message.
    pub fn from_node_with(node: &Node, options: DecoderOptions, depth: usize) -> LdapResult<Self> {
        Self::from_node_at(node, options, depth, 0)
    }

    fn from_node_at(
        node: &Node,
        options: DecoderOptions,
        depth: usize,
        level: usize,
    ) -> LdapResult<Self> {
        if level > MAX_FILTER_DEPTH {
            return Err(LdapError::DepthExceeded {
                limit: MAX_FILTER_DEPTH,
            });
        }
        let tagged = match node {
            Node::Choice(alternative) => {
                return Self::from_node_at(alternative, options, depth, level);
            }
            Node::Tagged(tagged) if tagged.identifier().class() == TagClass::ContextSpecific => {
                tagged
            }
            other => {
                return Err(LdapError::MalformedStructure(format!(
                    "Filter: expected context-tagged alternative, got {}",
                    other.kind_name()
                )));
            }
        };

        let filter = match tagged.identifier().number() {
            number @ (tags::AND | tags::OR) => {
                let name = if number == tags::AND { "and" } else { "or" };
                let children = tagged
                    .decode_children_at(options, depth)?
                    .iter()
                    .map(|child| Self::from_node_at(child, options, depth + 1, level + 1))
                    .collect::<LdapResult<Vec<_>>>()?;
                // SET SIZE (1..MAX)
                if children.is_empty() {
                    return Err(LdapError::MalformedStructure(format!(
                        "Filter.{}: empty set",
                        name
                    )));
                }
                if number == tags::AND {
                    Filter::And(children)
                } else {
                    Filter::Or(children)
                }
            }
            tags::NOT => Filter::Not(Box::new(Self::from_node_at(
                &tagged.decode_explicit_at(options, depth)?,
                options,
                depth + 1,
                level + 1,
            )?)),
            tags::EQUALITY_MATCH => Filter::EqualityMatch(AttributeValueAssertion::from_tagged(
                tagged, options, depth,
            )?),
            tags::SUBSTRINGS => {
                Filter::Substrings(SubstringFilter::from_tagged(tagged, options, depth)?)
            }
            tags::GREATER_OR_EQUAL => Filter::GreaterOrEqual(AttributeValueAssertion::from_tagged(
                tagged, options, depth,
            )?),
            tags::LESS_OR_EQUAL => Filter::LessOrEqual(AttributeValueAssertion::from_tagged(
                tagged, options, depth,
            )?),
            tags::PRESENT => Filter::Present(tagged.content_text()?),
            tags::APPROX_MATCH => Filter::ApproxMatch(AttributeValueAssertion::from_tagged(
                tagged, options, depth,
            )?),
            tags::EXTENSIBLE_MATCH => {
                Filter::ExtensibleMatch(MatchingRuleAssertion::from_tagged(tagged, options, depth)?)
            }
            other => {
                return Err(LdapError::MalformedStructure(format!(
                    "Filter: unknown alternative [{}]",
                    other
                )));
            }
        };
        Ok(filter)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) | Filter::Or(filters) => {
                f.write_str(if matches!(self, Filter::And(_)) { "(&" } else { "(|" })?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::EqualityMatch(ava) => write_ava(f, ava, "="),
            Filter::GreaterOrEqual(ava) => write_ava(f, ava, ">="),
            Filter::LessOrEqual(ava) => write_ava(f, ava, "<="),
            Filter::ApproxMatch(ava) => write_ava(f, ava, "~="),
            Filter::Present(attribute) => write!(f, "({}=*)", attribute),
            Filter::Substrings(sf) => {
                write!(f, "({}=", sf.attribute)?;
                for (i, s) in sf.substrings.iter().enumerate() {
                    match s {
                        Substring::Initial(v) if i == 0 => f.write_str(&escape_filter_value(v))?,
                        other => write!(f, "*{}", escape_filter_value(other.value()))?,
                    }
                }
                if !matches!(sf.substrings.last(), Some(Substring::Final(_))) {
                    f.write_str("*")?;
                }
                f.write_str(")")
            }
            Filter::ExtensibleMatch(mra) => {
                f.write_str("(")?;
                if let Some(attribute) = &mra.attribute {
                    f.write_str(attribute)?;
                }
                if mra.dn_attributes {
                    f.write_str(":dn")?;
                }
                if let Some(rule) = &mra.matching_rule {
                    write!(f, ":{}", rule)?;
                }
                write!(f, ":={})", escape_filter_value(&mra.value))
            }
        }
    }
}

fn write_ava(f: &mut fmt::Formatter<'_>, ava: &AttributeValueAssertion, op: &str) -> fmt::Result {
    write!(f, "({}{}{})", ava.attribute, op, escape_filter_value(&ava.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_asn1::ber::decode;

    fn round_trip_through_bytes(filter: &Filter) -> Filter {
        let bytes = filter.to_node().to_ber();
        let (node, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        Filter::from_node(&node).unwrap()
    }

    #[test]
    fn test_present_encoding() {
        let bytes = Filter::present("objectClass").to_node().to_ber();
        assert_eq!(bytes[0], 0x87);
        assert_eq!(&bytes[2..], b"objectClass");
    }

    #[test]
    fn test_and_encoding() {
        let filter = Filter::And(vec![Filter::equality("cn", "bob"), Filter::present("uid")]);
        let bytes = filter.to_node().to_ber();
        assert_eq!(
            bytes,
            vec![
                0xA0, 0x10, // and
                0xA3, 0x09, 0x04, 0x02, b'c', b'n', 0x04, 0x03, b'b', b'o', b'b',
                0x87, 0x03, b'u', b'i', b'd',
            ]
        );
    }

    #[test]
    fn test_not_is_explicit() {
        let filter = Filter::Not(Box::new(Filter::present("cn")));
        assert_eq!(filter.to_node().to_ber(), vec![0xA2, 0x04, 0x87, 0x02, b'c', b'n']);
    }

    #[test]
    fn test_substrings_encoding() {
        let filter = Filter::Substrings(SubstringFilter {
            attribute: "cn".to_string(),
            substrings: vec![Substring::Initial(b"b".to_vec()), Substring::Final(b"b".to_vec())],
        });
        assert_eq!(
            filter.to_node().to_ber(),
            vec![
                0xA4, 0x0C, 0x04, 0x02, b'c', b'n', 0x30, 0x06, 0x80, 0x01, b'b', 0x82, 0x01,
                b'b',
            ]
        );
    }

    #[test]
    fn test_extensible_omits_default_dn_attributes() {
        let mut mra = MatchingRuleAssertion {
            matching_rule: Some("2.5.13.2".to_string()),
            attribute: Some("cn".to_string()),
            value: b"x".to_vec(),
            dn_attributes: false,
        };
        let without = Filter::ExtensibleMatch(mra.clone()).to_node().to_ber();
        assert!(!without.windows(2).any(|w| w == [0x84, 0x01]));
        mra.dn_attributes = true;
        let with = Filter::ExtensibleMatch(mra).to_node().to_ber();
        assert!(with.ends_with(&[0x84, 0x01, 0xFF]));
    }

    #[test]
    fn test_from_node_of_decoded_bytes() {
        let filter = Filter::Or(vec![
            Filter::Not(Box::new(Filter::equality("cn", "x"))),
            Filter::GreaterOrEqual(AttributeValueAssertion::new("age", "30")),
            Filter::LessOrEqual(AttributeValueAssertion::new("age", "40")),
            Filter::ApproxMatch(AttributeValueAssertion::new("sn", "smyth")),
            Filter::Substrings(SubstringFilter {
                attribute: "mail".to_string(),
                substrings: vec![Substring::Any(b"@example".to_vec())],
            }),
            Filter::ExtensibleMatch(MatchingRuleAssertion {
                matching_rule: None,
                attribute: Some("ou".to_string()),
                value: b"dev".to_vec(),
                dn_attributes: true,
            }),
        ]);
        assert_eq!(round_trip_through_bytes(&filter), filter);
    }

    #[test]
    fn test_from_node_of_built_tree() {
        let filter = Filter::And(vec![Filter::present("uid")]);
        assert_eq!(Filter::from_node(&filter.to_node()).unwrap(), filter);
    }

    #[test]
    fn test_from_node_rejects_unknown_alternative() {
        let node = Node::tagged(Tagged::context(12, Node::null()));
        assert!(matches!(
            Filter::from_node(&node),
            Err(LdapError::MalformedStructure(_))
        ));
        assert!(Filter::from_node(&Node::integer(1)).is_err());
    }

    #[test]
    fn test_display() {
        let filter = Filter::And(vec![
            Filter::equality("cn", "a*b"),
            Filter::present("uid"),
            Filter::Not(Box::new(Filter::GreaterOrEqual(AttributeValueAssertion::new(
                "age", "3",
            )))),
        ]);
        assert_eq!(filter.to_string(), r"(&(cn=a\2ab)(uid=*)(!(age>=3)))");

        let sf = Filter::Substrings(SubstringFilter {
            attribute: "cn".to_string(),
            substrings: vec![Substring::Any(b"x".to_vec()), Substring::Any(b"y".to_vec())],
        });
        assert_eq!(sf.to_string(), "(cn=*x*y*)");

        let mra = Filter::ExtensibleMatch(MatchingRuleAssertion {
            matching_rule: Some("2.5.13.5".to_string()),
            attribute: Some("cn".to_string()),
            value: b"Fred".to_vec(),
            dn_attributes: true,
        });
        assert_eq!(mra.to_string(), "(cn:dn:2.5.13.5:=Fred)");
    }

    #[test]
    fn test_from_node_rejects_empty_and_or() {
        for number in [tags::AND, tags::OR] {
            let empty = Node::choice(Node::tagged(Tagged::context(number, Node::set_of(vec![]))));
            assert!(matches!(
                Filter::from_node(&empty),
                Err(LdapError::MalformedStructure(ref m)) if m.contains("empty set")
            ));
            let (decoded, _) = decode(&empty.to_ber()).unwrap();
            assert!(Filter::from_node(&decoded).is_err());
        }
    }

    #[test]
    fn test_from_node_rejects_empty_substrings() {
        let bytes = [0xA4, 0x04, 0x04, 0x00, 0x30, 0x00];
        let (node, _) = decode(&bytes).unwrap();
        assert!(matches!(
            Filter::from_node(&node),
            Err(LdapError::MalformedStructure(_))
        ));
    }

    #[test]
    fn test_from_node_with_honours_decoder_limits() {
        let filter = Filter::And(vec![Filter::Or(vec![Filter::equality("cn", "x")])]);
        let (node, _) = decode(&filter.to_node().to_ber()).unwrap();

        let roomy = DecoderOptions::default().with_max_depth(3);
        assert_eq!(Filter::from_node_with(&node, roomy, 0).unwrap(), filter);

        let tight = DecoderOptions::default().with_max_depth(2);
        assert!(matches!(
            Filter::from_node_with(&node, tight, 0),
            Err(LdapError::DepthExceeded { limit: 2 })
        ));
        assert!(matches!(
            Filter::from_node_with(&node, roomy, 1),
            Err(LdapError::DepthExceeded { limit: 3 })
        ));
    }
}
