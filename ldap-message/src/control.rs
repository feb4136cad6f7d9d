//! Message controls
//!
//! ```text
//! Controls ::= SEQUENCE OF Control
//!
//! Control ::= SEQUENCE {
//!     controlType  LDAPOID,
//!     criticality  BOOLEAN DEFAULT FALSE,
//!     controlValue OCTET STRING OPTIONAL }
//! ```
//!
//! The control value is opaque here; extension code builds and parses it
//! with the same [`Node`] codec.

use ldap_asn1::ber::{DecoderOptions, Node, NodeCursor, Tagged};
use ldap_core::{LdapResult, Oid};
use serde::{Deserialize, Serialize};

/// Context tag of `controls` inside `LDAPMessage`
pub const CONTROLS_TAG: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub oid: String,
    pub criticality: bool,
    pub value: Option<Vec<u8>>,
}

impl Control {
    pub fn new(oid: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            criticality: false,
            value: None,
        }
    }

    pub fn critical(mut self) -> Self {
        self.criticality = true;
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Control type parsed as a numeric OID
    pub fn oid(&self) -> LdapResult<Oid> {
        Oid::from_string(&self.oid)
    }

    pub fn to_node(&self) -> Node {
        let mut fields = vec![Node::text(&self.oid)];
        // DEFAULT FALSE is never sent
        if self.criticality {
            fields.push(Node::boolean(true));
        }
        if let Some(value) = &self.value {
            fields.push(Node::octet_string(value.clone()));
        }
        Node::sequence(fields)
    }

    pub fn from_node(node: Node) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_node("Control", node)?;
        let oid = cursor.next_string("controlType")?;
        let criticality = match cursor.peek() {
            Some(Node::Boolean(_)) => cursor.next_boolean("criticality")?,
            _ => false,
        };
        let value = match cursor.peek() {
            Some(Node::OctetString(_)) => Some(cursor.next_octet_string("controlValue")?),
            _ => None,
        };
        cursor.finish();
        Ok(Self {
            oid,
            criticality,
            value,
        })
    }
}

/// `controls [0] Controls`
pub fn controls_to_node(controls: &[Control]) -> Node {
    Node::tagged(Tagged::context(
        CONTROLS_TAG,
        Node::sequence_of(controls.iter().map(Control::to_node).collect()),
    ))
}

/// Read the `controls [0]` wrapper of a message
///
/// `depth` is the nesting level of the wrapper inside the message.
pub fn controls_from_tagged(
    tagged: &Tagged,
    options: DecoderOptions,
    depth: usize,
) -> LdapResult<Vec<Control>> {
    tagged
        .decode_children_at(options, depth)?
        .into_iter()
        .map(Control::from_node)
        .collect()
}
