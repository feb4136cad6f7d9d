//! Attributes and modifications
//!
//! ```text
//! Attribute ::= SEQUENCE {
//!     type AttributeDescription,
//!     vals SET OF AttributeValue }
//! ```
//!
//! `PartialAttributeList`, `AttributeList` and `AttributeTypeAndValues`
//! share this shape.

use ldap_asn1::ber::{Node, NodeCursor};
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub attr_type: String,
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    pub fn new(attr_type: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        Self {
            attr_type: attr_type.into(),
            values,
        }
    }

    /// Attribute whose values are all text
    pub fn with_text_values(attr_type: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            attr_type,
            values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        )
    }

    pub fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.attr_type),
            Node::set_of(self.values.iter().map(|v| Node::octet_string(v.clone())).collect()),
        ])
    }

    pub fn from_node(node: Node) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_node("Attribute", node)?;
        let attr_type = cursor.next_string("type")?;
        let values = cursor
            .next_sequence("vals")?
            .into_iter()
            .map(|value| match value {
                Node::OctetString(bytes) => Ok(bytes),
                other => Err(LdapError::MalformedStructure(format!(
                    "Attribute.vals: expected OCTET STRING, got {}",
                    other.kind_name()
                ))),
            })
            .collect::<LdapResult<Vec<_>>>()?;
        cursor.finish();
        Ok(Self { attr_type, values })
    }
}

/// `SEQUENCE OF Attribute`
pub fn attribute_list_to_node(attributes: &[Attribute]) -> Node {
    Node::sequence_of(attributes.iter().map(Attribute::to_node).collect())
}

pub fn attribute_list_from_nodes(nodes: Vec<Node>) -> LdapResult<Vec<Attribute>> {
    nodes.into_iter().map(Attribute::from_node).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
}

impl TryFrom<i64> for ModifyOperation {
    type Error = LdapError;

    fn try_from(value: i64) -> LdapResult<Self> {
        match value {
            0 => Ok(ModifyOperation::Add),
            1 => Ok(ModifyOperation::Delete),
            2 => Ok(ModifyOperation::Replace),
            other => Err(LdapError::MalformedStructure(format!(
                "invalid modify operation {}",
                other
            ))),
        }
    }
}

/// One change of a ModifyRequest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub operation: ModifyOperation,
    pub modification: Attribute,
}

impl Modification {
    pub fn new(operation: ModifyOperation, modification: Attribute) -> Self {
        Self {
            operation,
            modification,
        }
    }

    pub fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::enumerated(self.operation as i64),
            self.modification.to_node(),
        ])
    }

    pub fn from_node(node: Node) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_node("Modification", node)?;
        let operation = ModifyOperation::try_from(cursor.next_enumerated("operation")?)?;
        let modification = Attribute::from_node(cursor.next_node("modification")?)?;
        cursor.finish();
        Ok(Self {
            operation,
            modification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_wire_form() {
        let attr = Attribute::with_text_values("cn", &["a"]);
        assert_eq!(
            attr.to_node().to_ber(),
            vec![0x30, 0x09, 0x04, 0x02, b'c', b'n', 0x31, 0x03, 0x04, 0x01, b'a']
        );
    }

    #[test]
    fn test_modification_from_node() {
        let change = Modification::new(
            ModifyOperation::Replace,
            Attribute::with_text_values("mail", &["x@example.com", "y@example.com"]),
        );
        assert_eq!(Modification::from_node(change.to_node()).unwrap(), change);
    }

    #[test]
    fn test_invalid_modify_operation() {
        let node = Node::sequence(vec![
            Node::enumerated(7),
            Attribute::with_text_values("cn", &[]).to_node(),
        ]);
        assert!(matches!(
            Modification::from_node(node),
            Err(LdapError::MalformedStructure(_))
        ));
    }
}
