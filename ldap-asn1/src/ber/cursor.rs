//! Sequential reader over the elements of a decoded SEQUENCE
//!
//! Protocol structures are positional: each field is read in order and
//! optional fields are recognised by their context tag. `NodeCursor`
//! reports every mismatch as `MalformedStructure` naming the field.
//!
//! A cursor remembers the decoder options and the nesting level of its
//! elements, so tagged fields opened through it are held to the same
//! `max_depth` and `max_length` as the first decoding pass.

use crate::ber::decoder::DecoderOptions;
use crate::ber::node::{Node, Tagged};
use crate::ber::types::TagClass;
use ldap_core::{LdapError, LdapResult};
use std::collections::VecDeque;

pub struct NodeCursor {
    context: &'static str,
    nodes: VecDeque<Node>,
    options: DecoderOptions,
    depth: usize,
}

impl NodeCursor {
    /// `context` names the enclosing structure in error messages
    pub fn new(context: &'static str, nodes: Vec<Node>) -> Self {
        Self {
            context,
            nodes: nodes.into(),
            options: DecoderOptions::default(),
            depth: 0,
        }
    }

    /// Cursor over the children of a SEQUENCE or SET node
    pub fn from_node(context: &'static str, node: Node) -> LdapResult<Self> {
        Self::from_node_with(context, node, DecoderOptions::default(), 0)
    }

    /// Cursor over a SEQUENCE or SET found at nesting level `depth` of a
    /// message decoded with `options`
    pub fn from_node_with(
        context: &'static str,
        node: Node,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        match node {
            Node::Sequence(children) | Node::Set(children) => Ok(Self {
                context,
                nodes: children.into(),
                options,
                depth: depth + 1,
            }),
            other => Err(LdapError::MalformedStructure(format!(
                "{}: expected SEQUENCE, got {}",
                context,
                other.kind_name()
            ))),
        }
    }

    /// Cursor over the content of an implicitly tagged SEQUENCE
    pub fn from_tagged(context: &'static str, tagged: &Tagged) -> LdapResult<Self> {
        Self::from_tagged_with(context, tagged, DecoderOptions::default(), 0)
    }

    /// Same as [`from_tagged`](Self::from_tagged) for a value found at
    /// nesting level `depth` of a message decoded with `options`
    pub fn from_tagged_with(
        context: &'static str,
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let children = tagged.decode_children_at(options, depth)?;
        Ok(Self {
            context,
            nodes: children.into(),
            options,
            depth: depth + 1,
        })
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Nesting level of the elements under the cursor
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Open a tagged element taken from this cursor
    pub fn open_tagged(&self, context: &'static str, tagged: &Tagged) -> LdapResult<Self> {
        Self::from_tagged_with(context, tagged, self.options, self.depth)
    }

    /// Decode the content of a tagged element taken from this cursor
    pub fn tagged_children(&self, tagged: &Tagged) -> LdapResult<Vec<Node>> {
        tagged.decode_children_at(self.options, self.depth)
    }

    fn malformed(&self, field: &str, detail: String) -> LdapError {
        LdapError::MalformedStructure(format!("{}.{}: {}", self.context, field, detail))
    }

    pub fn peek(&self) -> Option<&Node> {
        self.nodes.front()
    }

    pub fn remaining(&self) -> usize {
        self.nodes.len()
    }

    pub fn next_node(&mut self, field: &str) -> LdapResult<Node> {
        self.nodes
            .pop_front()
            .ok_or_else(|| self.malformed(field, "missing element".to_string()))
    }

    pub fn next_integer(&mut self, field: &str) -> LdapResult<i64> {
        let node = self.next_node(field)?;
        node.as_integer()
            .ok_or_else(|| self.malformed(field, format!("expected INTEGER, got {}", node.kind_name())))
    }

    pub fn next_enumerated(&mut self, field: &str) -> LdapResult<i64> {
        let node = self.next_node(field)?;
        node.as_enumerated().ok_or_else(|| {
            self.malformed(field, format!("expected ENUMERATED, got {}", node.kind_name()))
        })
    }

    pub fn next_boolean(&mut self, field: &str) -> LdapResult<bool> {
        let node = self.next_node(field)?;
        node.as_bool()
            .ok_or_else(|| self.malformed(field, format!("expected BOOLEAN, got {}", node.kind_name())))
    }

    pub fn next_octet_string(&mut self, field: &str) -> LdapResult<Vec<u8>> {
        match self.next_node(field)? {
            Node::OctetString(bytes) => Ok(bytes),
            other => Err(self.malformed(
                field,
                format!("expected OCTET STRING, got {}", other.kind_name()),
            )),
        }
    }

    /// OCTET STRING read as UTF-8 text
    pub fn next_string(&mut self, field: &str) -> LdapResult<String> {
        let node = self.next_node(field)?;
        match node {
            Node::OctetString(_) | Node::CharString(..) => node.to_text(),
            other => Err(self.malformed(
                field,
                format!("expected OCTET STRING, got {}", other.kind_name()),
            )),
        }
    }

    /// Children of the next SEQUENCE or SET
    pub fn next_sequence(&mut self, field: &str) -> LdapResult<Vec<Node>> {
        match self.next_node(field)? {
            Node::Sequence(children) | Node::Set(children) => Ok(children),
            other => Err(self.malformed(
                field,
                format!("expected SEQUENCE, got {}", other.kind_name()),
            )),
        }
    }

    /// Next tagged element, looking through CHOICE wrappers
    pub fn next_tagged(&mut self, field: &str) -> LdapResult<Tagged> {
        let mut node = self.next_node(field)?;
        while let Node::Choice(alternative) = node {
            node = *alternative;
        }
        match node {
            Node::Tagged(tagged) => Ok(tagged),
            other => Err(self.malformed(
                field,
                format!("expected tagged value, got {}", other.kind_name()),
            )),
        }
    }

    /// Take the next element only if it carries the given tag
    ///
    /// Used for OPTIONAL and DEFAULT fields.
    pub fn next_tagged_if(&mut self, class: TagClass, number: u32) -> Option<Tagged> {
        let present =
            matches!(self.nodes.front(), Some(Node::Tagged(t)) if t.is(class, number));
        if !present {
            return None;
        }
        match self.nodes.pop_front() {
            Some(Node::Tagged(tagged)) => Some(tagged),
            _ => None,
        }
    }

    /// Check that every element was consumed
    ///
    /// Trailing elements are tolerated for extensibility and only logged.
    pub fn finish(self) {
        if !self.nodes.is_empty() {
            log::debug!(
                "{}: ignoring {} trailing element(s)",
                self.context,
                self.nodes.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_reads() {
        let mut cursor = NodeCursor::new(
            "Test",
            vec![
                Node::integer(3),
                Node::text("cn=x"),
                Node::boolean(true),
                Node::tagged(Tagged::context(0, Node::text("opt"))),
            ],
        );
        assert_eq!(cursor.next_integer("version").unwrap(), 3);
        assert_eq!(cursor.next_string("name").unwrap(), "cn=x");
        assert!(cursor.next_boolean("flag").unwrap());
        assert!(cursor.next_tagged_if(TagClass::ContextSpecific, 1).is_none());
        let opt = cursor.next_tagged_if(TagClass::ContextSpecific, 0).unwrap();
        assert_eq!(opt.content_text().unwrap(), "opt");
        assert_eq!(cursor.remaining(), 0);
        cursor.finish();
    }

    #[test]
    fn test_type_mismatch_is_malformed() {
        let mut cursor = NodeCursor::new("Test", vec![Node::text("x")]);
        let err = cursor.next_integer("version").unwrap_err();
        assert!(matches!(err, LdapError::MalformedStructure(ref m) if m.contains("Test.version")));
    }

    #[test]
    fn test_missing_element_is_malformed() {
        let mut cursor = NodeCursor::new("Test", vec![]);
        assert!(matches!(
            cursor.next_octet_string("value"),
            Err(LdapError::MalformedStructure(_))
        ));
    }

    #[test]
    fn test_next_tagged_looks_through_choice() {
        let op = Tagged::application(2, Node::null());
        let mut cursor = NodeCursor::new(
            "Test",
            vec![Node::choice(Node::tagged(op.clone())), Node::choice(Node::integer(1))],
        );
        assert_eq!(cursor.next_tagged("op").unwrap(), op);
        assert!(matches!(
            cursor.next_tagged("other"),
            Err(LdapError::MalformedStructure(ref m)) if m.contains("got INTEGER")
        ));
    }

    #[test]
    fn test_from_node_requires_sequence() {
        assert!(NodeCursor::from_node("Test", Node::null()).is_err());
        let cursor = NodeCursor::from_node("Test", Node::sequence(vec![Node::null()])).unwrap();
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_open_tagged_keeps_depth_limit() {
        let inner = Tagged::context(1, Node::sequence(vec![Node::integer(1)]));
        let outer = Tagged::context(0, Node::sequence(vec![Node::tagged(inner)]));
        let options = DecoderOptions::default().with_max_depth(2);

        let mut cursor = NodeCursor::from_tagged_with("Outer", &outer, options, 0).unwrap();
        assert_eq!(cursor.depth(), 1);
        let inner = cursor.next_tagged("inner").unwrap();
        let mut nested = cursor.open_tagged("Inner", &inner).unwrap();
        assert_eq!(nested.next_integer("value").unwrap(), 1);

        let mut deeper = NodeCursor::from_tagged_with("Outer", &outer, options, 1).unwrap();
        let inner = deeper.next_tagged("inner").unwrap();
        assert!(matches!(
            deeper.open_tagged("Inner", &inner),
            Err(LdapError::DepthExceeded { limit: 2 })
        ));
    }
}
