//! LDAPMessage envelope
//!
//! ```text
//! LDAPMessage ::= SEQUENCE {
//!     messageID  MessageID,
//!     protocolOp CHOICE { ... },
//!     controls   [0] Controls OPTIONAL }
//! ```

use crate::control::{controls_from_tagged, controls_to_node, Control, CONTROLS_TAG};
use crate::message_id::MessageIdCounter;
use crate::protocol_op::ProtocolOp;
use ldap_asn1::ber::{decode_with, read_tlv, DecoderOptions, Node, NodeCursor, TagClass};
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapMessage {
    pub message_id: i32,
    pub protocol_op: ProtocolOp,
    pub controls: Option<Vec<Control>>,
}

impl LdapMessage {
    pub fn new(message_id: i32, protocol_op: ProtocolOp) -> Self {
        Self {
            message_id,
            protocol_op,
            controls: None,
        }
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = Some(controls);
        self
    }

    /// Wrap a request with the next ID from `counter`
    ///
    /// Requests are expected here; any other operation is still wrapped
    /// but logged, since a client has no business sending it.
    pub fn build_request(
        counter: &MessageIdCounter,
        protocol_op: ProtocolOp,
        controls: Option<Vec<Control>>,
    ) -> Self {
        if !protocol_op.is_request() {
            log::warn!("building request envelope around {}", protocol_op.name());
        }
        Self {
            message_id: counter.next_id(),
            protocol_op,
            controls,
        }
    }

    pub fn to_node(&self) -> Node {
        let mut fields = vec![Node::integer(self.message_id as i64), self.protocol_op.to_node()];
        if let Some(controls) = &self.controls {
            fields.push(controls_to_node(controls));
        }
        Node::sequence(fields)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_node().to_ber()
    }

    /// Encode and write the whole message
    pub fn write_to<W: Write>(&self, writer: &mut W) -> LdapResult<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Decode one message from the start of `data`
    ///
    /// # Returns
    /// Returns `Ok((message, octets_consumed))`
    pub fn decode(data: &[u8]) -> LdapResult<(Self, usize)> {
        Self::decode_with(data, DecoderOptions::default())
    }

    pub fn decode_with(data: &[u8], options: DecoderOptions) -> LdapResult<(Self, usize)> {
        let (node, consumed) = decode_with(data, options)?;
        Ok((Self::from_node_with(node, options)?, consumed))
    }

    /// Read exactly one message from a blocking stream
    pub fn read_from<R: Read>(reader: &mut R, options: DecoderOptions) -> LdapResult<Self> {
        let raw = read_tlv(reader, &options)?;
        Ok(Self::decode_with(&raw, options)?.0)
    }

    /// Rebuild a message from a freshly built or decoded tree
    pub fn from_node(node: Node) -> LdapResult<Self> {
        Self::from_node_with(node, DecoderOptions::default())
    }

    /// Rebuild a message whose operation and controls are decoded under
    /// `options`
    pub fn from_node_with(node: Node, options: DecoderOptions) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_node_with("LDAPMessage", node, options, 0)?;
        let message_id = cursor.next_integer("messageID")?;
        let message_id = i32::try_from(message_id)
            .ok()
            .filter(|id| *id >= 0)
            .ok_or_else(|| {
                LdapError::MalformedStructure(format!(
                    "LDAPMessage.messageID: {} out of range",
                    message_id
                ))
            })?;

        let op = cursor.next_tagged("protocolOp")?;
        let protocol_op = ProtocolOp::from_tagged_with(&op, options, cursor.depth())?;
        log::debug!("message {}: {}", message_id, protocol_op.name());

        let controls = cursor
            .next_tagged_if(TagClass::ContextSpecific, CONTROLS_TAG)
            .map(|t| controls_from_tagged(&t, options, cursor.depth()))
            .transpose()?;

        if cursor.remaining() > 0 {
            log::warn!(
                "message {}: {} unexpected trailing element(s)",
                message_id,
                cursor.remaining()
            );
        }
        cursor.finish();

        Ok(Self {
            message_id,
            protocol_op,
            controls,
        })
    }
}
