//! Response operations
//!
//! Responses that carry nothing beyond `LDAPResult` (SearchResultDone,
//! ModifyResponse, AddResponse, DelResponse, ModifyDNResponse,
//! CompareResponse) use [`OperationResult`] directly.

use crate::attribute::{attribute_list_from_nodes, attribute_list_to_node, Attribute};
use crate::result::OperationResult;
use ldap_asn1::ber::{DecoderOptions, Node, NodeCursor, TagClass, Tagged};
use ldap_core::LdapResult;
use serde::{Deserialize, Serialize};

const SERVER_SASL_CREDS_TAG: u32 = 7;
const RESPONSE_NAME_TAG: u32 = 10;
const RESPONSE_VALUE_TAG: u32 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindResponse {
    pub result: OperationResult,
    pub server_sasl_creds: Option<Vec<u8>>,
}

impl BindResponse {
    pub fn new(result: OperationResult) -> Self {
        Self {
            result,
            server_sasl_creds: None,
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut fields = self.result.to_fields();
        if let Some(creds) = &self.server_sasl_creds {
            fields.push(Node::tagged(Tagged::context(
                SERVER_SASL_CREDS_TAG,
                Node::octet_string(creds.clone()),
            )));
        }
        Node::sequence(fields)
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("BindResponse", tagged, options, depth)?;
        let result = OperationResult::read(&mut cursor)?;
        let server_sasl_creds = cursor
            .next_tagged_if(TagClass::ContextSpecific, SERVER_SASL_CREDS_TAG)
            .map(|t| t.content_octets());
        cursor.finish();
        Ok(Self {
            result,
            server_sasl_creds,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    pub object_name: String,
    pub attributes: Vec<Attribute>,
}

impl SearchResultEntry {
    pub fn new(object_name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            object_name: object_name.into(),
            attributes,
        }
    }

    /// Values of the first attribute named `attr_type` (case-insensitive)
    pub fn values(&self, attr_type: &str) -> Option<&[Vec<u8>]> {
        self.attributes
            .iter()
            .find(|a| a.attr_type.eq_ignore_ascii_case(attr_type))
            .map(|a| a.values.as_slice())
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.object_name),
            attribute_list_to_node(&self.attributes),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("SearchResultEntry", tagged, options, depth)?;
        let object_name = cursor.next_string("objectName")?;
        let attributes = attribute_list_from_nodes(cursor.next_sequence("attributes")?)?;
        cursor.finish();
        Ok(Self {
            object_name,
            attributes,
        })
    }
}

/// `SearchResultReference ::= [APPLICATION 19] SEQUENCE OF LDAPURL`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultReference {
    pub uris: Vec<String>,
}

impl SearchResultReference {
    pub fn new(uris: Vec<String>) -> Self {
        Self { uris }
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence_of(self.uris.iter().map(|u| Node::text(u)).collect())
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let uris = tagged
            .decode_children_at(options, depth)?
            .iter()
            .map(Node::to_text)
            .collect::<LdapResult<Vec<_>>>()?;
        Ok(Self { uris })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedResponse {
    pub result: OperationResult,
    pub response_name: Option<String>,
    pub response_value: Option<Vec<u8>>,
}

impl ExtendedResponse {
    pub fn new(result: OperationResult) -> Self {
        Self {
            result,
            response_name: None,
            response_value: None,
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut fields = self.result.to_fields();
        if let Some(name) = &self.response_name {
            fields.push(Node::tagged(Tagged::context(RESPONSE_NAME_TAG, Node::text(name))));
        }
        if let Some(value) = &self.response_value {
            fields.push(Node::tagged(Tagged::context(
                RESPONSE_VALUE_TAG,
                Node::octet_string(value.clone()),
            )));
        }
        Node::sequence(fields)
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("ExtendedResponse", tagged, options, depth)?;
        let result = OperationResult::read(&mut cursor)?;
        let response_name = cursor
            .next_tagged_if(TagClass::ContextSpecific, RESPONSE_NAME_TAG)
            .map(|t| t.content_text())
            .transpose()?;
        let response_value = cursor
            .next_tagged_if(TagClass::ContextSpecific, RESPONSE_VALUE_TAG)
            .map(|t| t.content_octets());
        cursor.finish();
        Ok(Self {
            result,
            response_name,
            response_value,
        })
    }
}

/// Read a response that is a bare `LDAPResult`
pub(crate) fn result_from_tagged(
    context: &'static str,
    tagged: &Tagged,
    options: DecoderOptions,
    depth: usize,
) -> LdapResult<OperationResult> {
    let mut cursor = NodeCursor::from_tagged_with(context, tagged, options, depth)?;
    let result = OperationResult::read(&mut cursor)?;
    cursor.finish();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultCode;

    #[test]
    fn test_bind_response_with_sasl_creds() {
        let mut response = BindResponse::new(OperationResult::new(ResultCode::SaslBindInProgress));
        response.server_sasl_creds = Some(b"challenge".to_vec());
        let bytes = response.to_node().to_ber();
        assert!(bytes.windows(2).any(|w| w == [0x87, 0x09]));
        let tagged = Tagged::application(1, response.to_node());
        assert_eq!(BindResponse::from_tagged(&tagged, DecoderOptions::DEFAULT, 0).unwrap(), response);
    }

    #[test]
    fn test_extended_response_optional_fields() {
        let mut response = ExtendedResponse::new(OperationResult::success());
        response.response_name = Some("1.3.6.1.4.1.4203.1.11.3".to_string());
        let tagged = Tagged::application(24, response.to_node());
        let decoded = ExtendedResponse::from_tagged(&tagged, DecoderOptions::DEFAULT, 0).unwrap();
        assert_eq!(decoded, response);
        assert!(decoded.response_value.is_none());
    }

    #[test]
    fn test_entry_attribute_lookup() {
        let entry = SearchResultEntry::new(
            "uid=a,dc=x",
            vec![Attribute::with_text_values("mail", &["a@x"])],
        );
        assert_eq!(entry.values("MAIL").unwrap(), &[b"a@x".to_vec()]);
        assert!(entry.values("cn").is_none());
    }
}
