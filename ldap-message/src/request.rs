//! Request operations (RFC 2251 section 4.2 - 4.12)

use crate::attribute::{attribute_list_from_nodes, attribute_list_to_node, Attribute, Modification};
use ldap_asn1::ber::{DecoderOptions, Node, NodeCursor, TagClass, Tagged};
use ldap_core::{LdapError, LdapResult};
use ldap_filter::{AttributeValueAssertion, Filter};
use serde::{Deserialize, Serialize};

/// Protocol version sent in BindRequest
pub const LDAP_VERSION3: i64 = 3;

const AUTH_SIMPLE_TAG: u32 = 0;
const AUTH_SASL_TAG: u32 = 3;
const NEW_SUPERIOR_TAG: u32 = 0;
const REQUEST_NAME_TAG: u32 = 0;
const REQUEST_VALUE_TAG: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindAuthentication {
    /// `simple [0] OCTET STRING`
    Simple(Vec<u8>),
    /// `sasl [3] SaslCredentials`
    Sasl {
        mechanism: String,
        credentials: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRequest {
    pub version: i64,
    pub name: String,
    pub authentication: BindAuthentication,
}

impl BindRequest {
    /// LDAPv3 simple bind; empty name and password is an anonymous bind
    pub fn simple(name: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            version: LDAP_VERSION3,
            name: name.into(),
            authentication: BindAuthentication::Simple(password.into()),
        }
    }

    pub fn sasl(
        name: impl Into<String>,
        mechanism: impl Into<String>,
        credentials: Option<Vec<u8>>,
    ) -> Self {
        Self {
            version: LDAP_VERSION3,
            name: name.into(),
            authentication: BindAuthentication::Sasl {
                mechanism: mechanism.into(),
                credentials,
            },
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let authentication = match &self.authentication {
            BindAuthentication::Simple(password) => {
                Tagged::context(AUTH_SIMPLE_TAG, Node::octet_string(password.clone()))
            }
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            } => {
                let mut fields = vec![Node::text(mechanism)];
                if let Some(credentials) = credentials {
                    fields.push(Node::octet_string(credentials.clone()));
                }
                Tagged::context(AUTH_SASL_TAG, Node::sequence(fields))
            }
        };
        Node::sequence(vec![
            Node::integer(self.version),
            Node::text(&self.name),
            Node::choice(Node::tagged(authentication)),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("BindRequest", tagged, options, depth)?;
        let version = cursor.next_integer("version")?;
        let name = cursor.next_string("name")?;
        let auth = cursor.next_tagged("authentication")?;
        let authentication = if auth.is(TagClass::ContextSpecific, AUTH_SIMPLE_TAG) {
            BindAuthentication::Simple(auth.content_octets())
        } else if auth.is(TagClass::ContextSpecific, AUTH_SASL_TAG) {
            let mut sasl = cursor.open_tagged("SaslCredentials", &auth)?;
            let mechanism = sasl.next_string("mechanism")?;
            let credentials = match sasl.peek() {
                Some(_) => Some(sasl.next_octet_string("credentials")?),
                None => None,
            };
            sasl.finish();
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            }
        } else {
            return Err(LdapError::MalformedStructure(format!(
                "BindRequest.authentication: unsupported choice [{}]",
                auth.identifier().number()
            )));
        };
        cursor.finish();
        Ok(Self {
            version,
            name,
            authentication,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl TryFrom<i64> for SearchScope {
    type Error = LdapError;

    fn try_from(value: i64) -> LdapResult<Self> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            _ => Err(LdapError::MalformedStructure(format!(
                "invalid search scope {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

impl TryFrom<i64> for DerefAliases {
    type Error = LdapError;

    fn try_from(value: i64) -> LdapResult<Self> {
        match value {
            0 => Ok(DerefAliases::NeverDerefAliases),
            1 => Ok(DerefAliases::DerefInSearching),
            2 => Ok(DerefAliases::DerefFindingBaseObj),
            3 => Ok(DerefAliases::DerefAlways),
            _ => Err(LdapError::MalformedStructure(format!(
                "invalid derefAliases {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    pub size_limit: i64,
    pub time_limit: i64,
    pub types_only: bool,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Search with no limits, returning all user attributes
    pub fn new(base_object: impl Into<String>, scope: SearchScope, filter: Filter) -> Self {
        Self {
            base_object: base_object.into(),
            scope,
            deref_aliases: DerefAliases::NeverDerefAliases,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter,
            attributes: Vec::new(),
        }
    }

    /// Like [`SearchRequest::new`], compiling the filter from its string form
    pub fn with_filter_str(
        base_object: impl Into<String>,
        scope: SearchScope,
        filter: &str,
    ) -> LdapResult<Self> {
        Ok(Self::new(base_object, scope, Filter::parse(filter)?))
    }

    pub fn attributes(mut self, attributes: &[&str]) -> Self {
        self.attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn size_limit(mut self, limit: i64) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn time_limit(mut self, seconds: i64) -> Self {
        self.time_limit = seconds;
        self
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.base_object),
            Node::enumerated(self.scope as i64),
            Node::enumerated(self.deref_aliases as i64),
            Node::integer(self.size_limit),
            Node::integer(self.time_limit),
            Node::boolean(self.types_only),
            self.filter.to_node(),
            Node::sequence_of(self.attributes.iter().map(|a| Node::text(a)).collect()),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("SearchRequest", tagged, options, depth)?;
        let base_object = cursor.next_string("baseObject")?;
        let scope = SearchScope::try_from(cursor.next_enumerated("scope")?)?;
        let deref_aliases = DerefAliases::try_from(cursor.next_enumerated("derefAliases")?)?;
        let size_limit = cursor.next_integer("sizeLimit")?;
        let time_limit = cursor.next_integer("timeLimit")?;
        let types_only = cursor.next_boolean("typesOnly")?;
        let filter_node = cursor.next_node("filter")?;
        let filter = Filter::from_node_with(&filter_node, cursor.options(), cursor.depth())?;
        let attributes = cursor
            .next_sequence("attributes")?
            .iter()
            .map(Node::to_text)
            .collect::<LdapResult<Vec<_>>>()?;
        cursor.finish();
        Ok(Self {
            base_object,
            scope,
            deref_aliases,
            size_limit,
            time_limit,
            types_only,
            filter,
            attributes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub object: String,
    pub changes: Vec<Modification>,
}

impl ModifyRequest {
    pub fn new(object: impl Into<String>, changes: Vec<Modification>) -> Self {
        Self {
            object: object.into(),
            changes,
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.object),
            Node::sequence_of(self.changes.iter().map(Modification::to_node).collect()),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("ModifyRequest", tagged, options, depth)?;
        let object = cursor.next_string("object")?;
        let changes = cursor
            .next_sequence("modification")?
            .into_iter()
            .map(Modification::from_node)
            .collect::<LdapResult<Vec<_>>>()?;
        cursor.finish();
        Ok(Self { object, changes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    pub entry: String,
    pub attributes: Vec<Attribute>,
}

impl AddRequest {
    pub fn new(entry: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            entry: entry.into(),
            attributes,
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.entry),
            attribute_list_to_node(&self.attributes),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("AddRequest", tagged, options, depth)?;
        let entry = cursor.next_string("entry")?;
        let attributes = attribute_list_from_nodes(cursor.next_sequence("attributes")?)?;
        cursor.finish();
        Ok(Self { entry, attributes })
    }
}

/// `DelRequest ::= [APPLICATION 10] LDAPDN`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelRequest {
    pub entry: String,
}

impl DelRequest {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyDnRequest {
    pub entry: String,
    pub new_rdn: String,
    pub delete_old_rdn: bool,
    pub new_superior: Option<String>,
}

impl ModifyDnRequest {
    pub fn new(entry: impl Into<String>, new_rdn: impl Into<String>, delete_old_rdn: bool) -> Self {
        Self {
            entry: entry.into(),
            new_rdn: new_rdn.into(),
            delete_old_rdn,
            new_superior: None,
        }
    }

    pub fn with_new_superior(mut self, new_superior: impl Into<String>) -> Self {
        self.new_superior = Some(new_superior.into());
        self
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut fields = vec![
            Node::text(&self.entry),
            Node::text(&self.new_rdn),
            Node::boolean(self.delete_old_rdn),
        ];
        if let Some(new_superior) = &self.new_superior {
            fields.push(Node::tagged(Tagged::context(
                NEW_SUPERIOR_TAG,
                Node::text(new_superior),
            )));
        }
        Node::sequence(fields)
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("ModifyDNRequest", tagged, options, depth)?;
        let entry = cursor.next_string("entry")?;
        let new_rdn = cursor.next_string("newrdn")?;
        let delete_old_rdn = cursor.next_boolean("deleteoldrdn")?;
        let new_superior = cursor
            .next_tagged_if(TagClass::ContextSpecific, NEW_SUPERIOR_TAG)
            .map(|t| t.content_text())
            .transpose()?;
        cursor.finish();
        Ok(Self {
            entry,
            new_rdn,
            delete_old_rdn,
            new_superior,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub entry: String,
    pub ava: AttributeValueAssertion,
}

impl CompareRequest {
    pub fn new(
        entry: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            entry: entry.into(),
            ava: AttributeValueAssertion::new(attribute, value),
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        Node::sequence(vec![
            Node::text(&self.entry),
            Node::sequence(vec![
                Node::text(&self.ava.attribute),
                Node::octet_string(self.ava.value.clone()),
            ]),
        ])
    }

    pub(crate) fn from_tagged(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let mut cursor = NodeCursor::from_tagged_with("CompareRequest", tagged, options, depth)?;
        let entry = cursor.next_string("entry")?;
        let mut ava = NodeCursor::new("AttributeValueAssertion", cursor.next_sequence("ava")?);
        let attribute = ava.next_string("attributeDesc")?;
        let value = ava.next_octet_string("assertionValue")?;
        ava.finish();
        cursor.finish();
        Ok(Self {
            entry,
            ava: AttributeValueAssertion { attribute, value },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedRequest {
    pub request_name: String,
    pub request_value: Option<Vec<u8>>,
}

impl ExtendedRequest {
    pub fn new(request_name: impl Into<String>, request_value: Option<Vec<u8>>) -> Self {
        Self {
            request_name: request_name.into(),
            request_value,
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut fields = vec![Node::tagged(Tagged::context(
            REQUEST_NAME_TAG,
            Node::text(&self.request_name),
        ))];
        if let Some(value) = &self.request_value {
            fields.push(Node::tagged(Tagged::context(
                REQUEST_VALUE_TAG,
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
        let mut cursor = NodeCursor::from_tagged_with("ExtendedRequest", tagged, options, depth)?;
        let request_name = cursor
            .next_tagged_if(TagClass::ContextSpecific, REQUEST_NAME_TAG)
            .ok_or_else(|| {
                LdapError::MalformedStructure("ExtendedRequest.requestName: missing".to_string())
            })?
            .content_text()?;
        let request_value = cursor
            .next_tagged_if(TagClass::ContextSpecific, REQUEST_VALUE_TAG)
            .map(|t| t.content_octets());
        cursor.finish();
        Ok(Self {
            request_name,
            request_value,
        })
    }
}

/// Replacement values for re-issuing a request, e.g. to follow a referral
///
/// `reenter_reference` marks a search re-issued for a continuation
/// reference: a single-level search then only reads the referenced
/// object itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    pub base: Option<String>,
    pub filter: Option<Filter>,
    pub reenter_reference: bool,
}

impl RequestOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn reentering_reference(mut self) -> Self {
        self.reenter_reference = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: DecoderOptions = DecoderOptions::DEFAULT;

    fn as_tagged(node: Node) -> Tagged {
        Tagged::application(0, node)
    }

    #[test]
    fn test_simple_bind_fields() {
        let bind = BindRequest::simple("cn=admin", "secret");
        let bytes = bind.to_node().to_ber();
        // version 3, name, then simple [0] primitive
        assert_eq!(&bytes[2..5], &[0x02, 0x01, 0x03]);
        assert!(bytes.windows(2).any(|w| w == [0x80, 0x06]));
        assert_eq!(BindRequest::from_tagged(&as_tagged(bind.to_node()), OPTIONS, 0).unwrap(), bind);
    }

    #[test]
    fn test_sasl_bind() {
        let bind = BindRequest::sasl("", "EXTERNAL", None);
        let bytes = bind.to_node().to_ber();
        assert!(bytes.windows(2).any(|w| w == [0xA3, 0x0A]));
        assert_eq!(BindRequest::from_tagged(&as_tagged(bind.to_node()), OPTIONS, 0).unwrap(), bind);

        let with_creds = BindRequest::sasl("", "DIGEST-MD5", Some(b"resp".to_vec()));
        assert_eq!(
            BindRequest::from_tagged(&as_tagged(with_creds.to_node()), OPTIONS, 0).unwrap(),
            with_creds
        );
    }

    #[test]
    fn test_search_request_fields() {
        let search = SearchRequest::with_filter_str("dc=example,dc=com", SearchScope::WholeSubtree, "(uid=*)")
            .unwrap()
            .attributes(&["cn", "mail"])
            .size_limit(10);
        let decoded = SearchRequest::from_tagged(&as_tagged(search.to_node()), OPTIONS, 0).unwrap();
        assert_eq!(decoded, search);
    }

    #[test]
    fn test_invalid_scope() {
        assert!(SearchScope::try_from(3).is_err());
        assert!(DerefAliases::try_from(4).is_err());
    }

    #[test]
    fn test_modify_dn_new_superior() {
        let request = ModifyDnRequest::new("cn=a,dc=x", "cn=b", true).with_new_superior("ou=y,dc=x");
        let bytes = request.to_node().to_ber();
        assert!(bytes.windows(2).any(|w| w == [0x80, 0x09]));
        assert_eq!(ModifyDnRequest::from_tagged(&as_tagged(request.to_node()), OPTIONS, 0).unwrap(), request);
    }

    #[test]
    fn test_extended_request_requires_name() {
        let request = ExtendedRequest::new("1.3.6.1.4.1.1466.20037", None);
        assert_eq!(ExtendedRequest::from_tagged(&as_tagged(request.to_node()), OPTIONS, 0).unwrap(), request);
        let empty = Tagged::application(23, Node::sequence(vec![]));
        assert!(matches!(
            ExtendedRequest::from_tagged(&empty, OPTIONS, 0),
            Err(LdapError::MalformedStructure(_))
        ));
    }

    #[test]
    fn test_compare_request() {
        let request = CompareRequest::new("uid=jdoe,dc=x", "mail", "jdoe@x");
        assert_eq!(CompareRequest::from_tagged(&as_tagged(request.to_node()), OPTIONS, 0).unwrap(), request);
    }
}
