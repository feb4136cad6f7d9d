//! `protocolOp` CHOICE and its application tag table

use crate::request::{
    AddRequest, BindRequest, CompareRequest, DelRequest, ExtendedRequest, ModifyDnRequest,
    ModifyRequest, RequestOverrides, SearchRequest, SearchScope,
};
use crate::response::{
    result_from_tagged, BindResponse, ExtendedResponse, SearchResultEntry, SearchResultReference,
};
use crate::result::OperationResult;
use ldap_asn1::ber::decoder::integer_from_octets;
use ldap_asn1::ber::{DecoderOptions, Node, TagClass, Tagged};
use ldap_core::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};

/// Application tag numbers of the protocol operations
pub mod tags {
    pub const BIND_REQUEST: u32 = 0;
    pub const BIND_RESPONSE: u32 = 1;
    pub const UNBIND_REQUEST: u32 = 2;
    pub const SEARCH_REQUEST: u32 = 3;
    pub const SEARCH_RESULT_ENTRY: u32 = 4;
    pub const SEARCH_RESULT_DONE: u32 = 5;
    pub const MODIFY_REQUEST: u32 = 6;
    pub const MODIFY_RESPONSE: u32 = 7;
    pub const ADD_REQUEST: u32 = 8;
    pub const ADD_RESPONSE: u32 = 9;
    pub const DEL_REQUEST: u32 = 10;
    pub const DEL_RESPONSE: u32 = 11;
    pub const MODIFY_DN_REQUEST: u32 = 12;
    pub const MODIFY_DN_RESPONSE: u32 = 13;
    pub const COMPARE_REQUEST: u32 = 14;
    pub const COMPARE_RESPONSE: u32 = 15;
    pub const ABANDON_REQUEST: u32 = 16;
    pub const SEARCH_RESULT_REFERENCE: u32 = 19;
    pub const EXTENDED_REQUEST: u32 = 23;
    pub const EXTENDED_RESPONSE: u32 = 24;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolOp {
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindRequest,
    SearchRequest(SearchRequest),
    SearchResultEntry(SearchResultEntry),
    SearchResultDone(OperationResult),
    SearchResultReference(SearchResultReference),
    ModifyRequest(ModifyRequest),
    ModifyResponse(OperationResult),
    AddRequest(AddRequest),
    AddResponse(OperationResult),
    DelRequest(DelRequest),
    DelResponse(OperationResult),
    ModifyDnRequest(ModifyDnRequest),
    ModifyDnResponse(OperationResult),
    CompareRequest(CompareRequest),
    CompareResponse(OperationResult),
    /// Message ID of the operation to abandon
    AbandonRequest(i32),
    ExtendedRequest(ExtendedRequest),
    ExtendedResponse(ExtendedResponse),
}

impl ProtocolOp {
    pub fn tag_number(&self) -> u32 {
        match self {
            ProtocolOp::BindRequest(_) => tags::BIND_REQUEST,
            ProtocolOp::BindResponse(_) => tags::BIND_RESPONSE,
            ProtocolOp::UnbindRequest => tags::UNBIND_REQUEST,
            ProtocolOp::SearchRequest(_) => tags::SEARCH_REQUEST,
            ProtocolOp::SearchResultEntry(_) => tags::SEARCH_RESULT_ENTRY,
            ProtocolOp::SearchResultDone(_) => tags::SEARCH_RESULT_DONE,
            ProtocolOp::SearchResultReference(_) => tags::SEARCH_RESULT_REFERENCE,
            ProtocolOp::ModifyRequest(_) => tags::MODIFY_REQUEST,
            ProtocolOp::ModifyResponse(_) => tags::MODIFY_RESPONSE,
            ProtocolOp::AddRequest(_) => tags::ADD_REQUEST,
            ProtocolOp::AddResponse(_) => tags::ADD_RESPONSE,
            ProtocolOp::DelRequest(_) => tags::DEL_REQUEST,
            ProtocolOp::DelResponse(_) => tags::DEL_RESPONSE,
            ProtocolOp::ModifyDnRequest(_) => tags::MODIFY_DN_REQUEST,
            ProtocolOp::ModifyDnResponse(_) => tags::MODIFY_DN_RESPONSE,
            ProtocolOp::CompareRequest(_) => tags::COMPARE_REQUEST,
            ProtocolOp::CompareResponse(_) => tags::COMPARE_RESPONSE,
            ProtocolOp::AbandonRequest(_) => tags::ABANDON_REQUEST,
            ProtocolOp::ExtendedRequest(_) => tags::EXTENDED_REQUEST,
            ProtocolOp::ExtendedResponse(_) => tags::EXTENDED_RESPONSE,
        }
    }

    /// ASN.1 name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolOp::BindRequest(_) => "BindRequest",
            ProtocolOp::BindResponse(_) => "BindResponse",
            ProtocolOp::UnbindRequest => "UnbindRequest",
            ProtocolOp::SearchRequest(_) => "SearchRequest",
            ProtocolOp::SearchResultEntry(_) => "SearchResultEntry",
            ProtocolOp::SearchResultDone(_) => "SearchResultDone",
            ProtocolOp::SearchResultReference(_) => "SearchResultReference",
            ProtocolOp::ModifyRequest(_) => "ModifyRequest",
            ProtocolOp::ModifyResponse(_) => "ModifyResponse",
            ProtocolOp::AddRequest(_) => "AddRequest",
            ProtocolOp::AddResponse(_) => "AddResponse",
            ProtocolOp::DelRequest(_) => "DelRequest",
            ProtocolOp::DelResponse(_) => "DelResponse",
            ProtocolOp::ModifyDnRequest(_) => "ModifyDNRequest",
            ProtocolOp::ModifyDnResponse(_) => "ModifyDNResponse",
            ProtocolOp::CompareRequest(_) => "CompareRequest",
            ProtocolOp::CompareResponse(_) => "CompareResponse",
            ProtocolOp::AbandonRequest(_) => "AbandonRequest",
            ProtocolOp::ExtendedRequest(_) => "ExtendedRequest",
            ProtocolOp::ExtendedResponse(_) => "ExtendedResponse",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            ProtocolOp::BindRequest(_)
                | ProtocolOp::UnbindRequest
                | ProtocolOp::SearchRequest(_)
                | ProtocolOp::ModifyRequest(_)
                | ProtocolOp::AddRequest(_)
                | ProtocolOp::DelRequest(_)
                | ProtocolOp::ModifyDnRequest(_)
                | ProtocolOp::CompareRequest(_)
                | ProtocolOp::AbandonRequest(_)
                | ProtocolOp::ExtendedRequest(_)
        )
    }

    /// `LDAPResult` of a response carrying one
    pub fn result(&self) -> Option<&OperationResult> {
        match self {
            ProtocolOp::BindResponse(r) => Some(&r.result),
            ProtocolOp::ExtendedResponse(r) => Some(&r.result),
            ProtocolOp::SearchResultDone(r)
            | ProtocolOp::ModifyResponse(r)
            | ProtocolOp::AddResponse(r)
            | ProtocolOp::DelResponse(r)
            | ProtocolOp::ModifyDnResponse(r)
            | ProtocolOp::CompareResponse(r) => Some(r),
            _ => None,
        }
    }

    /// Build the application-tagged `protocolOp` CHOICE
    pub fn to_node(&self) -> Node {
        let content = match self {
            ProtocolOp::BindRequest(r) => r.to_node(),
            ProtocolOp::BindResponse(r) => r.to_node(),
            ProtocolOp::UnbindRequest => Node::null(),
            ProtocolOp::SearchRequest(r) => r.to_node(),
            ProtocolOp::SearchResultEntry(r) => r.to_node(),
            ProtocolOp::SearchResultReference(r) => r.to_node(),
            ProtocolOp::ModifyRequest(r) => r.to_node(),
            ProtocolOp::AddRequest(r) => r.to_node(),
            ProtocolOp::DelRequest(r) => Node::text(&r.entry),
            ProtocolOp::ModifyDnRequest(r) => r.to_node(),
            ProtocolOp::CompareRequest(r) => r.to_node(),
            ProtocolOp::AbandonRequest(id) => Node::integer(*id as i64),
            ProtocolOp::ExtendedRequest(r) => r.to_node(),
            ProtocolOp::ExtendedResponse(r) => r.to_node(),
            ProtocolOp::SearchResultDone(r)
            | ProtocolOp::ModifyResponse(r)
            | ProtocolOp::AddResponse(r)
            | ProtocolOp::DelResponse(r)
            | ProtocolOp::ModifyDnResponse(r)
            | ProtocolOp::CompareResponse(r) => Node::sequence(r.to_fields()),
        };
        Node::choice(Node::tagged(Tagged::application(self.tag_number(), content)))
    }

    /// Reinterpret an application-tagged node through the tag table
    pub fn from_tagged(tagged: &Tagged) -> LdapResult<Self> {
        Self::from_tagged_with(tagged, DecoderOptions::default(), 0)
    }

    /// Same as [`from_tagged`](Self::from_tagged) for an operation found at
    /// nesting level `depth` of a message decoded with `options`
    ///
    /// The operation content is held to the same `max_depth` and
    /// `max_length` as the envelope around it.
    pub fn from_tagged_with(
        tagged: &Tagged,
        options: DecoderOptions,
        depth: usize,
    ) -> LdapResult<Self> {
        let identifier = tagged.identifier();
        if identifier.class() != TagClass::Application {
            return Err(LdapError::MalformedStructure(format!(
                "protocolOp: expected application tag, got {:?} [{}]",
                identifier.class(),
                identifier.number()
            )));
        }

        let op = match identifier.number() {
            tags::BIND_REQUEST => ProtocolOp::BindRequest(BindRequest::from_tagged(tagged, options, depth)?),
            tags::BIND_RESPONSE => ProtocolOp::BindResponse(BindResponse::from_tagged(tagged, options, depth)?),
            tags::UNBIND_REQUEST => ProtocolOp::UnbindRequest,
            tags::SEARCH_REQUEST => ProtocolOp::SearchRequest(SearchRequest::from_tagged(tagged, options, depth)?),
            tags::SEARCH_RESULT_ENTRY => {
                ProtocolOp::SearchResultEntry(SearchResultEntry::from_tagged(tagged, options, depth)?)
            }
            tags::SEARCH_RESULT_DONE => {
                ProtocolOp::SearchResultDone(result_from_tagged("SearchResultDone", tagged, options, depth)?)
            }
            tags::SEARCH_RESULT_REFERENCE => {
                ProtocolOp::SearchResultReference(SearchResultReference::from_tagged(tagged, options, depth)?)
            }
            tags::MODIFY_REQUEST => ProtocolOp::ModifyRequest(ModifyRequest::from_tagged(tagged, options, depth)?),
            tags::MODIFY_RESPONSE => {
                ProtocolOp::ModifyResponse(result_from_tagged("ModifyResponse", tagged, options, depth)?)
            }
            tags::ADD_REQUEST => ProtocolOp::AddRequest(AddRequest::from_tagged(tagged, options, depth)?),
            tags::ADD_RESPONSE => ProtocolOp::AddResponse(result_from_tagged("AddResponse", tagged, options, depth)?),
            tags::DEL_REQUEST => ProtocolOp::DelRequest(DelRequest::new(tagged.content_text()?)),
            tags::DEL_RESPONSE => ProtocolOp::DelResponse(result_from_tagged("DelResponse", tagged, options, depth)?),
            tags::MODIFY_DN_REQUEST => {
                ProtocolOp::ModifyDnRequest(ModifyDnRequest::from_tagged(tagged, options, depth)?)
            }
            tags::MODIFY_DN_RESPONSE => {
                ProtocolOp::ModifyDnResponse(result_from_tagged("ModifyDNResponse", tagged, options, depth)?)
            }
            tags::COMPARE_REQUEST => {
                ProtocolOp::CompareRequest(CompareRequest::from_tagged(tagged, options, depth)?)
            }
            tags::COMPARE_RESPONSE => {
                ProtocolOp::CompareResponse(result_from_tagged("CompareResponse", tagged, options, depth)?)
            }
            tags::ABANDON_REQUEST => {
                let id = integer_from_octets(&tagged.content_octets())?;
                let id = i32::try_from(id).map_err(|_| {
                    LdapError::MalformedStructure(format!("AbandonRequest: message id {} out of range", id))
                })?;
                ProtocolOp::AbandonRequest(id)
            }
            tags::EXTENDED_REQUEST => {
                ProtocolOp::ExtendedRequest(ExtendedRequest::from_tagged(tagged, options, depth)?)
            }
            tags::EXTENDED_RESPONSE => {
                ProtocolOp::ExtendedResponse(ExtendedResponse::from_tagged(tagged, options, depth)?)
            }
            other => {
                return Err(LdapError::MalformedStructure(format!(
                    "protocolOp: unknown operation [APPLICATION {}]",
                    other
                )));
            }
        };
        log::trace!("decoded {}", op.name());
        Ok(op)
    }

    /// DN the request operates on
    ///
    /// Bind name, search base, or the target entry of add, delete,
    /// modify, modify DN and compare.
    pub fn request_dn(&self) -> Option<&str> {
        match self {
            ProtocolOp::BindRequest(r) => Some(&r.name),
            ProtocolOp::SearchRequest(r) => Some(&r.base_object),
            ProtocolOp::ModifyRequest(r) => Some(&r.object),
            ProtocolOp::AddRequest(r) => Some(&r.entry),
            ProtocolOp::DelRequest(r) => Some(&r.entry),
            ProtocolOp::ModifyDnRequest(r) => Some(&r.entry),
            ProtocolOp::CompareRequest(r) => Some(&r.entry),
            _ => None,
        }
    }

    /// Copy of this request with the DN and filter replaced
    ///
    /// Used when a request is re-issued against another server. For a
    /// search re-entered through a continuation reference, single-level
    /// scope becomes base-object: the reference already names the child
    /// entry, so only that entry is read.
    ///
    /// # Errors
    /// `UnsupportedDuplication` for abandon, unbind, modify, compare and
    /// every response.
    pub fn with_overrides(&self, overrides: &RequestOverrides) -> LdapResult<ProtocolOp> {
        let base = overrides.base.clone();
        let op = match self {
            ProtocolOp::BindRequest(r) => {
                let mut r = r.clone();
                if let Some(base) = base {
                    r.name = base;
                }
                ProtocolOp::BindRequest(r)
            }
            ProtocolOp::SearchRequest(r) => {
                let mut r = r.clone();
                if let Some(base) = base {
                    r.base_object = base;
                }
                if let Some(filter) = &overrides.filter {
                    r.filter = filter.clone();
                }
                if overrides.reenter_reference && r.scope == SearchScope::SingleLevel {
                    log::debug!("search re-entered for reference, scope reduced to base");
                    r.scope = SearchScope::BaseObject;
                }
                ProtocolOp::SearchRequest(r)
            }
            ProtocolOp::AddRequest(r) => {
                let mut r = r.clone();
                if let Some(base) = base {
                    r.entry = base;
                }
                ProtocolOp::AddRequest(r)
            }
            ProtocolOp::DelRequest(r) => {
                ProtocolOp::DelRequest(DelRequest::new(base.unwrap_or_else(|| r.entry.clone())))
            }
            ProtocolOp::ModifyDnRequest(r) => {
                let mut r = r.clone();
                if let Some(base) = base {
                    r.entry = base;
                }
                ProtocolOp::ModifyDnRequest(r)
            }
            ProtocolOp::ExtendedRequest(r) => ProtocolOp::ExtendedRequest(r.clone()),
            other => return Err(LdapError::UnsupportedDuplication(other.name())),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, Modification, ModifyOperation};
    use crate::result::ResultCode;
    use ldap_asn1::ber::decode;
    use ldap_filter::Filter;

    fn through_bytes(op: &ProtocolOp) -> ProtocolOp {
        let bytes = op.to_node().to_ber();
        let (node, _) = decode(&bytes).unwrap();
        ProtocolOp::from_tagged(node.as_tagged().unwrap()).unwrap()
    }

    #[test]
    fn test_every_operation_through_bytes() {
        let ops = vec![
            ProtocolOp::BindRequest(BindRequest::simple("cn=admin", "pw")),
            ProtocolOp::BindResponse(BindResponse::new(OperationResult::success())),
            ProtocolOp::UnbindRequest,
            ProtocolOp::SearchRequest(SearchRequest::new(
                "dc=x",
                SearchScope::SingleLevel,
                Filter::present("objectClass"),
            )),
            ProtocolOp::SearchResultEntry(SearchResultEntry::new(
                "cn=a,dc=x",
                vec![Attribute::with_text_values("cn", &["a"])],
            )),
            ProtocolOp::SearchResultDone(OperationResult::new(ResultCode::NoSuchObject)),
            ProtocolOp::SearchResultReference(SearchResultReference::new(vec![
                "ldap://h/dc=y".to_string(),
            ])),
            ProtocolOp::ModifyRequest(ModifyRequest::new(
                "cn=a,dc=x",
                vec![Modification::new(
                    ModifyOperation::Add,
                    Attribute::with_text_values("mail", &["a@x"]),
                )],
            )),
            ProtocolOp::ModifyResponse(OperationResult::success()),
            ProtocolOp::AddRequest(AddRequest::new("cn=b,dc=x", vec![])),
            ProtocolOp::AddResponse(OperationResult::new(ResultCode::EntryAlreadyExists)),
            ProtocolOp::DelRequest(DelRequest::new("cn=b,dc=x")),
            ProtocolOp::DelResponse(OperationResult::success()),
            ProtocolOp::ModifyDnRequest(ModifyDnRequest::new("cn=a,dc=x", "cn=c", false)),
            ProtocolOp::ModifyDnResponse(OperationResult::success()),
            ProtocolOp::CompareRequest(CompareRequest::new("cn=a,dc=x", "cn", "a")),
            ProtocolOp::CompareResponse(OperationResult::new(ResultCode::CompareTrue)),
            ProtocolOp::AbandonRequest(300),
            ProtocolOp::ExtendedRequest(ExtendedRequest::new("1.3.6.1.4.1.1466.20037", None)),
            ProtocolOp::ExtendedResponse(ExtendedResponse::new(OperationResult::success())),
        ];
        for op in ops {
            assert_eq!(through_bytes(&op), op, "{}", op.name());
        }
    }

    #[test]
    fn test_primitive_operation_tags() {
        assert_eq!(ProtocolOp::UnbindRequest.to_node().to_ber(), vec![0x42, 0x00]);
        assert_eq!(
            ProtocolOp::DelRequest(DelRequest::new("o=x")).to_node().to_ber(),
            vec![0x4A, 0x03, b'o', b'=', b'x']
        );
        assert_eq!(
            ProtocolOp::AbandonRequest(5).to_node().to_ber(),
            vec![0x50, 0x01, 0x05]
        );
    }

    #[test]
    fn test_unknown_operation_tag() {
        let tagged = Tagged::application(30, Node::sequence(vec![]));
        assert!(matches!(
            ProtocolOp::from_tagged(&tagged),
            Err(LdapError::MalformedStructure(_))
        ));
        let context = Tagged::context(0, Node::null());
        assert!(ProtocolOp::from_tagged(&context).is_err());
    }

    #[test]
    fn test_request_dn() {
        let bind = ProtocolOp::BindRequest(BindRequest::simple("cn=admin", ""));
        assert_eq!(bind.request_dn(), Some("cn=admin"));
        let modify = ProtocolOp::ModifyRequest(ModifyRequest::new("cn=m", vec![]));
        assert_eq!(modify.request_dn(), Some("cn=m"));
        assert_eq!(ProtocolOp::UnbindRequest.request_dn(), None);
        assert_eq!(ProtocolOp::AbandonRequest(1).request_dn(), None);
    }

    #[test]
    fn test_search_override_reduces_single_level_on_reentry() {
        let search = ProtocolOp::SearchRequest(SearchRequest::new(
            "dc=x",
            SearchScope::SingleLevel,
            Filter::present("cn"),
        ));
        let overrides = RequestOverrides::new()
            .with_base("ou=people,dc=y")
            .with_filter(Filter::equality("cn", "a"))
            .reentering_reference();
        let ProtocolOp::SearchRequest(copy) = search.with_overrides(&overrides).unwrap() else {
            panic!("expected search request");
        };
        assert_eq!(copy.base_object, "ou=people,dc=y");
        assert_eq!(copy.filter, Filter::equality("cn", "a"));
        assert_eq!(copy.scope, SearchScope::BaseObject);

        let referral = RequestOverrides::new().with_base("dc=y");
        let ProtocolOp::SearchRequest(copy) = search.with_overrides(&referral).unwrap() else {
            panic!("expected search request");
        };
        assert_eq!(copy.scope, SearchScope::SingleLevel);
        assert_eq!(copy.filter, Filter::present("cn"));
    }

    #[test]
    fn test_subtree_search_keeps_scope_on_reentry() {
        let search = ProtocolOp::SearchRequest(SearchRequest::new(
            "dc=x",
            SearchScope::WholeSubtree,
            Filter::present("cn"),
        ));
        let copy = search
            .with_overrides(&RequestOverrides::new().reentering_reference())
            .unwrap();
        assert_eq!(copy, search);
    }

    #[test]
    fn test_overrides_replace_target_dn() {
        let overrides = RequestOverrides::new().with_base("cn=new");
        for op in [
            ProtocolOp::BindRequest(BindRequest::simple("cn=old", "")),
            ProtocolOp::AddRequest(AddRequest::new("cn=old", vec![])),
            ProtocolOp::DelRequest(DelRequest::new("cn=old")),
            ProtocolOp::ModifyDnRequest(ModifyDnRequest::new("cn=old", "cn=x", true)),
        ] {
            let copy = op.with_overrides(&overrides).unwrap();
            assert_eq!(copy.request_dn(), Some("cn=new"), "{}", op.name());
        }
        let extended = ProtocolOp::ExtendedRequest(ExtendedRequest::new("1.2.3", Some(vec![1])));
        assert_eq!(extended.with_overrides(&overrides).unwrap(), extended);
    }

    #[test]
    fn test_unsupported_duplication() {
        let overrides = RequestOverrides::new().with_base("cn=new");
        for op in [
            ProtocolOp::AbandonRequest(3),
            ProtocolOp::UnbindRequest,
            ProtocolOp::ModifyRequest(ModifyRequest::new("cn=a", vec![])),
            ProtocolOp::CompareRequest(CompareRequest::new("cn=a", "cn", "a")),
            ProtocolOp::SearchResultDone(OperationResult::success()),
        ] {
            assert!(matches!(
                op.with_overrides(&overrides),
                Err(LdapError::UnsupportedDuplication(_))
            ));
        }
    }
}
