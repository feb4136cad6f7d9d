//! ldap_rs - LDAPv3 wire protocol for Rust
//!
//! This library encodes and decodes LDAP protocol data units: the LBER
//! subset of ASN.1 BER, the RFC 2251 message envelope with all of its
//! operations, and RFC 2254 string search filters.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `ldap-core`: Error type and OIDs
//! - `ldap-asn1`: LBER codec and the ASN.1 node taxonomy
//! - `ldap-filter`: Search filter parsing, encoding and printing
//! - `ldap-message`: `LDAPMessage`, protocol operations and message IDs
//!
//! # Usage
//!
//! ```rust
//! use ldap::{LdapMessage, MessageIdCounter, ProtocolOp, SearchRequest, SearchScope};
//!
//! let ids = MessageIdCounter::new();
//! let search = SearchRequest::with_filter_str(
//!     "dc=example,dc=com",
//!     SearchScope::WholeSubtree,
//!     "(&(objectClass=person)(cn=J*))",
//! )
//! .unwrap();
//! let message = LdapMessage::build_request(&ids, ProtocolOp::SearchRequest(search), None);
//!
//! let bytes = message.encode();
//! let (decoded, _) = LdapMessage::decode(&bytes).unwrap();
//! assert_eq!(decoded.message_id, 1);
//! ```

// Re-export core types
pub use ldap_core::{LdapError, LdapResult, Oid};

// Re-export the codec
pub use ldap_asn1::ber::{
    decode, decode_from_reader, decode_with, encode, BerDecoder, BerEncoder, CharStringKind,
    DecoderOptions, Identifier, Length, Node, NodeCursor, TagClass, Tagged,
};

pub use ldap_filter::{compile_filter, escape_filter_value, Filter};

pub use ldap_message::{
    AddRequest, Attribute, BindAuthentication, BindRequest, BindResponse, CompareRequest,
    Control, DelRequest, DerefAliases, ExtendedRequest, ExtendedResponse, LdapMessage,
    MessageIdCounter, Modification, ModifyDnRequest, ModifyOperation, ModifyRequest,
    OperationResult, ProtocolOp, RequestOverrides, ResultCode, SearchRequest, SearchResultEntry,
    SearchResultReference, SearchScope,
};

pub mod asn1 {
    pub use ldap_asn1::*;
}

pub mod filter {
    pub use ldap_filter::*;
}

pub mod message {
    pub use ldap_message::*;
}
