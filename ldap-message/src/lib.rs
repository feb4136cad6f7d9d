//! LDAP message layer (RFC 2251)
//!
//! This crate builds and parses the `LDAPMessage` envelope and every
//! protocol operation it can carry:
//!
//! - [`LdapMessage`]: message ID, protocol operation and optional controls
//! - [`ProtocolOp`]: the application-tagged operation CHOICE
//! - request and response structs for bind, search, modify, add, delete,
//!   modify DN, compare, abandon and extended operations
//! - [`MessageIdCounter`]: shared, wrapping message ID allocation
//!
//! With the `tokio` feature, [`io`] reads and writes whole messages on
//! async streams.

pub mod attribute;
pub mod control;
pub mod message;
pub mod message_id;
pub mod protocol_op;
pub mod request;
pub mod response;
pub mod result;

#[cfg(feature = "tokio")]
pub mod io;

pub use attribute::{Attribute, Modification, ModifyOperation};
pub use control::Control;
pub use message::LdapMessage;
pub use message_id::{MessageIdCounter, MAX_MESSAGE_ID};
pub use protocol_op::ProtocolOp;
pub use request::{
    AddRequest, BindAuthentication, BindRequest, CompareRequest, DelRequest, DerefAliases,
    ExtendedRequest, ModifyDnRequest, ModifyRequest, RequestOverrides, SearchRequest,
    SearchScope, LDAP_VERSION3,
};
pub use response::{BindResponse, ExtendedResponse, SearchResultEntry, SearchResultReference};
pub use result::{OperationResult, ResultCode};
