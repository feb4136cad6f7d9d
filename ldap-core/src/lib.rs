//! Core types and error handling for the LDAP protocol stack
//!
//! This crate provides the error type shared by the codec, message and
//! filter crates, plus the dotted-decimal OID type used for control types,
//! extended operation names and matching rule identifiers.

pub mod error;
pub mod oid;

pub use error::{LdapError, LdapResult};
pub use oid::Oid;
