//! ASN.1 processing for LDAP
//!
//! This crate provides the LBER codec: identifier and length primitives,
//! the [`Node`] value taxonomy, an encoder and a decoder
//! with depth and length limits.

pub mod ber;

pub use ber::{
    decode, decode_from_reader, encode, BerDecoder, BerEncoder, CharStringKind, DecoderOptions,
    Identifier, Length, Node, NodeCursor, TagClass, Tagged,
};
