//! LBER (Lightweight BER) encoder and decoder
//!
//! LDAP restricts ASN.1 BER to a small profile (RFC 2251 section 5.1).
//! Each value is a TLV (Tag-Length-Value) triplet:
//!
//! ```text
//! [Identifier] [Length] [Content]
//! ```
//!
//! ## Identifier Encoding
//!
//! ```text
//! Bits: 8 7 6 5 4 3 2 1
//!       C C P T T T T T
//! ```
//! Where:
//! - CC = Class (00=Universal, 01=Application, 10=Context, 11=Private)
//! - P = Primitive (0) or Constructed (1)
//! - TTTTT = Tag number (0-30), or 11111 followed by base-128 octets
//!
//! ## Length Encoding
//!
//! - **Short form** (1 octet): lengths 0-127
//! - **Long form**: `0x80 | n`, then `n` big-endian octets (n <= 4 here)
//! - **Indefinite** (`0x80`): not allowed in LDAP, rejected on decode
//!
//! ## Restrictions
//!
//! 1. Definite lengths only, always in the shortest form.
//! 2. OCTET STRING and the character string types are primitive only.
//! 3. BOOLEAN true is sent as `0xFF`; any nonzero octet is read as true.
//! 4. INTEGER and ENUMERATED use the minimal two's complement form.

pub mod cursor;
pub mod decoder;
pub mod encoder;
pub mod node;
pub mod types;

pub use cursor::NodeCursor;
pub use decoder::{decode, decode_from_reader, decode_with, read_tlv, BerDecoder, DecoderOptions};
pub use encoder::{encode, BerEncoder};
pub use node::{CharStringKind, Node, Tagged};
pub use types::{universal, Identifier, Length, TagClass};
