//! LBER decoder
//!
//! # Usage Example
//!
//! ```rust
//! use ldap_asn1::ber::{decode, Node};
//!
//! let (node, consumed) = decode(&[0x30, 0x03, 0x02, 0x01, 0x07]).unwrap();
//! assert_eq!(node, Node::sequence(vec![Node::integer(7)]));
//! assert_eq!(consumed, 5);
//! ```

use crate::ber::node::{CharStringKind, Node, Tagged};
use crate::ber::types::{universal, Identifier, Length, TagClass};
use ldap_core::{LdapError, LdapResult};
use std::io::Read;

/// Default bound on nested constructed values
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default bound on a single content length (16 MiB)
pub const DEFAULT_MAX_LENGTH: usize = 16 * 1024 * 1024;

/// Limits applied while decoding untrusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Maximum nesting of constructed values, counting tagged content
    /// once it is reinterpreted as a SEQUENCE
    pub max_depth: usize,
    /// Maximum declared content length of any single value
    pub max_length: usize,
}

impl DecoderOptions {
    pub const DEFAULT: Self = Self {
        max_depth: DEFAULT_MAX_DEPTH,
        max_length: DEFAULT_MAX_LENGTH,
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// LBER decoder over an in-memory buffer
///
/// The decoder keeps a position that advances as values are read, so
/// several consecutive TLVs can be taken from one buffer.
///
/// A decoder created for the content of a constructed value is *bounded*:
/// running past its end means a child overran its parent's declared
/// length, reported as `MalformedStructure`. At the top level the same
/// condition means the input stopped early and is `TruncatedStream`.
pub struct BerDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
    options: DecoderOptions,
    depth: usize,
    bounded: bool,
}

impl<'a> BerDecoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_options(buffer, DecoderOptions::default())
    }

    pub fn with_options(buffer: &'a [u8], options: DecoderOptions) -> Self {
        Self {
            buffer,
            position: 0,
            options,
            depth: 0,
            bounded: false,
        }
    }

    /// Decoder over the content of a constructed value at `depth`
    pub(crate) fn nested(buffer: &'a [u8], options: DecoderOptions, depth: usize) -> Self {
        Self {
            buffer,
            position: 0,
            options,
            depth,
            bounded: true,
        }
    }

    /// Get current position in buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there is more data to decode
    pub fn has_remaining(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn bound_error(&self, err: LdapError) -> LdapError {
        match err {
            LdapError::TruncatedStream(msg) if self.bounded => LdapError::MalformedStructure(
                format!("element overruns enclosing value: {}", msg),
            ),
            other => other,
        }
    }

    /// Decode identifier and length, returning the definite content length
    pub fn decode_header(&mut self) -> LdapResult<(Identifier, usize)> {
        let rest = &self.buffer[self.position..];
        let (identifier, id_len) = Identifier::decode(rest).map_err(|e| self.bound_error(e))?;
        let (length, len_len) =
            Length::decode(&rest[id_len..]).map_err(|e| self.bound_error(e))?;
        let content_len = length.definite()?;
        check_length(content_len, &self.options)?;
        self.position += id_len + len_len;
        Ok((identifier, content_len))
    }

    /// Decode a TLV (Tag-Length-Value) triplet
    ///
    /// Reads the header at the current position and borrows the content
    /// octets from the buffer without interpreting them.
    ///
    /// # Returns
    /// Returns `Ok((identifier, content, total_octets_consumed))`
    ///
    /// # Errors
    /// * `TruncatedStream` - header or content runs past the end of the
    ///   buffer (`MalformedStructure` inside a bounded decoder)
    /// * `UnsupportedLengthForm` - indefinite, reserved or oversized length
    /// * `MalformedStructure` - declared length above `max_length`
    ///
    /// # Why Keep the Position?
    /// On a truncated value the position is restored, so a caller feeding a
    /// growing buffer can retry once more octets arrive.
    pub fn decode_tlv(&mut self) -> LdapResult<(Identifier, &'a [u8], usize)> {
        let start = self.position;
        let (identifier, content_len) = self.decode_header()?;

        if self.remaining() < content_len {
            let err = LdapError::TruncatedStream(format!(
                "content needs {} octets, {} remaining",
                content_len,
                self.remaining()
            ));
            self.position = start;
            return Err(self.bound_error(err));
        }

        let content = &self.buffer[self.position..self.position + content_len];
        self.position += content_len;
        Ok((identifier, content, self.position - start))
    }

    /// Decode the next complete value
    pub fn decode_node(&mut self) -> LdapResult<Node> {
        let (identifier, content, _) = self.decode_tlv()?;
        build_node(identifier, content, &self.options, self.depth)
    }

    /// Decode values until the buffer is exhausted
    pub fn decode_all(&mut self) -> LdapResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while self.has_remaining() {
            nodes.push(self.decode_node()?);
        }
        Ok(nodes)
    }
}

/// Reject a declared content length above `options.max_length`
pub fn check_length(content_len: usize, options: &DecoderOptions) -> LdapResult<()> {
    if content_len > options.max_length {
        return Err(LdapError::MalformedStructure(format!(
            "declared length {} exceeds limit {}",
            content_len, options.max_length
        )));
    }
    Ok(())
}

/// Build a node from an identifier and its content octets
///
/// Universal tags are mapped to their variant; every other class becomes
/// an opaque implicit [`Tagged`] holding the raw content.
pub(crate) fn build_node(
    identifier: Identifier,
    content: &[u8],
    options: &DecoderOptions,
    depth: usize,
) -> LdapResult<Node> {
    if identifier.class() != TagClass::Universal {
        log::trace!(
            "opaque {:?} [{}], {} content octets",
            identifier.class(),
            identifier.number(),
            content.len()
        );
        return Ok(Node::Tagged(Tagged::opaque(identifier, content.to_vec())));
    }

    let number = identifier.number();
    match number {
        universal::SEQUENCE | universal::SET => {
            if !identifier.is_constructed() {
                return Err(LdapError::MalformedStructure(format!(
                    "primitive encoding of constructed universal type {}",
                    number
                )));
            }
            if depth >= options.max_depth {
                return Err(LdapError::DepthExceeded {
                    limit: options.max_depth,
                });
            }
            let children = BerDecoder::nested(content, *options, depth + 1).decode_all()?;
            if number == universal::SEQUENCE {
                Ok(Node::Sequence(children))
            } else {
                Ok(Node::Set(children))
            }
        }
        _ if identifier.is_constructed() => Err(LdapError::MalformedStructure(format!(
            "constructed encoding of universal type {} is not supported",
            number
        ))),
        universal::BOOLEAN => {
            if content.len() != 1 {
                return Err(LdapError::MalformedStructure(format!(
                    "BOOLEAN content must be 1 octet, got {}",
                    content.len()
                )));
            }
            if content[0] != 0x00 && content[0] != 0xFF {
                log::warn!("non-canonical BOOLEAN octet 0x{:02X} read as true", content[0]);
            }
            Ok(Node::Boolean(content[0] != 0))
        }
        universal::INTEGER => Ok(Node::Integer(integer_from_octets(content)?)),
        universal::ENUMERATED => Ok(Node::Enumerated(integer_from_octets(content)?)),
        universal::NULL => {
            if !content.is_empty() {
                return Err(LdapError::MalformedStructure(format!(
                    "NULL content must be empty, got {} octets",
                    content.len()
                )));
            }
            Ok(Node::Null)
        }
        universal::OCTET_STRING => Ok(Node::OctetString(content.to_vec())),
        _ => match CharStringKind::from_tag_number(number) {
            Some(kind) => {
                let text = std::str::from_utf8(content)
                    .map_err(|e| LdapError::InvalidTextEncoding(e.to_string()))?;
                Ok(Node::CharString(kind, text.to_string()))
            }
            None => Err(LdapError::UnknownTag {
                class: TagClass::Universal as u8,
                number,
            }),
        },
    }
}

/// Reconstruct a signed value from big-endian two's complement octets
///
/// The first octet is sign-extended, the rest are shifted in.
pub fn integer_from_octets(octets: &[u8]) -> LdapResult<i64> {
    let Some((&first, rest)) = octets.split_first() else {
        return Err(LdapError::MalformedStructure("empty INTEGER content".to_string()));
    };
    if octets.len() > 8 {
        return Err(LdapError::MalformedStructure(format!(
            "INTEGER of {} octets does not fit in 64 bits",
            octets.len()
        )));
    }
    let mut value = first as i8 as i64;
    for &octet in rest {
        value = (value << 8) | octet as i64;
    }
    Ok(value)
}

/// Decode one value from the start of `data`
///
/// # Returns
/// Returns `Ok((node, total_octets_consumed))`
pub fn decode(data: &[u8]) -> LdapResult<(Node, usize)> {
    decode_with(data, DecoderOptions::default())
}

pub fn decode_with(data: &[u8], options: DecoderOptions) -> LdapResult<(Node, usize)> {
    let mut decoder = BerDecoder::with_options(data, options);
    let node = decoder.decode_node()?;
    Ok((node, decoder.position()))
}

/// Read exactly one complete TLV from a blocking byte stream
///
/// Returns the raw octets (identifier, length and content). Nothing past
/// the end of the element is consumed from the reader.
pub fn read_tlv<R: Read>(reader: &mut R, options: &DecoderOptions) -> LdapResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(16);

    let first = read_octet(reader, "identifier")?;
    raw.push(first);
    if first & 0x1F == 0x1F {
        loop {
            let octet = read_octet(reader, "identifier")?;
            raw.push(octet);
            if octet & 0x80 == 0 {
                break;
            }
        }
    }
    let (_, id_len) = Identifier::decode(&raw)?;

    let first_len = read_octet(reader, "length")?;
    raw.push(first_len);
    if first_len & 0x80 != 0 && first_len != 0x80 && first_len != 0xFF {
        let count = (first_len & 0x7F) as usize;
        if count <= 4 {
            let mut octets = vec![0u8; count];
            reader
                .read_exact(&mut octets)
                .map_err(|e| LdapError::from_read(e, "length"))?;
            raw.extend_from_slice(&octets);
        }
    }
    let (length, _) = Length::decode(&raw[id_len..])?;
    let content_len = length.definite()?;
    check_length(content_len, options)?;

    let header_len = raw.len();
    raw.resize(header_len + content_len, 0);
    reader
        .read_exact(&mut raw[header_len..])
        .map_err(|e| LdapError::from_read(e, "content"))?;
    Ok(raw)
}

fn read_octet<R: Read>(reader: &mut R, context: &str) -> LdapResult<u8> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf)
        .map_err(|e| LdapError::from_read(e, context))?;
    Ok(buf[0])
}

/// Decode one value from a blocking byte stream
///
/// # Returns
/// Returns `Ok((node, total_octets_consumed))`
pub fn decode_from_reader<R: Read>(
    reader: &mut R,
    options: DecoderOptions,
) -> LdapResult<(Node, usize)> {
    let raw = read_tlv(reader, &options)?;
    decode_with(&raw, options)
}
