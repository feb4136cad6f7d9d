//! Filter value escaping
//!
//! RFC 2254 escapes a value octet as `\` followed by two hex digits. The
//! older RFC 1960 form `\*`, `\(`, `\)`, `\\` is still accepted on input.

use ldap_core::{LdapError, LdapResult};

/// Octets allowed to appear unescaped in a filter value
///
/// `0x01-0x27`, `0x2B-0x5B`, `0x5D-0x7F`, plus any octet belonging to a
/// multi-byte UTF-8 sequence. NUL, `(`, `)`, `*` and `\` must be escaped.
pub fn is_value_octet(octet: u8) -> bool {
    matches!(octet, 0x01..=0x27 | 0x2B..=0x5B | 0x5D..=0x7F | 0x80..=0xFF)
}

fn hex_value(octet: u8) -> Option<u8> {
    match octet {
        b'0'..=b'9' => Some(octet - b'0'),
        b'a'..=b'f' => Some(octet - b'a' + 10),
        b'A'..=b'F' => Some(octet - b'A' + 10),
        _ => None,
    }
}

/// Resolve escapes in a raw filter value
///
/// `offset` is the position of `raw` inside the whole filter string and is
/// only used for error positions.
///
/// # Errors
/// - `InvalidFilterEscape` for a dangling `\`, an incomplete hex pair or
///   an unknown escape
/// - `InvalidFilterCharacter` for an octet that must have been escaped
pub fn unescape_value(raw: &[u8], offset: usize) -> LdapResult<Vec<u8>> {
    let mut value = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let octet = raw[i];
        if octet != b'\\' {
            if !is_value_octet(octet) {
                return Err(LdapError::InvalidFilterCharacter {
                    position: offset + i,
                    octet,
                });
            }
            value.push(octet);
            i += 1;
            continue;
        }

        let Some(&next) = raw.get(i + 1) else {
            return Err(LdapError::InvalidFilterEscape {
                position: offset + i,
                reason: "backslash at end of value".to_string(),
            });
        };
        if let Some(high) = hex_value(next) {
            let Some(low) = raw.get(i + 2).and_then(|&o| hex_value(o)) else {
                return Err(LdapError::InvalidFilterEscape {
                    position: offset + i,
                    reason: "incomplete hex pair".to_string(),
                });
            };
            value.push((high << 4) | low);
            i += 3;
        } else if matches!(next, b'*' | b'(' | b')' | b'\\') {
            value.push(next);
            i += 2;
        } else {
            return Err(LdapError::InvalidFilterEscape {
                position: offset + i,
                reason: format!("unknown escape '\\{}'", next as char),
            });
        }
    }
    Ok(value)
}

/// Escape a value for use inside a filter string
///
/// UTF-8 text keeps its characters, other than the five octets RFC 2254
/// requires to be escaped. Values that are not UTF-8 have every non-ASCII
/// octet escaped as well.
pub fn escape_filter_value(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len());
    match std::str::from_utf8(value) {
        Ok(text) => {
            for c in text.chars() {
                match c {
                    '*' | '(' | ')' | '\\' | '\0' => push_hex(&mut out, c as u8),
                    _ => out.push(c),
                }
            }
        }
        Err(_) => {
            for &octet in value {
                if octet.is_ascii() && is_value_octet(octet) {
                    out.push(octet as char);
                } else {
                    push_hex(&mut out, octet);
                }
            }
        }
    }
    out
}

fn push_hex(out: &mut String, octet: u8) {
    out.push_str(&format!("\\{:02x}", octet));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_and_legacy_escapes() {
        assert_eq!(unescape_value(br"\2a", 0).unwrap(), b"*");
        assert_eq!(unescape_value(br"a\28b\29", 0).unwrap(), b"a(b)");
        assert_eq!(unescape_value(br"\*\(\)\\", 0).unwrap(), b"*()\\");
        assert_eq!(unescape_value(br"\5C\00", 0).unwrap(), b"\\\0");
    }

    #[test]
    fn test_utf8_passes_through() {
        assert_eq!(unescape_value("Lučić".as_bytes(), 0).unwrap(), "Lučić".as_bytes());
    }

    #[test]
    fn test_incomplete_hex_pair() {
        let err = unescape_value(br"ab\2", 4).unwrap_err();
        assert!(matches!(err, LdapError::InvalidFilterEscape { position: 6, .. }));
        let err = unescape_value(br"\2g", 0).unwrap_err();
        assert!(matches!(err, LdapError::InvalidFilterEscape { position: 0, .. }));
    }

    #[test]
    fn test_dangling_and_unknown_escape() {
        assert!(matches!(
            unescape_value(b"x\\", 0),
            Err(LdapError::InvalidFilterEscape { position: 1, .. })
        ));
        assert!(matches!(
            unescape_value(br"\q", 0),
            Err(LdapError::InvalidFilterEscape { .. })
        ));
    }

    #[test]
    fn test_unescaped_special_octets_rejected() {
        assert!(matches!(
            unescape_value(b"a*b", 10),
            Err(LdapError::InvalidFilterCharacter { position: 11, octet: b'*' })
        ));
        assert!(matches!(
            unescape_value(b"a(b", 0),
            Err(LdapError::InvalidFilterCharacter { octet: b'(', .. })
        ));
        assert!(matches!(
            unescape_value(b"\0", 0),
            Err(LdapError::InvalidFilterCharacter { octet: 0, .. })
        ));
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value(b"a*b(c)\\"), r"a\2ab\28c\29\5c");
        assert_eq!(escape_filter_value("José".as_bytes()), "José");
        assert_eq!(escape_filter_value(&[0x41, 0xFF, 0x00]), r"A\ff\00");
    }

    #[test]
    fn test_escape_then_unescape_restores_value() {
        let value = b"(x*y)\\z";
        let escaped = escape_filter_value(value);
        assert_eq!(unescape_value(escaped.as_bytes(), 0).unwrap(), value);
    }
}
