use thiserror::Error;

/// Main error type for LDAP codec, message and filter operations
///
/// Every variant is local and synchronous: a failure aborts the single
/// encode/decode/compile call that raised it and is handed back verbatim.
#[derive(Error, Debug)]
pub enum LdapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended in the middle of a tag, length or content
    #[error("Truncated stream: {0}")]
    TruncatedStream(String),

    /// Indefinite length or a length field wider than supported
    #[error("Unsupported length form: {0}")]
    UnsupportedLengthForm(String),

    /// A universal-class tag number with no mapped node variant
    #[error("Unknown tag: class {class}, number {number}")]
    UnknownTag { class: u8, number: u32 },

    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    #[error("Nesting depth exceeded (limit {limit})")]
    DepthExceeded { limit: usize },

    #[error("Invalid text encoding: {0}")]
    InvalidTextEncoding(String),

    #[error("Invalid filter escape at offset {position}: {reason}")]
    InvalidFilterEscape { position: usize, reason: String },

    #[error("Invalid filter character 0x{octet:02X} at offset {position}")]
    InvalidFilterCharacter { position: usize, octet: u8 },

    #[error("Invalid filter type at offset {position}: {found}")]
    InvalidFilterType { position: usize, found: String },

    #[error("Missing parenthesis at offset {position}: expected '{expected}'")]
    MissingParen { position: usize, expected: char },

    #[error("Unexpected end of filter")]
    UnexpectedEndOfFilter,

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Duplication not supported for {0}")]
    UnsupportedDuplication(&'static str),

    #[error("Invalid OID: {0}")]
    InvalidOid(String),
}

impl LdapError {
    /// Map an I/O error raised while reading a stream
    ///
    /// An unexpected EOF means the peer stopped mid-element, which is a
    /// truncation of the encoding rather than a transport failure.
    pub fn from_read(err: std::io::Error, context: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            LdapError::TruncatedStream(format!("end of stream while reading {}", context))
        } else {
            LdapError::Io(err)
        }
    }
}

/// Result type alias for LDAP operations
pub type LdapResult<T> = Result<T, LdapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_eof_maps_to_truncation() {
        let err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            LdapError::from_read(err, "length"),
            LdapError::TruncatedStream(_)
        ));
    }

    #[test]
    fn test_other_io_errors_pass_through() {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(LdapError::from_read(err, "tag"), LdapError::Io(_)));
    }

    #[test]
    fn test_unknown_tag_display() {
        let err = LdapError::UnknownTag { class: 0, number: 9 };
        assert_eq!(err.to_string(), "Unknown tag: class 0, number 9");
    }
}
