use crate::error::{LdapError, LdapResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric object identifier in dotted-decimal form
///
/// LDAP carries OIDs as text (`LDAPOID ::= OCTET STRING`), e.g. control
/// types, extended operation names and matching rule ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Oid {
    arcs: Vec<u64>,
}

impl Oid {
    /// Create an OID from its arcs
    ///
    /// # Errors
    /// Returns `InvalidOid` if fewer than two arcs are given or the first
    /// arc is not 0, 1 or 2.
    pub fn new(arcs: Vec<u64>) -> LdapResult<Self> {
        if arcs.len() < 2 {
            return Err(LdapError::InvalidOid(format!(
                "expected at least 2 arcs, got {}",
                arcs.len()
            )));
        }
        if arcs[0] > 2 {
            return Err(LdapError::InvalidOid(format!(
                "first arc must be 0, 1 or 2, got {}",
                arcs[0]
            )));
        }
        Ok(Self { arcs })
    }

    /// Parse an OID from dotted-decimal text such as "1.2.840.113556.1.4.319"
    pub fn from_string(s: &str) -> LdapResult<Self> {
        let mut arcs = Vec::new();
        for part in s.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(LdapError::InvalidOid(format!("invalid arc '{}' in '{}'", part, s)));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(LdapError::InvalidOid(format!("leading zero in arc '{}' of '{}'", part, s)));
            }
            let arc = part
                .parse::<u64>()
                .map_err(|_| LdapError::InvalidOid(format!("arc '{}' out of range in '{}'", part, s)))?;
            arcs.push(arc);
        }
        Self::new(arcs)
    }

    /// Check whether text is a well-formed numeric OID
    pub fn is_numeric_oid(s: &str) -> bool {
        Self::from_string(s).is_ok()
    }

    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }
}

impl FromStr for Oid {
    type Err = LdapError;

    fn from_str(s: &str) -> LdapResult<Self> {
        Self::from_string(s)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_from_string() {
        let oid = Oid::from_string("1.3.6.1.4.1.1466.20037").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 4, 1, 1466, 20037]);
    }

    #[test]
    fn test_oid_display() {
        let oid = Oid::new(vec![2, 5, 13, 2]).unwrap();
        assert_eq!(format!("{}", oid), "2.5.13.2");
    }

    #[test]
    fn test_oid_rejects_descriptors_and_garbage() {
        assert!(Oid::from_string("caseExactMatch").is_err());
        assert!(Oid::from_string("1").is_err());
        assert!(Oid::from_string("1..2").is_err());
        assert!(Oid::from_string("1.02").is_err());
        assert!(Oid::from_string("3.1").is_err());
    }

    #[test]
    fn test_is_numeric_oid() {
        assert!(Oid::is_numeric_oid("2.16.840.1.113730.3.4.2"));
        assert!(!Oid::is_numeric_oid("2.16.x"));
    }
}
