//! LDAP search filters (RFC 2254)
//!
//! Converts between three forms of a search filter:
//! - the textual representation, e.g. `(&(cn=bob)(uid=*))`
//! - the [`Filter`] AST
//! - the `Filter ::= CHOICE` node tree of RFC 2251 section 4.5.1
//!
//! ```rust
//! use ldap_filter::{compile_filter, Filter};
//!
//! let filter = Filter::parse("(cn=b*b)").unwrap();
//! assert_eq!(filter.to_string(), "(cn=b*b)");
//! let node = compile_filter("(uid=*)").unwrap();
//! assert_eq!(node.to_ber(), vec![0x87, 0x03, b'u', b'i', b'd']);
//! ```

pub mod escape;
pub mod filter;
pub mod parser;

pub use escape::{escape_filter_value, unescape_value};
pub use filter::{
    AttributeValueAssertion, Filter, MatchingRuleAssertion, Substring, SubstringFilter,
};
pub use parser::compile_filter;
