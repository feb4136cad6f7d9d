//! RFC 2254 string filter compiler
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = and / or / not / item
//! and        = "&" filterlist
//! or         = "|" filterlist
//! not        = "!" filter
//! item       = simple / present / substring / extensible
//! filtertype = "=" / "~=" / ">=" / "<="
//! extensible = [attr] [":dn"] [":" matchingrule] ":=" value
//! ```

use crate::escape::unescape_value;
use crate::filter::{
    AttributeValueAssertion, Filter, MatchingRuleAssertion, Substring, SubstringFilter,
    MAX_FILTER_DEPTH,
};
use ldap_asn1::ber::Node;
use ldap_core::{LdapError, LdapResult, Oid};

/// Filter used when the input is empty
const DEFAULT_FILTER: &str = "(objectclass=*)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterType {
    Equal,
    Approx,
    GreaterOrEqual,
    LessOrEqual,
    Extensible,
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    And,
    Or,
}

/// Parser states for one parenthesised filter component
#[derive(Debug)]
enum ParseState {
    ExpectLeftParen,
    ExpectOperatorOrAttribute,
    ExpectFilterList(ListKind),
    ExpectFilterType { attribute: String, start: usize },
    ExpectRightParen(Filter),
}

struct FilterParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> FilterParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, expected: u8) -> LdapResult<()> {
        match self.peek() {
            None => Err(LdapError::UnexpectedEndOfFilter),
            Some(octet) if octet == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(LdapError::MissingParen {
                position: self.pos,
                expected: expected as char,
            }),
        }
    }

    fn parse_filter(&mut self, depth: usize) -> LdapResult<Filter> {
        if depth > MAX_FILTER_DEPTH {
            return Err(LdapError::DepthExceeded {
                limit: MAX_FILTER_DEPTH,
            });
        }

        let mut state = ParseState::ExpectLeftParen;
        loop {
            state = match state {
                ParseState::ExpectLeftParen => {
                    self.expect(b'(')?;
                    ParseState::ExpectOperatorOrAttribute
                }
                ParseState::ExpectOperatorOrAttribute => match self.peek() {
                    None => return Err(LdapError::UnexpectedEndOfFilter),
                    Some(b'&') => {
                        self.pos += 1;
                        ParseState::ExpectFilterList(ListKind::And)
                    }
                    Some(b'|') => {
                        self.pos += 1;
                        ParseState::ExpectFilterList(ListKind::Or)
                    }
                    Some(b'!') => {
                        self.pos += 1;
                        let inner = self.parse_filter(depth + 1)?;
                        ParseState::ExpectRightParen(Filter::Not(Box::new(inner)))
                    }
                    Some(_) => {
                        let start = self.pos;
                        let attribute = self.read_attribute()?;
                        ParseState::ExpectFilterType { attribute, start }
                    }
                },
                ParseState::ExpectFilterList(kind) => {
                    let filters = self.parse_filter_list(depth)?;
                    ParseState::ExpectRightParen(match kind {
                        ListKind::And => Filter::And(filters),
                        ListKind::Or => Filter::Or(filters),
                    })
                }
                ParseState::ExpectFilterType { attribute, start } => {
                    let filter_type = self.read_filter_type()?;
                    let filter = self.read_item(attribute, start, filter_type)?;
                    ParseState::ExpectRightParen(filter)
                }
                ParseState::ExpectRightParen(filter) => {
                    self.expect(b')')?;
                    return Ok(filter);
                }
            };
        }
    }

    /// One or more parenthesised filters
    fn parse_filter_list(&mut self, depth: usize) -> LdapResult<Vec<Filter>> {
        let mut filters = vec![self.parse_filter(depth + 1)?];
        while self.peek() == Some(b'(') {
            filters.push(self.parse_filter(depth + 1)?);
        }
        Ok(filters)
    }

    /// Attribute token, up to one of `=~<>()` or the two-octet `:=`
    fn read_attribute(&mut self) -> LdapResult<String> {
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(LdapError::UnexpectedEndOfFilter),
                Some(b'=' | b'~' | b'<' | b'>') => break,
                Some(b':') if self.input.get(self.pos + 1) == Some(&b'=') => break,
                Some(octet @ (b'(' | b')')) => {
                    return Err(LdapError::InvalidFilterType {
                        position: self.pos,
                        found: (octet as char).to_string(),
                    });
                }
                Some(_) => self.pos += 1,
            }
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn read_filter_type(&mut self) -> LdapResult<FilterType> {
        let position = self.pos;
        let first = self.peek().ok_or(LdapError::UnexpectedEndOfFilter)?;
        if first == b'=' {
            self.pos += 1;
            return Ok(FilterType::Equal);
        }
        let second = self
            .input
            .get(self.pos + 1)
            .copied()
            .ok_or(LdapError::UnexpectedEndOfFilter)?;
        let filter_type = match (first, second) {
            (b'~', b'=') => FilterType::Approx,
            (b'>', b'=') => FilterType::GreaterOrEqual,
            (b'<', b'=') => FilterType::LessOrEqual,
            (b':', b'=') => FilterType::Extensible,
            _ => {
                return Err(LdapError::InvalidFilterType {
                    position,
                    found: String::from_utf8_lossy(&[first, second]).into_owned(),
                });
            }
        };
        self.pos += 2;
        Ok(filter_type)
    }

    /// Raw value octets up to the closing parenthesis, escapes unresolved
    fn read_raw_value(&mut self) -> LdapResult<(usize, &'a [u8])> {
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(LdapError::UnexpectedEndOfFilter),
                Some(b')') => break,
                // an escape may hide a ')'
                Some(b'\\') => self.pos = (self.pos + 2).min(self.input.len()),
                Some(_) => self.pos += 1,
            }
        }
        let input: &'a [u8] = self.input;
        Ok((start, &input[start..self.pos]))
    }

    fn read_item(
        &mut self,
        attribute: String,
        attribute_start: usize,
        filter_type: FilterType,
    ) -> LdapResult<Filter> {
        if attribute.is_empty() && filter_type != FilterType::Extensible {
            return Err(LdapError::InvalidFilterType {
                position: attribute_start,
                found: "missing attribute description".to_string(),
            });
        }
        let (offset, raw) = self.read_raw_value()?;

        let filter = match filter_type {
            FilterType::Equal => equal_item(attribute, offset, raw)?,
            FilterType::Approx => Filter::ApproxMatch(AttributeValueAssertion::new(
                attribute,
                unescape_value(raw, offset)?,
            )),
            FilterType::GreaterOrEqual => Filter::GreaterOrEqual(AttributeValueAssertion::new(
                attribute,
                unescape_value(raw, offset)?,
            )),
            FilterType::LessOrEqual => Filter::LessOrEqual(AttributeValueAssertion::new(
                attribute,
                unescape_value(raw, offset)?,
            )),
            FilterType::Extensible => {
                let mut mra = parse_extensible_attribute(&attribute, attribute_start)?;
                mra.value = unescape_value(raw, offset)?;
                Filter::ExtensibleMatch(mra)
            }
        };
        Ok(filter)
    }
}

/// `=` selects present, substrings or equality by the unescaped `*`s
fn equal_item(attribute: String, offset: usize, raw: &[u8]) -> LdapResult<Filter> {
    if raw == b"*" {
        return Ok(Filter::Present(attribute));
    }

    let segments = split_on_wildcards(raw);
    if segments.len() == 1 {
        return Ok(Filter::EqualityMatch(AttributeValueAssertion::new(
            attribute,
            unescape_value(raw, offset)?,
        )));
    }

    // runs of bare wildcards such as `**` assert nothing beyond presence
    if segments.iter().all(|(_, segment)| segment.is_empty()) {
        return Ok(Filter::Present(attribute));
    }

    let last = segments.len() - 1;
    let mut substrings = Vec::with_capacity(segments.len());
    for (i, (start, segment)) in segments.into_iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        let value = unescape_value(segment, offset + start)?;
        substrings.push(match i {
            0 => Substring::Initial(value),
            i if i == last => Substring::Final(value),
            _ => Substring::Any(value),
        });
    }
    Ok(Filter::Substrings(SubstringFilter {
        attribute,
        substrings,
    }))
}

/// Split a raw value on `*` that is not part of an escape
///
/// Each segment is returned with its offset inside `raw`.
fn split_on_wildcards(raw: &[u8]) -> Vec<(usize, &[u8])> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'\\' => i += 2,
            b'*' => {
                segments.push((start, &raw[start..i]));
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    segments.push((start, &raw[start.min(raw.len())..]));
    segments
}

/// Split `[type][:dn][:rule]` from the left side of `:=`
fn parse_extensible_attribute(token: &str, position: usize) -> LdapResult<MatchingRuleAssertion> {
    let invalid = |found: &str| LdapError::InvalidFilterType {
        position,
        found: found.to_string(),
    };

    let mut parts = token.split(':');
    let attribute = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let mut dn_attributes = false;
    let mut matching_rule = None;
    let mut next = parts.next();
    if next.is_some_and(|p| p.eq_ignore_ascii_case("dn")) {
        dn_attributes = true;
        next = parts.next();
    }
    if let Some(rule) = next {
        if rule.is_empty() {
            return Err(invalid(token));
        }
        if rule.starts_with(|c: char| c.is_ascii_digit()) {
            Oid::from_string(rule).map_err(|_| invalid(rule))?;
        }
        matching_rule = Some(rule.to_string());
    }
    if parts.next().is_some() {
        return Err(invalid(token));
    }
    if attribute.is_none() && matching_rule.is_none() {
        return Err(invalid(token));
    }

    Ok(MatchingRuleAssertion {
        matching_rule,
        attribute,
        value: Vec::new(),
        dn_attributes,
    })
}

impl Filter {
    /// Parse an RFC 2254 filter string
    ///
    /// Surrounding whitespace is ignored, a missing outer pair of
    /// parentheses is supplied and an empty string means `(objectclass=*)`.
    pub fn parse(text: &str) -> LdapResult<Self> {
        let trimmed = text.trim();
        let wrapped;
        let source = if trimmed.is_empty() {
            DEFAULT_FILTER
        } else if !trimmed.starts_with('(') {
            wrapped = format!("({})", trimmed);
            wrapped.as_str()
        } else {
            trimmed
        };

        let mut parser = FilterParser::new(source);
        let filter = parser.parse_filter(0)?;
        if parser.pos < parser.input.len() {
            return Err(LdapError::InvalidFilterType {
                position: parser.pos,
                found: String::from_utf8_lossy(&parser.input[parser.pos..]).into_owned(),
            });
        }
        Ok(filter)
    }
}

/// Compile a filter string into the `Filter` CHOICE node
pub fn compile_filter(text: &str) -> LdapResult<Node> {
    let filter = Filter::parse(text)?;
    log::trace!("compiled filter {}", filter);
    Ok(filter.to_node())
}
