//! `LDAPResult` and result codes

use ldap_asn1::ber::{Node, NodeCursor, TagClass, Tagged};
use ldap_core::LdapResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context tag of the `referral` field
pub const REFERRAL_TAG: u32 = 3;

macro_rules! result_codes {
    ($($name:ident = $code:literal, $text:literal;)*) => {
        /// LDAP result codes (RFC 2251 section 4.1.10)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ResultCode {
            $($name,)*
            /// A code outside the RFC 2251 table
            Unknown(i64),
        }

        impl ResultCode {
            pub fn from_code(code: i64) -> Self {
                match code {
                    $($code => ResultCode::$name,)*
                    other => ResultCode::Unknown(other),
                }
            }

            pub fn code(&self) -> i64 {
                match self {
                    $(ResultCode::$name => $code,)*
                    ResultCode::Unknown(code) => *code,
                }
            }

            fn text(&self) -> Option<&'static str> {
                match self {
                    $(ResultCode::$name => Some($text),)*
                    ResultCode::Unknown(_) => None,
                }
            }
        }
    };
}

result_codes! {
    Success = 0, "success";
    OperationsError = 1, "operationsError";
    ProtocolError = 2, "protocolError";
    TimeLimitExceeded = 3, "timeLimitExceeded";
    SizeLimitExceeded = 4, "sizeLimitExceeded";
    CompareFalse = 5, "compareFalse";
    CompareTrue = 6, "compareTrue";
    AuthMethodNotSupported = 7, "authMethodNotSupported";
    StrongAuthRequired = 8, "strongAuthRequired";
    Referral = 10, "referral";
    AdminLimitExceeded = 11, "adminLimitExceeded";
    UnavailableCriticalExtension = 12, "unavailableCriticalExtension";
    ConfidentialityRequired = 13, "confidentialityRequired";
    SaslBindInProgress = 14, "saslBindInProgress";
    NoSuchAttribute = 16, "noSuchAttribute";
    UndefinedAttributeType = 17, "undefinedAttributeType";
    InappropriateMatching = 18, "inappropriateMatching";
    ConstraintViolation = 19, "constraintViolation";
    AttributeOrValueExists = 20, "attributeOrValueExists";
    InvalidAttributeSyntax = 21, "invalidAttributeSyntax";
    NoSuchObject = 32, "noSuchObject";
    AliasProblem = 33, "aliasProblem";
    InvalidDnSyntax = 34, "invalidDNSyntax";
    AliasDereferencingProblem = 36, "aliasDereferencingProblem";
    InappropriateAuthentication = 48, "inappropriateAuthentication";
    InvalidCredentials = 49, "invalidCredentials";
    InsufficientAccessRights = 50, "insufficientAccessRights";
    Busy = 51, "busy";
    Unavailable = 52, "unavailable";
    UnwillingToPerform = 53, "unwillingToPerform";
    LoopDetect = 54, "loopDetect";
    NamingViolation = 64, "namingViolation";
    ObjectClassViolation = 65, "objectClassViolation";
    NotAllowedOnNonLeaf = 66, "notAllowedOnNonLeaf";
    NotAllowedOnRdn = 67, "notAllowedOnRDN";
    EntryAlreadyExists = 68, "entryAlreadyExists";
    ObjectClassModsProhibited = 69, "objectClassModsProhibited";
    AffectsMultipleDsas = 71, "affectsMultipleDSAs";
    Other = 80, "other";
}

impl ResultCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => write!(f, "{} ({})", text, self.code()),
            None => write!(f, "unknown ({})", self.code()),
        }
    }
}

/// `LDAPResult`, the common head of every response
///
/// ```text
/// LDAPResult ::= SEQUENCE {
///     resultCode   ENUMERATED,
///     matchedDN    LDAPDN,
///     errorMessage LDAPString,
///     referral     [3] Referral OPTIONAL }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub result_code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referral: Option<Vec<String>>,
}

impl OperationResult {
    pub fn new(result_code: ResultCode) -> Self {
        Self {
            result_code,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referral: None,
        }
    }

    pub fn success() -> Self {
        Self::new(ResultCode::Success)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = message.into();
        self
    }

    pub fn with_matched_dn(mut self, dn: impl Into<String>) -> Self {
        self.matched_dn = dn.into();
        self
    }

    pub fn with_referral(mut self, urls: Vec<String>) -> Self {
        self.referral = Some(urls);
        self
    }

    /// Fields of the `LDAPResult` SEQUENCE, for embedding in a response
    pub fn to_fields(&self) -> Vec<Node> {
        let mut fields = vec![
            Node::enumerated(self.result_code.code()),
            Node::text(&self.matched_dn),
            Node::text(&self.diagnostic_message),
        ];
        if let Some(urls) = &self.referral {
            fields.push(Node::tagged(Tagged::context(
                REFERRAL_TAG,
                Node::sequence_of(urls.iter().map(|u| Node::text(u)).collect()),
            )));
        }
        fields
    }

    /// Read the `LDAPResult` fields from the front of a response
    pub fn read(cursor: &mut NodeCursor) -> LdapResult<Self> {
        let result_code = ResultCode::from_code(cursor.next_enumerated("resultCode")?);
        let matched_dn = cursor.next_string("matchedDN")?;
        let diagnostic_message = cursor.next_string("errorMessage")?;
        let referral = match cursor.next_tagged_if(TagClass::ContextSpecific, REFERRAL_TAG) {
            Some(tagged) => Some(
                cursor
                    .tagged_children(&tagged)?
                    .iter()
                    .map(Node::to_text)
                    .collect::<LdapResult<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Self {
            result_code,
            matched_dn,
            diagnostic_message,
            referral,
        })
    }
}
