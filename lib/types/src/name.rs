// ============ Name Validation ============
// A name is "<label>.avax". Validation is pure: identical input always
// yields the identical verdict, which lets callers cache results.
//
// Rules, checked in order:
// 1. non-empty
// 2. blocklist (by name hash) short-circuits
// 3. exactly two '.'-separated segments
// 4. suffix is the namespace
// 5. label length within [MIN_LABEL_LEN, MAX_LABEL_LEN]
// 6. label characters in [a-z0-9-]
// 7. no leading or trailing '-'
// 8. no "--" at label positions 3-4 (reserved for punycode)

use crate::{Hash32, MAX_LABEL_LEN, MIN_LABEL_LEN, NAMESPACE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

const NAME_HASH_DOMAIN: &[u8] = b"avvy-name-v1";

// ============ Errors ============

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name is empty")]
    Empty,
    #[error("name is blocklisted")]
    Blocked,
    #[error("expected <label>.{ns}, got {0:?}", ns = NAMESPACE)]
    Segments(String),
    #[error("unsupported namespace {0:?}")]
    Namespace(String),
    #[error("label length {0} outside [{min}, {max}]", min = MIN_LABEL_LEN, max = MAX_LABEL_LEN)]
    Length(usize),
    #[error("label contains invalid character {0:?}")]
    Character(char),
    #[error("label may not start or end with '-'")]
    EdgeHyphen,
    #[error("label may not contain '--' at positions 3-4")]
    ReservedHyphens,
    #[error("quantity {quantity} outside [1, {max}]")]
    Quantity { quantity: u32, max: u32 },
    #[error("invalid amount {0:?}")]
    Amount(String),
}

// ============ Blocklist ============

/// Names withheld from registration, checked by name hash
pub trait Blocklist {
    fn is_blocked(&self, hash: &Hash32) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoBlocklist;

impl Blocklist for NoBlocklist {
    fn is_blocked(&self, _hash: &Hash32) -> bool {
        false
    }
}

impl Blocklist for HashSet<Hash32> {
    fn is_blocked(&self, hash: &Hash32) -> bool {
        self.contains(hash)
    }
}

// ============ Name ============

/// Validated domain name. Validation is exact: callers lower-case user
/// input at the boundary before parsing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Structural validation only; see [`Name::parse_with`] for the blocklist
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Self::parse_with(input, &NoBlocklist)
    }

    pub fn parse_with<B: Blocklist + ?Sized>(input: &str, blocklist: &B) -> Result<Self, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }
        if blocklist.is_blocked(&name_hash(input)) {
            return Err(ValidationError::Blocked);
        }

        let segments: Vec<&str> = input.split('.').collect();
        if segments.len() != 2 {
            return Err(ValidationError::Segments(input.to_string()));
        }
        let (label, namespace) = (segments[0], segments[1]);

        if namespace != NAMESPACE {
            return Err(ValidationError::Namespace(namespace.to_string()));
        }

        let len = label.chars().count();
        if !(MIN_LABEL_LEN..=MAX_LABEL_LEN).contains(&len) {
            return Err(ValidationError::Length(len));
        }

        if let Some(bad) = label
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(ValidationError::Character(bad));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(ValidationError::EdgeHyphen);
        }

        // ASCII from here on, byte indexing is safe
        if label.len() >= 4 && &label[2..4] == "--" {
            return Err(ValidationError::ReservedHyphens);
        }

        Ok(Name(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the namespace suffix
    pub fn label(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    pub fn hash(&self) -> Hash32 {
        name_hash(&self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl TryFrom<String> for Name {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Name::parse(&value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

// ============ Free Functions ============

/// Domain-separated SHA-256 of the lower-cased name
pub fn name_hash(name: &str) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(NAME_HASH_DOMAIN);
    hasher.update((name.len() as u32).to_le_bytes());
    hasher.update(name.as_bytes());
    Hash32(hasher.finalize().into())
}

pub fn is_supported(name: &str) -> bool {
    Name::parse(name).is_ok()
}

pub fn is_supported_with<B: Blocklist + ?Sized>(name: &str, blocklist: &B) -> bool {
    Name::parse_with(name, blocklist).is_ok()
}

// ============ Tests ============
