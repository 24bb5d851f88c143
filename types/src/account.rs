//! Ledger account name type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A Hive account name (`alice`, `peak.snaps`, `kcs-store-1`).
///
/// Names are 3 to 16 characters of lowercase letters, digits, `-` and `.`.
/// Operations read from the ledger are trusted to carry valid names, so
/// [`AccountName::new`] does not validate; use [`AccountName::parse`] for
/// operator-supplied input.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 16;

    /// Wrap a raw name as read from the ledger.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse and validate an account name supplied by an operator.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let name = Self(raw.to_string());
        if name.is_valid() {
            Ok(name)
        } else {
            Err(TypesError::InvalidAccount(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this name satisfies the ledger's naming rules.
    pub fn is_valid(&self) -> bool {
        let len = self.0.len();
        (Self::MIN_LEN..=Self::MAX_LEN).contains(&len)
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
            && self.0.as_bytes()[0].is_ascii_lowercase()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for AccountName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AccountName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_dotted_names() {
        assert!(AccountName::parse("peak.snaps").is_ok());
        assert!(AccountName::parse("snapnpay").is_ok());
    }

    #[test]
    fn parse_rejects_bad_names() {
        assert!(AccountName::parse("ab").is_err());
        assert!(AccountName::parse("Alice").is_err());
        assert!(AccountName::parse("1alice").is_err());
        assert!(AccountName::parse("a-very-long-account-name").is_err());
        assert!(AccountName::parse("al ice").is_err());
    }

    #[test]
    fn compares_against_str() {
        assert!(AccountName::new("alice") == *"alice");
        assert_eq!(AccountName::from("bob").to_string(), "bob");
    }
}
