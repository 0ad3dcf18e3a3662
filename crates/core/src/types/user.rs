//! User profile record and its email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::id::UserId;

/// The last-known-good slice of the signed-in user.
///
/// Read-only cached data: authentication itself always goes to the origin,
/// this record only lets the account chrome render while unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Upstream user identifier.
    pub id: UserId,
    /// The user's email address.
    pub email: Email,
    /// Name shown in the account chrome.
    pub display_name: String,
}

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input does not split into a local part and a domain.
    #[error("email must look like local@domain")]
    Malformed,
}

/// A structurally validated email address.
///
/// Validation here is deliberately shallow (non-empty local part and domain
/// around a single `@`); the origin is the authority on deliverability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or does not have a non-empty
    /// local part and domain separated by `@`.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        match s.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_owned()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
