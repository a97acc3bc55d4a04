//! Identifiers, domains and policy.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A functional area of the repository with its own roots and policy.
///
/// Tags are lower-cased on parse. Tags without a dedicated variant become
/// [`Domain::Unknown`], which never has configured roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Domain {
    /// Story pages and their assets.
    Story,
    /// Any tag without first-class configuration.
    Unknown(String),
}

impl Domain {
    /// Parse a caller-supplied tag.
    ///
    /// Returns `None` for empty or whitespace-only input so that "no domain"
    /// is always represented as an absent value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let tag = raw.trim().to_ascii_lowercase();
        match tag.as_str() {
            "" => None,
            "story" => Some(Self::Story),
            _ => Some(Self::Unknown(tag)),
        }
    }

    /// The lower-cased tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Story => "story",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether this domain has first-class configuration.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Domain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "domain tag must not be empty".to_owned())
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.as_str().to_owned()
    }
}

/// Whether scope violations block the operation or are only reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Advisory: violations are reported but never block.
    #[default]
    Soft,
    /// Blocking: any out-of-scope path denies the operation.
    Hard,
}

impl Policy {
    /// Whether violations under this policy deny the operation.
    #[must_use]
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Hard)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Opaque, stable identifier of a stored proposal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    /// Create a new random proposal ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an active work loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopId(String);

impl LoopId {
    /// Parse a caller-supplied loop id; empty input is `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// The loop id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque credential (scope override or approval token).
///
/// The secret is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Parse a caller-supplied token; empty input is `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// Expose the secret value for handing to a collaborator.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A short, non-reversible hint for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{tail}")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&"<redacted>").finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
