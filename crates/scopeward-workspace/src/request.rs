//! Scope guard requests.

use std::fmt;

use scopeward_config::ScopeKind;
use scopeward_core::{Domain, LoopId, Token};
use serde::{Deserialize, Serialize};

/// Operation a caller wants to perform on a set of paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    /// Writing a file through the file-write endpoint.
    FileWrite,
    /// Saving a story page.
    StoryPageSave,
    /// Applying a stored proposal.
    ProposalApply,
    /// Rejecting a stored proposal.
    ProposalReject,
    /// Searching the repository.
    Search,
    /// Running a command whose working set is the given paths.
    Command,
    /// Any other caller-defined operation.
    Other(String),
}

impl Operation {
    /// Parse an operation name such as `"story-page-save"`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "file-write" => Self::FileWrite,
            "story-page-save" => Self::StoryPageSave,
            "proposal-apply" => Self::ProposalApply,
            "proposal-reject" => Self::ProposalReject,
            "search" => Self::Search,
            "command" => Self::Command,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The kebab-case operation name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::FileWrite => "file-write",
            Self::StoryPageSave => "story-page-save",
            Self::ProposalApply => "proposal-apply",
            Self::ProposalReject => "proposal-reject",
            Self::Search => "search",
            Self::Command => "command",
            Self::Other(name) => name,
        }
    }

    /// Which loop roots apply to this operation.
    #[must_use]
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            Self::Search => ScopeKind::Read,
            _ => ScopeKind::Write,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_owned()
    }
}

/// A request to evaluate an operation against the scope policy.
#[derive(Debug, Clone)]
pub struct ScopeRequest {
    /// Operation being performed.
    pub operation: Operation,
    /// Raw paths as supplied by the caller.
    pub paths: Vec<String>,
    /// Domain the operation belongs to.
    pub domain: Option<Domain>,
    /// Active work loop, if any.
    pub loop_id: Option<LoopId>,
    /// Scope override token presented by the caller.
    pub override_token: Option<Token>,
}

impl ScopeRequest {
    /// Create a request with no paths or context.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            paths: Vec::new(),
            domain: None,
            loop_id: None,
            override_token: None,
        }
    }

    /// Build a request from raw transport values.
    ///
    /// Empty strings for domain, loop, and token become `None` here and
    /// nowhere else.
    #[must_use]
    pub fn from_raw<S: AsRef<str>>(
        operation: &str,
        paths: &[S],
        domain: Option<&str>,
        loop_id: Option<&str>,
        override_token: Option<&str>,
    ) -> Self {
        Self {
            operation: Operation::parse(operation),
            paths: paths.iter().map(|p| p.as_ref().to_owned()).collect(),
            domain: domain.and_then(Domain::parse),
            loop_id: loop_id.and_then(LoopId::parse),
            override_token: override_token.and_then(Token::parse),
        }
    }

    /// Add paths.
    #[must_use]
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Set the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<Domain>) -> Self {
        self.domain = domain;
        self
    }

    /// Set the work loop.
    #[must_use]
    pub fn with_loop(mut self, loop_id: Option<LoopId>) -> Self {
        self.loop_id = loop_id;
        self
    }

    /// Set the override token.
    #[must_use]
    pub fn with_override_token(mut self, token: Option<Token>) -> Self {
        self.override_token = token;
        self
    }
}
