//! Request correlation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one caller-facing request, carried as a tracing span.
///
/// Everything logged while the span is entered (scope guard verdicts, store
/// transitions, approval calls) shares the same `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique id of this request.
    pub request_id: Uuid,
    /// Shared by a request and all of its children.
    pub correlation_id: Uuid,
    /// Request that spawned this one.
    pub parent_id: Option<Uuid>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Component that created the context.
    pub source: String,
    /// Operation name, e.g. `"apply"`.
    pub operation: Option<String>,
    /// Entity the request acts on, e.g. a proposal id.
    pub subject: Option<String>,
}

impl RequestContext {
    /// Start a new root request.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            parent_id: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            subject: None,
        }
    }

    /// Start a sub-request sharing this request's correlation id.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.request_id),
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            subject: self.subject.clone(),
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Milliseconds since the request started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// An `info`-level span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            source = %self.source,
            operation = self.operation.as_deref(),
            subject = self.subject.as_deref(),
        )
    }
}
