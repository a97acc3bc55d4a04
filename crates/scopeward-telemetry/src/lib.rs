//! Scopeward Telemetry - logging and request correlation.
//!
//! This crate provides:
//! - Subscriber setup with selectable format and output target
//! - [`RequestContext`] spans that tie together the log lines of one
//!   proposal apply or reject
//!
//! # Example
//!
//! ```rust,no_run
//! use scopeward_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), scopeward_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("scopeward_workspace=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("proposals").with_operation("apply");
//! let _entered = ctx.span().entered();
//! tracing::info!("applying proposal");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
