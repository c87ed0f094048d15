//! Internal error taxonomy shared across the request execution pipeline.
//!
//! None of these variants ever escape to a tool caller directly — per the
//! orchestrator's failure semantics every [`Error`] is converted into an
//! [`crate::envelope::ResponseEnvelope`] before it leaves [`crate::orchestrator`].

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical internal error. Every variant maps to exactly one
/// [`crate::envelope::ResponseEnvelope`] kind.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Configuration failed to build or validate.
	#[error(transparent)]
	Config(#[from] crate::config::ConfigError),
	/// Argument validation against an operation's schema failed.
	#[error("argument validation failed with {} issue(s).", .issues.len())]
	Validation {
		/// Validation issues, one per offending field.
		issues: Vec<crate::schema::Issue>,
	},
	/// Authentication subsystem failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Upstream responded, but with a non-retryable failure.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Request could not be completed at the transport layer.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Unexpected internal fault (bug, invariant violation).
	#[error(transparent)]
	Internal(#[from] InternalError),
}
impl Error {
	/// Builds a [`Error::Validation`] from a single issue.
	pub fn validation(issue: crate::schema::Issue) -> Self {
		Self::Validation { issues: vec![issue] }
	}

	/// Builds an [`Error::Internal`] from a scrubbed message.
	pub fn internal(message: impl Into<String>) -> Self {
		Self::Internal(InternalError { message: message.into() })
	}
}

/// Authentication-provider failure modes.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// `auth_mode` is `none` but a header was requested.
	#[error("auth_unconfigured: no authentication mode is configured.")]
	Unconfigured,
	/// OAuth token endpoint returned non-2xx or a malformed body.
	#[error("auth_refresh_failed: {message}.")]
	RefreshFailed {
		/// Scrubbed failure summary (no secrets).
		message: String,
		/// HTTP status from the token endpoint, when reachable.
		status: Option<u16>,
	},
}

/// Non-retryable upstream failure, carrying best-effort extracted fields.
#[derive(Debug, ThisError)]
#[error("upstream responded with status {status}: {message}.")]
pub struct UpstreamError {
	/// HTTP status code returned by upstream (0 when the token endpoint was
	/// unreachable during an auth refresh).
	pub status: u16,
	/// Upstream-supplied error code, when present in the body.
	pub code: Option<String>,
	/// Human-readable message, extracted from the body or synthesized.
	pub message: String,
	/// Remaining body fields, when the body was JSON.
	pub details: Option<Json>,
	/// `Retry-After` hint in milliseconds, when the response carried one.
	pub retry_after_ms: Option<u64>,
}

/// Transport-level failure after the retry budget was exhausted or a
/// non-retryable transport fault occurred.
#[derive(Debug, ThisError)]
#[error("transport error after {attempts} attempt(s): {message}.")]
pub struct TransportError {
	/// Scrubbed human-readable summary.
	pub message: String,
	/// Underlying cause, stringified (never the raw error, to avoid leaking
	/// connection details that might include credentials embedded in a URL).
	pub cause: String,
	/// Number of attempts made before giving up.
	pub attempts: u32,
}
impl TransportError {
	/// Builds a [`TransportError`] from a lower-level error, stringifying the
	/// cause once so callers never need the original error type.
	pub fn from_cause(message: impl Into<String>, cause: &(impl StdError + ?Sized), attempts: u32) -> Self {
		Self { message: message.into(), cause: cause.to_string(), attempts }
	}
}

/// Unexpected internal fault. Messages are scrubbed before construction —
/// never build this from a raw error `Display` that might include secrets.
#[derive(Debug, ThisError)]
#[error("internal error: {message}.")]
pub struct InternalError {
	/// Scrubbed human-readable summary.
	pub message: String,
}

#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self { message: "request failed".into(), cause: e.to_string(), attempts: 1 }
	}
}
