//! [`ResponseEnvelope`]: the single success/failure record every orchestrator
//! invocation returns to its tool handler. Never `Result`-shaped at the API
//! boundary — every outcome, including unexpected internal faults, becomes
//! one of these variants instead of escaping as an error.

// self
use crate::{
	_prelude::*,
	error::{AuthError, Error},
	schema::{Issue, Operation},
};

/// Uniform success/failure record returned from every orchestrator invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResponseEnvelope {
	/// Upstream accepted the call and returned a usable body.
	#[serde(rename = "success")]
	Success {
		/// `true`, always, for this variant — kept explicit so the field is
		/// present in the serialized JSON regardless of `kind`.
		ok: bool,
		/// Operation that was invoked.
		operation: &'static str,
		/// Per-invocation correlation id.
		trace_id: String,
		/// Upstream response body, normalized to a JSON map.
		data: Json,
		/// HTTP status upstream returned.
		status: u16,
		/// Wall-clock latency of the whole invocation, in milliseconds.
		latency_ms: u64,
	},
	/// Argument validation failed before any network call was made.
	#[serde(rename = "validation")]
	Validation {
		/// Always `false`.
		ok: bool,
		/// Per-invocation correlation id.
		trace_id: String,
		/// One entry per offending field.
		issues: Vec<Issue>,
	},
	/// Upstream responded, but with a non-retryable failure.
	#[serde(rename = "upstream")]
	Upstream {
		/// Always `false`.
		ok: bool,
		/// Per-invocation correlation id.
		trace_id: String,
		/// HTTP status upstream returned (0 when a token refresh never
		/// reached the network).
		status: u16,
		/// Upstream-supplied error code, when present.
		#[serde(skip_serializing_if = "Option::is_none")]
		code: Option<String>,
		/// Human-readable message.
		message: String,
		/// Remaining body fields, when the body was JSON.
		#[serde(skip_serializing_if = "Option::is_none")]
		details: Option<Json>,
		/// `Retry-After` hint in milliseconds, when supplied.
		#[serde(skip_serializing_if = "Option::is_none")]
		retry_after_ms: Option<u64>,
	},
	/// The request could not be completed at the transport layer after the
	/// retry budget was exhausted.
	#[serde(rename = "transport")]
	Transport {
		/// Always `false`.
		ok: bool,
		/// Per-invocation correlation id.
		trace_id: String,
		/// Human-readable summary.
		message: String,
		/// Stringified cause (never the raw error).
		cause: String,
		/// Attempts made before giving up.
		attempts: u32,
	},
	/// Unexpected internal fault. Message is scrubbed (no secrets, no stack).
	#[serde(rename = "internal")]
	Internal {
		/// Always `false`.
		ok: bool,
		/// Per-invocation correlation id.
		trace_id: String,
		/// Scrubbed human-readable summary.
		message: String,
	},
}
impl ResponseEnvelope {
	/// Builds the success variant.
	pub fn success(
		operation: Operation,
		trace_id: String,
		data: Json,
		status: u16,
		latency_ms: u64,
	) -> Self {
		Self::Success { ok: true, operation: operation.as_str(), trace_id, data, status, latency_ms }
	}

	/// Builds the validation-failure variant.
	pub fn validation(trace_id: String, issues: Vec<Issue>) -> Self {
		Self::Validation { ok: false, trace_id, issues }
	}

	/// Builds the internal-fault variant.
	pub fn internal(trace_id: String, message: impl Into<String>) -> Self {
		Self::Internal { ok: false, trace_id, message: message.into() }
	}

	/// Converts an [`Error`] encountered mid-invocation into the matching
	/// envelope variant. This is the single place `Error` is consumed; no
	/// other code path should let an `Error` reach a tool caller.
	pub fn from_error(trace_id: String, err: Error) -> Self {
		match err {
			Error::Validation { issues } => Self::validation(trace_id, issues),
			Error::Upstream(upstream) => Self::Upstream {
				ok: false,
				trace_id,
				status: upstream.status,
				code: upstream.code,
				message: upstream.message,
				details: upstream.details,
				retry_after_ms: upstream.retry_after_ms,
			},
			Error::Transport(transport) => Self::Transport {
				ok: false,
				trace_id,
				message: transport.message,
				cause: transport.cause,
				attempts: transport.attempts,
			},
			Error::Auth(AuthError::Unconfigured) => Self::internal(trace_id, "auth_unconfigured"),
			Error::Auth(AuthError::RefreshFailed { message, status }) => Self::Upstream {
				ok: false,
				trace_id,
				status: status.unwrap_or(0),
				code: None,
				message,
				details: None,
				retry_after_ms: None,
			},
			Error::Config(config) => Self::internal(trace_id, config.to_string()),
			Error::Internal(internal) => Self::internal(trace_id, internal.message),
		}
	}

	/// The `trace_id` carried by any variant.
	pub fn trace_id(&self) -> &str {
		match self {
			Self::Success { trace_id, .. }
			| Self::Validation { trace_id, .. }
			| Self::Upstream { trace_id, .. }
			| Self::Transport { trace_id, .. }
			| Self::Internal { trace_id, .. } => trace_id,
		}
	}

	/// Whether this envelope represents a successful invocation.
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Success { .. })
	}

	/// The outcome kind, for logging/metrics labels.
	pub fn outcome_kind(&self) -> &'static str {
		match self {
			Self::Success { .. } => "success",
			Self::Validation { .. } => "validation",
			Self::Upstream { .. } => "upstream",
			Self::Transport { .. } => "transport",
			Self::Internal { .. } => "internal",
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_envelope_serializes_with_ok_true() {
		let envelope = ResponseEnvelope::success(
			Operation::Pricing,
			"trace-1".into(),
			serde_json::json!({"price": 1}),
			200,
			12,
		);
		let value = serde_json::to_value(&envelope).expect("envelope should serialize");

		assert_eq!(value["ok"], true);
		assert_eq!(value["kind"], "success");
		assert_eq!(value["operation"], "pricing");
	}

	#[test]
	fn validation_envelope_carries_issues() {
		let issues = vec![Issue { path: "messages".into(), message: "empty".into(), code: "min_length" }];
		let envelope = ResponseEnvelope::validation("trace-2".into(), issues);
		let value = serde_json::to_value(&envelope).expect("envelope should serialize");

		assert_eq!(value["ok"], false);
		assert_eq!(value["issues"][0]["code"], "min_length");
	}

	#[test]
	fn every_variant_reports_trace_id() {
		let envelope = ResponseEnvelope::internal("trace-3".into(), "boom");

		assert_eq!(envelope.trace_id(), "trace-3");
		assert!(!envelope.is_ok());
	}
}
