//! Optional observability helpers for the request execution pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit a structured span named `mcp_bridge.invocation` with the
//!   `operation` and `stage` fields, per invocation.
//! - Enable `metrics` to increment the `bridge_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`, and record the
//!   `bridge_operation_latency_ms` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvocationOutcome {
	/// Entry to the orchestrator.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back as an envelope.
	Failure,
}
impl InvocationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InvocationOutcome::Attempt => "attempt",
			InvocationOutcome::Success => "success",
			InvocationOutcome::Failure => "failure",
		}
	}
}
impl Display for InvocationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
