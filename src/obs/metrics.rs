// self
use crate::obs::InvocationOutcome;

/// Records an invocation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(operation: &'static str, outcome: InvocationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bridge_operation_total",
			"operation" => operation,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Records invocation latency via the global metrics recorder (when enabled).
pub fn record_latency(operation: &'static str, latency_ms: u64) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("bridge_operation_latency_ms", "operation" => operation)
			.record(latency_ms as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, latency_ms);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_outcome_noop_without_metrics() {
		record_outcome("chat", InvocationOutcome::Failure);
	}

	#[test]
	fn record_latency_noop_without_metrics() {
		record_latency("chat", 42);
	}
}
