// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedInvocation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedInvocation<F> = F;

/// A span builder used by orchestrator invocations.
#[derive(Clone, Debug)]
pub struct InvocationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl InvocationSpan {
	/// Creates a new span tagged with the operation name and trace id.
	pub fn new(operation: &'static str, trace_id: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("mcp_bridge.invocation", operation, trace_id = %trace_id);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, trace_id);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedInvocation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn invocation_span_noop_without_tracing() {
		let _span = InvocationSpan::new("chat", "trace-1");
		// Compile-time smoke test ensures the span exists even when tracing is disabled.
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = InvocationSpan::new("chat", "trace-1");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
