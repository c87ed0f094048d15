//! Retry/rate-limit policy: retry eligibility, backoff computation, and
//! the client-side token-bucket rate limiter.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, config::RateLimitTuning, error::TransportError, http::Classification};

/// Whether a classified outcome is eligible for a retry, and if so, what kind
/// of delay it implies. `AuthStale` is handled specially by the orchestrator
/// (invalidate + retry without consuming a backoff delay), so it is not
/// itself a variant here — callers check `Classification::AuthStale` first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// Not retryable; surface the failure as-is.
	GiveUp,
	/// Retryable with the standard exponential backoff.
	BackoffThenRetry,
	/// Retryable, honoring a server-directed delay.
	RetryAfter,
}

/// Maps a transport [`Classification`] to a [`RetryDecision`].
/// `Classification::AuthStale` is excluded — the orchestrator handles it
/// before reaching retry eligibility, since it also invalidates the cached
/// token.
pub fn retry_decision(classification: Classification) -> RetryDecision {
	match classification {
		Classification::Success | Classification::ClientError | Classification::ServerError =>
			RetryDecision::GiveUp,
		Classification::RateLimited => RetryDecision::RetryAfter,
		Classification::Transient => RetryDecision::BackoffThenRetry,
		Classification::AuthStale => RetryDecision::GiveUp,
	}
}

/// Computes the exponential backoff + jitter delay for `attempt` (1-indexed):
/// `min(max_delay, base_delay * 2^(attempt-1))`, jittered by a uniform factor
/// in `[1 - jitter, 1 + jitter]`.
pub fn backoff_delay(tuning: &crate::config::RetryTuning, attempt: u32) -> Duration {
	let base_ms = tuning.base_delay.whole_milliseconds().max(0) as u64;
	let max_ms = tuning.max_delay.whole_milliseconds().max(0) as u64;
	let exponent = attempt.saturating_sub(1).min(63);
	let scaled = base_ms.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
	let capped_ms = scaled.min(max_ms);
	let factor = jitter_factor(tuning.jitter);

	Duration::milliseconds((capped_ms as f64 * factor).round() as i64)
}

/// Clamps a server-directed `Retry-After` duration to `max_delay`:
/// `Retry-After: 0` causes immediate retry; values above `max_delay` are
/// clamped.
pub fn clamp_retry_after(retry_after: Duration, tuning: &crate::config::RetryTuning) -> Duration {
	if retry_after.is_negative() {
		Duration::ZERO
	} else if retry_after > tuning.max_delay {
		tuning.max_delay
	} else {
		retry_after
	}
}

fn jitter_factor(jitter: f64) -> f64 {
	if jitter <= 0.0 {
		return 1.0;
	}

	rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter))
}

struct BucketState {
	tokens: f64,
	last_refill: OffsetDateTime,
}

/// Client-side token-bucket rate limiter, shared across invocations.
/// `capacity = max_requests_per_window`, refilled linearly over `window`.
pub struct RateLimiter {
	capacity: f64,
	refill_per_ms: f64,
	state: Mutex<BucketState>,
}
impl RateLimiter {
	/// Poll interval while waiting for a token to become available.
	const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(20);

	/// Builds a limiter starting with a full bucket.
	pub fn new(tuning: RateLimitTuning) -> Self {
		let capacity = f64::from(tuning.max_requests_per_window);
		let window_ms = (tuning.window.whole_milliseconds().max(1)) as f64;

		Self {
			capacity,
			refill_per_ms: capacity / window_ms,
			state: Mutex::new(BucketState { tokens: capacity, last_refill: OffsetDateTime::now_utc() }),
		}
	}

	fn try_acquire(&self) -> bool {
		let mut state = self.state.lock();
		let now = OffsetDateTime::now_utc();
		let elapsed_ms = (now - state.last_refill).whole_milliseconds().max(0) as f64;

		state.tokens = (state.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
		state.last_refill = now;

		if state.tokens >= 1.0 {
			state.tokens -= 1.0;

			true
		} else {
			false
		}
	}

	/// Acquires one token, waiting up to `timeout`. On timeout, returns a
	/// [`TransportError`] with reason `rate_limit_local`.
	pub async fn acquire(&self, timeout: Duration) -> std::result::Result<(), TransportError> {
		let deadline = OffsetDateTime::now_utc() + timeout;

		loop {
			if self.try_acquire() {
				return Ok(());
			}
			if OffsetDateTime::now_utc() >= deadline {
				return Err(TransportError {
					message: "client-side rate limit exceeded".into(),
					cause: "rate_limit_local".into(),
					attempts: 1,
				});
			}

			tokio::time::sleep(Self::POLL_INTERVAL).await;
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::config::RetryTuning;

	#[test]
	fn backoff_grows_exponentially_and_clamps() {
		let tuning = RetryTuning {
			max_attempts: 5,
			base_delay: Duration::milliseconds(100),
			max_delay: Duration::seconds(1),
			jitter: 0.0,
		};

		assert_eq!(backoff_delay(&tuning, 1), Duration::milliseconds(100));
		assert_eq!(backoff_delay(&tuning, 2), Duration::milliseconds(200));
		assert_eq!(backoff_delay(&tuning, 3), Duration::milliseconds(400));
		assert_eq!(backoff_delay(&tuning, 10), Duration::seconds(1));
	}

	#[test]
	fn retry_after_zero_is_immediate_and_large_values_clamp() {
		let tuning = RetryTuning { max_delay: Duration::seconds(5), ..RetryTuning::default() };

		assert_eq!(clamp_retry_after(Duration::ZERO, &tuning), Duration::ZERO);
		assert_eq!(clamp_retry_after(Duration::seconds(30), &tuning), Duration::seconds(5));
		assert_eq!(clamp_retry_after(Duration::seconds(2), &tuning), Duration::seconds(2));
	}

	#[test]
	fn classification_maps_to_expected_decisions() {
		assert_eq!(retry_decision(Classification::Success), RetryDecision::GiveUp);
		assert_eq!(retry_decision(Classification::ClientError), RetryDecision::GiveUp);
		assert_eq!(retry_decision(Classification::ServerError), RetryDecision::GiveUp);
		assert_eq!(retry_decision(Classification::Transient), RetryDecision::BackoffThenRetry);
		assert_eq!(retry_decision(Classification::RateLimited), RetryDecision::RetryAfter);
	}

	#[tokio::test]
	async fn rate_limiter_exhausts_then_refills() {
		let limiter =
			RateLimiter::new(RateLimitTuning { max_requests_per_window: 1, window: Duration::milliseconds(50) });

		limiter.acquire(Duration::milliseconds(10)).await.expect("first token should be free");
		limiter.acquire(Duration::milliseconds(200)).await.expect("second token should arrive after refill");
	}

	#[tokio::test]
	async fn rate_limiter_times_out_as_transport_error() {
		let limiter =
			RateLimiter::new(RateLimitTuning { max_requests_per_window: 1, window: Duration::seconds(60) });

		limiter.acquire(Duration::milliseconds(10)).await.expect("first token should be free");

		let err = limiter
			.acquire(Duration::milliseconds(30))
			.await
			.expect_err("second token should time out");

		assert_eq!(err.cause, "rate_limit_local");
	}
}
