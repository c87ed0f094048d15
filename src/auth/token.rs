//! OAuth access token model.

// self
use crate::{_prelude::*, auth::secret::SecretString};

/// Window before expiry within which a token is considered stale and must be
/// refreshed rather than reused.
pub const REFRESH_MARGIN: Duration = Duration::seconds(300);

/// Cached OAuth access token. Owned exclusively by [`crate::auth::provider::OAuthAuthProvider`]
/// under a single-writer discipline.
#[derive(Clone)]
pub struct AccessToken {
	/// Bearer token value; never logged.
	pub token: SecretString,
	/// Absolute UTC expiry instant.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Builds a token expiring `expires_in` from `issued_at`.
	pub fn new(token: impl Into<String>, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
		Self { token: SecretString::new(token), expires_at: issued_at + expires_in }
	}

	/// A token is usable when `now + REFRESH_MARGIN < expires_at`.
	pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
		now + REFRESH_MARGIN < self.expires_at
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn usable_just_outside_refresh_margin() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::new("abc", issued, Duration::seconds(600));

		assert!(token.is_usable_at(issued));
		assert!(!token.is_usable_at(issued + Duration::seconds(301)));
		assert!(token.is_usable_at(issued + Duration::seconds(299)));
	}
}
