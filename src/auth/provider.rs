//! Authentication provider: produces an `Authorization` header, and for
//! OAuth, fetches/refreshes access tokens with single-flight refresh
//! discipline.

// self
use crate::{
	_prelude::*,
	auth::token::AccessToken,
	config::OAuthSettings,
	error::AuthError,
	http::{Classification, Method, OutboundRequest, RequestBody, ResponseBody, Transport, classify_status},
};

/// Timeout applied to the OAuth token-endpoint request. Not configurable via
/// [`crate::config::Config`] — the token endpoint is expected to be fast.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

/// Shape of a client-credentials token response, deserialized with
/// `serde_path_to_error` so a malformed body surfaces which field was bad.
#[derive(serde::Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default = "default_expires_in")]
	expires_in: u64,
}

fn default_expires_in() -> u64 {
	3600
}

/// Contract implemented by every authentication mode.
pub trait AuthProvider: Send + Sync {
	/// Returns a usable `Authorization` header, refreshing first if necessary.
	fn header_for<'a>(
		&'a self,
		now: OffsetDateTime,
	) -> Pin<Box<dyn Future<Output = Result<(&'static str, String)>> + Send + 'a>>;

	/// Marks any cached token unusable, forcing the next [`Self::header_for`]
	/// call to refresh.
	fn invalidate<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Stateless `auth_mode = api_key` provider: header value is always
/// `Bearer <api_key>`.
pub struct ApiKeyAuthProvider {
	key: crate::auth::secret::SecretString,
}
impl ApiKeyAuthProvider {
	/// Wraps an API key.
	pub fn new(key: impl Into<String>) -> Self {
		Self { key: crate::auth::secret::SecretString::new(key) }
	}
}
impl AuthProvider for ApiKeyAuthProvider {
	fn header_for<'a>(
		&'a self,
		_now: OffsetDateTime,
	) -> Pin<Box<dyn Future<Output = Result<(&'static str, String)>> + Send + 'a>> {
		Box::pin(async move { Ok(("Authorization", format!("Bearer {}", self.key.expose()))) })
	}

	fn invalidate<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
		Box::pin(async move {})
	}
}

/// `auth_mode = none` provider: always fails with `auth_unconfigured`.
pub struct NoAuthProvider;
impl AuthProvider for NoAuthProvider {
	fn header_for<'a>(
		&'a self,
		_now: OffsetDateTime,
	) -> Pin<Box<dyn Future<Output = Result<(&'static str, String)>> + Send + 'a>> {
		Box::pin(async move { Err(AuthError::Unconfigured.into()) })
	}

	fn invalidate<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
		Box::pin(async move {})
	}
}

/// `auth_mode = oauth` provider: maintains at most one [`AccessToken`],
/// refreshed under a single `AsyncMutex` so concurrent callers during an
/// expired token collapse into one refresh request.
pub struct OAuthAuthProvider {
	settings: OAuthSettings,
	transport: Arc<dyn Transport>,
	cache: AsyncMutex<Option<AccessToken>>,
}
impl OAuthAuthProvider {
	/// Builds a provider for the given settings and transport.
	pub fn new(settings: OAuthSettings, transport: Arc<dyn Transport>) -> Self {
		Self { settings, transport, cache: AsyncMutex::new(None) }
	}

	async fn refresh(&self) -> Result<AccessToken> {
		let mut form = vec![("grant_type".to_owned(), "client_credentials".to_owned())];

		if let Some(scope) = &self.settings.scope {
			form.push(("scope".to_owned(), scope.clone()));
		}

		let request = OutboundRequest::new(Method::Post, self.settings.token_url.clone(), TOKEN_REQUEST_TIMEOUT)
			.with_body(RequestBody::FormUrlEncoded(form))
			.with_basic_auth(self.settings.client_id.clone(), self.settings.client_secret.clone());
		let response = self.transport.send(request).await.map_err(|e| AuthError::RefreshFailed {
			message: e.to_string(),
			status: None,
		})?;

		if classify_status(response.status) != Classification::Success {
			return Err(AuthError::RefreshFailed {
				message: format!("token endpoint responded with status {}", response.status),
				status: Some(response.status),
			}
			.into());
		}

		let body = match response.body {
			ResponseBody::Json(value) => value,
			ResponseBody::Bytes { .. } => {
				return Err(AuthError::RefreshFailed {
					message: "token endpoint did not return a JSON body".into(),
					status: Some(response.status),
				}
				.into());
			},
		};
		let parsed: TokenResponse =
			serde_path_to_error::deserialize(body).map_err(|e| AuthError::RefreshFailed {
				message: format!("token endpoint response malformed at `{}`: {}", e.path(), e.inner()),
				status: Some(response.status),
			})?;

		Ok(AccessToken::new(
			parsed.access_token,
			OffsetDateTime::now_utc(),
			Duration::seconds(parsed.expires_in as i64),
		))
	}
}
impl AuthProvider for OAuthAuthProvider {
	fn header_for<'a>(
		&'a self,
		now: OffsetDateTime,
	) -> Pin<Box<dyn Future<Output = Result<(&'static str, String)>> + Send + 'a>> {
		Box::pin(async move {
			let mut guard = self.cache.lock().await;

			if let Some(token) = guard.as_ref() {
				if token.is_usable_at(now) {
					return Ok(("Authorization", format!("Bearer {}", token.token.expose())));
				}
			}

			let token = self.refresh().await?;
			let header = format!("Bearer {}", token.token.expose());

			*guard = Some(token);

			Ok(("Authorization", header))
		})
	}

	fn invalidate<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
		Box::pin(async move {
			*self.cache.lock().await = None;
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::error::TransportError;

	struct CountingTransport {
		calls: AtomicUsize,
	}
	impl Transport for CountingTransport {
		fn send(
			&self,
			_request: OutboundRequest,
		) -> Pin<Box<dyn Future<Output = Result<crate::http::RawResponse, TransportError>> + Send>> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				Ok(crate::http::RawResponse {
					status: 200,
					retry_after: None,
					body: ResponseBody::Json(serde_json::json!({"access_token": "tok", "expires_in": 3600})),
				})
			})
		}
	}

	fn settings() -> OAuthSettings {
		OAuthSettings {
			client_id: "id".into(),
			client_secret: "secret".into(),
			token_url: Url::parse("https://auth.example/token").expect("fixture url should parse"),
			scope: None,
		}
	}

	#[tokio::test]
	async fn api_key_provider_returns_static_header() {
		let provider = ApiKeyAuthProvider::new("my-key");
		let (name, value) = provider.header_for(OffsetDateTime::now_utc()).await.expect("header should resolve");

		assert_eq!(name, "Authorization");
		assert_eq!(value, "Bearer my-key");
	}

	#[tokio::test]
	async fn concurrent_header_for_calls_collapse_into_one_refresh() {
		let transport = Arc::new(CountingTransport { calls: AtomicUsize::new(0) });
		let provider = Arc::new(OAuthAuthProvider::new(settings(), transport.clone()));
		let now = OffsetDateTime::now_utc();
		let mut handles = Vec::new();

		for _ in 0..8 {
			let provider = provider.clone();

			handles.push(tokio::spawn(async move { provider.header_for(now).await }));
		}

		for handle in handles {
			handle.await.expect("task should not panic").expect("header should resolve");
		}

		assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn invalidate_forces_next_refresh() {
		let transport = Arc::new(CountingTransport { calls: AtomicUsize::new(0) });
		let provider = OAuthAuthProvider::new(settings(), transport.clone());
		let now = OffsetDateTime::now_utc();

		provider.header_for(now).await.expect("first header should resolve");
		provider.invalidate().await;
		provider.header_for(now).await.expect("second header should resolve");

		assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
	}
}
