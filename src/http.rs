//! HTTP transport: a single long-lived client with connection pooling,
//! timeouts, proxying, and TLS verification that turns an [`OutboundRequest`]
//! into a [`RawResponse`] and classifies the result for the retry policy.
//!
//! Response metadata capture is grounded on the broker-style instrumented
//! handle pattern: the transport records status and a parsed `Retry-After`
//! hint directly on the response it returns, so [`crate::retry`] never
//! re-parses headers.

#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// HTTP method used by an [`OutboundRequest`]. The catalog only ever needs
/// GET/POST, so no broader method set is modeled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}
impl Method {
	#[cfg(feature = "reqwest")]
	fn as_reqwest(self) -> reqwest::Method {
		match self {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
		}
	}
}

/// One part of a multipart request: file parts carry a filename inferred
/// from the field name, text parts are plain form fields.
#[derive(Clone, Debug)]
pub enum MultipartField {
	/// A plain text form field.
	Text {
		/// Field name.
		name: String,
		/// Field value.
		value: String,
	},
	/// A file part with raw bytes already decoded from base64 if needed.
	File {
		/// Field name.
		name: String,
		/// Filename reported to upstream, inferred from `name`.
		filename: String,
		/// Raw file bytes.
		bytes: Vec<u8>,
	},
}

/// Request body, already encoded according to the operation's `body_kind`.
#[derive(Clone, Debug)]
pub enum RequestBody {
	/// No body (GET requests).
	None,
	/// `application/json`.
	Json(Json),
	/// `application/x-www-form-urlencoded` (OAuth token requests).
	FormUrlEncoded(Vec<(String, String)>),
	/// `multipart/form-data`.
	Multipart(Vec<MultipartField>),
}

/// A fully-resolved outbound request: either a bridge call against the
/// upstream base URL or a token-endpoint call for the OAuth auth provider.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL to call.
	pub url: Url,
	/// Additional headers beyond `Authorization`/`Content-Type` (e.g.
	/// `X-Request-Id`).
	pub headers: Vec<(String, String)>,
	/// `Authorization` header value, when the caller already resolved one.
	pub authorization: Option<String>,
	/// HTTP Basic auth credentials (OAuth token endpoint).
	pub basic_auth: Option<(String, String)>,
	/// Request body.
	pub body: RequestBody,
	/// Overall request timeout.
	pub timeout: Duration,
}
impl OutboundRequest {
	/// Builds a bare request with no body, auth, or extra headers.
	pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
		Self {
			method,
			url,
			headers: Vec::new(),
			authorization: None,
			basic_auth: None,
			body: RequestBody::None,
			timeout,
		}
	}

	/// Sets the request body.
	pub fn with_body(mut self, body: RequestBody) -> Self {
		self.body = body;

		self
	}

	/// Sets the `Authorization` header value.
	pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
		self.authorization = Some(value.into());

		self
	}

	/// Sets HTTP Basic auth credentials.
	pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.basic_auth = Some((username.into(), password.into()));

		self
	}

	/// Appends an extra header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}
}

/// Response body, parsed as JSON when `Content-Type` says so, otherwise kept
/// as raw bytes alongside the content type.
#[derive(Clone, Debug)]
pub enum ResponseBody {
	/// Parsed JSON body.
	Json(Json),
	/// Raw bytes with their content type, for non-JSON responses.
	Bytes {
		/// `Content-Type` header value, when present.
		content_type: Option<String>,
		/// Raw response bytes.
		bytes: Vec<u8>,
	},
}
impl ResponseBody {
	/// Converts the body into the envelope `data` shape: JSON bodies pass
	/// through, binary bodies become `{ data: <base64>, content_type }`.
	pub fn into_envelope_data(self) -> Json {
		match self {
			ResponseBody::Json(value) => value,
			ResponseBody::Bytes { content_type, bytes } => {
				use base64::Engine;

				serde_json::json!({
					"data": base64::engine::general_purpose::STANDARD.encode(bytes),
					"content_type": content_type,
				})
			},
		}
	}
}

/// A response from the transport, with status and any `Retry-After` hint
/// already extracted for the retry policy.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Parsed `Retry-After` hint, relative duration from now.
	pub retry_after: Option<Duration>,
	/// Response body.
	pub body: ResponseBody,
}

/// How a [`RawResponse`] (or transport failure) should be treated by the
/// retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
	/// 2xx.
	Success,
	/// 401 — the auth provider should invalidate its cache and retry once.
	AuthStale,
	/// 429 — retry honoring `Retry-After` if present.
	RateLimited,
	/// 408/502/503/504 — retry with backoff.
	Transient,
	/// Other 4xx — not retryable.
	ClientError,
	/// Other 5xx — not retryable.
	ServerError,
}

/// Classifies an HTTP status for the retry policy.
pub fn classify_status(status: u16) -> Classification {
	match status {
		200..=299 => Classification::Success,
		401 => Classification::AuthStale,
		429 => Classification::RateLimited,
		408 | 502 | 503 | 504 => Classification::Transient,
		400..=499 => Classification::ClientError,
		_ => Classification::ServerError,
	}
}

/// Abstraction over the single outbound HTTP client the bridge holds. Kept
/// as a trait so tests can substitute a fake transport without a real socket.
pub trait Transport: Send + Sync {
	/// Sends `request` and returns a classified [`RawResponse`], or a
	/// [`TransportError`] for network/timeout failures that never produced a
	/// status code.
	fn send(
		&self,
		request: OutboundRequest,
	) -> Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send>>;
}

/// [`Transport`] implementation backed by a pooled [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport {
	client: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport from [`Config`](crate::config::Config)'s timeout,
	/// TLS, and proxy settings.
	pub fn from_config(config: &crate::config::Config) -> std::result::Result<Self, crate::config::ConfigError> {
		let mut builder = ReqwestClient::builder()
			.connect_timeout(std::time::Duration::from_millis(
				config.connect_timeout().whole_milliseconds().max(0) as u64,
			))
			.danger_accept_invalid_certs(!config.verify_tls);

		if let Some(proxy) = &config.http_proxy {
			builder = builder.proxy(
				reqwest::Proxy::http(proxy.as_str())
					.map_err(|e| crate::config::ConfigError::InvalidProxyUrl {
						which: "http",
						message: e.to_string(),
					})?,
			);
		}
		if let Some(proxy) = &config.https_proxy {
			builder = builder.proxy(
				reqwest::Proxy::https(proxy.as_str())
					.map_err(|e| crate::config::ConfigError::InvalidProxyUrl {
						which: "https",
						message: e.to_string(),
					})?,
			);
		}

		let client = builder.build()?;

		Ok(Self { client })
	}

	/// Wraps an existing [`ReqwestClient`] (used by tests that need
	/// `danger_accept_invalid_certs` for `httpmock`'s TLS fixtures).
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(
		&self,
		request: OutboundRequest,
	) -> Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send>> {
		let client = self.client.clone();

		Box::pin(async move {
			let mut builder = client
				.request(request.method.as_reqwest(), request.url.clone())
				.timeout(std::time::Duration::from_millis(
					request.timeout.whole_milliseconds().max(0) as u64,
				));

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(value) = &request.authorization {
				builder = builder.header(reqwest::header::AUTHORIZATION, value);
			}
			if let Some((user, pass)) = &request.basic_auth {
				builder = builder.basic_auth(user, Some(pass));
			}

			builder = match request.body {
				RequestBody::None => builder,
				RequestBody::Json(value) => builder.json(&value),
				RequestBody::FormUrlEncoded(pairs) => builder.form(&pairs),
				RequestBody::Multipart(fields) => {
					let mut form = reqwest::multipart::Form::new();

					for field in fields {
						form = match field {
							MultipartField::Text { name, value } => form.text(name, value),
							MultipartField::File { name, filename, bytes } => {
								let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);

								form.part(name, part)
							},
						};
					}

					builder.multipart(form)
				},
			};

			let response = builder
				.send()
				.await
				.map_err(|e| TransportError::from_cause("request failed", &e, 1))?;
			let status = response.status().as_u16();
			let headers = response.headers().clone();
			let retry_after = parse_retry_after(&headers);
			let content_type =
				headers.get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(String::from);
			let bytes = response
				.bytes()
				.await
				.map_err(|e| TransportError::from_cause("failed to read response body", &e, 1))?;
			let body = if content_type.as_deref().is_some_and(|ct| ct.starts_with("application/json")) {
				match serde_json::from_slice::<Json>(&bytes) {
					Ok(value) => ResponseBody::Json(value),
					Err(_) => ResponseBody::Bytes { content_type, bytes: bytes.to_vec() },
				}
			} else {
				ResponseBody::Bytes { content_type, bytes: bytes.to_vec() }
			};

			Ok(RawResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn classifies_known_statuses() {
		assert_eq!(classify_status(200), Classification::Success);
		assert_eq!(classify_status(202), Classification::Success);
		assert_eq!(classify_status(401), Classification::AuthStale);
		assert_eq!(classify_status(429), Classification::RateLimited);
		assert_eq!(classify_status(503), Classification::Transient);
		assert_eq!(classify_status(404), Classification::ClientError);
		assert_eq!(classify_status(500), Classification::ServerError);
	}

	#[test]
	fn binary_body_becomes_base64_envelope_data() {
		let body =
			ResponseBody::Bytes { content_type: Some("audio/mpeg".into()), bytes: vec![0xDE, 0xAD] };
		let data = body.into_envelope_data();

		assert_eq!(data["content_type"], "audio/mpeg");
		assert_eq!(data["data"], "3q0=");
	}
}
