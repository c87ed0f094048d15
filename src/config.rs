//! Immutable bridge configuration: base URL, auth mode, credentials, timeouts,
//! proxy, TLS verification, and retry/rate-limit tuning.

// self
use crate::_prelude::*;

/// Deployment environment tag. Staging/production enforce the auth-mode invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	#[default]
	/// Local development.
	Development,
	/// Automated test environment.
	Test,
	/// Pre-production staging.
	Staging,
	/// Live production traffic.
	Production,
}
impl Environment {
	/// Returns true for environments that require a fully configured auth mode.
	pub fn is_production_like(self) -> bool {
		matches!(self, Environment::Staging | Environment::Production)
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let s = match self {
			Environment::Development => "development",
			Environment::Test => "test",
			Environment::Staging => "staging",
			Environment::Production => "production",
		};

		f.write_str(s)
	}
}

/// Selector among the three supported authentication modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
	/// Static `Bearer <api_key>` header.
	ApiKey,
	/// OAuth2 client-credentials token lifecycle.
	OAuth,
	#[default]
	/// No authentication (development only).
	None,
}
impl Display for AuthMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let s = match self {
			AuthMode::ApiKey => "api_key",
			AuthMode::OAuth => "oauth",
			AuthMode::None => "none",
		};

		f.write_str(s)
	}
}

/// OAuth2 client-credentials settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
	/// OAuth2 client identifier.
	pub client_id: String,
	/// OAuth2 client secret.
	pub client_secret: String,
	/// Token endpoint URL.
	pub token_url: Url,
	/// Optional requested scope string.
	pub scope: Option<String>,
}
impl Debug for OAuthSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthSettings")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("token_url", &self.token_url.as_str())
			.field("scope", &self.scope)
			.finish()
	}
}

/// Retry/backoff tuning. See [`crate::retry`] for how these values are applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryTuning {
	/// Total attempt budget per invocation (>= 1).
	pub max_attempts: u32,
	/// Base delay for exponential backoff.
	pub base_delay: Duration,
	/// Maximum delay, also used to clamp server-directed `Retry-After` hints.
	pub max_delay: Duration,
	/// Uniform jitter fraction in `[0, 1]` applied to computed delays.
	pub jitter: f64,
}
impl Default for RetryTuning {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::milliseconds(200),
			max_delay: Duration::seconds(30),
			jitter: 0.2,
		}
	}
}

/// Client-side token-bucket tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimitTuning {
	/// Bucket capacity, refilled linearly over `window`.
	pub max_requests_per_window: u32,
	/// Refill window.
	pub window: Duration,
}
impl Default for RateLimitTuning {
	fn default() -> Self {
		Self { max_requests_per_window: 60, window: Duration::seconds(60) }
	}
}

/// Errors raised while building or validating a [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// `base_url` did not parse as an absolute URL.
	#[error("base_url is invalid: {message}.")]
	InvalidBaseUrl {
		/// Parser failure message.
		message: String,
	},
	/// `base_url` used a scheme other than http/https.
	#[error("base_url must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Staging/production requires exactly one of {api_key, oauth}.
	#[error(
		"staging/production environments require exactly one of api_key or oauth to be configured."
	)]
	AmbiguousAuth,
	/// `auth_mode` is `api_key` but no key was supplied.
	#[error("auth_mode is api_key but no api_key was provided.")]
	MissingApiKey,
	/// `auth_mode` is `oauth` but the OAuth triple was not fully supplied.
	#[error("auth_mode is oauth but oauth settings were not provided.")]
	MissingOAuthSettings,
	/// A numeric tunable failed its non-negative/positive constraint.
	#[error("{field} must be {constraint}, got {value}.")]
	InvalidTunable {
		/// Field name.
		field: &'static str,
		/// Human-readable constraint description.
		constraint: &'static str,
		/// Observed value formatted for display.
		value: String,
	},
	/// A proxy URL failed to parse.
	#[error("{which} proxy URL is invalid: {message}.")]
	InvalidProxyUrl {
		/// Which proxy (http/https).
		which: &'static str,
		/// Parser failure message.
		message: String,
	},
}

/// Immutable, validated bridge configuration.
///
/// Constructed once at process start via [`Config::builder`] (or
/// [`Config::from_env`] when the `reqwest` feature brings in a process environment
/// reader) and shared by value thereafter — consumers receive a cloned `Config`,
/// never a singleton, so tests can build arbitrary configurations cheaply.
#[derive(Clone)]
pub struct Config {
	/// Deployment environment tag.
	pub environment: Environment,
	/// Upstream base URL, e.g. `https://api.upstream.example`.
	pub base_url: Url,
	/// Selected authentication mode.
	pub auth_mode: AuthMode,
	/// API key, present when `auth_mode == ApiKey`.
	pub api_key: Option<String>,
	/// OAuth settings, present when `auth_mode == OAuth`.
	pub oauth: Option<OAuthSettings>,
	/// Per-request timeout (> 0).
	pub request_timeout: Duration,
	/// Whether to verify TLS certificates.
	pub verify_tls: bool,
	/// Optional HTTP proxy URL.
	pub http_proxy: Option<Url>,
	/// Optional HTTPS proxy URL.
	pub https_proxy: Option<Url>,
	/// Retry/backoff tuning.
	pub retry: RetryTuning,
	/// Client-side rate-limit tuning.
	pub rate_limit: RateLimitTuning,
}
impl Config {
	/// Starts a builder for the given environment and base URL.
	pub fn builder(environment: Environment, base_url: Url) -> ConfigBuilder {
		ConfigBuilder::new(environment, base_url)
	}

	/// Returns true for environments that require a fully configured auth mode.
	pub fn is_production_like(&self) -> bool {
		self.environment.is_production_like()
	}

	/// Connect timeout, capped at 5 seconds.
	pub fn connect_timeout(&self) -> Duration {
		let cap = Duration::seconds(5);

		if self.request_timeout < cap { self.request_timeout } else { cap }
	}

	/// Builds a redacted view suitable for logging (secrets replaced with a fixed
	/// placeholder, matching the access-token/secret redaction convention used
	/// throughout the crate).
	pub fn redacted(&self) -> RedactedConfig<'_> {
		RedactedConfig(self)
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("environment", &self.environment)
			.field("base_url", &self.base_url.as_str())
			.field("auth_mode", &self.auth_mode)
			.field("api_key_set", &self.api_key.is_some())
			.field("oauth", &self.oauth)
			.field("request_timeout", &self.request_timeout)
			.field("verify_tls", &self.verify_tls)
			.field("retry", &self.retry)
			.field("rate_limit", &self.rate_limit)
			.finish()
	}
}

/// `Debug`/`Display` wrapper over [`Config`] that never prints secret material.
pub struct RedactedConfig<'a>(&'a Config);
impl Debug for RedactedConfig<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("environment", &self.0.environment)
			.field("base_url", &self.0.base_url.as_str())
			.field("auth_mode", &self.0.auth_mode)
			.field("api_key", &self.0.api_key.as_ref().map(|_| "<redacted>"))
			.field("oauth", &self.0.oauth.as_ref().map(|_| "<redacted>"))
			.field("request_timeout", &self.0.request_timeout)
			.field("verify_tls", &self.0.verify_tls)
			.field("retry", &self.0.retry)
			.field("rate_limit", &self.0.rate_limit)
			.finish()
	}
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
	environment: Environment,
	base_url: Url,
	auth_mode: AuthMode,
	api_key: Option<String>,
	oauth: Option<OAuthSettings>,
	request_timeout: Duration,
	verify_tls: bool,
	http_proxy: Option<Url>,
	https_proxy: Option<Url>,
	retry: RetryTuning,
	rate_limit: RateLimitTuning,
}
impl ConfigBuilder {
	fn new(environment: Environment, base_url: Url) -> Self {
		Self {
			environment,
			base_url,
			auth_mode: AuthMode::default(),
			api_key: None,
			oauth: None,
			request_timeout: Duration::seconds(30),
			verify_tls: true,
			http_proxy: None,
			https_proxy: None,
			retry: RetryTuning::default(),
			rate_limit: RateLimitTuning::default(),
		}
	}

	/// Sets the authentication mode.
	pub fn auth_mode(mut self, mode: AuthMode) -> Self {
		self.auth_mode = mode;

		self
	}

	/// Sets the API key.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());

		self
	}

	/// Sets the OAuth settings.
	pub fn oauth(mut self, settings: OAuthSettings) -> Self {
		self.oauth = Some(settings);

		self
	}

	/// Overrides the request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides TLS verification (development-only escape hatch).
	pub fn verify_tls(mut self, verify: bool) -> Self {
		self.verify_tls = verify;

		self
	}

	/// Sets the HTTP proxy URL.
	pub fn http_proxy(mut self, url: Url) -> Self {
		self.http_proxy = Some(url);

		self
	}

	/// Sets the HTTPS proxy URL.
	pub fn https_proxy(mut self, url: Url) -> Self {
		self.https_proxy = Some(url);

		self
	}

	/// Overrides retry/backoff tuning.
	pub fn retry_tuning(mut self, tuning: RetryTuning) -> Self {
		self.retry = tuning;

		self
	}

	/// Overrides client-side rate-limit tuning.
	pub fn rate_limit_tuning(mut self, tuning: RateLimitTuning) -> Self {
		self.rate_limit = tuning;

		self
	}

	/// Consumes the builder and validates the resulting [`Config`].
	pub fn build(self) -> Result<Config, ConfigError> {
		if self.base_url.scheme() != "http" && self.base_url.scheme() != "https" {
			return Err(ConfigError::UnsupportedScheme { scheme: self.base_url.scheme().into() });
		}

		let has_api_key = self.api_key.is_some();
		let has_oauth = self.oauth.is_some();

		if self.environment.is_production_like() {
			match self.auth_mode {
				AuthMode::None => return Err(ConfigError::AmbiguousAuth),
				AuthMode::ApiKey if !has_api_key => return Err(ConfigError::AmbiguousAuth),
				AuthMode::OAuth if !has_oauth => return Err(ConfigError::AmbiguousAuth),
				_ if has_api_key && has_oauth => return Err(ConfigError::AmbiguousAuth),
				_ => {},
			}
		}

		match self.auth_mode {
			AuthMode::ApiKey if !has_api_key => return Err(ConfigError::MissingApiKey),
			AuthMode::OAuth if !has_oauth => return Err(ConfigError::MissingOAuthSettings),
			_ => {},
		}

		if self.request_timeout <= Duration::ZERO {
			return Err(ConfigError::InvalidTunable {
				field: "request_timeout",
				constraint: "positive",
				value: format!("{}", self.request_timeout),
			});
		}
		if self.retry.max_attempts < 1 {
			return Err(ConfigError::InvalidTunable {
				field: "retry.max_attempts",
				constraint: ">= 1",
				value: self.retry.max_attempts.to_string(),
			});
		}
		if self.retry.base_delay < Duration::ZERO || self.retry.max_delay < Duration::ZERO {
			return Err(ConfigError::InvalidTunable {
				field: "retry.base_delay/max_delay",
				constraint: "non-negative",
				value: format!("{}/{}", self.retry.base_delay, self.retry.max_delay),
			});
		}
		if !(0.0..=1.0).contains(&self.retry.jitter) {
			return Err(ConfigError::InvalidTunable {
				field: "retry.jitter",
				constraint: "within [0, 1]",
				value: self.retry.jitter.to_string(),
			});
		}
		if self.rate_limit.max_requests_per_window == 0 || self.rate_limit.window <= Duration::ZERO
		{
			return Err(ConfigError::InvalidTunable {
				field: "rate_limit",
				constraint: "positive capacity and window",
				value: format!(
					"{}/{}",
					self.rate_limit.max_requests_per_window, self.rate_limit.window
				),
			});
		}

		Ok(Config {
			environment: self.environment,
			base_url: self.base_url,
			auth_mode: self.auth_mode,
			api_key: self.api_key,
			oauth: self.oauth,
			request_timeout: self.request_timeout,
			verify_tls: self.verify_tls,
			http_proxy: self.http_proxy,
			https_proxy: self.https_proxy,
			retry: self.retry,
			rate_limit: self.rate_limit,
		})
	}
}

#[cfg(feature = "reqwest")]
impl Config {
	/// Loads configuration from environment variables prefixed with `prefix` (e.g.
	/// `prefix = "BRIDGE"` reads `BRIDGE_ENV`, `BRIDGE_API_BASE_URL`, ...). Missing
	/// required variables in staging/production should be treated by the caller as
	/// exit code 2 per the process contract.
	pub fn from_env(prefix: &str) -> Result<Config, ConfigError> {
		let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();
		let environment = match var("ENV").as_deref() {
			Some("production") => Environment::Production,
			Some("staging") => Environment::Staging,
			Some("test") => Environment::Test,
			_ => Environment::Development,
		};
		let base_url = var("API_BASE_URL")
			.ok_or_else(|| ConfigError::InvalidBaseUrl { message: "missing base url".into() })?;
		let base_url = Url::parse(&base_url)
			.map_err(|e| ConfigError::InvalidBaseUrl { message: e.to_string() })?;
		let api_key = var("API_KEY");
		let oauth = match (var("CLIENT_ID"), var("CLIENT_SECRET"), var("TOKEN_URL")) {
			(Some(client_id), Some(client_secret), Some(token_url)) => Some(OAuthSettings {
				client_id,
				client_secret,
				token_url: Url::parse(&token_url)
					.map_err(|e| ConfigError::InvalidBaseUrl { message: e.to_string() })?,
				scope: var("SCOPE"),
			}),
			_ => None,
		};
		let auth_mode = if oauth.is_some() {
			AuthMode::OAuth
		} else if api_key.is_some() {
			AuthMode::ApiKey
		} else {
			AuthMode::None
		};
		let mut builder = Config::builder(environment, base_url).auth_mode(auth_mode);

		if let Some(key) = api_key {
			builder = builder.api_key(key);
		}
		if let Some(oauth) = oauth {
			builder = builder.oauth(oauth);
		}
		if let Some(timeout) = var("TIMEOUT").and_then(|v| v.parse::<i64>().ok()) {
			builder = builder.request_timeout(Duration::seconds(timeout));
		}
		if let Some(verify) = var("VERIFY_SSL").and_then(|v| v.parse::<bool>().ok()) {
			builder = builder.verify_tls(verify);
		}
		if let Some(proxy) = var("HTTP_PROXY") {
			builder = builder.http_proxy(
				Url::parse(&proxy)
					.map_err(|e| ConfigError::InvalidProxyUrl { which: "http", message: e.to_string() })?,
			);
		}
		if let Some(proxy) = var("HTTPS_PROXY") {
			builder = builder.https_proxy(
				Url::parse(&proxy).map_err(|e| ConfigError::InvalidProxyUrl {
					which: "https",
					message: e.to_string(),
				})?,
			);
		}

		builder.build()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base_url() -> Url {
		Url::parse("https://upstream.example").expect("fixture base url should parse")
	}

	#[test]
	fn development_allows_no_auth() {
		let config = Config::builder(Environment::Development, base_url())
			.build()
			.expect("development config without auth should build");

		assert_eq!(config.auth_mode, AuthMode::None);
	}

	#[test]
	fn production_requires_exactly_one_auth_mode() {
		let err = Config::builder(Environment::Production, base_url())
			.build()
			.expect_err("production config without auth should fail");

		assert_eq!(err, ConfigError::AmbiguousAuth);

		let config = Config::builder(Environment::Production, base_url())
			.auth_mode(AuthMode::ApiKey)
			.api_key("secret")
			.build()
			.expect("production config with api key should build");

		assert_eq!(config.auth_mode, AuthMode::ApiKey);
	}

	#[test]
	fn rejects_non_http_scheme() {
		let url = Url::parse("ftp://upstream.example").expect("fixture ftp url should parse");
		let err = Config::builder(Environment::Development, url)
			.build()
			.expect_err("ftp scheme should be rejected");

		assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
	}

	#[test]
	fn rejects_zero_max_attempts() {
		let err = Config::builder(Environment::Development, base_url())
			.retry_tuning(RetryTuning { max_attempts: 0, ..RetryTuning::default() })
			.build()
			.expect_err("zero max_attempts should be rejected");

		assert!(matches!(err, ConfigError::InvalidTunable { field: "retry.max_attempts", .. }));
	}

	#[test]
	fn connect_timeout_is_capped_at_five_seconds() {
		let config = Config::builder(Environment::Development, base_url())
			.request_timeout(Duration::seconds(60))
			.build()
			.expect("config should build");

		assert_eq!(config.connect_timeout(), Duration::seconds(5));

		let config = Config::builder(Environment::Development, base_url())
			.request_timeout(Duration::seconds(2))
			.build()
			.expect("config should build");

		assert_eq!(config.connect_timeout(), Duration::seconds(2));
	}

	#[test]
	fn redacted_view_hides_secrets() {
		let config = Config::builder(Environment::Production, base_url())
			.auth_mode(AuthMode::ApiKey)
			.api_key("super-secret-key")
			.build()
			.expect("config should build");
		let rendered = format!("{:?}", config.redacted());

		assert!(!rendered.contains("super-secret-key"));
		assert!(rendered.contains("<redacted>"));
	}
}
