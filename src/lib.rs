//! Protocol-bridging server that exposes a fixed set of tool operations to
//! MCP-style clients and fulfills each call against a remote upstream REST
//! service — centralizing auth, retry/backoff, rate limiting, validation, and
//! tracing in one request execution pipeline.

#![deny(clippy::all, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod obs;
pub mod orchestrator;
pub mod retry;
pub mod schema;
pub mod tools;

#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ApiKeyAuthProvider, AuthProvider, OAuthAuthProvider},
		config::{AuthMode, Config, Environment, OAuthSettings, RetryTuning},
		http::ReqwestTransport,
		orchestrator::Orchestrator,
		retry::RateLimiter,
	};

	/// Builds a [`Config`] suitable for tests: development environment, API-key auth, a
	/// short timeout, and permissive retry/rate-limit tuning.
	pub fn test_config(base_url: &str) -> Config {
		Config::builder(Environment::Development, Url::parse(base_url).expect("valid base url"))
			.auth_mode(AuthMode::ApiKey)
			.api_key("test-api-key")
			.build()
			.expect("test config should build")
	}

	/// Builds a [`Config`] wired for the OAuth client-credentials flow against a mock
	/// token endpoint.
	pub fn test_oauth_config(base_url: &str, token_url: &str) -> Config {
		Config::builder(Environment::Development, Url::parse(base_url).expect("valid base url"))
			.auth_mode(AuthMode::OAuth)
			.oauth(OAuthSettings {
				client_id: "client-id".into(),
				client_secret: "client-secret".into(),
				token_url: Url::parse(token_url).expect("valid token url"),
				scope: None,
			})
			.retry_tuning(RetryTuning { max_attempts: 3, ..RetryTuning::default() })
			.build()
			.expect("test oauth config should build")
	}

	/// Builds an [`Orchestrator`] backed by a reqwest transport that accepts the
	/// self-signed certificates produced by `httpmock`.
	pub fn test_orchestrator(config: Config) -> Orchestrator {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("failed to build insecure reqwest client for tests");
		let transport = Arc::new(ReqwestTransport::with_client(client));
		let auth: Arc<dyn AuthProvider> = match config.auth_mode {
			AuthMode::ApiKey => Arc::new(ApiKeyAuthProvider::new(
				config.api_key.clone().expect("api key configured"),
			)),
			AuthMode::OAuth => Arc::new(OAuthAuthProvider::new(
				config.oauth.clone().expect("oauth configured"),
				transport.clone(),
			)),
			AuthMode::None => panic!("test orchestrator requires an auth mode"),
		};
		let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

		Orchestrator::new(config, transport, auth, limiter)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as Json;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
