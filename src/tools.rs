//! Tool handler: the thin layer a server transport calls into. Forwards
//! every real operation to the [`Orchestrator`] and answers the synthetic
//! `server_health` tool locally, without ever reaching upstream.

// self
use crate::{_prelude::*, config::AuthMode, orchestrator::Orchestrator};

/// Name of the synthetic liveness tool, handled entirely in-process.
pub const SERVER_HEALTH: &str = "server_health";

/// Owns the [`Orchestrator`] plus the process start time needed for
/// `server_health`'s `uptime_s` field.
pub struct ToolHandler {
	orchestrator: Orchestrator,
	started_at: OffsetDateTime,
}
impl ToolHandler {
	/// Wraps an orchestrator, recording the current time as process start.
	pub fn new(orchestrator: Orchestrator) -> Self {
		Self { orchestrator, started_at: OffsetDateTime::now_utc() }
	}

	/// The wrapped orchestrator.
	pub fn orchestrator(&self) -> &Orchestrator {
		&self.orchestrator
	}

	/// Dispatches a tool call by name, returning the JSON a transport writes
	/// back verbatim. Real operations serialize their
	/// [`ResponseEnvelope`](crate::envelope::ResponseEnvelope); `server_health`
	/// returns its own flat shape (it is not an invocation result, so it is
	/// never wrapped in one).
	pub async fn call(&self, tool_name: &str, arguments: Json, trace_id: Option<String>) -> Json {
		if tool_name == SERVER_HEALTH {
			return self.server_health();
		}

		let envelope = self.orchestrator.execute(tool_name, arguments, trace_id).await;

		serde_json::to_value(envelope).expect("ResponseEnvelope always serializes")
	}

	fn server_health(&self) -> Json {
		let config = self.orchestrator.config();
		let uptime_s = (OffsetDateTime::now_utc() - self.started_at).whole_seconds().max(0);

		serde_json::json!({
			"ok": true,
			"status": "healthy",
			"auth_mode": auth_mode_str(config.auth_mode),
			"env": config.environment.to_string(),
			"uptime_s": uptime_s,
		})
	}
}

fn auth_mode_str(mode: AuthMode) -> &'static str {
	match mode {
		AuthMode::ApiKey => "api_key",
		AuthMode::OAuth => "oauth",
		AuthMode::None => "none",
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::NoAuthProvider, http::ReqwestTransport, retry::RateLimiter};

	fn handler() -> ToolHandler {
		let config = crate::config::Config::builder(
			crate::config::Environment::Development,
			Url::parse("https://upstream.example").expect("fixture url should parse"),
		)
		.build()
		.expect("fixture config should build");
		let transport = Arc::new(
			ReqwestTransport::from_config(&config).expect("fixture transport should build"),
		);
		let auth = Arc::new(NoAuthProvider);
		let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

		ToolHandler::new(Orchestrator::new(config, transport, auth, limiter))
	}

	#[tokio::test]
	async fn server_health_returns_flat_shape_never_touching_upstream() {
		let body = handler().call(SERVER_HEALTH, Json::Null, None).await;

		assert_eq!(body["ok"], true);
		assert_eq!(body["status"], "healthy");
		assert_eq!(body["auth_mode"], "none");
		assert!(body.get("kind").is_none());
		assert!(body.get("operation").is_none());
		assert!(body.get("trace_id").is_none());
		assert!(body.get("data").is_none());
	}
}
