//! Binary entry point: the only place that reads environment variables, wires
//! up tracing, and owns process exit codes. The library itself never calls
//! `std::process::exit`.

// std
use std::{panic, process, sync::Arc};
// crates.io
use mcp_bridge::{
	auth::{ApiKeyAuthProvider, AuthProvider, NoAuthProvider, OAuthAuthProvider},
	config::{AuthMode, Config},
	http::ReqwestTransport,
	orchestrator::Orchestrator,
	retry::RateLimiter,
	tools::ToolHandler,
};
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	sync::Notify,
};

/// Environment variable prefix the bridge reads its configuration under.
const ENV_PREFIX: &str = "MCP_BRIDGE";

/// Drain window given to in-flight invocations once a shutdown signal arrives.
const SHUTDOWN_DRAIN: std::time::Duration = std::time::Duration::from_secs(30);

fn main() {
	let result = panic::catch_unwind(run);

	match result {
		Ok(code) => process::exit(code),
		Err(_) => process::exit(1),
	}
}

fn run() -> i32 {
	#[cfg(feature = "tracing-subscriber")]
	{
		use tracing_subscriber::EnvFilter;

		tracing_subscriber::fmt()
			.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
			.init();
	}

	let config = match Config::from_env(ENV_PREFIX) {
		Ok(config) => config,
		Err(err) => {
			eprintln!("configuration error: {err}");

			return 2;
		},
	};

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(err) => {
			eprintln!("failed to start async runtime: {err}");

			return 3;
		},
	};

	runtime.block_on(serve(config))
}

async fn serve(config: Config) -> i32 {
	#[cfg(feature = "tracing")]
	tracing::info!(config = ?config.redacted(), "starting bridge");

	let transport = match ReqwestTransport::from_config(&config) {
		Ok(transport) => Arc::new(transport),
		Err(err) => {
			eprintln!("failed to build transport: {err}");

			return 3;
		},
	};
	let auth: Arc<dyn AuthProvider> = match config.auth_mode {
		AuthMode::ApiKey => Arc::new(ApiKeyAuthProvider::new(
			config.api_key.clone().expect("build() guarantees api_key is set for AuthMode::ApiKey"),
		)),
		AuthMode::OAuth => Arc::new(OAuthAuthProvider::new(
			config.oauth.clone().expect("build() guarantees oauth is set for AuthMode::OAuth"),
			transport.clone(),
		)),
		AuthMode::None => Arc::new(NoAuthProvider),
	};
	let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
	let handler = Arc::new(ToolHandler::new(Orchestrator::new(config, transport, auth, limiter)));
	let shutdown = Arc::new(Notify::new());

	{
		let shutdown = shutdown.clone();

		tokio::spawn(async move {
			let _ = tokio::signal::ctrl_c().await;

			shutdown.notify_waiters();
		});
	}

	serve_stdio(handler, shutdown).await;

	0
}

/// Minimal line-delimited JSON-RPC-style loop: each stdin line is a
/// `{"id", "tool", "arguments", "trace_id"?}` request, each stdout line the
/// matching `{"id", "envelope"}` response, written as soon as that
/// invocation finishes — concurrently with other in-flight invocations and
/// with reading further stdin lines.
async fn serve_stdio(handler: Arc<ToolHandler>, shutdown: Arc<Notify>) {
	let stdin = tokio::io::stdin();
	let mut lines = BufReader::new(stdin).lines();
	let mut stdout = tokio::io::stdout();
	let mut in_flight = tokio::task::JoinSet::new();

	loop {
		tokio::select! {
			biased;

			_ = shutdown.notified() => break,
			line = lines.next_line() => match line {
				Ok(Some(line)) if !line.trim().is_empty() => {
					let handler = handler.clone();

					in_flight.spawn(async move { dispatch(&handler, &line).await });
				},
				Ok(Some(_)) => {},
				Ok(None) | Err(_) => break,
			},
			Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
				if let Ok(Some(response)) = result {
					let _ = stdout.write_all(response.as_bytes()).await;
					let _ = stdout.write_all(b"\n").await;
				}
			},
		}
	}

	// Whatever was still in flight when the loop above broke (shutdown or
	// stdin EOF/error) gets a bounded window to finish and write its response.
	let drain = async {
		while let Some(result) = in_flight.join_next().await {
			if let Ok(Some(response)) = result {
				let _ = stdout.write_all(response.as_bytes()).await;
				let _ = stdout.write_all(b"\n").await;
			}
		}
	};

	let _ = tokio::time::timeout(SHUTDOWN_DRAIN, drain).await;
	let _ = stdout.flush().await;
}

async fn dispatch(handler: &ToolHandler, line: &str) -> Option<String> {
	let request: serde_json::Value = serde_json::from_str(line).ok()?;
	let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
	let tool = request.get("tool").and_then(serde_json::Value::as_str)?.to_owned();
	let arguments = request.get("arguments").cloned().unwrap_or(serde_json::Value::Null);
	let trace_id = request.get("trace_id").and_then(serde_json::Value::as_str).map(String::from);
	let envelope = handler.call(&tool, arguments, trace_id).await;

	serde_json::to_string(&serde_json::json!({ "id": id, "envelope": envelope })).ok()
}
