// crates.io
use httpmock::prelude::*;
// self
use mcp_bridge::{_preludet::*, envelope::ResponseEnvelope};

#[tokio::test]
async fn text_to_image_happy_path() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/text-to-image").header("authorization", "Bearer test-api-key");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"task_id\":\"t-1\",\"status\":\"queued\"}");
		})
		.await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator
		.execute("text_to_image", serde_json::json!({"prompt": "a red fox"}), None)
		.await;

	match envelope {
		ResponseEnvelope::Success { data, status, .. } => {
			assert_eq!(status, 200);
			assert_eq!(data["task_id"], "t-1");
		},
		other => panic!("expected success, got {other:?}"),
	}

	mock.assert_async().await;
}

#[tokio::test]
async fn chat_validation_failure_never_reaches_network() {
	let server = MockServer::start_async().await;
	let mock = server.mock_async(|when, then| {
		when.method(POST).path("/chat");
		then.status(200).body("{}");
	}).await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator.execute("chat", serde_json::json!({"messages": []}), None).await;

	match envelope {
		ResponseEnvelope::Validation { issues, .. } => assert!(!issues.is_empty()),
		other => panic!("expected validation failure, got {other:?}"),
	}

	mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn rate_limited_honors_retry_after_until_budget_is_spent() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/chat");
			then.status(429).header("retry-after", "0").header("content-type", "application/json").body(
				"{\"code\":\"rate_limited\",\"message\":\"slow down\"}",
			);
		})
		.await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator
		.execute(
			"chat",
			serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
			None,
		)
		.await;

	match envelope {
		ResponseEnvelope::Upstream { status, code, .. } => {
			assert_eq!(status, 429);
			assert_eq!(code.as_deref(), Some("rate_limited"));
		},
		other => panic!("expected an upstream 429 after exhausting the retry budget, got {other:?}"),
	}

	// Retry-After: 0 makes every retry immediate, so all 3 attempts land
	// before the invocation gives up.
	mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn exhausted_retries_surface_as_transport_or_upstream_failure() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/pricing");
			then.status(503);
		})
		.await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator.execute("pricing", serde_json::json!({}), None).await;

	match envelope {
		ResponseEnvelope::Upstream { status, .. } => assert_eq!(status, 503),
		other => panic!("expected upstream failure after exhausting retries, got {other:?}"),
	}

	mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn oauth_401_invalidates_and_retries_exactly_once() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"a-token\",\"expires_in\":3600}");
		})
		.await;
	let pricing_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/pricing");
			then.status(401);
		})
		.await;
	let mut config = test_oauth_config(&server.base_url(), &server.url("/token"));

	config.retry.max_attempts = 2;

	let orchestrator = test_orchestrator(config);
	let envelope = orchestrator.execute("pricing", serde_json::json!({}), None).await;

	match envelope {
		ResponseEnvelope::Upstream { status, .. } => assert_eq!(status, 401),
		other => panic!("expected an upstream 401 after the retry budget was spent, got {other:?}"),
	}

	// One auth_stale retry is allowed per invocation: the first 401
	// invalidates the cached token, so the retry fetches a new one too.
	pricing_mock.assert_hits_async(2).await;
	token_mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn stream_chat_aggregates_sse_frames_into_one_message() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/streamchat");
			then.status(200).header("content-type", "text/event-stream").body(concat!(
				"data: {\"delta\": {\"role\": \"assistant\", \"content\": \"Hi\"}}\n",
				"data: {\"delta\": {\"content\": \" there\"}}\n",
				"data: [DONE]\n",
			));
		})
		.await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator
		.execute(
			"stream_chat",
			serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
			None,
		)
		.await;

	match envelope {
		ResponseEnvelope::Success { data, .. } => {
			assert_eq!(data["message"]["content"], "Hi there");
		},
		other => panic!("expected success, got {other:?}"),
	}

	mock.assert_async().await;
}

#[tokio::test]
async fn image_to_image_round_trips_multipart_bytes() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/image-to-image");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"task_id\":\"t-2\",\"status\":\"queued\"}");
		})
		.await;
	let orchestrator = test_orchestrator(test_config(&server.base_url()));
	let envelope = orchestrator
		.execute(
			"image_to_image",
			serde_json::json!({"image": [0xDE, 0xAD, 0xBE, 0xEF], "prompt": "make it glow"}),
			None,
		)
		.await;

	match envelope {
		ResponseEnvelope::Success { data, .. } => assert_eq!(data["task_id"], "t-2"),
		other => panic!("expected success, got {other:?}"),
	}

	mock.assert_async().await;
}
