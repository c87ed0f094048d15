//! Orchestrator: maps an operation to its catalog entry, validates
//! arguments, dispatches through auth + retry + transport, and normalizes the
//! outcome into a [`ResponseEnvelope`].

// self
use crate::{
	_prelude::*,
	auth::AuthProvider,
	config::Config,
	envelope::ResponseEnvelope,
	error::{Error, Result, TransportError, UpstreamError},
	http::{
		Classification, Method, MultipartField, OutboundRequest, RequestBody, ResponseBody,
		Transport, classify_status,
	},
	obs::{self, InvocationOutcome, InvocationSpan},
	retry::{RateLimiter, RetryDecision, backoff_delay, clamp_retry_after, retry_decision},
	schema::{self, Operation},
};

/// Request body encoding for an [`OperationSpec`] entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
	/// No request body (GET).
	None,
	/// `application/json`.
	Json,
	/// `multipart/form-data`.
	Multipart,
}

/// Upstream response shape an [`OperationSpec`] entry expects. Every kind but
/// [`ResponseKind::AggregatedStream`] is normalized into `data` the same way;
/// that one is aggregated first, see [`aggregate_stream_body`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
	/// Upstream replies synchronously with the full result.
	SyncResult,
	/// Upstream replies with `{ task_id, status, ... }` for later polling.
	AsyncTask,
	/// Upstream replies with an unstructured JSON body.
	ArbitraryJson,
	/// Upstream emits the reply incrementally; the body is collapsed into one
	/// aggregated message before it becomes envelope `data`.
	AggregatedStream,
}

/// Static catalog entry for one operation.
#[derive(Clone, Copy, Debug)]
pub struct OperationSpec {
	/// Path relative to the base URL, possibly containing `{task_id}`.
	pub path: &'static str,
	/// HTTP method.
	pub method: Method,
	/// Request body encoding.
	pub body_kind: BodyKind,
	/// Upstream response shape.
	pub response_kind: ResponseKind,
}

/// Looks up the static catalog entry for `operation`.
pub fn spec_for(operation: Operation) -> OperationSpec {
	match operation {
		Operation::TextToImage => OperationSpec {
			path: "/text-to-image",
			method: Method::Post,
			body_kind: BodyKind::Json,
			response_kind: ResponseKind::AsyncTask,
		},
		Operation::ImageToImage => OperationSpec {
			path: "/image-to-image",
			method: Method::Post,
			body_kind: BodyKind::Multipart,
			response_kind: ResponseKind::AsyncTask,
		},
		Operation::Inpainting => OperationSpec {
			path: "/inpainting",
			method: Method::Post,
			body_kind: BodyKind::Multipart,
			response_kind: ResponseKind::AsyncTask,
		},
		Operation::ReplaceBackground => OperationSpec {
			path: "/replace-background",
			method: Method::Post,
			body_kind: BodyKind::Multipart,
			response_kind: ResponseKind::AsyncTask,
		},
		Operation::TextToSpeech => OperationSpec {
			path: "/text-to-speech",
			method: Method::Post,
			body_kind: BodyKind::Json,
			response_kind: ResponseKind::AsyncTask,
		},
		Operation::Chat => OperationSpec {
			path: "/chat",
			method: Method::Post,
			body_kind: BodyKind::Json,
			response_kind: ResponseKind::SyncResult,
		},
		Operation::StreamChat => OperationSpec {
			path: "/streamchat",
			method: Method::Post,
			body_kind: BodyKind::Json,
			response_kind: ResponseKind::AggregatedStream,
		},
		Operation::StoreVectorDb => OperationSpec {
			path: "/store-file-in-vector-database",
			method: Method::Post,
			body_kind: BodyKind::Multipart,
			response_kind: ResponseKind::SyncResult,
		},
		Operation::TaskStatus => OperationSpec {
			path: "/task-status/{task_id}",
			method: Method::Get,
			body_kind: BodyKind::None,
			response_kind: ResponseKind::SyncResult,
		},
		Operation::Pricing => OperationSpec {
			path: "/pricing",
			method: Method::Get,
			body_kind: BodyKind::None,
			response_kind: ResponseKind::SyncResult,
		},
	}
}

/// Per-invocation context. Immutable except for the attempt counter, which
/// the orchestrator owns directly rather than a thread-local store.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// Per-invocation correlation id.
	pub trace_id: String,
	/// Operation being invoked.
	pub operation: Operation,
	/// Attempts made so far.
	pub attempt: u32,
	/// Logical start time.
	pub start: OffsetDateTime,
	/// Soft deadline: `start + request_timeout * max_attempts`.
	pub deadline: OffsetDateTime,
}

const BYTE_FIELDS: [&str; 4] = ["image", "mask", "background_image", "file"];

/// The request execution pipeline: holds every long-lived collaborator
/// and runs `validate → auth → send (+ retry) → normalize` for each call.
pub struct Orchestrator {
	config: Config,
	transport: Arc<dyn Transport>,
	auth: Arc<dyn AuthProvider>,
	limiter: Arc<RateLimiter>,
}
impl Orchestrator {
	/// Builds an orchestrator from its long-lived collaborators. All four are
	/// constructed once at process start and live for the process lifetime.
	pub fn new(
		config: Config,
		transport: Arc<dyn Transport>,
		auth: Arc<dyn AuthProvider>,
		limiter: Arc<RateLimiter>,
	) -> Self {
		Self { config, transport, auth, limiter }
	}

	/// The configuration this orchestrator was built with.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Executes one tool invocation end to end, never returning an `Err` —
	/// every outcome becomes a [`ResponseEnvelope`].
	pub async fn execute(
		&self,
		operation_name: &str,
		arguments: Json,
		trace_id: Option<String>,
	) -> ResponseEnvelope {
		let trace_id = trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
		let Some(operation) = Operation::parse(operation_name) else {
			return ResponseEnvelope::internal(
				trace_id,
				format!("unknown_operation: `{operation_name}`"),
			);
		};
		let span = InvocationSpan::new(operation.as_str(), &trace_id);

		span.instrument(self.execute_known(operation, arguments, trace_id)).await
	}

	async fn execute_known(
		&self,
		operation: Operation,
		arguments: Json,
		trace_id: String,
	) -> ResponseEnvelope {
		let start = OffsetDateTime::now_utc();

		obs::record_outcome(operation.as_str(), InvocationOutcome::Attempt);

		let result = self.run(operation, &arguments, &trace_id, start).await;
		let latency_ms = (OffsetDateTime::now_utc() - start).whole_milliseconds().max(0) as u64;
		let envelope = match result {
			Ok((data, status)) =>
				ResponseEnvelope::success(operation, trace_id.clone(), data, status, latency_ms),
			Err(err) => ResponseEnvelope::from_error(trace_id.clone(), err),
		};

		obs::record_outcome(
			operation.as_str(),
			if envelope.is_ok() { InvocationOutcome::Success } else { InvocationOutcome::Failure },
		);
		obs::record_latency(operation.as_str(), latency_ms);

		#[cfg(feature = "tracing")]
		tracing::info!(
			trace_id = %trace_id,
			operation = operation.as_str(),
			outcome = envelope.outcome_kind(),
			latency_ms,
			"invocation complete"
		);

		envelope
	}

	async fn run(
		&self,
		operation: Operation,
		arguments: &Json,
		trace_id: &str,
		start: OffsetDateTime,
	) -> Result<(Json, u16)> {
		schema::validate(operation, arguments).map_err(|issues| Error::Validation { issues })?;

		let spec = spec_for(operation);
		let path = render_path(spec.path, arguments);
		let body = build_body(spec.body_kind, arguments)?;
		let deadline = start + self.config.request_timeout * (self.config.retry.max_attempts as i32);
		let mut auth_stale_used = false;

		for attempt in 1..=self.config.retry.max_attempts {
			if OffsetDateTime::now_utc() >= deadline {
				return Err(Error::Transport(TransportError {
					message: "invocation deadline exceeded".into(),
					cause: "deadline_exceeded".into(),
					attempts: attempt.saturating_sub(1),
				}));
			}

			self.limiter.acquire(self.config.request_timeout).await?;

			let (_header_name, header_value) =
				self.auth.header_for(OffsetDateTime::now_utc()).await?;
			let url = self
				.config
				.base_url
				.join(path.trim_start_matches('/'))
				.map_err(|e| Error::internal(format!("failed to build upstream URL: {e}")))?;
			let request = OutboundRequest::new(spec.method, url, self.config.request_timeout)
				.with_header("X-Request-Id", trace_id)
				.with_authorization(header_value)
				.with_body(body.clone());

			match self.transport.send(request).await {
				Err(transport_err) =>
					if attempt == self.config.retry.max_attempts {
						return Err(Error::Transport(TransportError { attempts: attempt, ..transport_err }));
					} else {
						tokio::time::sleep(to_std(backoff_delay(&self.config.retry, attempt))).await;
					},
				Ok(response) => {
					let classification = classify_status(response.status);

					if classification == Classification::Success {
						let data = if spec.response_kind == ResponseKind::AggregatedStream {
							aggregate_stream_body(response.body)
						} else {
							response.body.into_envelope_data()
						};

						return Ok((data, response.status));
					}
					if classification == Classification::AuthStale
						&& !auth_stale_used
						&& attempt < self.config.retry.max_attempts
					{
						auth_stale_used = true;

						self.auth.invalidate().await;

						continue;
					}

					let decision = retry_decision(classification);

					if decision == RetryDecision::GiveUp || attempt == self.config.retry.max_attempts {
						return Err(upstream_error_from_response(response));
					}

					let delay = match decision {
						RetryDecision::RetryAfter => response
							.retry_after
							.map(|d| clamp_retry_after(d, &self.config.retry))
							.unwrap_or_else(|| backoff_delay(&self.config.retry, attempt)),
						_ => backoff_delay(&self.config.retry, attempt),
					};

					tokio::time::sleep(to_std(delay)).await;
				},
			}
		}

		unreachable!("loop always returns within max_attempts iterations")
	}
}

fn render_path(template: &'static str, arguments: &Json) -> String {
	if !template.contains('{') {
		return template.to_owned();
	}

	let task_id = arguments.get("task_id").and_then(Json::as_str).unwrap_or_default();

	template.replace("{task_id}", task_id)
}

fn build_body(kind: BodyKind, arguments: &Json) -> Result<RequestBody> {
	match kind {
		BodyKind::None => Ok(RequestBody::None),
		BodyKind::Json => Ok(RequestBody::Json(arguments.clone())),
		BodyKind::Multipart => build_multipart(arguments).map(RequestBody::Multipart),
	}
}

fn build_multipart(arguments: &Json) -> Result<Vec<MultipartField>> {
	let obj = arguments
		.as_object()
		.ok_or_else(|| Error::internal("multipart arguments must be a JSON object"))?;
	let mut fields = Vec::with_capacity(obj.len());

	for (key, value) in obj {
		if BYTE_FIELDS.contains(&key.as_str()) {
			fields.push(MultipartField::File {
				name: key.clone(),
				filename: key.clone(),
				bytes: decode_bytes_field(value)?,
			});
		} else {
			fields.push(MultipartField::Text { name: key.clone(), value: json_scalar_to_text(value) });
		}
	}

	Ok(fields)
}

fn decode_bytes_field(value: &Json) -> Result<Vec<u8>> {
	use base64::Engine;

	match value {
		Json::String(s) => base64::engine::general_purpose::STANDARD
			.decode(s)
			.map_err(|e| Error::internal(format!("invalid base64 in byte field: {e}"))),
		Json::Array(items) => items
			.iter()
			.map(|v| {
				v.as_u64()
					.filter(|n| *n <= u8::MAX as u64)
					.map(|n| n as u8)
					.ok_or_else(|| Error::internal("byte array element out of range"))
			})
			.collect(),
		_ => Err(Error::internal("byte field must be a base64 string or byte array")),
	}
}

fn json_scalar_to_text(value: &Json) -> String {
	match value {
		Json::String(s) => s.clone(),
		Json::Null => String::new(),
		other => other.to_string(),
	}
}

/// Aggregates a `stream_chat` response body into a single `data` map. The
/// body is already read to completion by the transport (the request timeout
/// covers reading until stream end, so a stall past it surfaces as the usual
/// `transport_error` before this ever runs); this only collapses the
/// incremental frames into one reply instead of forwarding them.
///
/// A body that arrived as one JSON document (no incremental framing) passes
/// through unchanged. Otherwise each line is treated as an SSE `data: {...}`
/// frame or a bare NDJSON object; `[DONE]` sentinels are skipped and every
/// frame's `delta`/`content` fragment is concatenated in order.
fn aggregate_stream_body(body: ResponseBody) -> Json {
	let bytes = match body {
		ResponseBody::Json(value) => return value,
		ResponseBody::Bytes { bytes, .. } => bytes,
	};
	let text = String::from_utf8_lossy(&bytes);
	let mut role = None;
	let mut content = String::new();

	for line in text.lines() {
		let payload = line.strip_prefix("data:").map(str::trim).unwrap_or_else(|| line.trim());

		if payload.is_empty() || payload == "[DONE]" {
			continue;
		}

		let Ok(frame) = serde_json::from_str::<Json>(payload) else { continue };
		let delta = frame
			.pointer("/choices/0/delta")
			.or_else(|| frame.get("delta"))
			.unwrap_or(&frame);

		if let Some(r) = delta.get("role").and_then(Json::as_str) {
			role = Some(r.to_owned());
		}
		if let Some(fragment) = delta.get("content").and_then(Json::as_str) {
			content.push_str(fragment);
		}
	}

	serde_json::json!({
		"message": { "role": role.unwrap_or_else(|| "assistant".to_owned()), "content": content },
	})
}

fn upstream_error_from_response(response: crate::http::RawResponse) -> Error {
	let retry_after_ms =
		response.retry_after.map(|d| d.whole_milliseconds().max(0) as u64);

	match response.body {
		crate::http::ResponseBody::Json(value) => {
			let code = value.get("code").and_then(Json::as_str).map(String::from);
			let message = value
				.get("message")
				.and_then(Json::as_str)
				.map(String::from)
				.unwrap_or_else(|| format!("upstream responded with status {}", response.status));
			let details = value.as_object().map(|_| value.clone());

			Error::Upstream(UpstreamError {
				status: response.status,
				code,
				message,
				details,
				retry_after_ms,
			})
		},
		crate::http::ResponseBody::Bytes { .. } => Error::Upstream(UpstreamError {
			status: response.status,
			code: None,
			message: format!("upstream responded with status {}", response.status),
			details: None,
			retry_after_ms,
		}),
	}
}

fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::from_millis(duration.whole_milliseconds().max(0) as u64)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn catalog_covers_every_operation() {
		for operation in Operation::ALL {
			let spec = spec_for(operation);

			assert!(spec.path.starts_with('/'));
		}
	}

	#[test]
	fn render_path_substitutes_task_id() {
		let args = serde_json::json!({"task_id": "11111111-1111-1111-1111-111111111111"});

		assert_eq!(
			render_path("/task-status/{task_id}", &args),
			"/task-status/11111111-1111-1111-1111-111111111111"
		);
	}

	#[test]
	fn aggregate_stream_body_concatenates_sse_deltas() {
		let sse = concat!(
			"data: {\"delta\": {\"role\": \"assistant\", \"content\": \"Hel\"}}\n",
			"data: {\"delta\": {\"content\": \"lo\"}}\n",
			"data: [DONE]\n",
		);
		let data = aggregate_stream_body(ResponseBody::Bytes {
			content_type: Some("text/event-stream".to_owned()),
			bytes: sse.as_bytes().to_vec(),
		});

		assert_eq!(data["message"]["role"], "assistant");
		assert_eq!(data["message"]["content"], "Hello");
	}

	#[test]
	fn multipart_round_trips_byte_array_and_text() {
		let args = serde_json::json!({"image": [0xDE, 0xAD, 0xBE, 0xEF], "prompt": "x"});
		let fields = build_multipart(&args).expect("multipart should build");

		let image = fields
			.iter()
			.find_map(|f| match f {
				MultipartField::File { name, bytes, .. } if name == "image" => Some(bytes.clone()),
				_ => None,
			})
			.expect("image part should be present");

		assert_eq!(image, vec![0xDE, 0xAD, 0xBE, 0xEF]);

		let prompt = fields.iter().find_map(|f| match f {
			MultipartField::Text { name, value } if name == "prompt" => Some(value.clone()),
			_ => None,
		});

		assert_eq!(prompt, Some("x".to_owned()));
	}
}
