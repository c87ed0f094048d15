//! Per-operation request schemas: strict, declarative validation of the
//! argument map a tool handler receives before it is forwarded to upstream.
//!
//! Validation never coerces loosely typed input (no implicit string→number)
//! and rejects unknown fields, mirroring how [`serde_path_to_error`] reports a
//! JSON-pointer-like path for the first structural mismatch it finds — here
//! every mismatch is collected, not just the first.

// self
use crate::_prelude::*;

/// One of the ten operations the bridge fronts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	/// `POST /text-to-image`.
	TextToImage,
	/// `POST /image-to-image`.
	ImageToImage,
	/// `POST /inpainting`.
	Inpainting,
	/// `POST /replace-background`.
	ReplaceBackground,
	/// `POST /text-to-speech`.
	TextToSpeech,
	/// `POST /chat`.
	Chat,
	/// `POST /streamchat`. Upstream emits incrementally; the bridge aggregates
	/// into one reply and never forwards tokens to the caller.
	StreamChat,
	/// `POST /store-file-in-vector-database`.
	StoreVectorDb,
	/// `GET /task-status/{task_id}`.
	TaskStatus,
	/// `GET /pricing`.
	Pricing,
}
impl Operation {
	/// All operations, in catalog order.
	pub const ALL: [Operation; 10] = [
		Operation::TextToImage,
		Operation::ImageToImage,
		Operation::Inpainting,
		Operation::ReplaceBackground,
		Operation::TextToSpeech,
		Operation::Chat,
		Operation::StreamChat,
		Operation::StoreVectorDb,
		Operation::TaskStatus,
		Operation::Pricing,
	];

	/// Stable lowercase snake_case name, used in envelopes, logs, and metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Operation::TextToImage => "text_to_image",
			Operation::ImageToImage => "image_to_image",
			Operation::Inpainting => "inpainting",
			Operation::ReplaceBackground => "replace_background",
			Operation::TextToSpeech => "text_to_speech",
			Operation::Chat => "chat",
			Operation::StreamChat => "stream_chat",
			Operation::StoreVectorDb => "store_vector_db",
			Operation::TaskStatus => "task_status",
			Operation::Pricing => "pricing",
		}
	}

	/// Parses an operation name, returning `None` for unknown operations
	/// (the orchestrator maps that to `unknown_operation`).
	pub fn parse(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|op| op.as_str() == name)
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A single validation failure, path-addressed like a JSON pointer segment
/// list (`messages[0].role`, `width`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
	/// Dotted/indexed path to the offending field; empty string means the
	/// whole argument map.
	pub path: String,
	/// Human-readable explanation.
	pub message: String,
	/// Machine-readable failure code (`missing`, `type_mismatch`, `min_length`,
	/// `max_length`, `min_value`, `max_value`, `unknown_field`, `invalid_uuid`).
	pub code: &'static str,
}
impl Issue {
	fn new(path: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
		Self { path: path.into(), code, message: message.into() }
	}
}

/// Validates `arguments` against `operation`'s schema, returning the
/// (unchanged, but now schema-confirmed) arguments on success.
pub fn validate(operation: Operation, arguments: &Json) -> std::result::Result<(), Vec<Issue>> {
	let obj = match arguments.as_object() {
		Some(obj) => obj,
		None => return Err(vec![Issue::new("", "type_mismatch", "arguments must be a JSON object")]),
	};
	let mut issues = Vec::new();
	let known: &[&str] = match operation {
		Operation::TextToImage => &[
			"prompt",
			"model",
			"width",
			"height",
			"steps",
			"guidance_scale",
			"seed",
			"negative_prompt",
		],
		Operation::ImageToImage =>
			&["image", "prompt", "strength", "guidance_scale", "steps", "seed"],
		Operation::Inpainting => &["image", "mask", "prompt", "guidance_scale", "steps", "seed"],
		Operation::ReplaceBackground =>
			&["image", "background_prompt", "background_image", "mask_threshold"],
		Operation::TextToSpeech => &["text", "voice", "language", "speed", "pitch"],
		Operation::Chat => &["messages", "model", "temperature", "max_tokens"],
		Operation::StreamChat => &["messages", "model", "temperature", "max_tokens"],
		Operation::StoreVectorDb =>
			&["file", "collection_name", "metadata", "chunk_size", "overlap"],
		Operation::TaskStatus => &["task_id"],
		Operation::Pricing => &[],
	};

	reject_unknown_fields(obj, known, &mut issues);

	match operation {
		Operation::TextToImage => validate_text_to_image(obj, &mut issues),
		Operation::ImageToImage => validate_image_to_image(obj, &mut issues),
		Operation::Inpainting => validate_inpainting(obj, &mut issues),
		Operation::ReplaceBackground => validate_replace_background(obj, &mut issues),
		Operation::TextToSpeech => validate_text_to_speech(obj, &mut issues),
		Operation::Chat => validate_chat(obj, &mut issues),
		Operation::StreamChat => validate_chat(obj, &mut issues),
		Operation::StoreVectorDb => validate_store_vector_db(obj, &mut issues),
		Operation::TaskStatus => validate_task_status(obj, &mut issues),
		Operation::Pricing => {},
	}

	if issues.is_empty() { Ok(()) } else { Err(issues) }
}

fn reject_unknown_fields(
	obj: &serde_json::Map<String, Json>,
	known: &[&str],
	issues: &mut Vec<Issue>,
) {
	for key in obj.keys() {
		if !known.contains(&key.as_str()) {
			issues.push(Issue::new(key.clone(), "unknown_field", format!("unknown field `{key}`")));
		}
	}
}

fn require_string(
	obj: &serde_json::Map<String, Json>,
	field: &str,
	min_len: usize,
	max_len: usize,
	issues: &mut Vec<Issue>,
) {
	require_string_at(obj, field, field, min_len, max_len, issues)
}

/// Like [`require_string`] but reports issues under `path` instead of `field`,
/// for fields nested inside an array element (e.g. `messages[0].role`).
fn require_string_at(
	obj: &serde_json::Map<String, Json>,
	field: &str,
	path: &str,
	min_len: usize,
	max_len: usize,
	issues: &mut Vec<Issue>,
) {
	match obj.get(field) {
		None => issues.push(Issue::new(path, "missing", format!("`{field}` is required"))),
		Some(Json::String(s)) => {
			if s.chars().count() < min_len {
				issues.push(Issue::new(
					path,
					"min_length",
					format!("`{field}` must be at least {min_len} character(s)"),
				));
			} else if s.chars().count() > max_len {
				issues.push(Issue::new(
					path,
					"max_length",
					format!("`{field}` must be at most {max_len} character(s)"),
				));
			}
		},
		Some(_) => issues.push(Issue::new(path, "type_mismatch", format!("`{field}` must be a string"))),
	}
}

fn optional_string(
	obj: &serde_json::Map<String, Json>,
	field: &str,
	issues: &mut Vec<Issue>,
) {
	if let Some(value) = obj.get(field) {
		if !value.is_string() {
			issues.push(Issue::new(field, "type_mismatch", format!("`{field}` must be a string")));
		}
	}
}

fn optional_int_range(
	obj: &serde_json::Map<String, Json>,
	field: &str,
	min: i64,
	max: i64,
	issues: &mut Vec<Issue>,
) {
	if let Some(value) = obj.get(field) {
		match value.as_i64() {
			Some(n) if value.is_i64() || value.is_u64() => {
				if n < min || n > max {
					issues.push(Issue::new(
						field,
						"range",
						format!("`{field}` must be between {min} and {max}"),
					));
				}
			},
			_ => issues.push(Issue::new(field, "type_mismatch", format!("`{field}` must be an integer"))),
		}
	}
}

fn optional_number_range(
	obj: &serde_json::Map<String, Json>,
	field: &str,
	min: f64,
	max: f64,
	issues: &mut Vec<Issue>,
) {
	if let Some(value) = obj.get(field) {
		match value.as_f64() {
			Some(n) if value.is_number() => {
				if n < min || n > max {
					issues.push(Issue::new(
						field,
						"range",
						format!("`{field}` must be between {min} and {max}"),
					));
				}
			},
			_ => issues.push(Issue::new(field, "type_mismatch", format!("`{field}` must be a number"))),
		}
	}
}

fn require_bytes_field(obj: &serde_json::Map<String, Json>, field: &str, issues: &mut Vec<Issue>) {
	match obj.get(field) {
		None => issues.push(Issue::new(field, "missing", format!("`{field}` is required"))),
		Some(Json::String(_)) => {},
		Some(Json::Array(items)) if items.iter().all(|v| v.is_u64()) => {},
		Some(_) => issues.push(Issue::new(
			field,
			"type_mismatch",
			format!("`{field}` must be a base64 string or a byte array"),
		)),
	}
}

fn optional_bytes_field(obj: &serde_json::Map<String, Json>, field: &str, issues: &mut Vec<Issue>) {
	if obj.contains_key(field) {
		require_bytes_field(obj, field, issues);
	}
}

fn validate_text_to_image(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_string(obj, "prompt", 1, 4000, issues);
	optional_string(obj, "model", issues);
	optional_int_range(obj, "width", 64, 4096, issues);
	optional_int_range(obj, "height", 64, 4096, issues);
	optional_int_range(obj, "steps", 1, 150, issues);
	optional_number_range(obj, "guidance_scale", 0.0, 50.0, issues);
	if let Some(seed) = obj.get("seed") {
		if !seed.is_i64() && !seed.is_u64() {
			issues.push(Issue::new("seed", "type_mismatch", "`seed` must be an integer"));
		}
	}
	optional_string(obj, "negative_prompt", issues);
}

fn validate_image_to_image(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_bytes_field(obj, "image", issues);
	require_string(obj, "prompt", 1, 4000, issues);
	optional_number_range(obj, "strength", 0.0, 1.0, issues);
	optional_number_range(obj, "guidance_scale", 0.0, 50.0, issues);
	optional_int_range(obj, "steps", 1, 150, issues);
	if let Some(seed) = obj.get("seed") {
		if !seed.is_i64() && !seed.is_u64() {
			issues.push(Issue::new("seed", "type_mismatch", "`seed` must be an integer"));
		}
	}
}

fn validate_inpainting(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_bytes_field(obj, "image", issues);
	require_bytes_field(obj, "mask", issues);
	require_string(obj, "prompt", 1, 4000, issues);
	optional_number_range(obj, "guidance_scale", 0.0, 50.0, issues);
	optional_int_range(obj, "steps", 1, 150, issues);
	if let Some(seed) = obj.get("seed") {
		if !seed.is_i64() && !seed.is_u64() {
			issues.push(Issue::new("seed", "type_mismatch", "`seed` must be an integer"));
		}
	}
}

fn validate_replace_background(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_bytes_field(obj, "image", issues);
	optional_string(obj, "background_prompt", issues);
	optional_bytes_field(obj, "background_image", issues);
	optional_number_range(obj, "mask_threshold", 0.0, 1.0, issues);
}

fn validate_text_to_speech(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_string(obj, "text", 1, 10_000, issues);
	optional_string(obj, "voice", issues);
	optional_string(obj, "language", issues);
	optional_number_range(obj, "speed", 0.25, 4.0, issues);
	if let Some(pitch) = obj.get("pitch") {
		if !pitch.is_number() {
			issues.push(Issue::new("pitch", "type_mismatch", "`pitch` must be a number"));
		}
	}
}

fn validate_chat(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	match obj.get("messages") {
		None => issues.push(Issue::new("messages", "missing", "`messages` is required")),
		Some(Json::Array(items)) => {
			if items.is_empty() {
				issues.push(Issue::new(
					"messages",
					"min_length",
					"`messages` must contain at least one message",
				));
			}
			for (idx, item) in items.iter().enumerate() {
				let path = format!("messages[{idx}]");

				match item.as_object() {
					Some(message) => {
						require_string_at(message, "role", &format!("{path}.role"), 1, 64, issues);
						require_string_at(
							message,
							"content",
							&format!("{path}.content"),
							0,
							100_000,
							issues,
						);
						for key in message.keys() {
							if key != "role" && key != "content" {
								issues.push(Issue::new(
									format!("{path}.{key}"),
									"unknown_field",
									format!("unknown field `{key}`"),
								));
							}
						}
					},
					None => issues.push(Issue::new(path, "type_mismatch", "message must be an object")),
				}
			}
		},
		Some(_) => issues.push(Issue::new("messages", "type_mismatch", "`messages` must be an array")),
	}
	optional_string(obj, "model", issues);
	optional_number_range(obj, "temperature", 0.0, 2.0, issues);
	if let Some(max_tokens) = obj.get("max_tokens") {
		match max_tokens.as_u64() {
			Some(n) if n >= 1 => {},
			Some(_) => issues.push(Issue::new("max_tokens", "min_value", "`max_tokens` must be >= 1")),
			None => issues.push(Issue::new("max_tokens", "type_mismatch", "`max_tokens` must be an integer")),
		}
	}
}

fn validate_store_vector_db(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	require_bytes_field(obj, "file", issues);
	require_string(obj, "collection_name", 1, 256, issues);
	if let Some(metadata) = obj.get("metadata") {
		if !metadata.is_object() {
			issues.push(Issue::new("metadata", "type_mismatch", "`metadata` must be an object"));
		}
	}

	let chunk_size = match obj.get("chunk_size") {
		None => None,
		Some(v) => match v.as_u64() {
			Some(n) if n >= 1 => Some(n),
			Some(_) => {
				issues.push(Issue::new("chunk_size", "min_value", "`chunk_size` must be >= 1"));
				None
			},
			None => {
				issues.push(Issue::new("chunk_size", "type_mismatch", "`chunk_size` must be an integer"));
				None
			},
		},
	};
	if let Some(overlap) = obj.get("overlap") {
		match overlap.as_u64() {
			Some(n) => {
				if let Some(chunk_size) = chunk_size {
					if n >= chunk_size {
						issues.push(Issue::new(
							"overlap",
							"range",
							"`overlap` must be strictly less than `chunk_size`",
						));
					}
				}
			},
			None => issues.push(Issue::new("overlap", "type_mismatch", "`overlap` must be an integer")),
		}
	}
}

fn validate_task_status(obj: &serde_json::Map<String, Json>, issues: &mut Vec<Issue>) {
	match obj.get("task_id") {
		None => issues.push(Issue::new("task_id", "missing", "`task_id` is required")),
		Some(Json::String(s)) => {
			if uuid::Uuid::parse_str(s).is_err() {
				issues.push(Issue::new("task_id", "invalid_uuid", "`task_id` must be a UUID"));
			}
		},
		Some(_) => issues.push(Issue::new("task_id", "type_mismatch", "`task_id` must be a string")),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use serde_json::json;

	#[test]
	fn text_to_image_accepts_width_boundaries() {
		assert!(validate(Operation::TextToImage, &json!({"prompt": "x", "width": 64})).is_ok());
		assert!(validate(Operation::TextToImage, &json!({"prompt": "x", "width": 4096})).is_ok());
		assert!(validate(Operation::TextToImage, &json!({"prompt": "x", "width": 63})).is_err());
		assert!(validate(Operation::TextToImage, &json!({"prompt": "x", "width": 4097})).is_err());
	}

	#[test]
	fn chat_rejects_empty_messages() {
		let issues = validate(Operation::Chat, &json!({"messages": []}))
			.expect_err("empty messages should fail validation");

		assert_eq!(issues.len(), 1);
		assert_eq!(issues[0].path, "messages");
		assert_eq!(issues[0].code, "min_length");
	}

	#[test]
	fn chat_accepts_temperature_boundaries() {
		let messages = json!([{"role": "user", "content": "hi"}]);

		assert!(
			validate(Operation::Chat, &json!({"messages": messages, "temperature": 0})).is_ok()
		);
		assert!(
			validate(Operation::Chat, &json!({"messages": messages, "temperature": 2})).is_ok()
		);
		assert!(
			validate(Operation::Chat, &json!({"messages": messages, "temperature": -0.001})).is_err()
		);
		assert!(
			validate(Operation::Chat, &json!({"messages": messages, "temperature": 2.001})).is_err()
		);
	}

	#[test]
	fn stream_chat_shares_chats_schema() {
		let issues = validate(Operation::StreamChat, &json!({"messages": []}))
			.expect_err("empty messages should fail validation");

		assert_eq!(issues[0].code, "min_length");
		assert!(
			validate(
				Operation::StreamChat,
				&json!({"messages": [{"role": "user", "content": "hi"}]})
			)
			.is_ok()
		);
	}

	#[test]
	fn store_vector_db_rejects_overlap_equal_to_chunk_size() {
		let args = json!({
			"file": "ZGF0YQ==",
			"collection_name": "docs",
			"chunk_size": 10,
			"overlap": 10,
		});

		assert!(validate(Operation::StoreVectorDb, &args).is_err());

		let args = json!({
			"file": "ZGF0YQ==",
			"collection_name": "docs",
			"chunk_size": 10,
			"overlap": 9,
		});

		assert!(validate(Operation::StoreVectorDb, &args).is_ok());
	}

	#[test]
	fn rejects_unknown_fields() {
		let issues = validate(Operation::Pricing, &json!({"bogus": 1}))
			.expect_err("unknown field should be rejected");

		assert_eq!(issues[0].code, "unknown_field");
	}

	#[test]
	fn task_status_requires_uuid_shaped_id() {
		assert!(validate(Operation::TaskStatus, &json!({"task_id": "not-a-uuid"})).is_err());
		assert!(
			validate(
				Operation::TaskStatus,
				&json!({"task_id": "11111111-1111-1111-1111-111111111111"})
			)
			.is_ok()
		);
	}

	#[test]
	fn operation_round_trips_through_str() {
		for op in Operation::ALL {
			assert_eq!(Operation::parse(op.as_str()), Some(op));
		}
	}
}
