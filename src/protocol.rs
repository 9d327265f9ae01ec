use serde::{Deserialize, Serialize};

// JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const VECFS_ERROR: i32 = -32000;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "vecfs-engine";

/// Incoming message. Requests without an `id` (or with a null one) are
/// notifications. Any other id, number or string, is echoed back verbatim.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
	#[serde(default)]
	pub id: Option<serde_json::Value>,
	pub method: String,
	#[serde(default)]
	pub params: serde_json::Value,
}

// ── Params ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallParams {
	pub name: String,
	#[serde(default)]
	pub arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
	pub query: Option<String>,
	pub vector: Option<serde_json::Value>,
	pub limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizeArgs {
	pub id: String,
	pub text: Option<String>,
	pub vector: Option<serde_json::Value>,
	#[serde(default)]
	pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackArgs {
	pub id: String,
	pub score_adjustment: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteArgs {
	pub id: String,
}

// ── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDef {
	pub name: &'static str,
	pub description: &'static str,
	pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct TextContent {
	#[serde(rename = "type")]
	pub content_type: &'static str,
	pub text: String,
}

impl TextContent {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			content_type: "text",
			text: text.into(),
		}
	}
}

pub fn tool_defs() -> Vec<ToolDef> {
	use serde_json::json;

	let vector_schema = json!({
		"description": "Sparse vector as {\"<dim>\": weight} or a dense array of numbers",
		"type": ["object", "array"],
	});

	vec![
		ToolDef {
			name: "search",
			description: "Semantic search: find entries similar to the query text or vector, ranked by similarity plus feedback.",
			input_schema: json!({
				"type": "object",
				"properties": {
					"query": { "type": "string", "description": "Search by text (embedded server-side)" },
					"vector": vector_schema,
					"limit": { "type": "number", "default": 5 },
				},
			}),
		},
		ToolDef {
			name: "memorize",
			description: "Store an entry by text or vector. Replaces the entry if the ID already exists.",
			input_schema: json!({
				"type": "object",
				"properties": {
					"id": { "type": "string" },
					"text": { "type": "string" },
					"vector": vector_schema,
					"metadata": { "type": "object" },
				},
				"required": ["id"],
			}),
		},
		ToolDef {
			name: "feedback",
			description: "Adjust the reinforcement score of an entry.",
			input_schema: json!({
				"type": "object",
				"properties": {
					"id": { "type": "string" },
					"scoreAdjustment": { "type": "number" },
				},
				"required": ["id", "scoreAdjustment"],
			}),
		},
		ToolDef {
			name: "delete",
			description: "Delete an entry by its unique ID.",
			input_schema: json!({
				"type": "object",
				"properties": {
					"id": { "type": "string" },
				},
				"required": ["id"],
			}),
		},
	]
}
