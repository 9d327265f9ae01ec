// ---------------------------------------------------------------------------
// VecfsServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Reads NDJSON JSON-RPC 2.0 requests from stdin and routes `tools/call` to
// the memory tools (search, memorize, feedback, delete). Requests are handled
// one at a time, in arrival order.
// ---------------------------------------------------------------------------

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::VecfsError;
use crate::memory::{Memory, TEXT_METADATA_KEY};
use crate::protocol::*;
use crate::sparse::normalize_vector_input;
use crate::transport::NdjsonTransport;

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

pub struct VecfsServer {
	transport: NdjsonTransport,
	memory: Memory,
}

impl VecfsServer {
	pub fn new(transport: NdjsonTransport, memory: Memory) -> Self {
		Self { transport, memory }
	}

	/// Main loop: read JSON-RPC messages from stdin until EOF.
	pub async fn run(&self) -> Result<(), VecfsError> {
		let mut lines = BufReader::new(tokio::io::stdin()).lines();

		while let Some(line) = lines.next_line().await? {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					self.transport
						.write_error(None, PARSE_ERROR, format!("Parse error: {}", e), None);
					continue;
				}
			};

			self.dispatch(request).await;
		}

		tracing::info!("stdin closed, shutting down");
		Ok(())
	}

	async fn dispatch(&self, req: JsonRpcRequest) {
		let Some(id) = req.id.filter(|id| !id.is_null()) else {
			tracing::debug!(method = %req.method, "Notification received");
			return;
		};

		match self.handle(&req.method, req.params).await {
			Some(Ok(value)) => self.transport.write_response(Some(id), value),
			Some(Err(e)) => {
				let code = match e {
					VecfsError::InvalidInput(_) => INVALID_PARAMS,
					_ => VECFS_ERROR,
				};
				tracing::warn!(method = %req.method, code = e.code(), "Request failed: {}", e);
				self.transport
					.write_error(Some(id), code, e.to_string(), Some(e.to_json_rpc_error()));
			}
			None => self.transport.write_error(
				Some(id),
				METHOD_NOT_FOUND,
				format!("Unknown method: {}", req.method),
				None,
			),
		}
	}

	/// Route one request. `None` when the method is unknown.
	pub async fn handle(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Option<Result<serde_json::Value, VecfsError>> {
		let result = match method {
			"initialize" => Ok(handle_initialize()),
			"ping" => Ok(serde_json::json!({})),
			"tools/list" => Ok(serde_json::json!({ "tools": tool_defs() })),
			"tools/call" => self.handle_tool_call(params).await,
			_ => return None,
		};
		Some(result)
	}

	async fn handle_tool_call(
		&self,
		params: serde_json::Value,
	) -> Result<serde_json::Value, VecfsError> {
		let p: ToolCallParams = parse_params(params)?;
		let text = match p.name.as_str() {
			"search" => handle_search(&self.memory, parse_params(p.arguments)?).await?,
			"memorize" => handle_memorize(&self.memory, parse_params(p.arguments)?).await?,
			"feedback" => handle_feedback(&self.memory, parse_params(p.arguments)?).await?,
			"delete" => handle_delete(&self.memory, parse_params(p.arguments)?).await?,
			other => return Err(VecfsError::InvalidInput(format!("Unknown tool: {}", other))),
		};
		Ok(serde_json::json!({ "content": [TextContent::new(text)] }))
	}
}

fn parse_params<T: serde::de::DeserializeOwned>(params: serde_json::Value) -> Result<T, VecfsError> {
	serde_json::from_value(params)
		.map_err(|e| VecfsError::InvalidInput(format!("Invalid params: {}", e)))
}

fn handle_initialize() -> serde_json::Value {
	serde_json::json!({
		"protocolVersion": PROTOCOL_VERSION,
		"serverInfo": {
			"name": SERVER_NAME,
			"version": env!("CARGO_PKG_VERSION"),
		},
		"capabilities": { "tools": {} },
	})
}

// ---------------------------------------------------------------------------
// Tool handlers
// ---------------------------------------------------------------------------

async fn handle_search(memory: &Memory, args: SearchArgs) -> Result<String, VecfsError> {
	let limit = match args.limit {
		Some(l) if l >= 1.0 => l as usize,
		_ => DEFAULT_SEARCH_LIMIT,
	};

	let hits = match (&args.vector, &args.query) {
		(Some(raw), _) => memory.search(&normalize_vector_input(raw)?, limit).await?,
		(None, Some(query)) => memory.search_text(query, limit).await?,
		(None, None) => {
			return Err(VecfsError::InvalidInput(
				"search requires a query or a vector".into(),
			))
		}
	};

	Ok(serde_json::to_string_pretty(&hits)?)
}

async fn handle_memorize(memory: &Memory, args: MemorizeArgs) -> Result<String, VecfsError> {
	let mut metadata = args.metadata.unwrap_or_default();

	let is_new = match (&args.vector, args.text) {
		(Some(raw), text) => {
			let vector = normalize_vector_input(raw)?;
			if let Some(text) = text {
				metadata.insert(TEXT_METADATA_KEY.to_string(), text.into());
			}
			memory.memorize(&args.id, vector, metadata).await?
		}
		(None, Some(text)) => memory.memorize_text(&args.id, &text, metadata).await?,
		(None, None) => {
			return Err(VecfsError::InvalidInput(
				"memorize requires text or a vector".into(),
			))
		}
	};

	Ok(if is_new {
		format!("Stored entry: {}", args.id)
	} else {
		format!("Updated entry: {}", args.id)
	})
}

async fn handle_feedback(memory: &Memory, args: FeedbackArgs) -> Result<String, VecfsError> {
	Ok(if memory.feedback(&args.id, args.score_adjustment).await? {
		format!("Updated score for entry: {}", args.id)
	} else {
		format!("Entry not found: {}", args.id)
	})
}

async fn handle_delete(memory: &Memory, args: DeleteArgs) -> Result<String, VecfsError> {
	Ok(if memory.delete(&args.id).await? {
		format!("Deleted entry: {}", args.id)
	} else {
		format!("Entry not found: {}", args.id)
	})
}
