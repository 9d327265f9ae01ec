use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Serialize)]
struct Message {
	jsonrpc: &'static str,
	id: Option<serde_json::Value>,
	#[serde(flatten)]
	outcome: Outcome,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
	Result(serde_json::Value),
	Error(ErrorObject),
}

#[derive(Serialize)]
struct ErrorObject {
	code: i32,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<serde_json::Value>,
}

/// Line-oriented JSON-RPC output: every message is one JSON object followed
/// by `\n`, flushed immediately. The server writes to stdout and keeps logs
/// on stderr.
pub struct NdjsonTransport {
	sink: Mutex<Box<dyn Write + Send>>,
}

impl NdjsonTransport {
	pub fn stdout() -> Self {
		Self::with_writer(io::stdout())
	}

	pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
		Self {
			sink: Mutex::new(Box::new(writer)),
		}
	}

	pub fn write_response(&self, id: Option<serde_json::Value>, result: serde_json::Value) {
		self.send(id, Outcome::Result(result));
	}

	pub fn write_error(
		&self,
		id: Option<serde_json::Value>,
		code: i32,
		message: impl Into<String>,
		data: Option<serde_json::Value>,
	) {
		let error = ErrorObject {
			code,
			message: message.into(),
			data,
		};
		self.send(id, Outcome::Error(error));
	}

	fn send(&self, id: Option<serde_json::Value>, outcome: Outcome) {
		let message = Message {
			jsonrpc: "2.0",
			id,
			outcome,
		};
		let mut line = match serde_json::to_vec(&message) {
			Ok(bytes) => bytes,
			Err(e) => {
				tracing::error!("Failed to serialize response: {}", e);
				return;
			}
		};
		line.push(b'\n');

		let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
		if let Err(e) = sink.write_all(&line).and_then(|()| sink.flush()) {
			tracing::error!("Failed to write response: {}", e);
		}
	}
}
