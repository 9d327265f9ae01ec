use thiserror::Error;

#[derive(Debug, Error)]
pub enum VecfsError {
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Embedder unavailable: no embedding provider is configured")]
	EmbedderUnavailable,
	#[error("Unknown embedding provider: {0} (use mock or none)")]
	UnknownProvider(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl VecfsError {
	pub fn code(&self) -> &str {
		match self {
			Self::InvalidInput(_) => "VECFS_INVALID_INPUT",
			Self::EmbedderUnavailable => "VECFS_EMBEDDER_UNAVAILABLE",
			Self::UnknownProvider(_) => "VECFS_UNKNOWN_PROVIDER",
			Self::Io(_) => "VECFS_IO",
			Self::Serialization(_) => "VECFS_SERIALIZATION",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"vecfsCode": self.code(),
			"message": self.to_string(),
		})
	}
}

impl From<serde_json::Error> for VecfsError {
	fn from(e: serde_json::Error) -> Self {
		Self::Serialization(e.to_string())
	}
}
