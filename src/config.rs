use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_STORAGE_FILE: &str = "./vecfs-data.jsonl";
pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers:all-MiniLM-L6-v2";
pub const DEFAULT_EMBED_THRESHOLD: f64 = 0.01;

#[derive(Parser, Debug)]
#[command(
	name = "vecfs-engine",
	version,
	about = "Sparse-vector memory store served over JSON-RPC 2.0 / NDJSON stdio"
)]
pub struct CliArgs {
	/// JSONL file holding the stored entries
	#[arg(long, global = true, default_value = DEFAULT_STORAGE_FILE, env = "VECFS_FILE")]
	pub storage_file: PathBuf,

	/// Embedding provider: "mock" (word-hash) or "none" (vectors only)
	#[arg(long, global = true, default_value = "mock", env = "VECFS_EMBED_PROVIDER")]
	pub embed_provider: String,

	/// Embedding model name, passed through to the provider
	#[arg(long, global = true, default_value = DEFAULT_EMBED_MODEL, env = "VECFS_EMBED_MODEL")]
	pub embed_model: String,

	/// Dense dimensions requested from the provider
	#[arg(long, global = true, env = "VECFS_EMBED_DIMS")]
	pub embed_dims: Option<usize>,

	/// Sparsification threshold applied after L2 normalization
	#[arg(
		long,
		global = true,
		default_value_t = DEFAULT_EMBED_THRESHOLD,
		env = "VECFS_EMBED_THRESHOLD",
		value_parser = parse_threshold
	)]
	pub embed_threshold: f64,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, global = true, default_value = "info", env = "VECFS_LOG_LEVEL")]
	pub log_level: String,

	#[command(subcommand)]
	pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
	/// Serve the memory tools over JSON-RPC on stdin/stdout (default)
	Serve,
	/// Embed text (arguments, or stdin when none) and print the sparse vector
	Embed {
		text: Vec<String>,
		/// Keep the K largest components instead of thresholding
		#[arg(long)]
		top_k: Option<usize>,
		/// Read one text per line from stdin and print a JSON array
		#[arg(long, conflicts_with = "text")]
		batch: bool,
	},
	/// Read sample texts from stdin (one per line) and report threshold statistics
	Calibrate {
		/// Comma-separated thresholds to evaluate
		#[arg(long, value_delimiter = ',')]
		thresholds: Vec<f64>,
	},
}

/// Thresholds compare against magnitudes, so they must be finite and >= 0.
fn parse_threshold(raw: &str) -> Result<f64, String> {
	let value: f64 = raw
		.trim()
		.parse()
		.map_err(|e| format!("not a number: {}", e))?;
	if !value.is_finite() || value < 0.0 {
		return Err(format!("must be a finite number >= 0, got {}", raw));
	}
	Ok(value)
}

/// Resolved configuration consumed by the store and the embedder.
#[derive(Debug, Clone, PartialEq)]
pub struct VecfsConfig {
	pub storage_file: PathBuf,
	pub embed: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedConfig {
	pub provider: String,
	pub model: String,
	pub dims: Option<usize>,
	pub threshold: f64,
}

impl CliArgs {
	pub fn resolve(&self) -> VecfsConfig {
		VecfsConfig {
			storage_file: self.storage_file.clone(),
			embed: EmbedConfig {
				provider: self.embed_provider.clone(),
				model: self.embed_model.clone(),
				dims: self.embed_dims,
				threshold: self.embed_threshold,
			},
		}
	}

	pub fn command_or_default(&self) -> Command {
		self.command.clone().unwrap_or(Command::Serve)
	}
}
