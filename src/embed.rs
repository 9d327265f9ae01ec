// ---------------------------------------------------------------------------
// Text embedding capability
// ---------------------------------------------------------------------------
//
// Embedding models live outside this crate; they are consumed through the
// `Embedder` trait, which turns text into a fixed-length dense vector. The
// `Vectorizer` pairs an embedder with a sparsification threshold.
// ---------------------------------------------------------------------------

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::EmbedConfig;
use crate::convert::to_sparse_threshold;
use crate::error::VecfsError;
use crate::sparse::SparseVector;

pub const PROVIDER_MOCK: &str = "mock";
pub const PROVIDER_NONE: &str = "none";

/// Dimensions produced by [`HashEmbedder`] when none are configured.
pub const DEFAULT_HASH_DIMS: usize = 100;

pub trait Embedder: Send + Sync {
	/// Provider name, for logs and CLI output.
	fn provider(&self) -> &str;

	/// Length of every vector returned by [`Embedder::embed`].
	fn dimensions(&self) -> usize;

	fn embed(&self, text: &str) -> Result<Vec<f64>, VecfsError>;

	fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, VecfsError> {
		texts.iter().map(|t| self.embed(t)).collect()
	}
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Deterministic bag-of-words embedder for offline use and tests.
///
/// Lowercases the text, keeps words longer than two characters, and counts
/// each word in bucket `fnv1a(word) % dims`.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
	dims: usize,
}

impl HashEmbedder {
	pub fn new(dims: usize) -> Self {
		Self { dims: dims.max(1) }
	}
}

impl Default for HashEmbedder {
	fn default() -> Self {
		Self::new(DEFAULT_HASH_DIMS)
	}
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
	let mut hash: u32 = 0x811c_9dc5;
	for &b in bytes {
		hash ^= b as u32;
		hash = hash.wrapping_mul(0x0100_0193);
	}
	hash
}

impl Embedder for HashEmbedder {
	fn provider(&self) -> &str {
		PROVIDER_MOCK
	}

	fn dimensions(&self) -> usize {
		self.dims
	}

	fn embed(&self, text: &str) -> Result<Vec<f64>, VecfsError> {
		let mut dense = vec![0.0; self.dims];
		let lowered = text.to_lowercase();
		for word in WORD_RE.find_iter(&lowered).map(|m| m.as_str()) {
			if word.chars().count() > 2 {
				let dim = fnv1a_32(word.as_bytes()) as usize % self.dims;
				dense[dim] += 1.0;
			}
		}
		Ok(dense)
	}
}

// ---------------------------------------------------------------------------
// Vectorizer
// ---------------------------------------------------------------------------

/// Text -> sparse vector: embed, L2-normalize, then threshold.
#[derive(Clone)]
pub struct Vectorizer {
	embedder: Arc<dyn Embedder>,
	threshold: f64,
}

impl Vectorizer {
	pub fn new(embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
		Self {
			embedder,
			threshold,
		}
	}

	/// Build the vectorizer named by the config. `Ok(None)` when the provider
	/// is `none`, i.e. only caller-supplied vectors are accepted.
	pub fn from_config(config: &EmbedConfig) -> Result<Option<Self>, VecfsError> {
		let embedder: Arc<dyn Embedder> = match config.provider.trim().to_lowercase().as_str() {
			"" | PROVIDER_MOCK => Arc::new(HashEmbedder::new(
				config.dims.unwrap_or(DEFAULT_HASH_DIMS),
			)),
			PROVIDER_NONE => return Ok(None),
			other => return Err(VecfsError::UnknownProvider(other.to_string())),
		};
		tracing::info!(
			provider = embedder.provider(),
			model = %config.model,
			dims = embedder.dimensions(),
			threshold = config.threshold,
			"Embedder ready"
		);
		Ok(Some(Self::new(embedder, config.threshold)))
	}

	pub fn embedder(&self) -> &dyn Embedder {
		self.embedder.as_ref()
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	pub fn vectorize(&self, text: &str) -> Result<SparseVector, VecfsError> {
		let dense = self.embedder.embed(text)?;
		Ok(to_sparse_threshold(&dense, self.threshold, true))
	}
}

impl std::fmt::Debug for Vectorizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Vectorizer")
			.field("provider", &self.embedder.provider())
			.field("threshold", &self.threshold)
			.finish()
	}
}
