// ---------------------------------------------------------------------------
// Memory — in-process API over the store
// ---------------------------------------------------------------------------
//
// The surface a protocol layer calls: search, memorize, feedback, delete.
// Text variants need a `Vectorizer`; without one they fail with
// `VecfsError::EmbedderUnavailable`.
// ---------------------------------------------------------------------------

use crate::embed::Vectorizer;
use crate::error::VecfsError;
use crate::sparse::SparseVector;
use crate::store::VectorStore;
use crate::types::{Metadata, SearchHit};

/// Metadata key under which `memorize_text` keeps the original text.
pub const TEXT_METADATA_KEY: &str = "text";

pub struct Memory {
	store: VectorStore,
	vectorizer: Option<Vectorizer>,
}

impl Memory {
	pub fn new(store: VectorStore, vectorizer: Option<Vectorizer>) -> Self {
		Self { store, vectorizer }
	}

	pub fn store(&self) -> &VectorStore {
		&self.store
	}

	pub fn vectorizer(&self) -> Result<&Vectorizer, VecfsError> {
		self.vectorizer
			.as_ref()
			.ok_or(VecfsError::EmbedderUnavailable)
	}

	pub async fn search(
		&self,
		vector: &SparseVector,
		limit: usize,
	) -> Result<Vec<SearchHit>, VecfsError> {
		let results = self.store.search(vector, limit).await?;
		Ok(results.into_iter().map(SearchHit::from).collect())
	}

	/// Insert or replace `id`. The score restarts at zero.
	pub async fn memorize(
		&self,
		id: &str,
		vector: SparseVector,
		metadata: Metadata,
	) -> Result<bool, VecfsError> {
		if id.is_empty() {
			return Err(VecfsError::InvalidInput("id must not be empty".into()));
		}
		self.store.store(id, vector, metadata, 0.0).await
	}

	pub async fn feedback(&self, id: &str, delta: f64) -> Result<bool, VecfsError> {
		if !delta.is_finite() {
			return Err(VecfsError::InvalidInput(
				"score adjustment must be a finite number".into(),
			));
		}
		self.store.update_score(id, delta).await
	}

	pub async fn delete(&self, id: &str) -> Result<bool, VecfsError> {
		self.store.delete(id).await
	}

	pub async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, VecfsError> {
		let vectorizer = self.vectorizer()?;
		if query.trim().is_empty() {
			return Err(VecfsError::InvalidInput("query must not be empty".into()));
		}
		let vector = vectorizer.vectorize(query)?;
		self.search(&vector, limit).await
	}

	pub async fn memorize_text(
		&self,
		id: &str,
		text: &str,
		mut metadata: Metadata,
	) -> Result<bool, VecfsError> {
		let vectorizer = self.vectorizer()?;
		if text.trim().is_empty() {
			return Err(VecfsError::InvalidInput("text must not be empty".into()));
		}
		let vector = vectorizer.vectorize(text)?;
		metadata.insert(TEXT_METADATA_KEY.to_string(), text.into());
		self.memorize(id, vector, metadata).await
	}
}
