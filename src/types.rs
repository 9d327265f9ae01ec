use serde::{Deserialize, Deserializer, Serialize};

use crate::sparse::SparseVector;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One stored record. Field order matches the on-disk line layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	pub id: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub metadata: Metadata,
	#[serde(default, deserialize_with = "null_as_default")]
	pub vector: SparseVector,
	#[serde(default, deserialize_with = "null_as_default")]
	pub score: f64,
	#[serde(default, deserialize_with = "null_as_default")]
	pub timestamp: u64,
}

/// An entry plus its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	#[serde(flatten)]
	pub entry: Entry,
	pub similarity: f64,
}

/// Search result as handed to protocol callers: the vector is never echoed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
	pub id: String,
	pub metadata: Metadata,
	pub score: f64,
	pub timestamp: u64,
	pub similarity: f64,
}

impl From<SearchResult> for SearchHit {
	fn from(r: SearchResult) -> Self {
		Self {
			id: r.entry.id,
			metadata: r.entry.metadata,
			score: r.entry.score,
			timestamp: r.entry.timestamp,
			similarity: r.similarity,
		}
	}
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
