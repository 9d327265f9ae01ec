// ---------------------------------------------------------------------------
// VectorStore — file-backed entry repository
// ---------------------------------------------------------------------------
//
// The in-memory cache is the source of truth once loaded; the JSONL file is
// rewritten or appended after every mutation so it always mirrors the cache.
// Mutations take the write half of a fair RwLock and are served in arrival
// order; searches take the read half and never see a half-applied mutation.
// ---------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{OnceCell, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::VecfsError;
use crate::persistence;
use crate::sparse::{cosine_similarity, norm, SparseVector};
use crate::types::{Entry, Metadata, SearchResult};

/// Maximum share of the combined rank that feedback can contribute.
pub const FEEDBACK_RANK_WEIGHT: f64 = 0.1;

/// Saturating feedback contribution, strictly inside
/// `(-FEEDBACK_RANK_WEIGHT, FEEDBACK_RANK_WEIGHT)`.
pub fn feedback_boost(score: f64) -> f64 {
	FEEDBACK_RANK_WEIGHT * score / (1.0 + score.abs())
}

pub fn combined_rank(similarity: f64, score: f64) -> f64 {
	similarity + feedback_boost(score)
}

fn current_timestamp_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}

type Cache = Option<Vec<Entry>>;

pub struct VectorStore {
	path: PathBuf,
	ready: OnceCell<()>,
	entries: RwLock<Cache>,
}

impl VectorStore {
	/// Create a store backed by `path`. Nothing touches the disk until the
	/// first operation (or an explicit [`VectorStore::ensure_file`]).
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			ready: OnceCell::new(),
			entries: RwLock::new(None),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Create the parent directory and an empty backing file if absent.
	/// Idempotent; only the first successful call does any work.
	pub async fn ensure_file(&self) -> Result<(), VecfsError> {
		self.ready
			.get_or_try_init(|| persistence::ensure_file(&self.path))
			.await?;
		Ok(())
	}

	// -- Cache access --------------------------------------------------------

	async fn load_into(&self, cache: &mut Cache) -> Result<(), VecfsError> {
		if cache.is_none() {
			self.ensure_file().await?;
			let loaded = persistence::load_entries(&self.path).await?;
			if loaded.unterminated {
				// Rewrite before anything is appended after the torn line.
				tracing::warn!(path = %self.path.display(), "Storage file ends mid-record, rewriting");
				persistence::write_all(&self.path, &loaded.entries).await?;
			}
			tracing::info!(
				path = %self.path.display(),
				count = loaded.entries.len(),
				"Loaded entries"
			);
			*cache = Some(loaded.entries);
		}
		Ok(())
	}

	async fn write_cache(&self) -> Result<RwLockWriteGuard<'_, Cache>, VecfsError> {
		let mut guard = self.entries.write().await;
		self.load_into(&mut guard).await?;
		Ok(guard)
	}

	/// Persist `next` as the whole file image, then make it the cache. On a
	/// failed write the cache keeps its previous contents.
	async fn commit(&self, cache: &mut Vec<Entry>, next: Vec<Entry>) -> Result<(), VecfsError> {
		persistence::write_all(&self.path, &next).await?;
		*cache = next;
		Ok(())
	}

	async fn read_cache(&self) -> Result<RwLockReadGuard<'_, Cache>, VecfsError> {
		let guard = self.entries.read().await;
		if guard.is_some() {
			return Ok(guard);
		}
		drop(guard);
		Ok(self.write_cache().await?.downgrade())
	}

	// -- Mutations -----------------------------------------------------------

	/// Insert or wholly replace the entry with `id`. Returns `true` when the
	/// id was new.
	pub async fn store(
		&self,
		id: &str,
		vector: SparseVector,
		metadata: Metadata,
		score: f64,
	) -> Result<bool, VecfsError> {
		let mut guard = self.write_cache().await?;
		let entries = guard.get_or_insert_with(Vec::new);

		let entry = Entry {
			id: id.to_string(),
			metadata,
			vector,
			score,
			timestamp: current_timestamp_ms(),
		};

		if let Some(pos) = entries.iter().position(|e| e.id == id) {
			let mut next = entries.clone();
			next[pos] = entry;
			self.commit(entries, next).await?;
			tracing::debug!(id, "Replaced entry");
			return Ok(false);
		}

		persistence::append_entry(&self.path, &entry).await?;
		entries.push(entry);
		tracing::debug!(id, "Stored new entry");
		Ok(true)
	}

	/// Add `delta` to the entry's score. `false` when the id is unknown.
	pub async fn update_score(&self, id: &str, delta: f64) -> Result<bool, VecfsError> {
		let mut guard = self.write_cache().await?;
		let entries = guard.get_or_insert_with(Vec::new);

		let Some(pos) = entries.iter().position(|e| e.id == id) else {
			return Ok(false);
		};
		let mut next = entries.clone();
		next[pos].score += delta;
		let score = next[pos].score;

		self.commit(entries, next).await?;
		tracing::debug!(id, delta, score, "Updated score");
		Ok(true)
	}

	/// Remove the entry. `false` when the id is unknown.
	pub async fn delete(&self, id: &str) -> Result<bool, VecfsError> {
		let mut guard = self.write_cache().await?;
		let entries = guard.get_or_insert_with(Vec::new);

		let Some(pos) = entries.iter().position(|e| e.id == id) else {
			return Ok(false);
		};
		let mut next = entries.clone();
		next.remove(pos);

		self.commit(entries, next).await?;
		tracing::debug!(id, "Deleted entry");
		Ok(true)
	}

	// -- Queries -------------------------------------------------------------

	/// Rank every entry by similarity plus bounded feedback and return the
	/// top `limit`. Equal ranks keep storage order.
	pub async fn search(
		&self,
		query: &SparseVector,
		limit: usize,
	) -> Result<Vec<SearchResult>, VecfsError> {
		let guard = self.read_cache().await?;
		let entries = guard.as_deref().unwrap_or_default();

		let query_norm = norm(query);
		let mut ranked: Vec<(f64, SearchResult)> = entries
			.iter()
			.map(|e| {
				let similarity = if e.vector.is_empty() {
					0.0
				} else {
					cosine_similarity(query, &e.vector, Some(query_norm))
				};
				(
					combined_rank(similarity, e.score),
					SearchResult {
						entry: e.clone(),
						similarity,
					},
				)
			})
			.collect();

		// sort_by is stable: ties keep their storage order.
		ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
		ranked.truncate(limit);

		Ok(ranked.into_iter().map(|(_, r)| r).collect())
	}

	pub async fn len(&self) -> Result<usize, VecfsError> {
		let guard = self.read_cache().await?;
		Ok(guard.as_ref().map_or(0, Vec::len))
	}

	pub async fn is_empty(&self) -> Result<bool, VecfsError> {
		Ok(self.len().await? == 0)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use serde_json::json;

	use super::*;

	fn sv(pairs: &[(u32, f64)]) -> SparseVector {
		pairs.iter().copied().collect()
	}

	fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	fn temp_store() -> (tempfile::TempDir, VectorStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = VectorStore::new(dir.path().join("data/vecfs.jsonl"));
		(dir, store)
	}

	fn file_lines(store: &VectorStore) -> Vec<String> {
		std::fs::read_to_string(store.path())
			.unwrap()
			.lines()
			.map(String::from)
			.collect()
	}

	#[test]
	fn feedback_boost_is_bounded() {
		for s in [-1e12, -100.0, -1.0, 0.0, 0.5, 3.0, 1e12] {
			let b = feedback_boost(s);
			assert!(b > -FEEDBACK_RANK_WEIGHT && b < FEEDBACK_RANK_WEIGHT);
		}
		assert_eq!(feedback_boost(0.0), 0.0);
		assert!((feedback_boost(1.0) - 0.05).abs() < 1e-12);
	}

	#[tokio::test]
	async fn ensure_file_is_idempotent() {
		let (_dir, store) = temp_store();
		store.ensure_file().await.unwrap();
		store.ensure_file().await.unwrap();
		assert!(store.path().exists());
		assert!(store.is_empty().await.unwrap());
	}

	#[tokio::test]
	async fn store_then_search_finds_entry() {
		let (_dir, store) = temp_store();
		let v = sv(&[(0, 1.0), (1, 0.5)]);
		assert!(store.store("a", v.clone(), Metadata::new(), 0.0).await.unwrap());

		let results = store.search(&v, 5).await.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].entry.id, "a");
		assert!(results[0].similarity > 0.99);
	}

	#[tokio::test]
	async fn upsert_replaces_whole_record() {
		let (_dir, store) = temp_store();
		let old = sv(&[(0, 1.0)]);
		let new = sv(&[(5, 1.0)]);
		assert!(store
			.store("a", old.clone(), meta(&[("v", json!(1))]), 3.0)
			.await
			.unwrap());
		assert!(!store
			.store("a", new.clone(), meta(&[("v", json!(2))]), 0.0)
			.await
			.unwrap());

		assert_eq!(store.len().await.unwrap(), 1);
		let hits = store.search(&new, 10).await.unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].entry.vector, new);
		assert_eq!(hits[0].entry.metadata["v"], json!(2));
		assert_eq!(hits[0].entry.score, 0.0);
		assert!(hits[0].similarity > 0.99);
		assert_eq!(store.search(&old, 10).await.unwrap()[0].similarity, 0.0);

		assert_eq!(file_lines(&store).len(), 1);
	}

	#[tokio::test]
	async fn upsert_refreshes_timestamp() {
		let (_dir, store) = temp_store();
		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		let first = store.search(&SparseVector::new(), 1).await.unwrap()[0].entry.timestamp;
		std::thread::sleep(std::time::Duration::from_millis(5));
		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		let second = store.search(&SparseVector::new(), 1).await.unwrap()[0].entry.timestamp;
		assert!(second > first);
	}

	#[tokio::test]
	async fn missing_ids_report_not_found() {
		let (_dir, store) = temp_store();
		assert!(!store.update_score("missing", 1.0).await.unwrap());
		assert!(!store.delete("missing").await.unwrap());

		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		assert!(store.delete("a").await.unwrap());
		assert!(!store.delete("a").await.unwrap());
		assert!(store.is_empty().await.unwrap());
		assert!(file_lines(&store).is_empty());
	}

	#[tokio::test]
	async fn update_score_accumulates_and_persists() {
		let (_dir, store) = temp_store();
		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		assert!(store.update_score("a", 1.5).await.unwrap());
		assert!(store.update_score("a", -0.5).await.unwrap());

		let reloaded = VectorStore::new(store.path());
		let hits = reloaded.search(&sv(&[(0, 1.0)]), 1).await.unwrap();
		assert!((hits[0].entry.score - 1.0).abs() < 1e-12);
	}

	#[tokio::test]
	async fn feedback_breaks_ties_but_never_beats_similarity() {
		let (_dir, store) = temp_store();
		let q = sv(&[(0, 1.0)]);
		store.store("close", sv(&[(0, 1.0), (1, 0.2)]), Metadata::new(), 0.0).await.unwrap();
		store.store("twin-a", sv(&[(0, 1.0), (1, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		store.store("twin-b", sv(&[(0, 1.0), (1, 1.0)]), Metadata::new(), 0.0).await.unwrap();

		let ids = |r: Vec<SearchResult>| r.into_iter().map(|r| r.entry.id).collect::<Vec<_>>();
		assert_eq!(ids(store.search(&q, 10).await.unwrap()), ["close", "twin-a", "twin-b"]);

		store.update_score("twin-b", 1e9).await.unwrap();
		assert_eq!(ids(store.search(&q, 10).await.unwrap()), ["close", "twin-b", "twin-a"]);

		store.update_score("twin-a", -5.0).await.unwrap();
		store.update_score("twin-b", -1e9).await.unwrap();
		assert_eq!(ids(store.search(&q, 10).await.unwrap()), ["close", "twin-b", "twin-a"]);
	}

	#[tokio::test]
	async fn search_limit_and_empty_vectors() {
		let (_dir, store) = temp_store();
		store.store("empty", SparseVector::new(), Metadata::new(), 0.0).await.unwrap();
		store.store("x", sv(&[(3, 2.0)]), Metadata::new(), 0.0).await.unwrap();

		let all = store.search(&sv(&[(3, 1.0)]), 100).await.unwrap();
		assert_eq!(all.len(), 2);
		assert_eq!(all[0].entry.id, "x");
		assert_eq!(all[1].similarity, 0.0);

		assert_eq!(store.search(&sv(&[(3, 1.0)]), 1).await.unwrap().len(), 1);
		assert!(store.search(&sv(&[(3, 1.0)]), 0).await.unwrap().is_empty());

		let zero_query = store.search(&SparseVector::new(), 5).await.unwrap();
		assert!(zero_query.iter().all(|r| r.similarity == 0.0));
	}

	#[tokio::test]
	async fn insert_appends_and_update_rewrites() {
		let (_dir, store) = temp_store();
		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		store.store("b", sv(&[(1, 1.0)]), Metadata::new(), 0.0).await.unwrap();
		let lines = file_lines(&store);
		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with(r#"{"id":"a""#));
		assert!(lines[1].starts_with(r#"{"id":"b""#));

		store.delete("a").await.unwrap();
		let lines = file_lines(&store);
		assert_eq!(lines.len(), 1);
		assert!(lines[0].starts_with(r#"{"id":"b""#));
	}

	#[tokio::test]
	async fn reload_roundtrip_preserves_fields() {
		let (_dir, store) = temp_store();
		let metadata = meta(&[
			("text", json!("note")),
			("nested", json!({"k": [1, 2, null], "ok": true})),
		]);
		store
			.store("a", sv(&[(0, 0.75), (42, -0.1)]), metadata.clone(), 0.0)
			.await
			.unwrap();
		store.update_score("a", 2.0).await.unwrap();
		store.store("b", sv(&[(7, 1.0)]), Metadata::new(), 0.0).await.unwrap();

		let before = store.search(&SparseVector::new(), 10).await.unwrap();
		let reloaded = VectorStore::new(store.path());
		let after = reloaded.search(&SparseVector::new(), 10).await.unwrap();

		let entries = |r: Vec<SearchResult>| r.into_iter().map(|r| r.entry).collect::<Vec<_>>();
		let (before, after) = (entries(before), entries(after));
		assert_eq!(before, after);
		let a = after.iter().find(|e| e.id == "a").unwrap();
		assert_eq!(a.metadata, metadata);
		assert_eq!(a.vector.get(&42), Some(&-0.1));
	}

	#[tokio::test]
	async fn load_skips_malformed_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("vecfs.jsonl");
		std::fs::write(
			&path,
			concat!(
				r#"{"id":"a","metadata":{},"vector":{"0":1.0},"score":0,"timestamp":1}"#,
				"\n",
				"{not json\n",
				"\n",
				"[\"array\"]\n",
				r#"{"id":"b","metadata":{},"vector":{"1":1.0},"score":null,"timestamp":2}"#,
				"\n",
			),
		)
		.unwrap();

		let store = VectorStore::new(&path);
		assert_eq!(store.len().await.unwrap(), 2);

		// The next rewrite drops the junk so the file mirrors the cache.
		store.update_score("b", 1.0).await.unwrap();
		assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
	}

	#[tokio::test]
	async fn torn_last_line_does_not_swallow_next_insert() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("vecfs.jsonl");
		std::fs::write(
			&path,
			concat!(
				r#"{"id":"a","metadata":{},"vector":{"0":1.0},"score":0,"timestamp":1}"#,
				"\n",
				r#"{"id":"tr"#,
			),
		)
		.unwrap();

		let store = VectorStore::new(&path);
		assert!(store.store("b", sv(&[(1, 1.0)]), Metadata::new(), 0.0).await.unwrap());
		assert_eq!(store.len().await.unwrap(), 2);

		let reloaded = VectorStore::new(&path);
		assert_eq!(reloaded.len().await.unwrap(), 2);
		assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
	}

	fn block_rewrites(store: &VectorStore) -> PathBuf {
		let mut name = store.path().file_name().unwrap().to_os_string();
		name.push(".tmp");
		let tmp = store.path().with_file_name(name);
		std::fs::create_dir_all(tmp.join("occupied")).unwrap();
		tmp
	}

	#[tokio::test]
	async fn failed_rewrite_leaves_cache_untouched() {
		let (_dir, store) = temp_store();
		let v = sv(&[(0, 1.0)]);
		store.store("a", v.clone(), meta(&[("v", json!(1))]), 0.0).await.unwrap();
		let tmp = block_rewrites(&store);

		let err = store.update_score("a", 5.0).await.unwrap_err();
		assert!(matches!(err, VecfsError::Io(_)));
		let err = store.delete("a").await.unwrap_err();
		assert!(matches!(err, VecfsError::Io(_)));
		let err = store
			.store("a", sv(&[(9, 1.0)]), meta(&[("v", json!(2))]), 0.0)
			.await
			.unwrap_err();
		assert!(matches!(err, VecfsError::Io(_)));

		let cached = store.search(&v, 10).await.unwrap();
		assert_eq!(cached.len(), 1);
		assert_eq!(cached[0].entry.score, 0.0);
		assert_eq!(cached[0].entry.vector, v);
		assert_eq!(cached[0].entry.metadata["v"], json!(1));
		let on_disk = VectorStore::new(store.path()).search(&v, 10).await.unwrap();
		assert_eq!(cached, on_disk);

		// Once the obstruction is gone, a later write carries only itself.
		std::fs::remove_dir_all(tmp).unwrap();
		assert!(store.update_score("a", 1.0).await.unwrap());
		let on_disk = VectorStore::new(store.path()).search(&v, 10).await.unwrap();
		assert_eq!(on_disk[0].entry.score, 1.0);
	}

	#[tokio::test]
	async fn failed_append_is_not_cached() {
		let (_dir, store) = temp_store();
		store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await.unwrap();

		// Swap the backing file for a directory so the append cannot open it.
		std::fs::remove_file(store.path()).unwrap();
		std::fs::create_dir(store.path()).unwrap();

		let err = store
			.store("b", sv(&[(1, 1.0)]), Metadata::new(), 0.0)
			.await
			.unwrap_err();
		assert!(matches!(err, VecfsError::Io(_)));
		assert_eq!(store.len().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn unusable_path_reports_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let blocker = dir.path().join("plain-file");
		std::fs::write(&blocker, "x").unwrap();

		let store = VectorStore::new(blocker.join("vecfs.jsonl"));
		assert!(matches!(store.ensure_file().await, Err(VecfsError::Io(_))));
		assert!(matches!(store.len().await, Err(VecfsError::Io(_))));
		assert!(matches!(
			store.store("a", sv(&[(0, 1.0)]), Metadata::new(), 0.0).await,
			Err(VecfsError::Io(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_mutations_stay_consistent() {
		let (_dir, store) = temp_store();
		let store = Arc::new(store);

		let mut handles = Vec::new();
		for i in 0..32u32 {
			let store = Arc::clone(&store);
			handles.push(tokio::spawn(async move {
				let id = format!("e{}", i % 8);
				store.store(&id, sv(&[(i, 1.0)]), Metadata::new(), 0.0).await.unwrap();
				store.update_score(&id, 1.0).await.unwrap();
				store.search(&sv(&[(i, 1.0)]), 3).await.unwrap();
			}));
		}
		for h in handles {
			h.await.unwrap();
		}

		assert_eq!(store.len().await.unwrap(), 8);
		let cached = store.search(&SparseVector::new(), 100).await.unwrap();
		let reloaded = VectorStore::new(store.path())
			.search(&SparseVector::new(), 100)
			.await
			.unwrap();
		assert_eq!(cached, reloaded);
		assert_eq!(file_lines(&store).len(), 8);
	}
}
