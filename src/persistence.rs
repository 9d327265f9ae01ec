// ---------------------------------------------------------------------------
// JSONL persistence
// ---------------------------------------------------------------------------
//
// One entry per newline-terminated line:
//   {"id":"..","metadata":{..},"vector":{"<dim>":<w>,..},"score":<n>,"timestamp":<ms>}
//
// Loading is fail-soft: blank lines are ignored and lines that do not parse
// as an entry object are skipped with a warning. Whole-file rewrites go
// through a sibling temp file and a rename.
// ---------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::VecfsError;
use crate::types::Entry;

/// Serialize one entry as a single line, including the trailing newline.
pub fn encode_line(entry: &Entry) -> Result<String, VecfsError> {
	let mut line = serde_json::to_string(entry)?;
	line.push('\n');
	Ok(line)
}

/// Parse one line. `None` for blank, malformed or non-object lines.
pub fn parse_line(line: &str) -> Option<Entry> {
	let line = line.trim();
	if line.is_empty() {
		return None;
	}
	serde_json::from_str(line).ok()
}

/// Parse a whole file image, skipping lines that are not valid entries.
pub fn parse_entries(contents: &str) -> Vec<Entry> {
	let mut entries = Vec::new();
	for (n, line) in contents.lines().enumerate() {
		match parse_line(line) {
			Some(entry) => entries.push(entry),
			None if line.trim().is_empty() => {}
			None => tracing::warn!(line = n + 1, "Skipping malformed entry line"),
		}
	}
	entries
}

/// Create the parent directory and an empty file if either is missing.
pub async fn ensure_file(path: &Path) -> Result<(), VecfsError> {
	if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(dir).await?;
	}
	if !tokio::fs::try_exists(path).await? {
		tokio::fs::write(path, b"").await?;
		tracing::info!(path = %path.display(), "Created storage file");
	}
	Ok(())
}

/// Entries read from the backing file.
#[derive(Debug, Default)]
pub struct LoadedFile {
	pub entries: Vec<Entry>,
	/// The file ends without a newline, i.e. the last write was cut short.
	/// Appending before the file is rewritten would glue the next record
	/// onto that partial line.
	pub unterminated: bool,
}

pub async fn load_entries(path: &Path) -> Result<LoadedFile, VecfsError> {
	let contents = tokio::fs::read_to_string(path).await?;
	Ok(LoadedFile {
		entries: parse_entries(&contents),
		unterminated: !contents.is_empty() && !contents.ends_with('\n'),
	})
}

/// Append one entry to the end of the file.
pub async fn append_entry(path: &Path, entry: &Entry) -> Result<(), VecfsError> {
	let line = encode_line(entry)?;
	let mut file = tokio::fs::OpenOptions::new()
		.append(true)
		.create(true)
		.open(path)
		.await?;
	file.write_all(line.as_bytes()).await?;
	file.flush().await?;
	Ok(())
}

/// Replace the file contents with exactly `entries`, in order.
pub async fn write_all(path: &Path, entries: &[Entry]) -> Result<(), VecfsError> {
	let mut buf = String::new();
	for entry in entries {
		buf.push_str(&encode_line(entry)?);
	}

	let tmp = temp_path(path);
	tokio::fs::write(&tmp, buf.as_bytes()).await?;
	if let Err(e) = tokio::fs::rename(&tmp, path).await {
		let _ = tokio::fs::remove_file(&tmp).await;
		return Err(e.into());
	}
	Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
	let mut name = path
		.file_name()
		.map(|n| n.to_os_string())
		.unwrap_or_default();
	name.push(".tmp");
	path.with_file_name(name)
}
