use std::io::Read;

use anyhow::{bail, Context, Result};
use clap::Parser;
use vecfs_engine::calibrate::{magnitude_stats, sparsity_at_thresholds, DEFAULT_THRESHOLDS};
use vecfs_engine::config::{CliArgs, Command, VecfsConfig};
use vecfs_engine::convert::{to_sparse_threshold, to_sparse_top_k};
use vecfs_engine::embed::Vectorizer;
use vecfs_engine::memory::Memory;
use vecfs_engine::server::VecfsServer;
use vecfs_engine::store::VectorStore;
use vecfs_engine::transport::NdjsonTransport;

#[tokio::main]
async fn main() -> Result<()> {
	let args = CliArgs::parse();

	// stdout carries the protocol; logs go to stderr.
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let config = args.resolve();
	match args.command_or_default() {
		Command::Serve => serve(&config).await,
		Command::Embed {
			text,
			top_k,
			batch,
		} => embed(&config, text, top_k, batch),
		Command::Calibrate { thresholds } => calibrate(&config, thresholds),
	}
}

async fn serve(config: &VecfsConfig) -> Result<()> {
	let vectorizer = Vectorizer::from_config(&config.embed)?;
	let store = VectorStore::new(&config.storage_file);
	store
		.ensure_file()
		.await
		.with_context(|| format!("opening {}", config.storage_file.display()))?;

	let memory = Memory::new(store, vectorizer);
	let count = memory.store().len().await?;
	let server = VecfsServer::new(NdjsonTransport::stdout(), memory);

	tracing::info!(
		file = %config.storage_file.display(),
		entries = count,
		"vecfs-engine ready"
	);
	server.run().await?;
	Ok(())
}

fn require_vectorizer(config: &VecfsConfig) -> Result<Vectorizer> {
	match Vectorizer::from_config(&config.embed)? {
		Some(v) => Ok(v),
		None => bail!("embedding provider is 'none'; choose a provider with --embed-provider"),
	}
}

fn read_stdin() -> Result<String> {
	let mut buf = String::new();
	std::io::stdin()
		.read_to_string(&mut buf)
		.context("reading stdin")?;
	Ok(buf)
}

/// Non-empty trimmed lines of stdin.
fn read_stdin_lines() -> Result<Vec<String>> {
	Ok(read_stdin()?
		.lines()
		.map(str::trim)
		.filter(|l| !l.is_empty())
		.map(String::from)
		.collect())
}

fn embed(config: &VecfsConfig, text: Vec<String>, top_k: Option<usize>, batch: bool) -> Result<()> {
	let vectorizer = require_vectorizer(config)?;
	let embedder = vectorizer.embedder();

	let sparse_record = |dense: Vec<f64>| {
		let vector = match top_k {
			Some(k) => to_sparse_top_k(&dense, k, true),
			None => to_sparse_threshold(&dense, vectorizer.threshold(), true),
		};
		serde_json::json!({
			"vector": vector,
			"model": config.embed.model,
			"provider": embedder.provider(),
			"denseDimensions": dense.len(),
			"nonZeroCount": vector.len(),
			"threshold": vectorizer.threshold(),
		})
	};

	let out = if batch {
		let texts = read_stdin_lines()?;
		if texts.is_empty() {
			bail!("--batch requires input on stdin (one text per line)");
		}
		let records: Vec<serde_json::Value> = embedder
			.embed_batch(&texts)?
			.into_iter()
			.map(sparse_record)
			.collect();
		tracing::debug!(count = records.len(), "Embedded batch");
		serde_json::Value::Array(records)
	} else {
		let text = if text.is_empty() {
			read_stdin()?.trim().to_string()
		} else {
			text.join(" ")
		};
		if text.is_empty() {
			bail!("no input text provided");
		}
		sparse_record(embedder.embed(&text)?)
	};

	println!("{}", serde_json::to_string_pretty(&out)?);
	Ok(())
}

fn calibrate(config: &VecfsConfig, thresholds: Vec<f64>) -> Result<()> {
	let vectorizer = require_vectorizer(config)?;
	let texts = read_stdin_lines()?;
	if texts.is_empty() {
		bail!("calibrate requires sample texts on stdin (one per line)");
	}

	let thresholds = if thresholds.is_empty() {
		DEFAULT_THRESHOLDS.to_vec()
	} else {
		thresholds
	};

	let embedder = vectorizer.embedder();
	let vectors = embedder.embed_batch(&texts)?;
	tracing::info!(samples = vectors.len(), "Computing calibration statistics");

	let out = serde_json::json!({
		"model": config.embed.model,
		"provider": embedder.provider(),
		"sampleCount": vectors.len(),
		"magnitudeStats": magnitude_stats(&vectors),
		"sparsityAtThresholds": sparsity_at_thresholds(&vectors, &thresholds),
	});
	println!("{}", serde_json::to_string_pretty(&out)?);
	Ok(())
}
