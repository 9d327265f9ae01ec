// ---------------------------------------------------------------------------
// Threshold calibration statistics
// ---------------------------------------------------------------------------
//
// Offline helpers for choosing a sparsification threshold from a sample of
// dense embeddings. Every vector is L2-normalized before it is measured.
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::convert::normalize;

/// Thresholds reported when the caller does not supply any.
pub const DEFAULT_THRESHOLDS: [f64; 5] = [0.001, 0.005, 0.01, 0.02, 0.05];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MagnitudeStats {
	pub min: f64,
	pub max: f64,
	pub mean: f64,
	pub p10: f64,
	pub p25: f64,
	pub p50: f64,
	pub p75: f64,
	pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdSparsity {
	pub threshold: f64,
	#[serde(rename = "meanRetainedPct")]
	pub mean_retained_pct: f64,
}

/// Pool the absolute component magnitudes of every normalized vector and
/// report nearest-rank percentiles. `None` when there are no components.
pub fn magnitude_stats(vectors: &[Vec<f64>]) -> Option<MagnitudeStats> {
	let mut mags: Vec<f64> = vectors
		.iter()
		.flat_map(|v| normalize(v))
		.map(f64::abs)
		.collect();
	if mags.is_empty() {
		return None;
	}
	mags.sort_by(f64::total_cmp);

	let n = mags.len();
	let percentile = |p: f64| mags[((p / 100.0) * (n - 1) as f64).floor() as usize];

	Some(MagnitudeStats {
		min: mags[0],
		max: mags[n - 1],
		mean: mags.iter().sum::<f64>() / n as f64,
		p10: percentile(10.0),
		p25: percentile(25.0),
		p50: percentile(50.0),
		p75: percentile(75.0),
		p90: percentile(90.0),
	})
}

/// Mean percentage of dimensions retained at each threshold, rounded to one
/// decimal. Results follow the order of `thresholds`.
pub fn sparsity_at_thresholds(vectors: &[Vec<f64>], thresholds: &[f64]) -> Vec<ThresholdSparsity> {
	let normalized: Vec<Vec<f64>> = vectors.iter().map(|v| normalize(v)).collect();

	thresholds
		.iter()
		.map(|&t| {
			let pcts: Vec<f64> = normalized
				.iter()
				.map(|v| {
					if v.is_empty() {
						return 0.0;
					}
					let kept = v.iter().filter(|x| x.abs() > t).count();
					kept as f64 / v.len() as f64 * 100.0
				})
				.collect();
			let mean = if pcts.is_empty() {
				0.0
			} else {
				pcts.iter().sum::<f64>() / pcts.len() as f64
			};
			ThresholdSparsity {
				threshold: t,
				mean_retained_pct: (mean * 10.0).round() / 10.0,
			}
		})
		.collect()
}
