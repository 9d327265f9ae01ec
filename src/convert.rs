// ---------------------------------------------------------------------------
// Dense -> sparse conversion
// ---------------------------------------------------------------------------

use crate::sparse::SparseVector;

/// L2-normalize a dense vector. A zero vector is returned unchanged.
pub fn normalize(dense: &[f64]) -> Vec<f64> {
	let norm = dense.iter().map(|x| x * x).sum::<f64>().sqrt();
	if norm == 0.0 {
		return dense.to_vec();
	}
	dense.iter().map(|x| x / norm).collect()
}

fn prepare(dense: &[f64], normalize_first: bool) -> Vec<f64> {
	if normalize_first {
		normalize(dense)
	} else {
		dense.to_vec()
	}
}

/// Keep every dimension whose magnitude is strictly greater than `threshold`.
pub fn to_sparse_threshold(dense: &[f64], threshold: f64, normalize_first: bool) -> SparseVector {
	prepare(dense, normalize_first)
		.into_iter()
		.enumerate()
		.filter(|(_, x)| x.abs() > threshold)
		.map(|(i, x)| (i as u32, x))
		.collect()
}

/// Keep the `k` largest-magnitude dimensions, never including exact zeros.
///
/// Equal magnitudes keep ascending index order (stable sort).
pub fn to_sparse_top_k(dense: &[f64], k: usize, normalize_first: bool) -> SparseVector {
	let mut indexed: Vec<(usize, f64)> = prepare(dense, normalize_first)
		.into_iter()
		.enumerate()
		.collect();
	indexed.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
	indexed
		.into_iter()
		.take(k)
		.filter(|(_, x)| *x != 0.0)
		.map(|(i, x)| (i as u32, x))
		.collect()
}
