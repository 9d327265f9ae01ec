// ---------------------------------------------------------------------------
// Sparse vector math
// ---------------------------------------------------------------------------
//
// Dot product, norm and cosine similarity over sparse vectors, plus the one
// validation gate for vectors supplied from outside the process.
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::VecfsError;

/// Dimension index -> weight. Absent dimensions are implicitly zero.
///
/// Serialized by serde_json with decimal-string keys (`{"3": 0.5}`), and
/// parsed back into integer keys on load.
pub type SparseVector = BTreeMap<u32, f64>;

/// Dot product over the dimensions present in both vectors.
/// Iterates the smaller map and looks each dimension up in the larger one.
pub fn dot(v1: &SparseVector, v2: &SparseVector) -> f64 {
	let (small, large) = if v1.len() <= v2.len() { (v1, v2) } else { (v2, v1) };
	small
		.iter()
		.filter_map(|(dim, a)| large.get(dim).map(|b| a * b))
		.sum()
}

/// Euclidean (L2) norm.
pub fn norm(v: &SparseVector) -> f64 {
	v.values().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity between two sparse vectors.
///
/// `norm1` lets a caller reuse the norm of `v1` across many comparisons.
/// Returns exactly 0.0 when either norm is zero.
pub fn cosine_similarity(v1: &SparseVector, v2: &SparseVector, norm1: Option<f64>) -> f64 {
	let n1 = norm1.unwrap_or_else(|| norm(v1));
	let n2 = norm(v2);
	if n1 == 0.0 || n2 == 0.0 {
		return 0.0;
	}
	dot(v1, v2) / (n1 * n2)
}

/// Convert an externally supplied vector into a [`SparseVector`].
///
/// Accepts a dense JSON array (exact zeros dropped, no normalization) or a
/// JSON object of dimension -> weight. Object keys must be non-negative
/// integers; values may be numbers or numeric strings.
pub fn normalize_vector_input(raw: &Value) -> Result<SparseVector, VecfsError> {
	match raw {
		Value::Array(items) => {
			let mut out = SparseVector::new();
			for (i, item) in items.iter().enumerate() {
				let x = coerce_weight(item).ok_or_else(|| {
					VecfsError::InvalidInput(format!("vector[{}] is not a number", i))
				})?;
				if x != 0.0 {
					let dim = u32::try_from(i).map_err(|_| {
						VecfsError::InvalidInput(format!("dimension {} out of range", i))
					})?;
					out.insert(dim, x);
				}
			}
			Ok(out)
		}
		Value::Object(map) => {
			let mut out = SparseVector::new();
			for (key, value) in map {
				let dim: u32 = key.trim().parse().map_err(|_| {
					VecfsError::InvalidInput(format!(
						"vector key {:?} is not a non-negative integer",
						key
					))
				})?;
				let x = coerce_weight(value).ok_or_else(|| {
					VecfsError::InvalidInput(format!("vector[{}] is not a number", key))
				})?;
				out.insert(dim, x);
			}
			Ok(out)
		}
		_ => Err(VecfsError::InvalidInput(
			"vector must be an array of numbers or an object of dimension -> value".into(),
		)),
	}
}

fn coerce_weight(value: &Value) -> Option<f64> {
	let x = match value {
		Value::Number(n) => n.as_f64()?,
		Value::String(s) => s.trim().parse::<f64>().ok()?,
		_ => return None,
	};
	x.is_finite().then_some(x)
}
