//! Embedding similarity helper.
//!
//! Linear scan over every stored vector of the same object type and model
//! version, ranked by cosine similarity to the query vector. The query object
//! itself is never returned. Zero-norm vectors are similar to nothing (0.0).

use data_loader::{DataError, Dataset, ObjectId, ObjectType, Result};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero norm, and `None` on a dimension mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (&x, &y)| {
        let (x, y) = (x as f64, y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// The `k` objects most similar to `object_id`, best first, with their similarity.
///
/// Ties are broken by ascending object id. Stored vectors whose dimension
/// differs from the query are logged and skipped.
#[instrument(skip(data))]
pub fn similar_items<D>(
    data: &D,
    object_type: ObjectType,
    object_id: ObjectId,
    model_version: &str,
    k: usize,
) -> Result<Vec<(ObjectId, f32)>>
where
    D: Dataset + ?Sized,
{
    let query = data
        .embedding(object_type, object_id, model_version)
        .ok_or_else(|| DataError::not_found("Embedding", object_id))?;

    let others = data.embeddings(object_type, model_version);
    let mut scored: Vec<(ObjectId, f32)> = others
        .par_iter()
        .filter(|e| e.object_id != object_id)
        .filter_map(|e| match cosine_similarity(&query.vector, &e.vector) {
            Some(similarity) => Some((e.object_id, similarity)),
            None => {
                warn!(
                    other = e.object_id,
                    expected = query.vector.len(),
                    found = e.vector.len(),
                    "embedding dimension mismatch, skipping"
                );
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(k);

    debug!("Found {} similar {}s", scored.len(), object_type);
    Ok(scored)
}
