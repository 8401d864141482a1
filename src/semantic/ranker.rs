//! Cosine similarity and relevance ordering.
//!
//! Pure functions over raw vectors; no model or store access. The service
//! layer feeds in (post id, stored embedding) pairs and gets back an ordered
//! list of ids.

/// Errors that can occur while comparing vectors.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Result is in [-1, 1]. A zero-norm vector on either side yields 0.0
/// rather than NaN or an error. Vectors of differing length are a
/// [`RankError::DimensionMismatch`], never silently truncated or padded.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RankError> {
    if a.len() != b.len() {
        return Err(RankError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot_product = 0.0f32;
    let mut magnitude_a = 0.0f32;
    let mut magnitude_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        magnitude_a += x * x;
        magnitude_b += y * y;
    }

    let magnitude_a = magnitude_a.sqrt();
    let magnitude_b = magnitude_b.sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Order candidates by cosine similarity to `query`, most similar first.
///
/// Returns candidate ids only; scores stay internal. The sort is stable, so
/// candidates with equal scores keep their input order. Candidates whose
/// vector length differs from the query's (a corpus embedded with a
/// different model) are skipped with a warning instead of failing the whole
/// ranking.
pub fn rank(query: &[f32], candidates: &[(u64, Vec<f32>)]) -> Vec<u64> {
    let mut scored: Vec<(u64, f32)> = candidates
        .iter()
        .filter_map(|(id, embedding)| match cosine_similarity(query, embedding) {
            Ok(score) => Some((*id, score)),
            Err(err) => {
                log::warn!("skipping candidate {id} during ranking: {err}");
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored.into_iter().map(|(id, _)| id).collect()
}
