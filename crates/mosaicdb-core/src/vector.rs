//! Dense vector math over fixed-dimension `f32` embeddings.

use crate::error::{MosaicError, MosaicResult};

/// Small constant preventing division by zero in cosine similarity.
pub const EPSILON: f32 = 1e-9;

/// Computes the Euclidean norm (`‖v‖`) of a vector.
#[must_use]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Computes the dot product of two vectors.
///
/// # Errors
///
/// Returns [`MosaicError::InvalidInput`] if the vectors have different
/// dimensions.
pub fn dot(v1: &[f32], v2: &[f32]) -> MosaicResult<f32> {
    check_dims(v1, v2)?;
    Ok(v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum())
}

/// Computes cosine similarity given both vectors and their precomputed norms.
///
/// `cosine_similarity(v1, ‖v1‖, v2, ‖v2‖) = dot(v1, v2) / (‖v1‖·‖v2‖ + ε)`.
/// Expected range is `[-1, 1]`.
///
/// # Errors
///
/// Returns [`MosaicError::InvalidInput`] if the vectors have different
/// dimensions.
pub fn cosine_similarity(v1: &[f32], norm1: f32, v2: &[f32], norm2: f32) -> MosaicResult<f32> {
    let d = dot(v1, v2)?;
    Ok(d / (norm1 * norm2 + EPSILON))
}

/// Computes cosine similarity directly from two raw vectors, computing their
/// norms internally. Prefer [`cosine_similarity`] when a norm is already
/// cached (e.g. a shard centroid's precomputed `centroid_norm`).
///
/// # Errors
///
/// Returns [`MosaicError::InvalidInput`] if the vectors have different
/// dimensions.
pub fn cosine_similarity_raw(v1: &[f32], v2: &[f32]) -> MosaicResult<f32> {
    cosine_similarity(v1, norm(v1), v2, norm(v2))
}

fn check_dims(v1: &[f32], v2: &[f32]) -> MosaicResult<()> {
    if v1.len() != v2.len() {
        return Err(MosaicError::invalid_input(format!(
            "dimension mismatch: {} vs {}",
            v1.len(),
            v2.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_unit_vector() {
        assert!((norm(&[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        let n = norm(&v);
        let sim = cosine_similarity(&v, n, &v, n).unwrap();
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let a = [1.0_f32, 0.0];
        let b = [0.0_f32, 1.0];
        let sim = cosine_similarity_raw(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors_is_minus_one() {
        let a = [1.0_f32, 0.0];
        let b = [-1.0_f32, 0.0];
        let sim = cosine_similarity_raw(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < 1e-5);
    }

    #[test]
    fn dimension_mismatch_is_invalid_input() {
        let err = dot(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidInput { .. }));
    }

    #[test]
    fn zero_vector_does_not_divide_by_zero() {
        let zero = [0.0_f32, 0.0];
        let other = [1.0_f32, 1.0];
        let sim = cosine_similarity_raw(&zero, &other).unwrap();
        assert!(sim.is_finite());
    }
}
