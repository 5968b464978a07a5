//! Attention-masked mean pooling and L2 normalization.

use crate::vector::{VectorDimension, VectorError, l2_norm};

/// Floor applied to the mask count and to vector norms.
pub const POOLING_EPSILON: f32 = 1e-9;

/// Averages the token vectors whose mask entry is 1.
///
/// `tokens` holds one hidden state per position and `mask` one entry per
/// position. The divisor is the number of unmasked positions, floored at
/// [`POOLING_EPSILON`], so an all-padding row yields the zero vector rather
/// than NaNs.
pub fn masked_mean_pool(
    tokens: &[Vec<f32>],
    mask: &[u8],
    dimension: VectorDimension,
) -> Result<Vec<f32>, VectorError> {
    if tokens.len() != mask.len() {
        return Err(VectorError::EmbeddingFailed(format!(
            "Model returned {} token states for a sequence of length {}",
            tokens.len(),
            mask.len()
        )));
    }

    let mut sum = vec![0.0f32; dimension.get()];
    let mut count = 0.0f32;

    for (state, &m) in tokens.iter().zip(mask) {
        dimension.validate_vector(state)?;
        if m == 0 {
            continue;
        }
        let weight = f32::from(m);
        for (acc, value) in sum.iter_mut().zip(state) {
            *acc += value * weight;
        }
        count += weight;
    }

    let divisor = count.max(POOLING_EPSILON);
    for value in &mut sum {
        *value /= divisor;
    }
    Ok(sum)
}

/// Scales `v` to unit length in place.
///
/// The norm is floored at [`POOLING_EPSILON`], so the zero vector stays zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v).max(POOLING_EPSILON);
    for value in v.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    #[test]
    fn test_padding_is_ignored() {
        let tokens = vec![vec![1.0, 3.0], vec![3.0, 5.0], vec![100.0, -100.0]];
        let pooled = masked_mean_pool(&tokens, &[1, 1, 0], dim(2)).unwrap();
        assert_eq!(pooled, vec![2.0, 4.0]);
    }

    #[test]
    fn test_all_masked_row_is_zero() {
        let tokens = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        let pooled = masked_mean_pool(&tokens, &[0, 0], dim(2)).unwrap();
        assert_eq!(pooled, vec![0.0, 0.0]);
        assert!(pooled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_token_dimension_is_validated() {
        let tokens = vec![vec![1.0, 1.0], vec![2.0]];
        assert!(masked_mean_pool(&tokens, &[1, 1], dim(2)).is_err());
        assert!(masked_mean_pool(&tokens[..1], &[1, 1], dim(2)).is_err());
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
