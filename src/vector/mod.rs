//! Vector primitives shared by the build and query paths.
//!
//! Vectors are stored as dense row-major matrices and persisted in a small
//! binary format that is memory-mapped on load.

mod matrix;
mod types;

pub use matrix::{VectorMatrix, VectorStorageError};
pub use types::{VECTOR_DIMENSION_384, VectorDimension, VectorError};

/// Dot product of two equal-length vectors.
///
/// For unit-normalized inputs this is their cosine similarity.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm of a vector.
#[inline]
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        // Identical unit vectors
        let v1 = vec![1.0, 0.0, 0.0];
        assert!((dot(&v1, &v1) - 1.0).abs() < 0.001);

        // Orthogonal vectors
        let v2 = vec![0.0, 1.0, 0.0];
        assert!(dot(&v1, &v2).abs() < 0.001);

        // Opposite vectors
        let v3 = vec![-1.0, 0.0, 0.0];
        assert!((dot(&v1, &v3) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_l2_norm() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < f32::EPSILON);
        assert_eq!(l2_norm(&[0.0, 0.0]), 0.0);
    }
}
