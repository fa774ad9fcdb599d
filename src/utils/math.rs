//! Shared numeric utilities for sparse term vectors and confidence values.

use std::collections::BTreeMap;

/// Sparse vector keyed by term. Ordered so that summation order, and
/// therefore every score derived from it, is deterministic.
pub type SparseVector = BTreeMap<String, f64>;

/// Euclidean norm of a sparse vector.
pub fn magnitude(v: &SparseVector) -> f64 {
    v.values().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product of two sparse vectors, iterating the shorter one.
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum()
}

/// Cosine similarity with precomputed magnitudes.
/// Returns 0.0 if either magnitude is zero.
pub fn cosine_with_magnitudes(a: &SparseVector, b: &SparseVector, mag_a: f64, mag_b: f64) -> f64 {
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        sparse_dot(a, b) / (mag_a * mag_b)
    }
}

/// Clamp a confidence value into `[0, 1]`. NaN maps to 0.0.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
        cosine_with_magnitudes(a, b, magnitude(a), magnitude(b))
    }

    fn vector(entries: &[(&str, f64)]) -> SparseVector {
        entries.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vector(&[("alpha", 1.0), ("beta", 2.0), ("gamma", 3.0)]);
        let sim = cosine_similarity(&a, &a);
        assert!(
            (sim - 1.0).abs() < 1e-12,
            "Identical vectors should have similarity 1.0, got {sim}"
        );
    }

    #[test]
    fn test_cosine_similarity_disjoint_terms() {
        let a = vector(&[("alpha", 1.0)]);
        let b = vector(&[("beta", 1.0)]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = SparseVector::new();
        let b = vector(&[("alpha", 1.0), ("beta", 1.0)]);
        assert_eq!(cosine_similarity(&a, &b), 0.0, "Zero vector should yield 0.0");
    }

    #[test]
    fn test_cosine_similarity_known_angle() {
        // 45-degree angle: cos(45) = 1/sqrt(2)
        let a = vector(&[("x", 1.0)]);
        let b = vector(&[("x", 1.0), ("y", 1.0)]);
        let sim = cosine_similarity(&a, &b);
        assert!(
            (sim - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12,
            "Expected ~0.7071, got {sim}",
        );
    }

    #[test]
    fn test_sparse_dot_is_symmetric() {
        let a = vector(&[("x", 2.0), ("y", 3.0)]);
        let b = vector(&[("y", 4.0), ("z", 5.0), ("w", 1.0)]);
        assert_eq!(sparse_dot(&a, &b), 12.0);
        assert_eq!(sparse_dot(&b, &a), 12.0);
    }

    #[test]
    fn test_magnitude() {
        let v = vector(&[("x", 3.0), ("y", 4.0)]);
        assert!((magnitude(&v) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.333333, 4), 0.3333);
        assert_eq!(round_to(2.0, 2), 2.0);
        assert_eq!(round_to(1.005, 0), 1.0);
    }
}
