//! Fibonacci freshness weighting.
//!
//! Collapses an ordered series into one figure that privileges the most
//! recent entries: the i-th value (oldest first) is weighted by the i-th
//! Fibonacci number `1, 1, 2, 3, 5, 8, …`. A regression in the last few runs
//! therefore dominates the score even when earlier runs were clean.

/// First `n` Fibonacci weights, starting `1, 1`.
///
/// Terms past the 1476th overflow to infinity; [`freshness_score`] rescales
/// internally instead of using this table.
pub fn fibonacci_weights(n: usize) -> Vec<f64> {
    let mut weights = Vec::with_capacity(n);
    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    for _ in 0..n {
        weights.push(a);
        (a, b) = (b, a + b);
    }
    weights
}

/// Rescale threshold; keeps long series clear of `f64` overflow.
const RESCALE_ABOVE: f64 = 1e280;

/// `Σ(value·weight) / Σ(weight)` with Fibonacci weights. Empty input scores 0.
pub fn freshness_score(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    let (mut weighted, mut total) = (0.0_f64, 0.0_f64);
    for value in values {
        weighted += value * a;
        total += a;
        (a, b) = (b, a + b);
        if b > RESCALE_ABOVE {
            a /= RESCALE_ABOVE;
            b /= RESCALE_ABOVE;
            weighted /= RESCALE_ABOVE;
            total /= RESCALE_ABOVE;
        }
    }
    weighted / total
}
