//! Lagrange interpolation at zero

use crate::{evaluation_point, ThresholdError, ThresholdResult};
use curve25519_dalek::scalar::Scalar;
use std::collections::HashSet;

/// Coefficients `lambda_i = prod_{j != i} x_j / (x_j - x_i)` for a subset of
/// exactly `threshold` zero-based member indices, in the subset's order.
pub fn lagrange_coefficients(indices: &[usize], threshold: usize) -> ThresholdResult<Vec<Scalar>> {
    if indices.len() < threshold || indices.is_empty() {
        return Err(ThresholdError::InsufficientShares {
            got: indices.len(),
            need: threshold.max(1),
        });
    }
    if indices.len() > threshold {
        return Err(ThresholdError::TooManyShares {
            got: indices.len(),
            threshold,
        });
    }

    let mut seen = HashSet::with_capacity(indices.len());
    for &index in indices {
        if !seen.insert(index) {
            return Err(ThresholdError::DuplicateIndex(index));
        }
    }

    let points: Vec<Scalar> = indices.iter().map(|&i| evaluation_point(i)).collect();
    let coefficients = points
        .iter()
        .enumerate()
        .map(|(i, x_i)| {
            let mut numerator = Scalar::ONE;
            let mut denominator = Scalar::ONE;
            for (j, x_j) in points.iter().enumerate() {
                if i != j {
                    numerator *= x_j;
                    denominator *= x_j - x_i;
                }
            }
            numerator * denominator.invert()
        })
        .collect();
    Ok(coefficients)
}

/// Interpolate `f(0)` from `(member_index, share)` pairs.
///
/// Only used to audit a sharing; the protocol never reconstructs the key.
pub fn reconstruct_secret(shares: &[(usize, Scalar)], threshold: usize) -> ThresholdResult<Scalar> {
    let indices: Vec<usize> = shares.iter().map(|(i, _)| *i).collect();
    let lambdas = lagrange_coefficients(&indices, threshold)?;
    Ok(shares
        .iter()
        .zip(&lambdas)
        .map(|((_, share), lambda)| share * lambda)
        .sum())
}
