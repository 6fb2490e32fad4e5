//! Finite-difference weights on arbitrary 1-D stencils.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};

/// `n!` as a float.
pub fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Weights `c` such that `sum_j c[j] * f(stencil[j])` approximates the
/// `derivative_order`-th derivative of `f` at zero.
///
/// The weights are exact for polynomials of degree below the stencil width.
/// Points need not be evenly spaced or symmetric about zero.
pub fn diff_coefficients(stencil: &[f64], derivative_order: usize) -> Result<Vec<f64>> {
    let m = stencil.len();
    if m <= derivative_order {
        return Err(Error::StencilRankDeficient(format!(
            "derivative of order {derivative_order} needs at least {} points, got {m}",
            derivative_order + 1
        )));
    }
    if stencil.iter().any(|h| !h.is_finite()) {
        return Err(Error::StencilRankDeficient(
            "stencil contains non-finite values".to_string(),
        ));
    }
    for (i, a) in stencil.iter().enumerate() {
        if stencil[i + 1..].contains(a) {
            return Err(Error::StencilRankDeficient(format!(
                "duplicate stencil point {a}"
            )));
        }
    }

    // Row i holds stencil^i.
    let a = DMatrix::from_fn(m, m, |i, j| stencil[j].powi(i as i32));
    let mut b = DVector::zeros(m);
    b[derivative_order] = factorial(derivative_order);
    a.lu()
        .solve(&b)
        .map(|c| c.iter().copied().collect())
        .ok_or_else(|| Error::StencilRankDeficient("stencil matrix is singular".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_difference_weights() {
        let h = 0.01;
        let c = diff_coefficients(&[-h, 0.0, h], 1).expect("weights");
        assert!((c[0] + 0.5 / h).abs() < 1e-9);
        assert!(c[1].abs() < 1e-9);
        assert!((c[2] - 0.5 / h).abs() < 1e-9);

        let c2 = diff_coefficients(&[-h, 0.0, h], 2).expect("weights");
        assert!((c2[0] - 1.0 / (h * h)).abs() < 1e-6);
        assert!((c2[1] + 2.0 / (h * h)).abs() < 1e-6);
    }

    #[test]
    fn exact_on_polynomials_for_irregular_stencil() {
        let stencil = [-2.0, -1.0, 0.0, 0.5, 1.5];
        let m = stencil.len();
        for n in 0..m {
            let c = diff_coefficients(&stencil, n).expect("weights");
            for k in 0..m {
                let approx: f64 = c.iter().zip(&stencil).map(|(w, x)| w * x.powi(k as i32)).sum();
                let exact = if k == n { factorial(n) } else { 0.0 };
                assert!(
                    (approx - exact).abs() < 1e-9,
                    "order {n}, x^{k}: {approx} vs {exact}"
                );
            }
        }
    }

    #[test]
    fn rank_deficient_stencils_are_rejected() {
        assert!(matches!(
            diff_coefficients(&[0.0, 0.1], 2),
            Err(Error::StencilRankDeficient(_))
        ));
        assert!(matches!(
            diff_coefficients(&[0.0, 0.1, 0.1], 1),
            Err(Error::StencilRankDeficient(_))
        ));
    }

    #[test]
    fn factorial_values() {
        assert_eq!(factorial(0), 1.0);
        assert_eq!(factorial(5), 120.0);
    }
}
