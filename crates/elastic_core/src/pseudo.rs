//! Pseudo-inverses mapping stress derivatives to independent elastic constants.
//!
//! Along a strain state with ray `n`, the Voigt stress of a degree-`d` term
//! of the expansion is
//!
//! ```text
//! sigma_i(s) = C_{i j_2 .. j_d} (n_{j_2} s) .. (n_{j_d} s) / (d-1)!
//! ```
//!
//! so its `(d-1)`-th derivative in `s` is linear in the independent symbols
//! of `C`. Stacking those linear forms over every ray and Voigt component
//! gives a coefficient matrix; its Moore-Penrose pseudo-inverse turns the
//! measured derivatives into symbol values.

use crate::error::{Error, Result};
use crate::finite_diff::factorial;
use crate::symbolic::{build_symbol_table, LinearExpr, Polynomial, SymbolId, SymbolTable};
use crate::tensor::unflatten;
use log::debug;
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// Singular values below this fraction of the largest are discarded.
const PINV_RCOND: f64 = 1e-15;

/// Linear map for one expansion degree.
#[derive(Debug, Clone)]
pub struct PseudoInverse {
    /// Rank of the Voigt symbol array (2 for second-order constants).
    pub degree: usize,
    pub table: SymbolTable,
    /// `n_symbols x (6 * n_rays)`; columns are ordered ray-major.
    pub matrix: DMatrix<f64>,
    /// Symbols no ray constrains. They come out of the solve as zero.
    pub absent: BTreeSet<SymbolId>,
}

impl PseudoInverse {
    /// Symbol values for stacked derivatives (`ray * 6 + component`).
    pub fn solve(&self, derivatives: &[f64]) -> Result<Vec<f64>> {
        if derivatives.len() != self.matrix.ncols() {
            return Err(Error::Shape(format!(
                "pseudo-inverse of degree {} expects {} derivatives, got {}",
                self.degree,
                self.matrix.ncols(),
                derivatives.len()
            )));
        }
        let values = &self.matrix * nalgebra::DVector::from_column_slice(derivatives);
        Ok(values.iter().copied().collect())
    }

    pub fn absent_names(&self) -> Vec<String> {
        self.absent.iter().map(|&id| self.table.name(id)).collect()
    }
}

/// Symbolic `(d-1)`-th derivative of the degree-`d` stress along `ray`, per
/// Voigt component.
pub fn stress_derivative_exprs(table: &SymbolTable, ray: &[f64; 6]) -> Vec<LinearExpr> {
    let degree = table.rank();
    let powers = degree - 1;
    let mut tail = vec![0usize; powers];
    let mut index = vec![0usize; degree];
    (0..6)
        .map(|component| {
            let mut expr = LinearExpr::default();
            index[0] = component;
            for flat in 0..6usize.pow(powers as u32) {
                unflatten(flat, 6, &mut tail);
                let coeff: f64 = tail.iter().map(|&j| ray[j]).product();
                if coeff == 0.0 {
                    continue;
                }
                index[1..].copy_from_slice(&tail);
                expr.add_term(table.symbol_at(&index), Polynomial::monomial(coeff, powers));
            }
            expr.scale(1.0 / factorial(powers)).nth_derivative(powers)
        })
        .collect()
}

/// Builds pseudo-inverses for degrees `2..=max_order`.
pub fn generate_pseudo(rays: &[[f64; 6]], max_order: usize) -> Result<Vec<PseudoInverse>> {
    if max_order < 2 {
        return Err(Error::InvalidInput(format!(
            "expansion order must be at least 2, got {max_order}"
        )));
    }
    if rays.is_empty() {
        return Err(Error::MissingStrainStates(
            "no strain states to build a pseudo-inverse from".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(max_order - 1);
    for degree in 2..=max_order {
        let table = build_symbol_table(degree, 6)?;
        let rows: Vec<LinearExpr> = rays
            .iter()
            .flat_map(|ray| stress_derivative_exprs(&table, ray))
            .collect();

        let present: BTreeSet<SymbolId> = rows.iter().flat_map(|e| e.symbols_present()).collect();
        let absent: BTreeSet<SymbolId> = (0..table.len()).filter(|id| !present.contains(id)).collect();

        let coefficients = DMatrix::from_fn(rows.len(), table.len(), |r, c| {
            rows[r].coefficient(c).coeff(0)
        });
        let mut matrix = pinv(coefficients)?;
        for &id in &absent {
            matrix.row_mut(id).fill(0.0);
        }
        debug!(
            "degree {degree}: {} symbols, {} rows, {} absent",
            table.len(),
            rows.len(),
            absent.len()
        );
        out.push(PseudoInverse {
            degree,
            table,
            matrix,
            absent,
        });
    }
    Ok(out)
}

pub(crate) fn pinv(matrix: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let svd = matrix.svd(true, true);
    let largest = svd.singular_values.iter().fold(0.0f64, |acc, &s| acc.max(s));
    let cutoff = (PINV_RCOND * largest).max(f64::MIN_POSITIVE);
    svd.pseudo_inverse(cutoff)
        .map_err(|e| Error::SingularMatrix(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_rays() -> Vec<[f64; 6]> {
        (0..6)
            .map(|i| {
                let mut r = [0.0; 6];
                r[i] = 1.0;
                r
            })
            .collect()
    }

    #[test]
    fn second_order_unit_rays_give_identity_structure() {
        let pseudo = generate_pseudo(&unit_rays(), 2).expect("pseudo");
        assert_eq!(pseudo.len(), 1);
        let p = &pseudo[0];
        assert_eq!(p.matrix.shape(), (21, 36));
        assert!(p.absent.is_empty());

        // Derivatives of a known symmetric C along unit rays are its columns.
        let c = |i: usize, j: usize| 1.0 + (i.min(j) * 6 + i.max(j)) as f64;
        let mut derivs = Vec::new();
        for ray in 0..6 {
            for comp in 0..6 {
                derivs.push(c(comp, ray));
            }
        }
        let values = p.solve(&derivs).expect("solve");
        for (id, tuple) in p.table.symbols().iter().enumerate() {
            assert!((values[id] - c(tuple[0], tuple[1])).abs() < 1e-10);
        }
    }

    #[test]
    fn single_ray_leaves_symbols_absent() {
        let mut ray = [0.0; 6];
        ray[0] = 1.0;
        let pseudo = generate_pseudo(&[ray], 3).expect("pseudo");
        assert_eq!(pseudo.len(), 2);
        // Only C_i0 (second order) can be seen along the first axis.
        assert_eq!(pseudo[0].table.len() - pseudo[0].absent.len(), 6);
        assert!(pseudo[0].absent_names().contains(&"c_11".to_string()));
        // Third order: C_i00 only.
        assert_eq!(pseudo[1].table.len() - pseudo[1].absent.len(), 6);
        // Absent symbols have an all-zero row in the pseudo-inverse.
        for &id in &pseudo[1].absent {
            assert!(pseudo[1].matrix.row(id).iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn derivative_expressions_scale_with_ray() {
        let table = build_symbol_table(3, 6).expect("table");
        let ray = [1.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        let exprs = stress_derivative_exprs(&table, &ray);
        // d^2/ds^2 [ C_0jk n_j n_k s^2 / 2 ] = C_000 + 4 C_001 + 4 C_011
        let e = &exprs[0];
        let id = |t: &[usize]| table.id_of(t).expect("symbol");
        assert_eq!(e.coefficient(id(&[0, 0, 0])).coeff(0), 1.0);
        assert_eq!(e.coefficient(id(&[0, 0, 1])).coeff(0), 4.0);
        assert_eq!(e.coefficient(id(&[0, 1, 1])).coeff(0), 4.0);
        assert_eq!(e.symbols_present().len(), 3);
    }

    #[test]
    fn rejects_low_order_and_empty_input() {
        assert!(generate_pseudo(&unit_rays(), 1).is_err());
        assert!(generate_pseudo(&[], 2).is_err());
    }
}
