//! Symmetric strain and stress samples.
//!
//! Both are stored as 3x3 matrices. Voigt order is
//! `[11, 22, 33, 23, 13, 12]`; strain uses engineering shear (off-diagonal
//! entries doubled), stress does not.

use crate::error::{Error, Result};
use crate::tensor::{Tensor, VOIGT_MAP};
use log::warn;
use nalgebra::Matrix3;

const SYMMETRY_TOL: f64 = 1e-8;

fn matrix_from_components(values: &[f64], shear_scale: f64, what: &str) -> Result<Matrix3<f64>> {
    match values.len() {
        9 => Ok(Matrix3::from_row_slice(values)),
        6 => {
            let mut m = Matrix3::zeros();
            for (v, &(i, j)) in VOIGT_MAP.iter().enumerate() {
                let value = if v >= 3 { values[v] / shear_scale } else { values[v] };
                m[(i, j)] = value;
                m[(j, i)] = value;
            }
            Ok(m)
        }
        n => Err(Error::Shape(format!(
            "{what} must be 3x3 (9 values) or Voigt (6 values), got {n} values"
        ))),
    }
}

fn voigt_from_matrix(m: &Matrix3<f64>, shear_scale: f64) -> [f64; 6] {
    let mut out = [0.0; 6];
    for (v, &(i, j)) in VOIGT_MAP.iter().enumerate() {
        out[v] = if v >= 3 { m[(i, j)] * shear_scale } else { m[(i, j)] };
    }
    out
}

fn zero_small(m: &Matrix3<f64>, tol: f64) -> Matrix3<f64> {
    m.map(|v| if v.abs() < tol { 0.0 } else { v })
}

fn check_symmetry(m: &Matrix3<f64>, what: &str) {
    if (m - m.transpose()).abs().max() > SYMMETRY_TOL {
        warn!("{what} is not symmetric; only its symmetric part is meaningful");
    }
}

/// Symmetric strain sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strain(Matrix3<f64>);

impl Strain {
    pub fn new(matrix: Matrix3<f64>) -> Self {
        check_symmetry(&matrix, "strain");
        Self(matrix)
    }

    pub fn zero() -> Self {
        Self(Matrix3::zeros())
    }

    /// From engineering Voigt components.
    pub fn from_voigt(voigt: [f64; 6]) -> Self {
        let mut m = Matrix3::zeros();
        for (v, &(i, j)) in VOIGT_MAP.iter().enumerate() {
            let value = if v >= 3 { voigt[v] / 2.0 } else { voigt[v] };
            m[(i, j)] = value;
            m[(j, i)] = value;
        }
        Self(m)
    }

    /// From 9 row-major matrix entries or 6 engineering Voigt components.
    pub fn from_components(values: &[f64]) -> Result<Self> {
        Ok(Self::new(matrix_from_components(values, 2.0, "strain")?))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn voigt(&self) -> [f64; 6] {
        voigt_from_matrix(&self.0, 2.0)
    }

    pub fn zeroed(&self, tol: f64) -> Self {
        Self(zero_small(&self.0, tol))
    }

    pub fn to_tensor(&self) -> Tensor {
        Tensor::from_matrix(&self.0)
    }

    /// True if every component is below `tol` in magnitude.
    pub fn is_zero(&self, tol: f64) -> bool {
        self.0.iter().all(|v| v.abs() < tol)
    }
}

/// Symmetric stress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stress(Matrix3<f64>);

impl Stress {
    pub fn new(matrix: Matrix3<f64>) -> Self {
        check_symmetry(&matrix, "stress");
        Self(matrix)
    }

    pub fn zero() -> Self {
        Self(Matrix3::zeros())
    }

    pub fn from_voigt(voigt: [f64; 6]) -> Self {
        let mut m = Matrix3::zeros();
        for (v, &(i, j)) in VOIGT_MAP.iter().enumerate() {
            m[(i, j)] = voigt[v];
            m[(j, i)] = voigt[v];
        }
        Self(m)
    }

    /// From 9 row-major matrix entries or 6 Voigt components.
    pub fn from_components(values: &[f64]) -> Result<Self> {
        Ok(Self::new(matrix_from_components(values, 1.0, "stress")?))
    }

    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        Ok(Self::new(tensor.to_matrix()?))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn voigt(&self) -> [f64; 6] {
        voigt_from_matrix(&self.0, 1.0)
    }

    pub fn zeroed(&self, tol: f64) -> Self {
        Self(zero_small(&self.0, tol))
    }

    pub fn to_tensor(&self) -> Tensor {
        Tensor::from_matrix(&self.0)
    }

    /// Componentwise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Stress, atol: f64) -> bool {
        (self.0 - other.0).abs().max() <= atol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strain_voigt_uses_engineering_shear() {
        let strain = Strain::from_components(&[
            0.01, 0.002, 0.0, //
            0.002, 0.0, 0.003, //
            0.0, 0.003, -0.01,
        ])
        .expect("3x3");
        let v = strain.voigt();
        assert_eq!(v[0], 0.01);
        assert_eq!(v[2], -0.01);
        assert!((v[3] - 0.006).abs() < 1e-15);
        assert!((v[5] - 0.004).abs() < 1e-15);
        assert_eq!(Strain::from_voigt(v).matrix(), strain.matrix());
    }

    #[test]
    fn stress_voigt_is_unscaled() {
        let stress = Stress::from_components(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("voigt");
        assert_eq!(stress.matrix()[(1, 2)], 4.0);
        assert_eq!(stress.matrix()[(0, 1)], 6.0);
        assert_eq!(stress.voigt(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let err = Strain::from_components(&[1.0, 2.0, 3.0]).expect_err("bad shape");
        assert!(matches!(err, Error::Shape(_)));
        assert!(Stress::from_components(&[0.0; 8]).is_err());
    }

    #[test]
    fn zeroed_snaps_small_entries() {
        let strain = Strain::from_voigt([1e-12, 0.01, 0.0, 0.0, 0.0, 0.0]).zeroed(1e-10);
        assert_eq!(strain.voigt(), [0.0, 0.01, 0.0, 0.0, 0.0, 0.0]);
        assert!(Strain::from_voigt([1e-12; 6]).is_zero(1e-10));
    }
}
