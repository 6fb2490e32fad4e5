//! Dense Cartesian tensors over three spatial dimensions.
//!
//! Storage is row-major: the last index varies fastest. Even-rank tensors can
//! be folded into Voigt arrays (dimension 6, half the rank) using
//! [`VOIGT_MAP`], with an optional per-entry [`VoigtScale`].

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix6, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Spatial dimension of every tensor axis.
pub const DIM: usize = 3;

/// Voigt index -> symmetric Cartesian index pair.
pub const VOIGT_MAP: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];

/// Cartesian index pair -> Voigt index.
pub fn voigt_index(i: usize, j: usize) -> usize {
    match (i.min(j), i.max(j)) {
        (0, 0) => 0,
        (1, 1) => 1,
        (2, 2) => 2,
        (1, 2) => 3,
        (0, 2) => 4,
        _ => 5,
    }
}

/// Scale factors applied when folding a tensor into Voigt form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoigtScale {
    /// All factors are one (stress, stiffness).
    Unit,
    /// Factor 2 for every shear Voigt index (engineering strain, compliance).
    Engineering,
}

impl VoigtScale {
    /// Scale factor of a Voigt index tuple.
    pub fn factor(self, voigt_indices: &[usize]) -> f64 {
        match self {
            VoigtScale::Unit => 1.0,
            VoigtScale::Engineering => voigt_indices
                .iter()
                .map(|&v| if v >= 3 { 2.0 } else { 1.0 })
                .product(),
        }
    }
}

/// Dense tensor of arbitrary rank, dimension 3 per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRepr")]
pub struct Tensor {
    rank: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct TensorRepr {
    rank: usize,
    data: Vec<f64>,
}

impl TryFrom<TensorRepr> for Tensor {
    type Error = Error;

    fn try_from(repr: TensorRepr) -> Result<Self> {
        Tensor::from_data(repr.rank, repr.data)
    }
}

impl Tensor {
    pub fn zeros(rank: usize) -> Self {
        Self {
            rank,
            data: vec![0.0; DIM.pow(rank as u32)],
        }
    }

    pub fn from_data(rank: usize, data: Vec<f64>) -> Result<Self> {
        let expected = u32::try_from(rank)
            .ok()
            .and_then(|r| DIM.checked_pow(r))
            .ok_or_else(|| Error::Shape(format!("tensor rank {rank} is too large")))?;
        if data.len() != expected {
            return Err(Error::Shape(format!(
                "rank-{rank} tensor needs {expected} entries, got {}",
                data.len()
            )));
        }
        Ok(Self { rank, data })
    }

    /// Builds a tensor by evaluating `f` on every index tuple.
    pub fn from_fn(rank: usize, mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let mut tensor = Self::zeros(rank);
        let mut index = vec![0usize; rank];
        for flat in 0..tensor.data.len() {
            unflatten(flat, DIM, &mut index);
            tensor.data[flat] = f(&index);
        }
        tensor
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            rank: 0,
            data: vec![value],
        }
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self {
            rank: 1,
            data: v.iter().copied().collect(),
        }
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self::from_fn(2, |idx| m[(idx[0], idx[1])])
    }

    pub fn identity() -> Self {
        Self::from_fn(2, |idx| if idx[0] == idx[1] { 1.0 } else { 0.0 })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[flatten(index, DIM)]
    }

    pub fn set(&mut self, index: &[usize], value: f64) {
        let flat = flatten(index, DIM);
        self.data[flat] = value;
    }

    /// Value of a rank-0 tensor.
    pub fn value(&self) -> Result<f64> {
        self.expect_rank(0)?;
        Ok(self.data[0])
    }

    pub fn to_matrix(&self) -> Result<Matrix3<f64>> {
        self.expect_rank(2)?;
        Ok(Matrix3::from_row_slice(&self.data))
    }

    pub fn expect_rank(&self, expected: usize) -> Result<()> {
        if self.rank != expected {
            return Err(Error::RankMismatch {
                expected,
                found: self.rank,
            });
        }
        Ok(())
    }

    /// Unfolds a Voigt array of rank `voigt_rank` (dimension 6, row-major)
    /// into a full tensor of rank `2 * voigt_rank`.
    pub fn from_voigt(voigt_rank: usize, voigt: &[f64], scale: VoigtScale) -> Result<Self> {
        let expected = 6usize.pow(voigt_rank as u32);
        if voigt.len() != expected {
            return Err(Error::Shape(format!(
                "rank-{voigt_rank} Voigt array needs {expected} entries, got {}",
                voigt.len()
            )));
        }
        let mut vidx = vec![0usize; voigt_rank];
        Ok(Self::from_fn(2 * voigt_rank, |idx| {
            for (k, v) in vidx.iter_mut().enumerate() {
                *v = voigt_index(idx[2 * k], idx[2 * k + 1]);
            }
            voigt[flatten(&vidx, 6)] / scale.factor(&vidx)
        }))
    }

    pub fn from_voigt_matrix(voigt: &Matrix6<f64>, scale: VoigtScale) -> Self {
        let mut vidx = [0usize; 2];
        Self::from_fn(4, |idx| {
            vidx[0] = voigt_index(idx[0], idx[1]);
            vidx[1] = voigt_index(idx[2], idx[3]);
            voigt[(vidx[0], vidx[1])] / scale.factor(&vidx)
        })
    }

    /// Folds an even-rank tensor into its Voigt array (row-major, dimension 6).
    pub fn voigt(&self, scale: VoigtScale) -> Result<Vec<f64>> {
        if self.rank % 2 != 0 {
            return Err(Error::OddRank(self.rank));
        }
        let voigt_rank = self.rank / 2;
        let mut out = vec![0.0; 6usize.pow(voigt_rank as u32)];
        let mut vidx = vec![0usize; voigt_rank];
        let mut full = vec![0usize; self.rank];
        for (flat, value) in out.iter_mut().enumerate() {
            unflatten(flat, 6, &mut vidx);
            for (k, &v) in vidx.iter().enumerate() {
                let (i, j) = VOIGT_MAP[v];
                full[2 * k] = i;
                full[2 * k + 1] = j;
            }
            *value = self.get(&full) * scale.factor(&vidx);
        }
        Ok(out)
    }

    pub fn voigt_matrix(&self, scale: VoigtScale) -> Result<Matrix6<f64>> {
        self.expect_rank(4)?;
        Ok(Matrix6::from_row_slice(&self.voigt(scale)?))
    }

    /// True if swapping the two indices of any Voigt pair leaves the tensor
    /// unchanged within `tol`.
    pub fn is_voigt_symmetric(&self, tol: f64) -> bool {
        if self.rank % 2 != 0 {
            return false;
        }
        let mut index = vec![0usize; self.rank];
        let mut canonical = vec![0usize; self.rank];
        for flat in 0..self.data.len() {
            unflatten(flat, DIM, &mut index);
            for k in (0..self.rank).step_by(2) {
                canonical[k] = index[k].min(index[k + 1]);
                canonical[k + 1] = index[k].max(index[k + 1]);
            }
            if (self.data[flat] - self.get(&canonical)).abs() > tol {
                return false;
            }
        }
        true
    }

    /// Axis permutation: axis `k` of the result is axis `axes[k]` of `self`.
    pub fn transpose(&self, axes: &[usize]) -> Result<Self> {
        let mut seen = vec![false; self.rank];
        if axes.len() != self.rank {
            return Err(Error::Shape(format!(
                "transpose of a rank-{} tensor needs {} axes, got {}",
                self.rank,
                self.rank,
                axes.len()
            )));
        }
        for &a in axes {
            if a >= self.rank || seen[a] {
                return Err(Error::Shape(format!("invalid axis permutation {axes:?}")));
            }
            seen[a] = true;
        }
        let mut source = vec![0usize; self.rank];
        Ok(Self::from_fn(self.rank, |idx| {
            for (k, &a) in axes.iter().enumerate() {
                source[a] = idx[k];
            }
            self.get(&source)
        }))
    }

    /// Copy with entries of magnitude below `tol` set to zero.
    pub fn zeroed(&self, tol: f64) -> Self {
        Self {
            rank: self.rank,
            data: self
                .data
                .iter()
                .map(|&v| if v.abs() < tol { 0.0 } else { v })
                .collect(),
        }
    }

    /// Contracts the leading `other.rank()` indices of `self` with `other`.
    pub fn contract_leading(&self, other: &Tensor) -> Result<Tensor> {
        if other.rank > self.rank {
            return Err(Error::Shape(format!(
                "cannot contract rank-{} tensor into rank-{} tensor",
                other.rank, self.rank
            )));
        }
        let rest = self.rank - other.rank;
        let stride = DIM.pow(rest as u32);
        let mut out = Tensor::zeros(rest);
        for (k, &w) in other.data.iter().enumerate() {
            if w == 0.0 {
                continue;
            }
            let block = &self.data[k * stride..(k + 1) * stride];
            for (o, &v) in out.data.iter_mut().zip(block) {
                *o += w * v;
            }
        }
        Ok(out)
    }

    /// Successively contracts the leading indices with each operand in turn.
    pub fn einsum_sequence(&self, others: &[&Tensor]) -> Result<Tensor> {
        let mut current = self.clone();
        for other in others {
            current = current.contract_leading(other)?;
        }
        Ok(current)
    }

    pub fn outer(&self, other: &Tensor) -> Tensor {
        let mut data = Vec::with_capacity(self.data.len() * other.data.len());
        for &a in &self.data {
            data.extend(other.data.iter().map(|&b| a * b));
        }
        Tensor {
            rank: self.rank + other.rank,
            data,
        }
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    pub fn approx_eq(&self, other: &Tensor, tol: f64) -> bool {
        self.rank == other.rank
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// Row-major flat offset of `index` for axes of length `dim`.
pub(crate) fn flatten(index: &[usize], dim: usize) -> usize {
    index.iter().fold(0, |acc, &i| acc * dim + i)
}

/// Inverse of [`flatten`]; writes into `index`, whose length fixes the rank.
pub(crate) fn unflatten(mut flat: usize, dim: usize, index: &mut [usize]) {
    for slot in index.iter_mut().rev() {
        *slot = flat % dim;
        flat /= dim;
    }
}

// Elementwise arithmetic. Panics if ranks differ.

impl Add<&Tensor> for &Tensor {
    type Output = Tensor;
    fn add(self, rhs: &Tensor) -> Tensor {
        assert_eq!(self.rank, rhs.rank, "tensor rank mismatch in addition");
        Tensor {
            rank: self.rank,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
        }
    }
}

impl Sub<&Tensor> for &Tensor {
    type Output = Tensor;
    fn sub(self, rhs: &Tensor) -> Tensor {
        assert_eq!(self.rank, rhs.rank, "tensor rank mismatch in subtraction");
        Tensor {
            rank: self.rank,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
        }
    }
}

impl Mul<f64> for &Tensor {
    type Output = Tensor;
    fn mul(self, rhs: f64) -> Tensor {
        Tensor {
            rank: self.rank,
            data: self.data.iter().map(|v| v * rhs).collect(),
        }
    }
}

impl Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_voigt() -> Matrix6<f64> {
        Matrix6::from_fn(|i, j| {
            let (a, b) = (i.min(j) as f64, i.max(j) as f64);
            10.0 * a + b + 1.0
        })
    }

    #[test]
    fn deserialization_checks_data_length() {
        let tensor: Tensor =
            serde_json::from_str(r#"{"rank":1,"data":[1.0,2.0,3.0]}"#).expect("valid payload");
        assert_eq!(tensor.get(&[2]), 3.0);

        let err = serde_json::from_str::<Tensor>(r#"{"rank":4,"data":[1.0,0.0,0.0]}"#)
            .expect_err("short data");
        assert!(err.to_string().contains("rank-4 tensor needs 81 entries"), "{err}");
        assert!(serde_json::from_str::<Tensor>(r#"{"rank":99,"data":[]}"#).is_err());
    }

    #[test]
    fn voigt_round_trip_preserves_matrix() {
        let voigt = sample_voigt();
        let tensor = Tensor::from_voigt_matrix(&voigt, VoigtScale::Unit);
        let back = tensor.voigt_matrix(VoigtScale::Unit).expect("rank 4");
        assert!((back - voigt).abs().max() < 1e-14);
        assert!(tensor.is_voigt_symmetric(1e-12));
    }

    #[test]
    fn engineering_scale_divides_shear_entries() {
        let voigt = Matrix6::from_element(4.0);
        let tensor = Tensor::from_voigt_matrix(&voigt, VoigtScale::Engineering);
        assert_eq!(tensor.get(&[0, 0, 0, 0]), 4.0);
        assert_eq!(tensor.get(&[0, 0, 1, 2]), 2.0);
        assert_eq!(tensor.get(&[0, 1, 1, 2]), 1.0);
    }

    #[test]
    fn generic_from_voigt_matches_matrix_variant() {
        let voigt = sample_voigt();
        let flat: Vec<f64> = (0..36).map(|k| voigt[(k / 6, k % 6)]).collect();
        let a = Tensor::from_voigt(2, &flat, VoigtScale::Unit).expect("shape");
        let b = Tensor::from_voigt_matrix(&voigt, VoigtScale::Unit);
        assert!(a.approx_eq(&b, 0.0));
    }

    #[test]
    fn asymmetric_tensor_is_detected() {
        let mut tensor = Tensor::from_voigt_matrix(&sample_voigt(), VoigtScale::Unit);
        tensor.set(&[0, 1, 0, 0], 100.0);
        assert!(!tensor.is_voigt_symmetric(1e-4));
    }

    #[test]
    fn transpose_swaps_axes() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let t = Tensor::from_matrix(&m).transpose(&[1, 0]).expect("perm");
        assert_eq!(t.to_matrix().expect("rank 2"), m.transpose());
        assert!(Tensor::from_matrix(&m).transpose(&[0, 0]).is_err());
    }

    #[test]
    fn einsum_sequence_contracts_leading_indices() {
        let c = Tensor::from_voigt_matrix(&sample_voigt(), VoigtScale::Unit);
        let n = Tensor::from_vector(&Vector3::new(1.0, 0.0, 0.0));
        let value = c.einsum_sequence(&[&n, &n, &n, &n]).expect("contract");
        assert_eq!(value.rank(), 0);
        assert_eq!(value.value().expect("scalar"), c.get(&[0, 0, 0, 0]));

        let strain = Tensor::identity();
        let stress = c.einsum_sequence(&[&strain]).expect("contract");
        let expected: f64 = (0..3).map(|k| c.get(&[k, k, 0, 1])).sum();
        assert!((stress.get(&[0, 1]) - expected).abs() < 1e-12);
    }

    #[test]
    fn voigt_rejects_odd_rank() {
        let t = Tensor::zeros(3);
        assert!(matches!(t.voigt(VoigtScale::Unit), Err(Error::OddRank(3))));
    }
}
