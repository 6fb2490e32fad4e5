//! Conversions from flat JS arrays into core samples, structures and directions.

use elastic_core::{CrystalStructure, Strain, Stress};
use nalgebra::{Matrix3, Matrix6, Vector3};

/// Splits a flat array into per-sample chunks of 6 (Voigt) or 9 (row-major
/// matrix) components.
fn chunks(values: &[f64], width: usize, what: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    if width != 6 && width != 9 {
        anyhow::bail!("{what} width must be 6 (Voigt) or 9 (matrix), got {width}.");
    }
    if values.is_empty() || values.len() % width != 0 {
        anyhow::bail!(
            "{what} array length {} is not a positive multiple of {width}.",
            values.len()
        );
    }
    Ok(values.chunks(width).map(|c| c.to_vec()).collect())
}

pub(crate) fn parse_strains(values: &[f64], width: usize) -> anyhow::Result<Vec<Strain>> {
    chunks(values, width, "Strain")?
        .iter()
        .map(|c| Ok(Strain::from_components(c)?))
        .collect()
}

pub(crate) fn parse_stresses(values: &[f64], width: usize) -> anyhow::Result<Vec<Stress>> {
    chunks(values, width, "Stress")?
        .iter()
        .map(|c| Ok(Stress::from_components(c)?))
        .collect()
}

/// Pairs strain and stress arrays of the same sample count.
pub(crate) fn parse_pairs(
    strains: &[f64],
    stresses: &[f64],
    width: usize,
) -> anyhow::Result<(Vec<Strain>, Vec<Stress>)> {
    let strains = parse_strains(strains, width)?;
    let stresses = parse_stresses(stresses, width)?;
    if strains.len() != stresses.len() {
        anyhow::bail!(
            "Sample count mismatch: {} strains, {} stresses.",
            strains.len(),
            stresses.len()
        );
    }
    Ok((strains, stresses))
}

pub(crate) fn parse_direction(values: &[f64]) -> anyhow::Result<Vector3<f64>> {
    if values.len() != 3 {
        anyhow::bail!("Direction must have 3 components, got {}.", values.len());
    }
    Ok(Vector3::new(values[0], values[1], values[2]))
}

/// Lattice given as 9 row-major entries (rows are lattice vectors, Å).
pub(crate) fn parse_structure(
    lattice: &[f64],
    site_masses: Vec<f64>,
) -> anyhow::Result<CrystalStructure> {
    if lattice.len() != 9 {
        anyhow::bail!("Lattice must have 9 entries, got {}.", lattice.len());
    }
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        row.copy_from_slice(&lattice[3 * r..3 * r + 3]);
    }
    Ok(CrystalStructure::new(rows, site_masses)?)
}

pub(crate) fn parse_voigt_matrix(values: &[f64]) -> anyhow::Result<Matrix6<f64>> {
    if values.len() != 36 {
        anyhow::bail!("Voigt matrix must have 36 entries, got {}.", values.len());
    }
    Ok(Matrix6::from_row_slice(values))
}

pub(crate) fn matrix6_row_major(m: &Matrix6<f64>) -> Vec<f64> {
    m.transpose().as_slice().to_vec()
}

pub(crate) fn matrix3_row_major(m: &Matrix3<f64>) -> Vec<f64> {
    m.transpose().as_slice().to_vec()
}
