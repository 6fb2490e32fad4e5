//! A plain structure description implementing [`Structure`].

use crate::error::{Error, Result};
use crate::traits::Structure;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Minimal crystal structure: lattice rows plus per-site atomic masses.
///
/// Every site is treated as fully occupied, so the atom count equals the site
/// count and the composition weight is the sum of the site masses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalStructure {
    pub lattice: [[f64; 3]; 3],
    pub site_masses: Vec<f64>,
}

impl CrystalStructure {
    pub fn new(lattice: [[f64; 3]; 3], site_masses: Vec<f64>) -> Result<Self> {
        if site_masses.is_empty() {
            return Err(Error::InvalidInput(
                "structure must contain at least one site".to_string(),
            ));
        }
        if site_masses.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(Error::InvalidInput(
                "site masses must be positive and finite".to_string(),
            ));
        }
        let structure = Self {
            lattice,
            site_masses,
        };
        if structure.volume() <= 0.0 {
            return Err(Error::InvalidInput(
                "lattice must be right-handed with positive volume".to_string(),
            ));
        }
        Ok(structure)
    }

    /// Simple cubic cell of edge `a` (Å).
    pub fn cubic(a: f64, site_masses: Vec<f64>) -> Result<Self> {
        Self::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]], site_masses)
    }
}

impl Structure for CrystalStructure {
    fn num_sites(&self) -> usize {
        self.site_masses.len()
    }

    fn num_atoms(&self) -> f64 {
        self.site_masses.len() as f64
    }

    fn composition_weight(&self) -> f64 {
        self.site_masses.iter().sum()
    }

    fn species_masses(&self) -> Vec<f64> {
        self.site_masses.clone()
    }

    fn volume(&self) -> f64 {
        self.lattice_matrix().determinant()
    }

    fn lattice_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|i, j| self.lattice[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_rows_are_lattice_vectors() {
        let lattice = [[3.0, 0.0, 0.0], [1.0, 2.0, 0.0], [0.5, 0.25, 4.0]];
        let structure = CrystalStructure::new(lattice, vec![12.0]).expect("structure");
        let m = structure.lattice_matrix();
        assert_eq!(m[(1, 0)], 1.0);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(2, 1)], 0.25);
        assert!((structure.volume() - 24.0).abs() < 1e-12);
    }

    #[test]
    fn cubic_cell_reports_volume_and_weight() {
        let structure = CrystalStructure::cubic(2.0, vec![28.0855, 28.0855]).expect("structure");
        assert!((structure.volume() - 8.0).abs() < 1e-12);
        assert_eq!(structure.num_sites(), 2);
        assert!((structure.composition_weight() - 56.171).abs() < 1e-12);
    }

    #[test]
    fn rejects_empty_and_left_handed_cells() {
        assert!(CrystalStructure::cubic(2.0, vec![]).is_err());
        let flipped = [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(CrystalStructure::new(flipped, vec![1.0]).is_err());
    }
}
