//! Seams between the property layer and structure descriptions.

use nalgebra::Matrix3;

/// Read-only description of a crystal structure.
///
/// Property evaluators only need counts, masses and the cell geometry, so any
/// structure representation can be plugged in by implementing this trait.
pub trait Structure {
    /// Number of sites in the unit cell.
    fn num_sites(&self) -> usize;

    /// Total number of atoms of the composition (may be fractional for
    /// partially occupied sites).
    fn num_atoms(&self) -> f64;

    /// Total composition weight in atomic mass units.
    fn composition_weight(&self) -> f64;

    /// Atomic mass (amu) of the species on each site, in site order.
    fn species_masses(&self) -> Vec<f64>;

    /// Unit-cell volume in Å³.
    fn volume(&self) -> f64;

    /// Lattice vectors as matrix rows, in Å.
    fn lattice_matrix(&self) -> Matrix3<f64>;
}
