//! Physical constants and unit conversion factors (SI unless noted).

/// eV/Å³ to GPa.
pub const EV_PER_ANG3_TO_GPA: f64 = 160.217_663_4;

/// GPa to eV/Å³.
pub const GPA_TO_EV_PER_ANG3: f64 = 1.0 / EV_PER_ANG3_TO_GPA;

/// Atomic mass unit in kg.
pub const AMU_KG: f64 = 1.660_54e-27;

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380_65e-23;

/// Reduced Planck constant in J s.
pub const HBAR: f64 = 1.054_57e-34;

/// Avogadro constant in 1/mol.
pub const AVOGADRO: f64 = 6.022e23;

/// Molar gas constant in J/(mol K).
pub const GAS_CONSTANT: f64 = 8.314;

/// Å³ to m³.
pub const ANG3_TO_M3: f64 = 1e-30;
