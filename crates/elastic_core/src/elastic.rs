//! Elastic tensors of arbitrary order and the second-order property layer.
//!
//! Moduli are returned in the units of the tensor (GPa for fitted DFT
//! data). Structure-dependent properties assume GPa and return SI values.

use crate::einsum::einsum;
use crate::error::{Error, Result};
use crate::finite_diff::factorial;
use crate::fitting::{diff_fit, fit_independent_strains, fit_pseudoinverse};
use crate::strain::{Strain, Stress};
use crate::tensor::{Tensor, VoigtScale, VOIGT_MAP};
use crate::traits::Structure;
use crate::units::{
    AMU_KG, ANG3_TO_M3, BOLTZMANN, EV_PER_ANG3_TO_GPA, GPA_TO_EV_PER_ANG3, HBAR,
};
use log::warn;
use nalgebra::{Matrix3, Matrix6, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Tolerance of the Voigt-symmetry check performed on construction.
pub const SYMMETRY_TOL: f64 = 1e-4;

/// Default orthogonality tolerance for [`ElasticTensor::directional_poisson_ratio`].
pub const ORTHOGONALITY_TOL: f64 = 1e-8;

fn check_voigt_symmetry(tensor: &Tensor) {
    if !tensor.is_voigt_symmetric(SYMMETRY_TOL) {
        warn!("input elastic tensor does not satisfy standard Voigt symmetries");
    }
}

pub(crate) fn unit_vector(v: &Vector3<f64>) -> Result<Vector3<f64>> {
    let norm = v.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::InvalidInput(format!("direction {v:?} cannot be normalized")));
    }
    Ok(v / norm)
}

/// Serialized form shared by the single-tensor wrappers; deserialization goes
/// back through their constructors.
#[derive(Deserialize)]
struct TensorField {
    tensor: Tensor,
}

/// Elastic tensor of order `k`: rank `2k`, index pairs symmetric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorField")]
pub struct NthOrderElasticTensor {
    tensor: Tensor,
}

impl NthOrderElasticTensor {
    pub fn new(tensor: Tensor) -> Result<Self> {
        if tensor.rank() % 2 != 0 {
            return Err(Error::OddRank(tensor.rank()));
        }
        if tensor.rank() < 4 {
            return Err(Error::RankMismatch {
                expected: 4,
                found: tensor.rank(),
            });
        }
        check_voigt_symmetry(&tensor);
        Ok(Self { tensor })
    }

    /// From a row-major Voigt array with `6^order` entries.
    pub fn from_voigt(order: usize, voigt: &[f64]) -> Result<Self> {
        Self::new(Tensor::from_voigt(order, voigt, VoigtScale::Unit)?)
    }

    /// The order-`order` member of [`diff_fit`].
    pub fn from_diff_fit(
        strains: &[Strain],
        stresses: &[Stress],
        eq_stress: Option<&Stress>,
        order: usize,
        tol: f64,
    ) -> Result<Self> {
        let mut tensors = diff_fit(strains, stresses, eq_stress, order, tol)?;
        match tensors.pop() {
            Some(tensor) => Self::new(tensor),
            None => Err(Error::InvalidInput(format!("no tensor of order {order} was fitted"))),
        }
    }

    pub fn order(&self) -> usize {
        self.tensor.rank() / 2
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    pub fn voigt(&self) -> Result<Vec<f64>> {
        self.tensor.voigt(VoigtScale::Unit)
    }

    /// This tensor's contribution to the stress at `strain`:
    /// `C . strain^(k-1) / (k-1)!`.
    pub fn calculate_stress(&self, strain: &Strain) -> Result<Stress> {
        let s = strain.to_tensor();
        let operands = vec![&s; self.order() - 1];
        let contracted = self.tensor.einsum_sequence(&operands)?;
        Stress::from_tensor(&(&contracted * (1.0 / factorial(self.order() - 1))))
    }

    /// Elastic energy density `stress : strain / k`, optionally converted
    /// from GPa to eV/Å³.
    pub fn energy_density(&self, strain: &Strain, convert_gpa_to_ev: bool) -> Result<f64> {
        let stress = self.calculate_stress(strain)?;
        let mut density = stress.matrix().component_mul(strain.matrix()).sum() / self.order() as f64;
        if convert_gpa_to_ev {
            density *= GPA_TO_EV_PER_ANG3;
        }
        Ok(density)
    }
}

/// Fourth-rank compliance tensor. Voigt folding doubles every shear index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorField")]
pub struct ComplianceTensor {
    tensor: Tensor,
}

impl ComplianceTensor {
    pub fn from_voigt_matrix(voigt: &Matrix6<f64>) -> Self {
        Self {
            tensor: Tensor::from_voigt_matrix(voigt, VoigtScale::Engineering),
        }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn voigt_matrix(&self) -> Result<Matrix6<f64>> {
        self.tensor.voigt_matrix(VoigtScale::Engineering)
    }
}

/// Second-order elastic (stiffness) tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorField")]
pub struct ElasticTensor {
    tensor: Tensor,
}

/// Properties that need only the tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticProperties {
    pub k_voigt: f64,
    pub k_reuss: f64,
    pub k_vrh: f64,
    pub g_voigt: f64,
    pub g_reuss: f64,
    pub g_vrh: f64,
    pub universal_anisotropy: f64,
    pub homogeneous_poisson: f64,
    pub y_mod: f64,
}

/// Properties that need a structure and a physically valid tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureProperty {
    TransV,
    LongV,
    SnyderAc,
    SnyderOpt,
    SnyderTotal,
    ClarkeThermalcond,
    CahillThermalcond,
    AgneDiffusiveThermalcond,
    DebyeTemperature,
}

impl StructureProperty {
    pub const ALL: [StructureProperty; 9] = [
        StructureProperty::TransV,
        StructureProperty::LongV,
        StructureProperty::SnyderAc,
        StructureProperty::SnyderOpt,
        StructureProperty::SnyderTotal,
        StructureProperty::ClarkeThermalcond,
        StructureProperty::CahillThermalcond,
        StructureProperty::AgneDiffusiveThermalcond,
        StructureProperty::DebyeTemperature,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StructureProperty::TransV => "trans_v",
            StructureProperty::LongV => "long_v",
            StructureProperty::SnyderAc => "snyder_ac",
            StructureProperty::SnyderOpt => "snyder_opt",
            StructureProperty::SnyderTotal => "snyder_total",
            StructureProperty::ClarkeThermalcond => "clarke_thermalcond",
            StructureProperty::CahillThermalcond => "cahill_thermalcond",
            StructureProperty::AgneDiffusiveThermalcond => "agne_diffusive_thermalcond",
            StructureProperty::DebyeTemperature => "debye_temperature",
        }
    }
}

/// Structure-dependent properties; `None` where evaluation was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePropertyDict {
    pub values: Vec<(StructureProperty, Option<f64>)>,
    pub base: Option<ElasticProperties>,
}

impl StructurePropertyDict {
    pub fn get(&self, prop: StructureProperty) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| *p == prop)
            .and_then(|(_, v)| *v)
    }
}

/// Per-structure quantities shared by the structure-dependent evaluators.
struct Cell {
    n_sites: f64,
    /// Sites per m^3.
    site_density: f64,
    /// kg/m^3.
    mass_density: f64,
    /// Mean atomic mass in kg.
    avg_mass: f64,
}

impl Cell {
    fn of(structure: &dyn Structure) -> Self {
        let n_sites = structure.num_sites() as f64;
        let n_atoms = structure.num_atoms();
        let volume = structure.volume();
        let total_mass: f64 = structure.species_masses().iter().sum();
        Self {
            n_sites,
            site_density: n_sites / (volume * ANG3_TO_M3),
            mass_density: AMU_KG / ANG3_TO_M3 * n_sites * structure.composition_weight()
                / (n_atoms * volume),
            avg_mass: AMU_KG * total_mass / n_atoms,
        }
    }
}

impl ElasticTensor {
    pub fn new(tensor: Tensor) -> Result<Self> {
        tensor.expect_rank(4)?;
        check_voigt_symmetry(&tensor);
        Ok(Self { tensor })
    }

    pub fn from_voigt_matrix(voigt: &Matrix6<f64>) -> Result<Self> {
        Self::new(Tensor::from_voigt_matrix(voigt, VoigtScale::Unit))
    }

    /// Second-order tensor fitted by finite differences.
    pub fn from_diff_fit(
        strains: &[Strain],
        stresses: &[Stress],
        eq_stress: Option<&Stress>,
        tol: f64,
    ) -> Result<Self> {
        Self::new(NthOrderElasticTensor::from_diff_fit(strains, stresses, eq_stress, 2, tol)?.into_tensor())
    }

    /// Fit from the six single-component strain states, see
    /// [`fit_independent_strains`].
    pub fn from_independent_strains(
        strains: &[Strain],
        stresses: &[Stress],
        eq_stress: Option<&Stress>,
        vasp: bool,
        tol: f64,
    ) -> Result<Self> {
        Self::new(fit_independent_strains(strains, stresses, eq_stress, vasp, tol)?)
    }

    /// Least-squares fit over all samples, see [`fit_pseudoinverse`].
    pub fn from_pseudoinverse(strains: &[Strain], stresses: &[Stress]) -> Result<Self> {
        Self::new(fit_pseudoinverse(strains, stresses)?)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn voigt(&self) -> Matrix6<f64> {
        // rank is checked on construction
        Matrix6::from_fn(|i, j| {
            let (a, b) = VOIGT_MAP[i];
            let (c, d) = VOIGT_MAP[j];
            self.tensor.get(&[a, b, c, d])
        })
    }

    pub fn as_nth_order(&self) -> NthOrderElasticTensor {
        NthOrderElasticTensor {
            tensor: self.tensor.clone(),
        }
    }

    pub fn compliance_tensor(&self) -> Result<ComplianceTensor> {
        let s = self.voigt().try_inverse().ok_or_else(|| {
            Error::SingularMatrix("Voigt elastic tensor is not invertible".to_string())
        })?;
        Ok(ComplianceTensor::from_voigt_matrix(&s))
    }

    fn compliance_voigt(&self) -> Result<Matrix6<f64>> {
        self.compliance_tensor()?.voigt_matrix()
    }

    pub fn k_voigt(&self) -> f64 {
        self.voigt().fixed_view::<3, 3>(0, 0).mean()
    }

    pub fn g_voigt(&self) -> f64 {
        let c = self.voigt();
        let normal = c.fixed_view::<3, 3>(0, 0);
        let shear = c.fixed_view::<3, 3>(3, 3);
        (2.0 * normal.trace() - normal.upper_triangle().sum() + 3.0 * shear.trace()) / 15.0
    }

    pub fn k_reuss(&self) -> Result<f64> {
        Ok(1.0 / self.compliance_voigt()?.fixed_view::<3, 3>(0, 0).sum())
    }

    pub fn g_reuss(&self) -> Result<f64> {
        let s = self.compliance_voigt()?;
        let normal = s.fixed_view::<3, 3>(0, 0);
        let shear = s.fixed_view::<3, 3>(3, 3);
        Ok(15.0 / (8.0 * normal.trace() - 4.0 * normal.upper_triangle().sum() + 3.0 * shear.trace()))
    }

    pub fn k_vrh(&self) -> Result<f64> {
        Ok(0.5 * (self.k_voigt() + self.k_reuss()?))
    }

    pub fn g_vrh(&self) -> Result<f64> {
        Ok(0.5 * (self.g_voigt() + self.g_reuss()?))
    }

    /// Young's modulus from the Hill averages, in SI units.
    pub fn y_mod(&self) -> Result<f64> {
        let k = self.k_vrh()?;
        let g = self.g_vrh()?;
        Ok(9.0e9 * k * g * EV_PER_ANG3_TO_GPA / (3.0 * k + g))
    }

    /// Poisson ratio for stress along `n` and lateral strain along `m`.
    pub fn directional_poisson_ratio(&self, n: &Vector3<f64>, m: &Vector3<f64>, tol: f64) -> Result<f64> {
        let n = unit_vector(n)?;
        let m = unit_vector(m)?;
        let overlap = n.dot(&m);
        if overlap.abs() >= tol {
            return Err(Error::NotOrthogonal(overlap.abs()));
        }
        let s = self.compliance_tensor()?;
        let nt = Tensor::from_vector(&n);
        let mt = Tensor::from_vector(&m);
        let cross = s.tensor().einsum_sequence(&[&nt, &nt, &mt, &mt])?.value()?;
        let axial = s.tensor().einsum_sequence(&[&nt, &nt, &nt, &nt])?.value()?;
        Ok(-cross / axial)
    }

    pub fn directional_elastic_mod(&self, n: &Vector3<f64>) -> Result<f64> {
        let n = Tensor::from_vector(&unit_vector(n)?);
        self.tensor.einsum_sequence(&[&n, &n, &n, &n])?.value()
    }

    pub fn universal_anisotropy(&self) -> Result<f64> {
        Ok(5.0 * self.g_voigt() / self.g_reuss()? + self.k_voigt() / self.k_reuss()? - 6.0)
    }

    pub fn homogeneous_poisson(&self) -> Result<f64> {
        let ratio = self.g_vrh()? / self.k_vrh()?;
        Ok((1.0 - 2.0 / 3.0 * ratio) / (2.0 + 2.0 / 3.0 * ratio))
    }

    /// Christoffel matrix `C_ijkl u_i u_l`, indexed `(j, k)`.
    pub fn green_kristoffel(&self, u: &Vector3<f64>) -> Result<Matrix3<f64>> {
        let ut = Tensor::from_vector(u);
        einsum("ijkl,i,l", &[&self.tensor, &ut, &ut])?.to_matrix()
    }

    pub fn property_dict(&self) -> Result<ElasticProperties> {
        Ok(ElasticProperties {
            k_voigt: self.k_voigt(),
            k_reuss: self.k_reuss()?,
            k_vrh: self.k_vrh()?,
            g_voigt: self.g_voigt(),
            g_reuss: self.g_reuss()?,
            g_vrh: self.g_vrh()?,
            universal_anisotropy: self.universal_anisotropy()?,
            homogeneous_poisson: self.homogeneous_poisson()?,
            y_mod: self.y_mod()?,
        })
    }

    /// Fails with [`Error::Unphysical`] if either Hill modulus is negative.
    pub fn raise_if_unphysical(&self) -> Result<()> {
        let k_vrh = self.k_vrh()?;
        let g_vrh = self.g_vrh()?;
        if k_vrh < 0.0 || g_vrh < 0.0 {
            return Err(Error::Unphysical { k_vrh, g_vrh });
        }
        Ok(())
    }

    /// Transverse sound velocity (m/s).
    pub fn trans_v(&self, structure: &dyn Structure) -> Result<f64> {
        self.raise_if_unphysical()?;
        let cell = Cell::of(structure);
        Ok((1e9 * self.g_vrh()? / cell.mass_density).sqrt())
    }

    /// Longitudinal sound velocity (m/s).
    pub fn long_v(&self, structure: &dyn Structure) -> Result<f64> {
        self.raise_if_unphysical()?;
        let cell = Cell::of(structure);
        Ok((1e9 * (self.k_vrh()? + 4.0 / 3.0 * self.g_vrh()?) / cell.mass_density).sqrt())
    }

    fn mean_velocity(&self, structure: &dyn Structure) -> Result<f64> {
        Ok((self.long_v(structure)? + 2.0 * self.trans_v(structure)?) / 3.0)
    }

    pub fn snyder_ac(&self, structure: &dyn Structure) -> Result<f64> {
        let v = self.mean_velocity(structure)?;
        let cell = Cell::of(structure);
        Ok(0.38483 * cell.avg_mass * v.powi(3)
            / (300.0 * cell.site_density.powf(-2.0 / 3.0) * cell.n_sites.cbrt()))
    }

    pub fn snyder_opt(&self, structure: &dyn Structure) -> Result<f64> {
        let v = self.mean_velocity(structure)?;
        let cell = Cell::of(structure);
        Ok(1.66914e-23 * v / cell.site_density.powf(-2.0 / 3.0)
            * (1.0 - cell.n_sites.powf(-1.0 / 3.0)))
    }

    pub fn snyder_total(&self, structure: &dyn Structure) -> Result<f64> {
        Ok(self.snyder_ac(structure)? + self.snyder_opt(structure)?)
    }

    pub fn clarke_thermalcond(&self, structure: &dyn Structure) -> Result<f64> {
        self.raise_if_unphysical()?;
        let cell = Cell::of(structure);
        Ok(0.87
            * BOLTZMANN
            * cell.avg_mass.powf(-2.0 / 3.0)
            * cell.mass_density.powf(1.0 / 6.0)
            * self.y_mod()?.sqrt())
    }

    pub fn cahill_thermalcond(&self, structure: &dyn Structure) -> Result<f64> {
        let v = self.long_v(structure)? + 2.0 * self.trans_v(structure)?;
        let cell = Cell::of(structure);
        Ok(BOLTZMANN / 2.48 * cell.site_density.powf(2.0 / 3.0) * v)
    }

    /// Diffusion-mediated minimum thermal conductivity (Agne, Hanus and
    /// Snyder, Energy Environ. Sci. 11, 609 (2018)).
    pub fn agne_diffusive_thermalcond(&self, structure: &dyn Structure) -> Result<f64> {
        let v = self.mean_velocity(structure)?;
        let cell = Cell::of(structure);
        Ok(0.76 * cell.site_density.powf(2.0 / 3.0) * BOLTZMANN * v)
    }

    /// Debye temperature (K) from the mean sound velocity.
    pub fn debye_temperature(&self, structure: &dyn Structure) -> Result<f64> {
        let vl = self.long_v(structure)?;
        let vt = self.trans_v(structure)?;
        let v0 = structure.volume() * ANG3_TO_M3 / structure.num_sites() as f64;
        let vm = 3f64.cbrt() * (1.0 / vl.powi(3) + 2.0 / vt.powi(3)).powf(-1.0 / 3.0);
        Ok(HBAR / BOLTZMANN * vm * (6.0 * PI * PI / v0).cbrt())
    }

    /// Evaluates `prop`; with `ignore_errors` an unphysical tensor gives
    /// `Ok(None)` instead of an error.
    pub fn evaluate(
        &self,
        prop: StructureProperty,
        structure: &dyn Structure,
        ignore_errors: bool,
    ) -> Result<Option<f64>> {
        let value = match prop {
            StructureProperty::TransV => self.trans_v(structure),
            StructureProperty::LongV => self.long_v(structure),
            StructureProperty::SnyderAc => self.snyder_ac(structure),
            StructureProperty::SnyderOpt => self.snyder_opt(structure),
            StructureProperty::SnyderTotal => self.snyder_total(structure),
            StructureProperty::ClarkeThermalcond => self.clarke_thermalcond(structure),
            StructureProperty::CahillThermalcond => self.cahill_thermalcond(structure),
            StructureProperty::AgneDiffusiveThermalcond => self.agne_diffusive_thermalcond(structure),
            StructureProperty::DebyeTemperature => self.debye_temperature(structure),
        };
        match value {
            Ok(v) => Ok(Some(v)),
            Err(e) if ignore_errors && e.is_unphysical() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_structure_property_dict(
        &self,
        structure: &dyn Structure,
        include_base_props: bool,
        ignore_errors: bool,
    ) -> Result<StructurePropertyDict> {
        let values = StructureProperty::ALL
            .iter()
            .map(|&p| Ok((p, self.evaluate(p, structure, ignore_errors)?)))
            .collect::<Result<Vec<_>>>()?;
        let base = if include_base_props {
            Some(self.property_dict()?)
        } else {
            None
        };
        Ok(StructurePropertyDict { values, base })
    }
}

impl From<ElasticTensor> for NthOrderElasticTensor {
    fn from(value: ElasticTensor) -> Self {
        NthOrderElasticTensor {
            tensor: value.tensor,
        }
    }
}

impl TryFrom<NthOrderElasticTensor> for ElasticTensor {
    type Error = Error;

    fn try_from(value: NthOrderElasticTensor) -> Result<Self> {
        Self::new(value.tensor)
    }
}

impl TryFrom<TensorField> for NthOrderElasticTensor {
    type Error = Error;

    fn try_from(field: TensorField) -> Result<Self> {
        Self::new(field.tensor)
    }
}

impl TryFrom<TensorField> for ElasticTensor {
    type Error = Error;

    fn try_from(field: TensorField) -> Result<Self> {
        Self::new(field.tensor)
    }
}

impl TryFrom<TensorField> for ComplianceTensor {
    type Error = Error;

    fn try_from(field: TensorField) -> Result<Self> {
        field.tensor.expect_rank(4)?;
        Ok(Self {
            tensor: field.tensor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::CrystalStructure;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn isotropic(lambda: f64, mu: f64) -> ElasticTensor {
        let mut c = Matrix6::zeros();
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = lambda;
            }
            c[(i, i)] = lambda + 2.0 * mu;
            c[(i + 3, i + 3)] = mu;
        }
        ElasticTensor::from_voigt_matrix(&c).expect("rank 4")
    }

    fn copper_like() -> CrystalStructure {
        CrystalStructure::cubic(3.61, vec![63.546; 4]).expect("structure")
    }

    #[test]
    fn isotropic_moduli_agree_between_bounds() {
        let c = isotropic(100.0, 50.0);
        let props = c.property_dict().expect("props");
        assert!((props.k_voigt - 400.0 / 3.0).abs() < 1e-9);
        assert!((props.k_reuss - 400.0 / 3.0).abs() < 1e-9);
        assert!((props.g_voigt - 50.0).abs() < 1e-9);
        assert!((props.g_reuss - 50.0).abs() < 1e-9);
        assert!(props.universal_anisotropy.abs() < 1e-9);
        assert!((props.homogeneous_poisson - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn directional_poisson_ratio_on_isotropic_tensor() {
        let c = isotropic(100.0, 50.0);
        let n = Vector3::new(1.0, 1.0, 0.0);
        let m = Vector3::new(0.0, 0.0, 2.0);
        let nu = c.directional_poisson_ratio(&n, &m, ORTHOGONALITY_TOL).expect("orthogonal");
        assert!((nu - 1.0 / 3.0).abs() < 1e-6);

        let e = c.directional_elastic_mod(&Vector3::new(0.0, 3.0, 0.0)).expect("modulus");
        assert!((e - 200.0).abs() < 1e-9);
    }

    #[test]
    fn non_orthogonal_directions_are_rejected() {
        let c = isotropic(100.0, 50.0);
        let n = Vector3::new(1.0, 0.0, 0.0);
        let m = Vector3::new(1.0, 1.0, 0.0);
        assert_err_contains(
            c.directional_poisson_ratio(&n, &m, ORTHOGONALITY_TOL),
            "must be orthogonal",
        );
    }

    #[test]
    fn compliance_inverts_stiffness() {
        let c = isotropic(120.0, 40.0);
        let s = c.compliance_tensor().expect("compliance");
        let product = c.voigt() * s.voigt_matrix().expect("voigt");
        assert!((product - Matrix6::identity()).abs().max() < 1e-12);
        // Full tensor contraction is the symmetric identity on strains.
        let strain = Strain::from_voigt([0.01, -0.002, 0.0, 0.004, 0.0, 0.001]);
        let stress = c.as_nth_order().calculate_stress(&strain).expect("stress");
        let back = s.tensor().contract_leading(&stress.to_tensor()).expect("strain");
        assert!(back.approx_eq(&strain.to_tensor(), 1e-12));
    }

    #[test]
    fn sound_velocities_and_debye_temperature() {
        let c = isotropic(100.0, 50.0);
        let structure = copper_like();
        let vt = c.trans_v(&structure).expect("vt");
        let vl = c.long_v(&structure).expect("vl");
        let density = AMU_KG / ANG3_TO_M3 * 4.0 * 63.546 * 4.0 / (4.0 * 3.61f64.powi(3));
        assert!((vt - (50e9 / density).sqrt()).abs() < 1e-6);
        assert!((vl - ((400.0 / 3.0 + 200.0 / 3.0) * 1e9 / density).sqrt()).abs() < 1e-6);
        assert!(vl > vt);
        let theta = c.debye_temperature(&structure).expect("debye");
        assert!(theta > 100.0 && theta < 1000.0, "debye temperature {theta}");
        let total = c.snyder_total(&structure).expect("total");
        let parts = c.snyder_ac(&structure).expect("ac") + c.snyder_opt(&structure).expect("opt");
        assert!((total - parts).abs() <= 1e-12 * total.abs());
    }

    #[test]
    fn unphysical_tensor_guards_structure_properties() {
        let c = isotropic(100.0, -20.0);
        let structure = copper_like();
        assert!(c.g_vrh().expect("g") < 0.0);
        let err = c.trans_v(&structure).expect_err("unphysical");
        assert!(err.is_unphysical());
        assert_eq!(
            c.evaluate(StructureProperty::TransV, &structure, true).expect("ignored"),
            None
        );

        let dict = c.get_structure_property_dict(&structure, true, true).expect("dict");
        assert!(dict.values.iter().all(|(_, v)| v.is_none()));
        assert!(dict.base.is_some());
        assert!(c.get_structure_property_dict(&structure, false, false).is_err());

        // Properties that do not depend on the modulus signs still evaluate.
        assert!(c.directional_elastic_mod(&Vector3::x()).is_ok());
    }

    #[test]
    fn structure_property_dict_is_complete() {
        let c = isotropic(100.0, 50.0);
        let dict = c
            .get_structure_property_dict(&copper_like(), false, false)
            .expect("dict");
        assert_eq!(dict.values.len(), StructureProperty::ALL.len());
        assert!(dict.base.is_none());
        let vt = dict.get(StructureProperty::TransV).expect("trans_v");
        assert!(vt > 0.0);
        assert_eq!(StructureProperty::CahillThermalcond.name(), "cahill_thermalcond");
    }

    #[test]
    fn odd_rank_is_rejected() {
        let err = NthOrderElasticTensor::new(Tensor::zeros(3)).expect_err("odd");
        assert_eq!(err, Error::OddRank(3));
        assert!(ElasticTensor::new(Tensor::zeros(6)).is_err());
    }

    #[test]
    fn deserialization_runs_constructor_checks() {
        let rank2 = r#"{"tensor":{"rank":2,"data":[1,0,0,0,1,0,0,0,1]}}"#;
        let err = serde_json::from_str::<ElasticTensor>(rank2).expect_err("rank 2");
        assert!(err.to_string().contains("expected tensor of rank 4, got rank 2"), "{err}");
        assert!(serde_json::from_str::<ComplianceTensor>(rank2).is_err());
        assert!(serde_json::from_str::<NthOrderElasticTensor>(rank2).is_err());

        let odd = r#"{"tensor":{"rank":1,"data":[1,0,0]}}"#;
        let err = serde_json::from_str::<NthOrderElasticTensor>(odd).expect_err("odd rank");
        assert!(err.to_string().contains("even rank"), "{err}");

        let c = isotropic(100.0, 50.0);
        let json = serde_json::to_string(&c).expect("serialize");
        let back: ElasticTensor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, c);
        assert!((back.k_vrh().expect("k_vrh") - 400.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn energy_density_of_uniaxial_strain() {
        let c = isotropic(100.0, 50.0).as_nth_order();
        let strain = Strain::from_voigt([0.01, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let stress = c.calculate_stress(&strain).expect("stress");
        assert!((stress.matrix()[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((stress.matrix()[(1, 1)] - 1.0).abs() < 1e-12);
        let e = c.energy_density(&strain, false).expect("energy");
        assert!((e - 0.01).abs() < 1e-12);
        let ev = c.energy_density(&strain, true).expect("energy");
        assert!((ev - 0.01 * GPA_TO_EV_PER_ANG3).abs() < 1e-15);
    }
}
