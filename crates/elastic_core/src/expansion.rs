//! Higher-order elastic tensor expansions and the quantities derived from
//! them: Gruneisen tensors, thermal expansion, compliance expansions and the
//! Wallace stability criterion.

use crate::einsum::einsum;
use crate::elastic::{unit_vector, ElasticTensor, NthOrderElasticTensor};
use crate::error::{Error, Result};
use crate::finite_diff::factorial;
use crate::fitting::diff_fit;
use crate::solvers::{integrate, try_find_root, QuadratureSettings, RootSettings, SphereQuadrature};
use crate::strain::{Strain, Stress};
use crate::tensor::{Tensor, VoigtScale};
use crate::traits::Structure;
use crate::units::{AMU_KG, ANG3_TO_M3, AVOGADRO, BOLTZMANN, GAS_CONSTANT, HBAR};
use log::debug;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};

/// Modes with `hbar * omega` above this multiple of `kT` carry no heat.
pub const HEAT_CAPACITY_CUTOFF: f64 = 1e2;

/// How the molar heat capacity entering the thermal expansion is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeatCapacityMode {
    #[default]
    Debye,
    DulongPetit,
}

/// Elastic tensors of orders `2, 3, ..` describing one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExpansionRepr")]
pub struct ElasticTensorExpansion {
    tensors: Vec<NthOrderElasticTensor>,
}

#[derive(Deserialize)]
struct ExpansionRepr {
    tensors: Vec<NthOrderElasticTensor>,
}

impl TryFrom<ExpansionRepr> for ElasticTensorExpansion {
    type Error = Error;

    fn try_from(repr: ExpansionRepr) -> Result<Self> {
        Self::new(repr.tensors)
    }
}

impl ElasticTensorExpansion {
    /// Tensors must start at second order and increase by one.
    pub fn new(tensors: Vec<NthOrderElasticTensor>) -> Result<Self> {
        if tensors.is_empty() {
            return Err(Error::InvalidInput("tensor expansion is empty".to_string()));
        }
        for (k, t) in tensors.iter().enumerate() {
            if t.order() != k + 2 {
                return Err(Error::InvalidInput(format!(
                    "expansion member {k} has order {}, expected {}",
                    t.order(),
                    k + 2
                )));
            }
        }
        Ok(Self { tensors })
    }

    pub fn from_tensors(tensors: Vec<Tensor>) -> Result<Self> {
        Self::new(
            tensors
                .into_iter()
                .map(NthOrderElasticTensor::new)
                .collect::<Result<Vec<_>>>()?,
        )
    }

    /// Expansion up to `order` fitted by finite differences.
    pub fn from_diff_fit(
        strains: &[Strain],
        stresses: &[Stress],
        eq_stress: Option<&Stress>,
        tol: f64,
        order: usize,
    ) -> Result<Self> {
        Self::from_tensors(diff_fit(strains, stresses, eq_stress, order, tol)?)
    }

    /// Highest order present.
    pub fn order(&self) -> usize {
        self.tensors.len() + 1
    }

    pub fn tensors(&self) -> &[NthOrderElasticTensor] {
        &self.tensors
    }

    pub fn soec(&self) -> Result<ElasticTensor> {
        ElasticTensor::new(self.tensors[0].tensor().clone())
    }

    fn member(&self, order: usize) -> Result<&Tensor> {
        self.tensors
            .get(order - 2)
            .map(NthOrderElasticTensor::tensor)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "expansion of order {} has no order-{order} tensor",
                    self.order()
                ))
            })
    }

    pub fn calculate_stress(&self, strain: &Strain) -> Result<Stress> {
        let mut total = Matrix3::zeros();
        for t in &self.tensors {
            total += t.calculate_stress(strain)?.matrix();
        }
        Ok(Stress::new(total))
    }

    pub fn energy_density(&self, strain: &Strain, convert_gpa_to_ev: bool) -> Result<f64> {
        self.tensors
            .iter()
            .map(|t| t.energy_density(strain, convert_gpa_to_ev))
            .sum()
    }

    /// Generalized Gruneisen tensor for mode direction `n` and polarization `u`.
    pub fn get_ggt(&self, n: &Vector3<f64>, u: &Vector3<f64>) -> Result<Matrix3<f64>> {
        let c2 = self.member(2)?;
        let c3 = self.member(3)?;
        let nt = Tensor::from_vector(n);
        let ut = Tensor::from_vector(u);
        let gk = c2.einsum_sequence(&[&nt, &ut, &nt, &ut])?.value()?;
        if gk == 0.0 {
            return Err(Error::InvalidInput(format!(
                "mode ({n:?}, {u:?}) has zero acoustic stiffness"
            )));
        }
        let c2_nn = c2.einsum_sequence(&[&nt, &nt])?.to_matrix()?;
        let c3_nunu = c3.einsum_sequence(&[&nt, &ut, &nt, &ut])?.to_matrix()?;
        Ok(-(2.0 * gk * u * u.transpose() + c2_nn + c3_nunu) / (2.0 * gk))
    }

    /// Thermodynamic Gruneisen tensor: the mode average of [`Self::get_ggt`]
    /// over the sphere, weighted by directional heat capacity when a
    /// temperature is given.
    pub fn get_tgt(
        &self,
        temperature: Option<f64>,
        structure: Option<&dyn Structure>,
        quad: Option<&SphereQuadrature>,
    ) -> Result<Matrix3<f64>> {
        let weighting = match (temperature, structure) {
            (Some(t), _) if t < 0.0 || !t.is_finite() => {
                return Err(Error::InvalidInput(format!("temperature {t} must be non-negative")))
            }
            (Some(t), Some(s)) if t > 0.0 => Some((t, s)),
            (Some(t), None) if t > 0.0 => {
                return Err(Error::InvalidInput(
                    "a structure is required when a temperature is given".to_string(),
                ))
            }
            _ => None,
        };

        let default_quad;
        let quad = match quad {
            Some(q) => q,
            None => {
                default_quad = SphereQuadrature::default();
                &default_quad
            }
        };

        let soec = self.soec()?;
        let mut num = Matrix3::zeros();
        let mut denom = 0.0;
        for (p, &w) in quad.points.iter().zip(&quad.weights) {
            let p = Vector3::from(*p);
            let modes = SymmetricEigen::new(soec.green_kristoffel(&p)?);
            for u in modes.eigenvectors.column_iter() {
                let u = unit_vector(&u.into_owned())?;
                let c = match weighting {
                    Some((t, s)) => self.get_heat_capacity(t, s, &p, &u, HEAT_CAPACITY_CUTOFF)?,
                    None => 1.0,
                };
                num += c * w * self.get_ggt(&p, &u)?;
                denom += c * w;
            }
        }
        if denom == 0.0 {
            return Err(Error::InvalidInput(
                "no acoustic mode carries heat at this temperature".to_string(),
            ));
        }
        Ok(num / denom)
    }

    pub fn get_gruneisen_parameter(
        &self,
        temperature: Option<f64>,
        structure: Option<&dyn Structure>,
        quad: Option<&SphereQuadrature>,
    ) -> Result<f64> {
        Ok(self.get_tgt(temperature, structure, quad)?.trace() / 3.0)
    }

    /// Molar heat capacity (J/mol/K) of the mode `(n, u)`.
    pub fn get_heat_capacity(
        &self,
        temperature: f64,
        structure: &dyn Structure,
        n: &Vector3<f64>,
        u: &Vector3<f64>,
        cutoff: f64,
    ) -> Result<f64> {
        let kt = BOLTZMANN * temperature;
        let hbar_w = HBAR * self.omega(structure, n, u)?;
        if hbar_w > kt * cutoff {
            return Ok(0.0);
        }
        let x = (hbar_w / kt).abs();
        let einstein = if x == 0.0 {
            1.0
        } else {
            let e = (-x).exp();
            x * x * e / ((1.0 - e) * (1.0 - e))
        };
        Ok(BOLTZMANN * einstein * AVOGADRO)
    }

    /// Angular frequency of the mode `(n, u)` at the cell's length scale.
    pub fn omega(&self, structure: &dyn Structure, n: &Vector3<f64>, u: &Vector3<f64>) -> Result<f64> {
        let c2 = self.member(2)?;
        let lattice = structure.lattice_matrix();
        let l0 = lattice.row_sum().transpose().dot(n) * 1e-10;
        let weight = structure.composition_weight() * AMU_KG;
        let volume = structure.volume() * ANG3_TO_M3;
        let nt = Tensor::from_vector(n);
        let ut = Tensor::from_vector(u);
        let stiffness = c2.einsum_sequence(&[&nt, &ut, &nt, &ut])?.value()?;
        let velocity = (1e9 * stiffness / (weight / volume)).sqrt();
        Ok(velocity / l0)
    }

    /// Thermal expansion tensor (1/K) from the second- and third-order
    /// constants.
    pub fn thermal_expansion_coeff(
        &self,
        structure: &dyn Structure,
        temperature: f64,
        mode: HeatCapacityMode,
    ) -> Result<Matrix3<f64>> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "temperature {temperature} must be positive"
            )));
        }
        let soec = self.soec()?;
        let v0 = structure.volume() * ANG3_TO_M3 / structure.num_sites() as f64;
        let cv = match mode {
            HeatCapacityMode::Debye => {
                let t_ratio = temperature / soec.debye_temperature(structure)?;
                let debye = integrate(debye_integrand, 0.0, 1.0 / t_ratio, QuadratureSettings::default())?;
                9.0 * GAS_CONSTANT * t_ratio.powi(3) * debye
            }
            HeatCapacityMode::DulongPetit => 3.0 * GAS_CONSTANT,
        };
        debug!("heat capacity {cv} J/mol/K at {temperature} K ({mode:?})");
        let tgt = Tensor::from_matrix(&self.get_tgt(Some(temperature), Some(structure), None)?);
        let compliance = soec.compliance_tensor()?;
        let alpha = einsum("ijkl,ij", &[compliance.tensor(), &tgt])?.to_matrix()?;
        Ok(alpha * (cv / (1e9 * v0 * AVOGADRO)))
    }

    /// Compliance tensors `[S, S_3, S_4]` (as far as the expansion goes)
    /// such that `strain = sum_k S_k . stress^k / k!`.
    pub fn get_compliance_expansion(&self) -> Result<Vec<Tensor>> {
        if self.order() > 4 {
            return Err(Error::InvalidInput(
                "compliance tensor expansion only supported for fourth-order and lower".to_string(),
            ));
        }
        let s = self.soec()?.compliance_tensor()?.tensor().clone();
        let mut out = vec![s.clone()];
        if self.order() >= 3 {
            let c3 = self.member(3)?;
            out.push(einsum("ijpq,pqrsuv,rskl,uvmn->ijklmn", &[&-&s, c3, &s, &s])?);
        }
        if self.order() == 4 {
            let c3 = self.member(3)?;
            let c4 = self.member(4)?;
            let mut s4 = -&einsum("pqab,cdij,efkl,ghmn,abcdefgh", &[&s, &s, &s, &s, c4])?;
            for subscripts in [
                "pqab,abcdef,cdijmn,efkl",
                "pqab,abcdef,efklmn,cdij",
                "pqab,abcdef,cdijkl,efmn",
            ] {
                s4 = &s4 - &einsum(subscripts, &[&s, c3, &out[1], &s])?;
            }
            out.push(s4);
        }
        Ok(out)
    }

    pub fn get_strain_from_stress(&self, stress: &Stress) -> Result<Strain> {
        let sigma = stress.to_tensor();
        let mut strain = Tensor::zeros(2);
        for (k, compliance) in self.get_compliance_expansion()?.iter().enumerate() {
            let operands = vec![&sigma; k + 1];
            let term = compliance.einsum_sequence(&operands)?;
            strain = &strain + &(&term * (1.0 / factorial(k + 1)));
        }
        Ok(Strain::new(strain.to_matrix()?))
    }

    /// Strain-dependent elastic constants of order `order` (2 gives the
    /// effective stiffness).
    pub fn get_effective_ecs(&self, strain: &Strain, order: usize) -> Result<Tensor> {
        if order < 2 || order > self.order() {
            return Err(Error::InvalidInput(format!(
                "effective constants of order {order} need an expansion of at least that order"
            )));
        }
        let eps = strain.to_tensor();
        let mut sum = Tensor::zeros(2 * order);
        for (n, ecs) in self.tensors[order - 2..].iter().enumerate() {
            let operands = vec![&eps; n];
            let term = ecs.tensor().einsum_sequence(&operands)?;
            sum = &sum + &(&term * (1.0 / factorial(n)));
        }
        Ok(sum)
    }

    /// Wallace tensor at applied stress `tau`.
    pub fn get_wallace_tensor(&self, tau: &Stress) -> Result<Tensor> {
        let t = tau.matrix();
        let d = |a: usize, b: usize| if a == b { 1.0 } else { 0.0 };
        let b = Tensor::from_fn(4, |idx| {
            let (k, l, m, n) = (idx[0], idx[1], idx[2], idx[3]);
            0.5 * (t[(m, l)] * d(k, n) + t[(k, m)] * d(l, n) + t[(n, l)] * d(k, m) + t[(k, n)] * d(l, m)
                - 2.0 * t[(k, l)] * d(m, n))
        });
        let strain = self.get_strain_from_stress(tau)?;
        Ok(&b + &self.get_effective_ecs(&strain, 2)?)
    }

    pub fn get_symmetric_wallace_tensor(&self, tau: &Stress) -> Result<Tensor> {
        let wallace = self.get_wallace_tensor(tau)?;
        Ok(&(&wallace + &wallace.transpose(&[2, 3, 0, 1])?) * 0.5)
    }

    /// Determinant of the symmetric Wallace tensor under uniaxial stress `s`
    /// along `n`; a sign change marks loss of stability.
    pub fn get_stability_criteria(&self, s: f64, n: &Vector3<f64>) -> Result<f64> {
        let n = unit_vector(n)?;
        let stress = Stress::new(s * n * n.transpose());
        let wallace = self.get_symmetric_wallace_tensor(&stress)?;
        Ok(wallace.voigt_matrix(VoigtScale::Unit)?.determinant())
    }

    /// Compressive and tensile yield stress along `n`: roots of the stability
    /// criterion searched from -1 and +1.
    pub fn get_yield_stress(&self, n: &Vector3<f64>, settings: RootSettings) -> Result<(f64, f64)> {
        let criterion = |s: f64| self.get_stability_criteria(s, n);
        let compressive = try_find_root(criterion, -1.0, settings)?;
        let tensile = try_find_root(criterion, 1.0, settings)?;
        debug!(
            "yield stress along {n:?}: {} ({} steps), {} ({} steps)",
            compressive.root, compressive.iterations, tensile.root, tensile.iterations
        );
        Ok((compressive.root, tensile.root))
    }
}

/// `x^4 e^x / (e^x - 1)^2`, written to stay finite for large `x`.
fn debye_integrand(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let e = (-x).exp();
    x.powi(4) * e / ((1.0 - e) * (1.0 - e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::CrystalStructure;
    use nalgebra::Matrix6;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn isotropic(lambda: f64, mu: f64) -> Tensor {
        let mut c = Matrix6::zeros();
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = lambda;
            }
            c[(i, i)] = lambda + 2.0 * mu;
            c[(i + 3, i + 3)] = mu;
        }
        Tensor::from_voigt_matrix(&c, VoigtScale::Unit)
    }

    /// Fully symmetric Voigt array of rank `rank`, `value` on all-normal
    /// index tuples and zero elsewhere.
    fn normal_only(rank: usize, value: f64) -> Tensor {
        let voigt: Vec<f64> = (0..6usize.pow(rank as u32))
            .map(|flat| {
                let all_normal = (0..rank).all(|k| (flat / 6usize.pow(k as u32)) % 6 < 3);
                if all_normal {
                    value
                } else {
                    0.0
                }
            })
            .collect();
        Tensor::from_voigt(rank, &voigt, VoigtScale::Unit).expect("voigt")
    }

    fn expansion(c3: f64, c4: Option<f64>) -> ElasticTensorExpansion {
        let mut tensors = vec![isotropic(100.0, 50.0), normal_only(3, c3)];
        if let Some(c4) = c4 {
            tensors.push(normal_only(4, c4));
        }
        ElasticTensorExpansion::from_tensors(tensors).expect("expansion")
    }

    fn max_diff(a: &Strain, b: &Strain) -> f64 {
        (a.matrix() - b.matrix()).abs().max()
    }

    #[test]
    fn expansion_orders_must_be_consecutive() {
        let err = ElasticTensorExpansion::from_tensors(vec![normal_only(3, 1.0)]);
        assert_err_contains(err, "expected 2");
        assert_eq!(expansion(-300.0, None).order(), 3);
    }

    #[test]
    fn deserialization_requires_consecutive_orders() {
        let exp = expansion(-300.0, None);
        let json = serde_json::to_string(&exp).expect("serialize");
        let back: ElasticTensorExpansion = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, exp);

        let third_only = ElasticTensorExpansion {
            tensors: vec![NthOrderElasticTensor::new(normal_only(3, 1.0)).expect("order 3")],
        };
        let json = serde_json::to_string(&third_only).expect("serialize");
        let err = serde_json::from_str::<ElasticTensorExpansion>(&json).expect_err("order 3 first");
        assert!(err.to_string().contains("expected 2"), "{err}");
        assert!(serde_json::from_str::<ElasticTensorExpansion>(r#"{"tensors":[]}"#).is_err());
    }

    #[test]
    fn stress_and_energy_sum_over_orders() {
        let exp = expansion(-300.0, None);
        let strain = Strain::from_voigt([1e-3, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let stress = exp.calculate_stress(&strain).expect("stress");
        // 200 * e + 0.5 * (-300) * e^2
        assert!((stress.matrix()[(0, 0)] - (0.2 - 1.5e-4)).abs() < 1e-12);
        let energy = exp.energy_density(&strain, false).expect("energy");
        let expected = 0.5 * 200.0 * 1e-6 + (-300.0) * 1e-9 / 6.0;
        assert!((energy - expected).abs() < 1e-15);
    }

    #[test]
    fn compliance_expansion_inverts_third_order_law() {
        let exp = expansion(-300.0, None);
        let strain = Strain::from_voigt([1e-3, 5e-4, 2e-4, 3e-4, 0.0, 1e-4]);
        let stress = exp.calculate_stress(&strain).expect("stress");

        let compliance = exp.get_compliance_expansion().expect("compliance");
        assert_eq!(compliance.len(), 2);
        assert_eq!(compliance[1].rank(), 6);

        let first_order = Strain::new(
            compliance[0]
                .contract_leading(&stress.to_tensor())
                .expect("contract")
                .to_matrix()
                .expect("matrix"),
        );
        let recovered = exp.get_strain_from_stress(&stress).expect("strain");
        let linear_err = max_diff(&first_order, &strain);
        let full_err = max_diff(&recovered, &strain);
        assert!(full_err < linear_err / 20.0, "{full_err} vs {linear_err}");
    }

    #[test]
    fn fourth_order_compliance_improves_inversion() {
        let exp4 = expansion(-300.0, Some(-2000.0));
        let exp3 = expansion(-300.0, None);
        let strain = Strain::from_voigt([1e-3, 5e-4, 2e-4, 0.0, 0.0, 0.0]);
        let stress = exp4.calculate_stress(&strain).expect("stress");

        let compliance = exp4.get_compliance_expansion().expect("compliance");
        assert_eq!(compliance.len(), 3);
        assert!(compliance[2].is_voigt_symmetric(1e-12));

        let err4 = max_diff(&exp4.get_strain_from_stress(&stress).expect("strain"), &strain);
        let err3 = max_diff(&exp3.get_strain_from_stress(&stress).expect("strain"), &strain);
        assert!(err4 < err3 / 5.0, "{err4} vs {err3}");
    }

    #[test]
    fn isotropic_gruneisen_parameter_without_anharmonicity() {
        let exp = expansion(0.0, None);
        let gamma = exp.get_gruneisen_parameter(None, None, None).expect("gamma");
        assert!((gamma + 4.0 / 3.0).abs() < 1e-10, "gamma = {gamma}");
    }

    #[test]
    fn temperature_requires_structure() {
        let exp = expansion(0.0, None);
        assert_err_contains(exp.get_tgt(Some(300.0), None, None), "structure is required");
    }

    #[test]
    fn heat_capacity_reaches_classical_limit() {
        let exp = expansion(-300.0, None);
        let structure = CrystalStructure::cubic(3.61, vec![63.546; 4]).expect("structure");
        let x = Vector3::x();
        let cv = exp
            .get_heat_capacity(1e6, &structure, &x, &x, HEAT_CAPACITY_CUTOFF)
            .expect("cv");
        assert!((cv / (BOLTZMANN * AVOGADRO) - 1.0).abs() < 1e-3);
        let frozen = exp
            .get_heat_capacity(1e-6, &structure, &x, &x, HEAT_CAPACITY_CUTOFF)
            .expect("cv");
        assert_eq!(frozen, 0.0);
    }

    #[test]
    fn debye_heat_capacity_approaches_dulong_petit() {
        let exp = expansion(-300.0, None);
        let structure = CrystalStructure::cubic(3.61, vec![63.546; 4]).expect("structure");
        let hot = 5000.0;
        let debye = exp
            .thermal_expansion_coeff(&structure, hot, HeatCapacityMode::Debye)
            .expect("debye");
        let classical = exp
            .thermal_expansion_coeff(&structure, hot, HeatCapacityMode::DulongPetit)
            .expect("dulong-petit");
        assert!(classical.iter().all(|v| v.is_finite()));
        let ratio = debye[(0, 0)] / classical[(0, 0)];
        assert!((ratio - 1.0).abs() < 1e-3, "ratio {ratio}");
    }

    #[test]
    fn yield_stress_of_harmonic_isotropic_expansion() {
        // With vanishing third-order constants, the stability determinant
        // under uniaxial stress s is proportional to
        // (40000 + 500 s - s^2 / 2) (50 + s / 2)^2, whose root nearest zero
        // is 500 - sqrt(330000).
        let exp = expansion(0.0, None);
        let n = Vector3::new(0.0, 0.0, 2.0);
        let expected = 500.0 - 330000f64.sqrt();
        let f0 = exp.get_stability_criteria(0.0, &n).expect("criterion");
        let f_root = exp.get_stability_criteria(expected, &n).expect("criterion");
        assert!(f_root.abs() < 1e-9 * f0.abs());

        let (compressive, tensile) = exp.get_yield_stress(&n, RootSettings::default()).expect("yield");
        assert!((compressive - expected).abs() < 1e-6, "compressive {compressive}");
        assert!((tensile - expected).abs() < 1e-6, "tensile {tensile}");
    }

    #[test]
    fn yield_stress_reports_criterion_errors() {
        let exp = expansion(0.0, None);
        let err = exp
            .get_yield_stress(&Vector3::zeros(), RootSettings::default())
            .expect_err("zero direction");
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("cannot be normalized")));
    }

    #[test]
    fn effective_constants_shift_with_strain() {
        let exp = expansion(-300.0, None);
        let zero = exp.get_effective_ecs(&Strain::zero(), 2).expect("ecs");
        assert!(zero.approx_eq(exp.tensors()[0].tensor(), 0.0));
        let strained = exp
            .get_effective_ecs(&Strain::from_voigt([1e-2, 0.0, 0.0, 0.0, 0.0, 0.0]), 2)
            .expect("ecs");
        assert!((strained.get(&[0, 0, 0, 0]) - (200.0 - 3.0)).abs() < 1e-12);
        assert!(exp.get_effective_ecs(&Strain::zero(), 4).is_err());
    }
}
