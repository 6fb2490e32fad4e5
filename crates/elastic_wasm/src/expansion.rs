//! Elastic tensor expansion wrapper.

use crate::samples::{
    matrix3_row_major, matrix6_row_major, parse_direction, parse_pairs, parse_strains,
    parse_stresses, parse_structure,
};
use crate::tensor::{FitSettings, WasmElasticTensor};
use anyhow::Context;
use elastic_core::solvers::RootSettings;
use elastic_core::tensor::VoigtScale;
use elastic_core::{ElasticTensorExpansion, HeatCapacityMode, Structure};
use js_sys::Float64Array;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) fn fit_expansion(
    strains: &[f64],
    stresses: &[f64],
    settings: &FitSettings,
) -> anyhow::Result<ElasticTensorExpansion> {
    let (strains, stresses) = parse_pairs(strains, stresses, settings.width)?;
    let eq = settings.eq_stress()?;
    let expansion = ElasticTensorExpansion::from_diff_fit(
        &strains,
        &stresses,
        eq.as_ref(),
        settings.tol,
        settings.order,
    )
    .with_context(|| format!("Order {} fit failed", settings.order))?;
    Ok(expansion)
}

#[derive(Serialize)]
struct YieldStressPayload {
    compressive: f64,
    tensile: f64,
}

fn js_err(e: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", e))
}

#[wasm_bindgen]
pub struct WasmElasticExpansion {
    expansion: ElasticTensorExpansion,
}

#[wasm_bindgen]
impl WasmElasticExpansion {
    /// Fits orders `2..=settings.order` to flat strain and stress arrays.
    #[wasm_bindgen(constructor)]
    pub fn new(
        strains: Vec<f64>,
        stresses: Vec<f64>,
        settings_val: JsValue,
    ) -> Result<WasmElasticExpansion, JsValue> {
        console_error_panic_hook::set_once();
        let settings = FitSettings::from_js(settings_val)?;
        if settings.order < 2 {
            return Err(JsValue::from_str("Expansion order must be at least 2."));
        }
        let expansion = fit_expansion(&strains, &stresses, &settings).map_err(js_err)?;
        Ok(WasmElasticExpansion { expansion })
    }

    pub fn order(&self) -> u32 {
        self.expansion.order() as u32
    }

    /// Second-order member as a standalone tensor.
    pub fn soec(&self) -> Result<WasmElasticTensor, JsValue> {
        let tensor = self
            .expansion
            .soec()
            .map_err(|e| JsValue::from_str(&format!("Invalid second-order tensor: {}", e)))?;
        Ok(WasmElasticTensor { tensor })
    }

    /// Voigt array of the order-`order` member, row-major over `order` indices.
    pub fn voigt(&self, order: u32) -> Result<Float64Array, JsValue> {
        let member = self
            .expansion
            .tensors()
            .iter()
            .find(|t| t.order() == order as usize)
            .ok_or_else(|| JsValue::from_str(&format!("No member of order {}.", order)))?;
        let voigt = member
            .voigt()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Float64Array::from(voigt.as_slice()))
    }

    /// Stress (Voigt) for a strain of 6 Voigt or 9 matrix components.
    pub fn calculate_stress(&self, strain: Vec<f64>) -> Result<Float64Array, JsValue> {
        let run = || -> anyhow::Result<Vec<f64>> {
            let strain = single(parse_strains(&strain, strain.len())?)?;
            Ok(self.expansion.calculate_stress(&strain)?.voigt().to_vec())
        };
        run()
            .map(|v| Float64Array::from(v.as_slice()))
            .map_err(js_err)
    }

    pub fn energy_density(&self, strain: Vec<f64>, convert_gpa_to_ev: bool) -> Result<f64, JsValue> {
        let run = || -> anyhow::Result<f64> {
            let strain = single(parse_strains(&strain, strain.len())?)?;
            Ok(self.expansion.energy_density(&strain, convert_gpa_to_ev)?)
        };
        run().map_err(js_err)
    }

    /// Strain (engineering Voigt) produced by a stress, through the compliance expansion.
    pub fn strain_from_stress(&self, stress: Vec<f64>) -> Result<Float64Array, JsValue> {
        let run = || -> anyhow::Result<Vec<f64>> {
            let stress = single(parse_stresses(&stress, stress.len())?)?;
            Ok(self.expansion.get_strain_from_stress(&stress)?.voigt().to_vec())
        };
        run()
            .map(|v| Float64Array::from(v.as_slice()))
            .map_err(js_err)
    }

    /// Effective second-order constants at a strain, row-major Voigt.
    pub fn effective_ecs(&self, strain: Vec<f64>, order: u32) -> Result<Float64Array, JsValue> {
        let run = || -> anyhow::Result<Vec<f64>> {
            let strain = single(parse_strains(&strain, strain.len())?)?;
            let ecs = self.expansion.get_effective_ecs(&strain, order as usize)?;
            Ok(matrix6_row_major(&ecs.voigt_matrix(VoigtScale::Unit)?))
        };
        run()
            .map(|v| Float64Array::from(v.as_slice()))
            .map_err(js_err)
    }

    /// Mode-averaged Gruneisen parameter. Without a temperature every mode
    /// counts equally and the structure may be omitted.
    pub fn gruneisen_parameter(
        &self,
        temperature: Option<f64>,
        lattice: Option<Vec<f64>>,
        site_masses: Option<Vec<f64>>,
    ) -> Result<f64, JsValue> {
        let run = || -> anyhow::Result<f64> {
            let structure = match (lattice, site_masses) {
                (Some(l), Some(m)) => Some(parse_structure(&l, m).context("Invalid structure")?),
                (None, None) => None,
                _ => anyhow::bail!("Lattice and site masses must be given together."),
            };
            let structure = structure.as_ref().map(|s| s as &dyn Structure);
            Ok(self
                .expansion
                .get_gruneisen_parameter(temperature, structure, None)?)
        };
        run().map_err(js_err)
    }

    /// Thermal expansion tensor (1/K), row-major. `mode` is `"debye"` or
    /// `"dulong-petit"`.
    pub fn thermal_expansion_coeff(
        &self,
        lattice: Vec<f64>,
        site_masses: Vec<f64>,
        temperature: f64,
        mode: &str,
    ) -> Result<Float64Array, JsValue> {
        let mode = match mode {
            "debye" => HeatCapacityMode::Debye,
            "dulong-petit" => HeatCapacityMode::DulongPetit,
            _ => return Err(JsValue::from_str("Unknown heat capacity mode")),
        };
        let run = || -> anyhow::Result<Vec<f64>> {
            let structure = parse_structure(&lattice, site_masses).context("Invalid structure")?;
            let alpha = self
                .expansion
                .thermal_expansion_coeff(&structure, temperature, mode)?;
            Ok(matrix3_row_major(&alpha))
        };
        run()
            .map(|v| Float64Array::from(v.as_slice()))
            .map_err(js_err)
    }

    pub fn yield_stress(&self, n: Vec<f64>, settings_val: JsValue) -> Result<JsValue, JsValue> {
        let settings: RootSettings = if settings_val.is_undefined() || settings_val.is_null() {
            RootSettings::default()
        } else {
            from_value(settings_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid root settings: {}", e)))?
        };
        let direction = parse_direction(&n).map_err(js_err)?;
        let (compressive, tensile) = self
            .expansion
            .get_yield_stress(&direction, settings)
            .map_err(|e| JsValue::from_str(&format!("Yield stress search failed: {}", e)))?;
        to_value(&YieldStressPayload {
            compressive,
            tensile,
        })
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

fn single<T>(mut parsed: Vec<T>) -> anyhow::Result<T> {
    if parsed.len() != 1 {
        anyhow::bail!("Expected a single sample, got {}.", parsed.len());
    }
    parsed
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Expected a single sample."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::FitMethod;
    use elastic_core::{Strain, Stress};

    /// Samples of `sigma_i = lambda tr(e) + 2 mu e_i + 0.5 c3 e_i^2` along
    /// every normal and shear axis.
    fn quadratic_samples(c3: f64) -> (Vec<f64>, Vec<f64>) {
        let (lambda, mu) = (100.0, 50.0);
        let mut strains = Vec::new();
        let mut stresses = Vec::new();
        for axis in 0..6 {
            for mag in [-0.02, -0.01, 0.01, 0.02] {
                let mut e = [0.0_f64; 6];
                e[axis] = mag;
                strains.extend_from_slice(&e);
                let trace = e[0] + e[1] + e[2];
                for i in 0..6 {
                    let s = if i < 3 {
                        lambda * trace + 2.0 * mu * e[i]
                            + 0.5 * c3 * (e[0] + e[1] + e[2]).powi(2)
                    } else {
                        mu * e[i]
                    };
                    stresses.push(s);
                }
            }
        }
        (strains, stresses)
    }

    fn settings(order: usize) -> FitSettings {
        FitSettings {
            method: FitMethod::DiffFit,
            order,
            ..FitSettings::default()
        }
    }

    #[test]
    fn third_order_fit_reproduces_samples() {
        let (strains, stresses) = quadratic_samples(-800.0);
        let expansion = fit_expansion(&strains, &stresses, &settings(3)).expect("fit");
        assert_eq!(expansion.order(), 3);

        let strain = Strain::from_voigt([0.01, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let stress = expansion.calculate_stress(&strain).expect("stress").voigt();
        let expected = Stress::from_voigt([1.96, 0.96, 0.96, 0.0, 0.0, 0.0]);
        assert!(
            Stress::from_voigt(stress).approx_eq(&expected, 1e-6),
            "stress {stress:?}"
        );
    }

    #[test]
    fn fit_errors_carry_order_context() {
        let (strains, stresses) = quadratic_samples(0.0);
        let err = fit_expansion(&strains, &stresses, &settings(1))
            .err()
            .expect("order 1");
        assert!(format!("{err:#}").starts_with("Order 1 fit failed"));
    }

    #[test]
    fn single_requires_exactly_one_sample() {
        assert_eq!(single(vec![3]).expect("one"), 3);
        assert!(single(vec![1, 2]).is_err());
        assert!(single(Vec::<u8>::new()).is_err());
    }
}
