//! Second-order elastic tensor wrapper.

use crate::samples::{
    matrix3_row_major, matrix6_row_major, parse_direction, parse_pairs, parse_stresses,
    parse_structure, parse_voigt_matrix,
};
use anyhow::Context;
use elastic_core::elastic::ElasticProperties;
use elastic_core::fitting::DEFAULT_FIT_TOL;
use elastic_core::{ElasticTensor, Stress};
use js_sys::Float64Array;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum FitMethod {
    DiffFit,
    IndependentStrains,
    Pseudoinverse,
}

/// Options shared by the tensor and expansion fits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FitSettings {
    /// Components per sample: 6 (Voigt) or 9 (row-major matrix).
    pub width: usize,
    pub tol: f64,
    pub eq_stress: Option<Vec<f64>>,
    pub method: FitMethod,
    pub vasp: bool,
    pub order: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            width: 6,
            tol: DEFAULT_FIT_TOL,
            eq_stress: None,
            method: FitMethod::DiffFit,
            vasp: false,
            order: 2,
        }
    }
}

impl FitSettings {
    pub(crate) fn from_js(settings_val: JsValue) -> Result<Self, JsValue> {
        if settings_val.is_undefined() || settings_val.is_null() {
            return Ok(Self::default());
        }
        from_value(settings_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid fit settings: {}", e)))
    }

    pub(crate) fn eq_stress(&self) -> anyhow::Result<Option<Stress>> {
        match &self.eq_stress {
            None => Ok(None),
            Some(values) => {
                let mut parsed = parse_stresses(values, values.len())
                    .context("Invalid equilibrium stress")?;
                Ok(parsed.pop())
            }
        }
    }
}

pub(crate) fn fit_tensor(
    strains: &[f64],
    stresses: &[f64],
    settings: &FitSettings,
) -> anyhow::Result<ElasticTensor> {
    let (strains, stresses) = parse_pairs(strains, stresses, settings.width)?;
    let eq = settings.eq_stress()?;
    let tensor = match settings.method {
        FitMethod::DiffFit => {
            ElasticTensor::from_diff_fit(&strains, &stresses, eq.as_ref(), settings.tol)
        }
        FitMethod::IndependentStrains => ElasticTensor::from_independent_strains(
            &strains,
            &stresses,
            eq.as_ref(),
            settings.vasp,
            settings.tol,
        ),
        FitMethod::Pseudoinverse => ElasticTensor::from_pseudoinverse(&strains, &stresses),
    }?;
    Ok(tensor)
}

#[derive(Serialize)]
struct PropertyEntry {
    name: &'static str,
    value: Option<f64>,
}

#[derive(Serialize)]
struct StructurePropertiesPayload {
    properties: Vec<PropertyEntry>,
    base: Option<ElasticProperties>,
}

#[wasm_bindgen]
pub struct WasmElasticTensor {
    pub(crate) tensor: ElasticTensor,
}

#[wasm_bindgen]
impl WasmElasticTensor {
    /// Builds the tensor from 36 row-major Voigt entries (GPa).
    #[wasm_bindgen(constructor)]
    pub fn new(voigt: Vec<f64>) -> Result<WasmElasticTensor, JsValue> {
        console_error_panic_hook::set_once();
        let matrix = parse_voigt_matrix(&voigt).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let tensor = ElasticTensor::from_voigt_matrix(&matrix)
            .map_err(|e| JsValue::from_str(&format!("Invalid elastic tensor: {}", e)))?;
        Ok(WasmElasticTensor { tensor })
    }

    /// Fits the tensor to flat strain and stress arrays.
    pub fn fit(
        strains: Vec<f64>,
        stresses: Vec<f64>,
        settings_val: JsValue,
    ) -> Result<WasmElasticTensor, JsValue> {
        console_error_panic_hook::set_once();
        let settings = FitSettings::from_js(settings_val)?;
        let tensor = fit_tensor(&strains, &stresses, &settings)
            .map_err(|e| JsValue::from_str(&format!("Elastic tensor fit failed: {:#}", e)))?;
        Ok(WasmElasticTensor { tensor })
    }

    pub fn voigt(&self) -> Float64Array {
        Float64Array::from(matrix6_row_major(&self.tensor.voigt()).as_slice())
    }

    pub fn compliance_voigt(&self) -> Result<Float64Array, JsValue> {
        let s = self
            .tensor
            .compliance_tensor()
            .and_then(|c| c.voigt_matrix())
            .map_err(|e| JsValue::from_str(&format!("Compliance failed: {}", e)))?;
        Ok(Float64Array::from(matrix6_row_major(&s).as_slice()))
    }

    pub fn property_dict(&self) -> Result<JsValue, JsValue> {
        let props = self
            .tensor
            .property_dict()
            .map_err(|e| JsValue::from_str(&format!("Property evaluation failed: {}", e)))?;
        to_value(&props).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn structure_property_dict(
        &self,
        lattice: Vec<f64>,
        site_masses: Vec<f64>,
        include_base_props: bool,
        ignore_errors: bool,
    ) -> Result<JsValue, JsValue> {
        let payload = structure_properties(
            &self.tensor,
            &lattice,
            site_masses,
            include_base_props,
            ignore_errors,
        )
        .map_err(|e| JsValue::from_str(&format!("Property evaluation failed: {:#}", e)))?;
        to_value(&payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn directional_poisson_ratio(&self, n: Vec<f64>, m: Vec<f64>) -> Result<f64, JsValue> {
        let run = || -> anyhow::Result<f64> {
            let n = parse_direction(&n)?;
            let m = parse_direction(&m)?;
            Ok(self.tensor.directional_poisson_ratio(&n, &m, 1e-8)?)
        };
        run().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn directional_elastic_mod(&self, n: Vec<f64>) -> Result<f64, JsValue> {
        let run = || -> anyhow::Result<f64> {
            Ok(self.tensor.directional_elastic_mod(&parse_direction(&n)?)?)
        };
        run().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Christoffel matrix along `u`, row-major.
    pub fn green_kristoffel(&self, u: Vec<f64>) -> Result<Float64Array, JsValue> {
        let run = || -> anyhow::Result<Vec<f64>> {
            let g = self.tensor.green_kristoffel(&parse_direction(&u)?)?;
            Ok(matrix3_row_major(&g))
        };
        run()
            .map(|v| Float64Array::from(v.as_slice()))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn structure_properties(
    tensor: &ElasticTensor,
    lattice: &[f64],
    site_masses: Vec<f64>,
    include_base_props: bool,
    ignore_errors: bool,
) -> anyhow::Result<StructurePropertiesPayload> {
    let structure = parse_structure(lattice, site_masses).context("Invalid structure")?;
    let dict = tensor.get_structure_property_dict(&structure, include_base_props, ignore_errors)?;
    Ok(StructurePropertiesPayload {
        properties: dict
            .values
            .iter()
            .map(|&(p, value)| PropertyEntry {
                name: p.name(),
                value,
            })
            .collect(),
        base: dict.base,
    })
}
