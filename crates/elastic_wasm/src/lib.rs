//! WASM bridge for `elastic_core`: fitting elastic tensors and expansions
//! from flat strain/stress arrays and evaluating their properties.

mod expansion;
mod samples;
mod tensor;

pub use expansion::WasmElasticExpansion;
pub use tensor::WasmElasticTensor;

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn message(err: JsValue) -> String {
        err.as_string().unwrap_or_default()
    }

    #[wasm_bindgen_test]
    fn tensor_rejects_short_voigt_array() {
        let result = WasmElasticTensor::new(vec![0.0; 35]);
        assert!(result.is_err(), "should reject 35 entries");
        let msg = result.err().map(message).unwrap_or_default();
        assert!(msg.contains("36 entries"), "got {msg}");
    }

    #[wasm_bindgen_test]
    fn expansion_rejects_first_order() {
        let settings = serde_wasm_bindgen::to_value(&OrderOnly { order: 1 }).expect("settings");
        let result = WasmElasticExpansion::new(vec![0.01; 6], vec![1.0; 6], settings);
        let msg = result.err().map(message).unwrap_or_default();
        assert!(msg.contains("at least 2"), "got {msg}");
    }

    #[wasm_bindgen_test]
    fn tensor_reports_isotropic_moduli() {
        let mut voigt = vec![0.0; 36];
        for i in 0..3 {
            for j in 0..3 {
                voigt[i * 6 + j] = 100.0;
            }
            voigt[i * 6 + i] = 200.0;
            voigt[(i + 3) * 6 + i + 3] = 50.0;
        }
        let tensor = WasmElasticTensor::new(voigt).expect("tensor");
        let modulus = tensor
            .directional_elastic_mod(vec![0.0, 0.0, 1.0])
            .expect("modulus");
        assert!((modulus - 200.0).abs() < 1e-9);
        assert_eq!(tensor.voigt().length(), 36);
    }

    #[derive(serde::Serialize)]
    struct OrderOnly {
        order: usize,
    }
}
