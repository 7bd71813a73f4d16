//! Inversion runner exposed to JavaScript.

use crate::columns::SampleColumns;
use ari_core::end_member::estimate_end_member;
use ari_core::types::validate_samples;
use ari_core::{
    inversion_uq, quadratic_inversion, resistivity_inversion, Ensemble, InversionConfig,
    InversionReport, QuadraticResult, Sample, ShaleEndMember,
};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmInversion {
    samples: Vec<Sample>,
    config: InversionConfig,
    end_member: ShaleEndMember,
}

impl WasmInversion {
    pub(crate) fn from_parts(
        columns: SampleColumns,
        config: InversionConfig,
    ) -> Result<Self, String> {
        config.validate().map_err(|e| e.to_string())?;
        let samples = columns.into_samples()?;
        validate_samples(&samples).map_err(|e| e.to_string())?;
        let end_member =
            estimate_end_member(&samples, config.end_member).map_err(|e| e.to_string())?;
        Ok(Self {
            samples,
            config,
            end_member,
        })
    }

    pub(crate) fn report(&self) -> Result<InversionReport, String> {
        resistivity_inversion(&self.samples, &self.config).map_err(|e| e.to_string())
    }

    pub(crate) fn quadratic_results(&self) -> Result<Vec<QuadraticResult>, String> {
        quadratic_inversion(&self.samples, self.end_member).map_err(|e| e.to_string())
    }

    pub(crate) fn ensemble_results(&self) -> Result<Ensemble, String> {
        inversion_uq(
            &self.samples,
            self.end_member,
            &self.config.solver,
            &self.config.uncertainty,
        )
        .map_err(|e| e.to_string())
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
impl WasmInversion {
    #[wasm_bindgen(constructor)]
    pub fn new(columns: JsValue, config: JsValue) -> Result<WasmInversion, JsValue> {
        console_error_panic_hook::set_once();

        let columns: SampleColumns = from_value(columns)
            .map_err(|e| JsValue::from_str(&format!("Invalid sample columns: {}", e)))?;
        let config: InversionConfig = if config.is_undefined() || config.is_null() {
            InversionConfig::default()
        } else {
            from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?
        };

        Self::from_parts(columns, config).map_err(|e| JsValue::from_str(&e))
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn end_member(&self) -> Result<JsValue, JsValue> {
        serialize(&self.end_member)
    }

    pub fn nonlinear(&self) -> Result<JsValue, JsValue> {
        let report = self
            .report()
            .map_err(|e| JsValue::from_str(&format!("Inversion failed: {}", e)))?;
        serialize(&report)
    }

    pub fn quadratic(&self) -> Result<JsValue, JsValue> {
        let results = self
            .quadratic_results()
            .map_err(|e| JsValue::from_str(&format!("Quadratic inversion failed: {}", e)))?;
        serialize(&results)
    }

    pub fn ensemble(&self) -> Result<JsValue, JsValue> {
        let ensemble = self
            .ensemble_results()
            .map_err(|e| JsValue::from_str(&format!("Ensemble failed: {}", e)))?;
        serialize(&ensemble)
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::WasmInversion;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn constructor_rejects_malformed_columns() {
        let result = WasmInversion::new(JsValue::from_str("not columns"), JsValue::UNDEFINED);
        assert!(result.is_err());
    }
}
