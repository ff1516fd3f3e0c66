use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgbError, Result};
use crate::formula::{pantropical_biomass, regional_biomass};

/// Coefficients of the pantropical height model, `AGB = coef · (ρ·D²·H)^exp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightModel {
    pub coef: f64,
    pub exp: f64,
}

impl HeightModel {
    pub fn new(coef: f64, exp: f64) -> Self {
        Self { coef, exp }
    }

    /// Biomass in kg for wood density `rho`, diameter `d` (cm) and height `h` (m).
    pub fn estimate(&self, rho: f64, d: f64, h: f64) -> Result<f64> {
        pantropical_biomass(self, rho, d, h)
    }
}

impl Default for HeightModel {
    fn default() -> Self {
        Self::new(0.0673, 0.976)
    }
}

/// Coefficients of the regional model used when no height is measured.
///
/// `AGB = exp(constant − coef_e·E + coef_rho·ln ρ + coef_d·ln D − coef_d_squared·ln D²)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoHeightModel {
    pub constant: f64,
    pub coef_e: f64,
    pub coef_rho: f64,
    pub coef_d: f64,
    pub coef_d_squared: f64,
}

impl NoHeightModel {
    pub fn estimate(&self, rho: f64, d: f64, e: f64) -> Result<f64> {
        regional_biomass(self, rho, d, e)
    }
}

impl Default for NoHeightModel {
    fn default() -> Self {
        Self {
            constant: 1.803,
            coef_e: 0.976,
            coef_rho: 0.976,
            coef_d: 2.673,
            coef_d_squared: 0.0299,
        }
    }
}

/// Fitted constants for the generic fallback tiers.
/// Passed explicitly to the selector; there is no process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub height_model: HeightModel,
    pub no_height_model: NoHeightModel,
    /// Environmental stress covariate `E` used when a site value is unknown.
    pub environmental_stress: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            height_model: HeightModel::default(),
            no_height_model: NoHeightModel::default(),
            environmental_stress: 1.0,
        }
    }
}

impl ModelConfig {
    /// Parse a JSON config; omitted fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AgbError::io(path, e))?;
        Self::from_json_str(&text)
    }
}
