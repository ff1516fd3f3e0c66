//! Allometric biomass formulas. All functions are pure; coefficients come in
//! as arguments so the same code serves any fitted parameter set.

use crate::config::{HeightModel, NoHeightModel};
use crate::error::{require_positive, Result};
use crate::reference::DiameterClass;

/// Intercept of the DBH → DRC conversion in log space.
pub const DRC_INTERCEPT: f64 = 0.36738;
/// Slope of the DBH → DRC conversion in log space.
pub const DRC_SLOPE: f64 = 0.94932;

/// Express a DBH measurement in the convention a regression expects.
///
/// `Dbh` is the identity for every input. `Drc` applies
/// `exp(0.36738 + 0.94932·ln dbh)` and needs `dbh > 0`.
pub fn convert_diameter(class: DiameterClass, dbh: f64) -> Result<f64> {
    match class {
        DiameterClass::Dbh => Ok(dbh),
        DiameterClass::Drc => {
            let dbh = require_positive("dbh", dbh)?;
            Ok((DRC_INTERCEPT + DRC_SLOPE * dbh.ln()).exp())
        }
    }
}

/// Taxa-level log-linear model: `AGB = exp(b0 + b1·ln D)`.
pub fn taxa_biomass(b0: f64, b1: f64, class: DiameterClass, dbh: f64) -> Result<f64> {
    let dbh = require_positive("dbh", dbh)?;
    let d = convert_diameter(class, dbh)?;
    Ok((b0 + b1 * d.ln()).exp())
}

/// Pantropical power law with height: `AGB = coef · (ρ·D²·H)^exp`.
pub fn pantropical_biomass(model: &HeightModel, rho: f64, d: f64, h: f64) -> Result<f64> {
    let rho = require_positive("specific gravity", rho)?;
    let d = require_positive("dbh", d)?;
    let h = require_positive("height", h)?;
    Ok(model.coef * (rho * d * d * h).powf(model.exp))
}

/// Regional log-linear model without height:
/// `AGB = exp(const − coef_e·E + coef_rho·ln ρ + coef_d·ln D − coef_d_sq·ln D²)`.
pub fn regional_biomass(model: &NoHeightModel, rho: f64, d: f64, e: f64) -> Result<f64> {
    let rho = require_positive("specific gravity", rho)?;
    let d = require_positive("dbh", d)?;
    let ln_d = d.ln();
    Ok((model.constant - model.coef_e * e + model.coef_rho * rho.ln() + model.coef_d * ln_d
        - model.coef_d_squared * (2.0 * ln_d))
        .exp())
}
