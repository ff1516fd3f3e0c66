use std::path::PathBuf;

use thiserror::Error;

/// Every failure the estimation engine can report.
///
/// An unmatched taxon and an ambiguous match are not errors; they are
/// [`crate::matcher::MatchResult`] variants that drive the tier fallback.
#[derive(Debug, Error)]
pub enum AgbError {
    /// A reference-table, species-table or inventory row has an unusable shape.
    #[error("data format error in {context}: {reason}")]
    DataFormat { context: String, reason: String },

    #[error("invalid diameter class {0:?}: expected \"dbh\" or \"drc\"")]
    InvalidDiameterClass(String),

    /// A formula input lies outside the domain of its logarithm or power.
    #[error("{quantity} = {value} is outside the model domain (must be finite and > 0)")]
    Domain { quantity: &'static str, value: f64 },

    #[error("tree has no {attribute}, required by the fallback biomass models")]
    MissingAttribute { attribute: &'static str },

    #[error("species {0:?} not found in species lookup")]
    UnknownSpecies(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgbError>;

impl AgbError {
    pub(crate) fn data_format(context: impl Into<String>, reason: impl Into<String>) -> Self {
        AgbError::DataFormat {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgbError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reject non-finite and non-positive values before they reach `ln` or `powf`.
pub(crate) fn require_positive(quantity: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AgbError::Domain { quantity, value })
    }
}
