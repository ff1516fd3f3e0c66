use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgbError, Result};
use crate::selector::Tier;

/// One measured tree. The estimator fills `agb` and `tier`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    #[serde(default)]
    pub species: Option<String>,
    /// Diameter at breast height in cm.
    pub dbh: f64,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, alias = "taxa")]
    pub taxon: Option<String>,
    #[serde(default, alias = "spg")]
    pub specific_gravity: Option<f64>,
    /// Total height in metres.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub x_pos: Option<f64>,
    #[serde(default)]
    pub y_pos: Option<f64>,
    #[serde(default)]
    pub fia_species_code: Option<u32>,
    /// Above-ground biomass in kg.
    #[serde(default)]
    pub agb: Option<f64>,
    #[serde(default)]
    pub tier: Option<Tier>,
}

impl TreeRecord {
    pub fn new(dbh: f64) -> Self {
        Self { dbh, ..Self::default() }
    }

    pub fn with_taxon(mut self, group: &str, taxon: &str) -> Self {
        self.group = Some(group.to_string());
        self.taxon = Some(taxon.to_string());
        self
    }

    pub fn with_specific_gravity(mut self, spg: f64) -> Self {
        self.specific_gravity = Some(spg);
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }
}

/// A field inventory: `{"trees": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeInventory {
    pub trees: Vec<TreeRecord>,
}

impl TreeInventory {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("trees").is_none() {
            return Err(AgbError::data_format("tree inventory", "missing \"trees\" key"));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AgbError::io(path, e))?;
        let inventory = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), trees = inventory.trees.len(), "loaded tree inventory");
        Ok(inventory)
    }

    /// One CSV row per tree; absent values are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for tree in &self.trees {
            wtr.serialize(tree)?;
        }
        wtr.flush().map_err(|e| AgbError::Csv(e.into()))?;
        Ok(())
    }

    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| AgbError::Json(serde_json::Error::io(e)))?;
        Ok(())
    }
}
