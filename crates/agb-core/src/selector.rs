//! Three-tier model selection.
//!
//! Tiers, first applicable wins:
//!   1. Taxon-specific regression from the reference table.
//!   2. Pantropical height model, when a height is measured.
//!   3. Regional model without height.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{AgbError, Result};
use crate::formula::{pantropical_biomass, regional_biomass, taxa_biomass};
use crate::matcher::MatchResult;
use crate::reference::{DiameterClass, ReferenceTable};
use crate::tree::TreeRecord;

/// Which model produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    TaxonSpecific,
    HeightBased,
    HeightLess,
}

/// Biomass for one tree plus how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Above-ground biomass in kg.
    pub agb: f64,
    pub tier: Tier,
    /// Diameter convention of the model that was evaluated.
    pub diameter_class: DiameterClass,
    /// The tree fell back to a DBH model although its taxon is only
    /// parameterised for root-collar diameter elsewhere in the table.
    pub diameter_mismatch: bool,
}

/// Picks and evaluates a model for each tree against a shared table and config.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector<'a> {
    table: &'a ReferenceTable,
    config: &'a ModelConfig,
}

impl<'a> ModelSelector<'a> {
    pub fn new(table: &'a ReferenceTable, config: &'a ModelConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &'a ReferenceTable {
        self.table
    }

    pub fn config(&self) -> &'a ModelConfig {
        self.config
    }

    /// Biomass of `tree` in kg.
    pub fn select_and_compute(&self, tree: &TreeRecord) -> Result<f64> {
        self.estimate(tree).map(|e| e.agb)
    }

    pub fn estimate(&self, tree: &TreeRecord) -> Result<Estimate> {
        if let (Some(group), Some(taxon)) = (tree.group.as_deref(), tree.taxon.as_deref()) {
            let matched = self.table.match_taxon(group, taxon, tree.specific_gravity);
            if let MatchResult::Candidates(cs) = &matched {
                if cs.len() > 1 {
                    tracing::debug!(
                        group,
                        taxon,
                        candidates = cs.len(),
                        chosen = %cs[0].taxon_label,
                        "ambiguous reference match, using first candidate"
                    );
                }
            }
            if let Some(c) = matched.preferred() {
                let agb = taxa_biomass(c.b0, c.b1, c.diameter_class, tree.dbh)?;
                return Ok(Estimate {
                    agb,
                    tier: Tier::TaxonSpecific,
                    diameter_class: c.diameter_class,
                    diameter_mismatch: false,
                });
            }
        }

        let diameter_mismatch = self.only_drc_elsewhere(tree);
        if diameter_mismatch {
            tracing::warn!(
                group = tree.group.as_deref().unwrap_or(""),
                taxon = tree.taxon.as_deref().unwrap_or(""),
                "taxon only has root-collar models in other groups; generic model assumes dbh"
            );
        }

        let rho = tree
            .specific_gravity
            .ok_or(AgbError::MissingAttribute { attribute: "specific gravity" })?;

        let (agb, tier) = match tree.height {
            Some(h) if h != 0.0 => (
                pantropical_biomass(&self.config.height_model, rho, tree.dbh, h)?,
                Tier::HeightBased,
            ),
            _ => (
                regional_biomass(
                    &self.config.no_height_model,
                    rho,
                    tree.dbh,
                    self.config.environmental_stress,
                )?,
                Tier::HeightLess,
            ),
        };

        Ok(Estimate {
            agb,
            tier,
            diameter_class: DiameterClass::Dbh,
            diameter_mismatch,
        })
    }

    /// Estimate and write `agb` / `tier` into the record.
    pub fn apply(&self, tree: &mut TreeRecord) -> Result<Estimate> {
        let estimate = self.estimate(tree)?;
        tree.agb = Some(estimate.agb);
        tree.tier = Some(estimate.tier);
        Ok(estimate)
    }

    fn only_drc_elsewhere(&self, tree: &TreeRecord) -> bool {
        let Some(taxon) = tree.taxon.as_deref().map(str::trim) else {
            return false;
        };
        let mut classes = self
            .table
            .rows()
            .iter()
            .filter(|r| r.has_taxon(taxon))
            .map(|r| r.coefficients.diameter_class)
            .peekable();
        classes.peek().is_some() && classes.all(|c| c == DiameterClass::Drc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeightModel, NoHeightModel};
    use approx::assert_relative_eq;

    fn fixtures() -> (ReferenceTable, ModelConfig) {
        (ReferenceTable::builtin().unwrap(), ModelConfig::default())
    }

    #[test]
    fn exact_match_uses_taxon_tier() {
        let (t, c) = fixtures();
        let s = ModelSelector::new(&t, &c);
        let tree = TreeRecord::new(1.0).with_taxon("Woodland", "Cupressoceae").with_specific_gravity(0.7);
        let e = s.estimate(&tree).unwrap();
        assert_eq!(e.tier, Tier::TaxonSpecific);
        assert_eq!(e.diameter_class, DiameterClass::Drc);
        assert_eq!((e.agb * 100.0).round() / 100.0, 0.15);
    }

    #[test]
    fn woodland_fabaceae_at_unit_dbh() {
        let (t, c) = fixtures();
        let tree = TreeRecord::new(1.0).with_taxon("Woodland", "Fabaceae").with_specific_gravity(0.5);
        let agb = ModelSelector::new(&t, &c).select_and_compute(&tree).unwrap();
        assert_eq!((agb * 100.0).round() / 100.0, 0.13);
    }

    #[test]
    fn ambiguous_match_uses_first_candidate() {
        let (t, c) = fixtures();
        let tree = TreeRecord::new(20.0).with_taxon("Conifer", "Cupressoceae");
        let e = ModelSelector::new(&t, &c).estimate(&tree).unwrap();
        assert_eq!(e.tier, Tier::TaxonSpecific);
        let expected = taxa_biomass(-1.9615, 2.1063, DiameterClass::Dbh, 20.0).unwrap();
        assert_relative_eq!(e.agb, expected, max_relative = 1e-12);
    }

    #[test]
    fn taxon_tier_ignores_height() {
        let (t, c) = fixtures();
        let s = ModelSelector::new(&t, &c);
        let base = TreeRecord::new(15.0).with_taxon("Conifer", "Larix").with_specific_gravity(0.5);
        let a = s.select_and_compute(&base).unwrap();
        let b = s.select_and_compute(&base.clone().with_height(12.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_match_with_height_uses_pantropical() {
        let (t, _) = fixtures();
        let c = ModelConfig { height_model: HeightModel::new(0.0673, 0.976), ..ModelConfig::default() };
        let tree = TreeRecord::new(2.0)
            .with_taxon("Tropical", "Dipterocarpaceae")
            .with_specific_gravity(1.0)
            .with_height(3.0);
        let e = ModelSelector::new(&t, &c).estimate(&tree).unwrap();
        assert_eq!(e.tier, Tier::HeightBased);
        assert_eq!((e.agb * 1000.0).round() / 1000.0, 0.761);
    }

    #[test]
    fn no_match_without_height_uses_regional() {
        let (t, c) = fixtures();
        let tree = TreeRecord::new(10.0).with_specific_gravity(0.5);
        let e = ModelSelector::new(&t, &c).estimate(&tree).unwrap();
        assert_eq!(e.tier, Tier::HeightLess);
        assert!(e.agb.is_finite() && e.agb > 0.0);
        assert_relative_eq!(
            e.agb,
            regional_biomass(&NoHeightModel::default(), 0.5, 10.0, 1.0).unwrap(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn zero_height_counts_as_absent() {
        let (t, c) = fixtures();
        let tree = TreeRecord::new(10.0).with_specific_gravity(0.5).with_height(0.0);
        assert_eq!(ModelSelector::new(&t, &c).estimate(&tree).unwrap().tier, Tier::HeightLess);
    }

    #[test]
    fn removing_height_drops_to_height_less_tier() {
        let (t, c) = fixtures();
        let s = ModelSelector::new(&t, &c);
        let mut tree = TreeRecord::new(10.0)
            .with_taxon("Conifer", "Sequoia")
            .with_specific_gravity(0.4)
            .with_height(20.0);
        assert_eq!(s.estimate(&tree).unwrap().tier, Tier::HeightBased);
        tree.height = None;
        assert_eq!(s.estimate(&tree).unwrap().tier, Tier::HeightLess);
    }

    #[test]
    fn environmental_stress_comes_from_config() {
        let (t, _) = fixtures();
        let tree = TreeRecord::new(10.0).with_specific_gravity(0.5);
        let low = ModelConfig { environmental_stress: 0.0, ..ModelConfig::default() };
        let high = ModelConfig { environmental_stress: 2.0, ..ModelConfig::default() };
        let a = ModelSelector::new(&t, &low).select_and_compute(&tree).unwrap();
        let b = ModelSelector::new(&t, &high).select_and_compute(&tree).unwrap();
        assert!(a > b, "higher stress should lower biomass: {a} vs {b}");
    }

    #[test]
    fn fallback_without_gravity_is_an_error() {
        let (t, c) = fixtures();
        let tree = TreeRecord::new(10.0).with_height(5.0);
        assert!(matches!(
            ModelSelector::new(&t, &c).estimate(&tree),
            Err(AgbError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn domain_errors_propagate() {
        let (t, c) = fixtures();
        let s = ModelSelector::new(&t, &c);
        let taxon_tree = TreeRecord::new(0.0).with_taxon("Conifer", "Larix");
        assert!(matches!(s.estimate(&taxon_tree), Err(AgbError::Domain { .. })));
        let height_tree = TreeRecord::new(10.0).with_specific_gravity(0.5).with_height(-2.0);
        assert!(matches!(s.estimate(&height_tree), Err(AgbError::Domain { .. })));
        let rho_tree = TreeRecord::new(10.0).with_specific_gravity(0.0);
        assert!(matches!(s.estimate(&rho_tree), Err(AgbError::Domain { .. })));
    }

    #[test]
    fn drc_only_taxon_in_other_group_is_flagged() {
        let (t, c) = fixtures();
        // Pinaceae exists only as a Woodland (drc) row.
        let tree = TreeRecord::new(30.0)
            .with_taxon("Conifer", "Pinaceae")
            .with_specific_gravity(0.45);
        let e = ModelSelector::new(&t, &c).estimate(&tree).unwrap();
        assert_eq!(e.tier, Tier::HeightLess);
        assert!(e.diameter_mismatch);

        let unknown = TreeRecord::new(30.0).with_taxon("Conifer", "Araucaria").with_specific_gravity(0.45);
        assert!(!ModelSelector::new(&t, &c).estimate(&unknown).unwrap().diameter_mismatch);
    }

    #[test]
    fn apply_writes_agb_and_tier() {
        let (t, c) = fixtures();
        let mut tree = TreeRecord::new(25.0).with_taxon("Conifer", "Cupressoceae").with_specific_gravity(0.40);
        let e = ModelSelector::new(&t, &c).apply(&mut tree).unwrap();
        assert_eq!(tree.agb, Some(e.agb));
        assert_eq!(tree.tier, Some(Tier::TaxonSpecific));
        assert_relative_eq!(e.agb, 207.7366, epsilon = 1e-3);
    }

    #[test]
    fn estimates_are_idempotent() {
        let (t, c) = fixtures();
        let s = ModelSelector::new(&t, &c);
        let mut tree = TreeRecord::new(12.0).with_taxon("Hardwood", "Betulaceae").with_specific_gravity(0.45);
        let first = s.apply(&mut tree).unwrap();
        let second = s.apply(&mut tree).unwrap();
        assert_eq!(first, second);
    }
}
