//! Above-ground biomass estimation for individual trees.
//!
//! Pipeline:
//!   species lookup → taxon match against the reference table →
//!   taxon regression, else pantropical height model, else regional model.

pub mod batch;
pub mod config;
pub mod error;
pub mod formula;
pub mod matcher;
pub mod reference;
pub mod selector;
pub mod species;
pub mod tree;

pub use batch::{estimate_all, BatchReport};
pub use config::{HeightModel, ModelConfig, NoHeightModel};
pub use error::{AgbError, Result};
pub use matcher::{Candidate, MatchResult};
pub use reference::{Coefficients, DiameterClass, ReferenceRow, ReferenceTable, SpgRange};
pub use selector::{Estimate, ModelSelector, Tier};
pub use species::{SpeciesDictionary, SpeciesInfo, SpeciesLookup};
pub use tree::{TreeInventory, TreeRecord};
