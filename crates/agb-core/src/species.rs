//! Common-name → taxonomy lookup used to prepare raw field records.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgbError, Result};
use crate::tree::TreeRecord;

/// What the estimator needs to know about a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesInfo {
    pub taxon: String,
    pub group: String,
    pub specific_gravity: f64,
    pub fia_species_code: Option<u32>,
}

/// Anything that can resolve a common species name.
pub trait SpeciesLookup {
    fn lookup(&self, common_name: &str) -> Option<&SpeciesInfo>;
}

impl SpeciesLookup for HashMap<String, SpeciesInfo> {
    fn lookup(&self, common_name: &str) -> Option<&SpeciesInfo> {
        self.get(common_name)
    }
}

#[derive(Debug, Deserialize)]
struct SpeciesCsvRow {
    #[serde(rename = "Common name")]
    common_name: String,
    #[serde(rename = "Taxa")]
    taxa: String,
    #[serde(rename = "FIA species code", default)]
    fia_species_code: Option<u32>,
    #[serde(rename = "Wood specific gravity")]
    specific_gravity: f64,
    #[serde(rename = "Group")]
    group: String,
}

/// Species table keyed by common name.
#[derive(Debug, Clone, Default)]
pub struct SpeciesDictionary {
    entries: HashMap<String, SpeciesInfo>,
}

impl SpeciesDictionary {
    /// Read a species CSV with `Common name`, `Taxa`, `FIA species code`,
    /// `Wood specific gravity` and `Group` columns. The taxon is the first
    /// word of `Taxa`; later rows replace earlier ones with the same name.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = HashMap::new();
        for (i, row) in rdr.deserialize::<SpeciesCsvRow>().enumerate() {
            let row = row?;
            let taxon = row
                .taxa
                .split_whitespace()
                .next()
                .ok_or_else(|| AgbError::data_format(format!("species row {}", i + 1), "empty Taxa"))?
                .to_string();
            entries.insert(
                row.common_name,
                SpeciesInfo {
                    taxon,
                    group: row.group,
                    specific_gravity: row.specific_gravity,
                    fia_species_code: row.fia_species_code,
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AgbError::io(path, e))?;
        let dict = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), species = dict.len(), "loaded species dictionary");
        Ok(dict)
    }

    pub fn insert(&mut self, common_name: impl Into<String>, info: SpeciesInfo) {
        self.entries.insert(common_name.into(), info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SpeciesLookup for SpeciesDictionary {
    fn lookup(&self, common_name: &str) -> Option<&SpeciesInfo> {
        self.entries.get(common_name)
    }
}

/// Fill taxon, group, specific gravity and FIA code from the species label.
///
/// Records without a species label are left as they are, so inventories that
/// already carry taxonomy pass straight through.
pub fn preprocess_tree<L: SpeciesLookup + ?Sized>(tree: &mut TreeRecord, lookup: &L) -> Result<()> {
    let Some(species) = tree.species.as_deref() else {
        return Ok(());
    };
    let info = lookup
        .lookup(species)
        .ok_or_else(|| AgbError::UnknownSpecies(species.to_string()))?;
    tree.taxon = Some(info.taxon.clone());
    tree.group = Some(info.group.clone());
    tree.specific_gravity = Some(info.specific_gravity);
    tree.fia_species_code = info.fia_species_code;
    Ok(())
}

/// Preprocess every tree; the first unknown species aborts.
pub fn preprocess_trees<L: SpeciesLookup + ?Sized>(trees: &mut [TreeRecord], lookup: &L) -> Result<()> {
    trees.iter_mut().try_for_each(|t| preprocess_tree(t, lookup))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Common name,Taxa,FIA species code,Wood specific gravity,Group\n\
                          Oak,Genus1 species1,101,0.6,GroupA\n\
                          Pine,Genus2 species2,102,0.5,GroupB\n\
                          Maple,Genus3 species3,103,0.7,GroupC\n";

    fn sample() -> SpeciesDictionary {
        SpeciesDictionary::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn builds_dictionary_from_csv() {
        let d = sample();
        assert_eq!(d.len(), 3);
        assert_eq!(d.lookup("Oak").unwrap().taxon, "Genus1");
        assert_eq!(d.lookup("Pine").unwrap().fia_species_code, Some(102));
        assert_eq!(d.lookup("Maple").unwrap().specific_gravity, 0.7);
        assert_eq!(d.lookup("Pine").unwrap().group, "GroupB");
        assert!(d.lookup("Birch").is_none());
    }

    #[test]
    fn blank_fia_code_is_none() {
        let csv = "Common name,Taxa,FIA species code,Wood specific gravity,Group\n\
                   Juniper,Cupressoceae Juniperus,,0.44,Woodland\n";
        let d = SpeciesDictionary::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(d.lookup("Juniper").unwrap().fia_species_code, None);
        assert_eq!(d.lookup("Juniper").unwrap().taxon, "Cupressoceae");
    }

    /// Only the first `Taxa` word survives, so two-word reference taxa such
    /// as `Fagaceae evergreen` are out of reach through the dictionary.
    #[test]
    fn taxon_is_first_word_only() {
        let csv = "Common name,Taxa,FIA species code,Wood specific gravity,Group\n\
                   Live oak,Fagaceae evergreen Quercus virginiana,838,0.8,Hardwood\n";
        let d = SpeciesDictionary::from_reader(csv.as_bytes()).unwrap();
        let mut tree = TreeRecord { species: Some("Live oak".into()), ..TreeRecord::new(30.0) };
        preprocess_tree(&mut tree, &d).unwrap();
        assert_eq!(tree.taxon.as_deref(), Some("Fagaceae"));

        let table = crate::reference::ReferenceTable::builtin().unwrap();
        assert!(!table.match_taxon("Hardwood", "Fagaceae", tree.specific_gravity).is_match());
    }

    #[test]
    fn empty_taxa_is_rejected() {
        let csv = "Common name,Taxa,FIA species code,Wood specific gravity,Group\n\
                   Mystery,,1,0.5,Hardwood\n";
        assert!(matches!(
            SpeciesDictionary::from_reader(csv.as_bytes()),
            Err(AgbError::DataFormat { .. })
        ));
    }

    #[test]
    fn preprocess_fills_taxonomy() {
        let mut tree = TreeRecord { species: Some("Oak".into()), ..TreeRecord::new(10.0) };
        preprocess_tree(&mut tree, &sample()).unwrap();
        assert_eq!(tree.taxon.as_deref(), Some("Genus1"));
        assert_eq!(tree.group.as_deref(), Some("GroupA"));
        assert_eq!(tree.specific_gravity, Some(0.6));
        assert_eq!(tree.fia_species_code, Some(101));
    }

    #[test]
    fn preprocess_many() {
        let mut trees = vec![
            TreeRecord { species: Some("Pine".into()), ..TreeRecord::new(5.0) },
            TreeRecord { species: Some("Maple".into()), ..TreeRecord::new(6.0) },
        ];
        preprocess_trees(&mut trees, &sample()).unwrap();
        assert_eq!(trees[0].taxon.as_deref(), Some("Genus2"));
        assert_eq!(trees[0].specific_gravity, Some(0.5));
        assert_eq!(trees[1].taxon.as_deref(), Some("Genus3"));
        assert_eq!(trees[1].group.as_deref(), Some("GroupC"));
    }

    #[test]
    fn unknown_species_is_an_error() {
        let mut tree = TreeRecord { species: Some("Baobab".into()), ..TreeRecord::new(10.0) };
        assert!(matches!(
            preprocess_tree(&mut tree, &sample()),
            Err(AgbError::UnknownSpecies(s)) if s == "Baobab"
        ));
    }

    #[test]
    fn unlabelled_tree_passes_through() {
        let mut tree = TreeRecord::new(10.0).with_taxon("Conifer", "Larix");
        let before = tree.clone();
        preprocess_tree(&mut tree, &sample()).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn hashmap_is_a_lookup() {
        let mut map = HashMap::new();
        map.insert(
            "Juniper".to_string(),
            SpeciesInfo { taxon: "Cupressoceae".into(), group: "Woodland".into(), specific_gravity: 0.44, fia_species_code: None },
        );
        let mut tree = TreeRecord { species: Some("Juniper".into()), ..TreeRecord::new(8.0) };
        preprocess_tree(&mut tree, &map).unwrap();
        assert_eq!(tree.group.as_deref(), Some("Woodland"));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("species.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(SpeciesDictionary::from_path(&path).unwrap().len(), 3);
    }
}
