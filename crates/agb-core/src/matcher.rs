//! Resolve a tree's (group, taxon, specific gravity) to regression coefficients.

use serde::Serialize;

use crate::reference::{Coefficients, ReferenceRow, ReferenceTable};

/// One plausible model when the gravity does not single out a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub group: String,
    pub taxon_label: String,
    pub coefficients: Coefficients,
}

impl Candidate {
    fn from_row(row: &ReferenceRow) -> Self {
        Self {
            group: row.group.clone(),
            taxon_label: row.taxon_label.clone(),
            coefficients: row.coefficients,
        }
    }
}

/// Outcome of matching a tree against the reference table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchResult {
    /// No row for this group/taxon.
    NoMatch,
    /// Exactly one row's gravity range contains the tree's gravity.
    Exact(Coefficients),
    /// Every row for the group/taxon, in table order.
    Candidates(Vec<Candidate>),
}

impl MatchResult {
    /// Coefficients the selector should use: the exact row, else the first candidate.
    pub fn preferred(&self) -> Option<Coefficients> {
        match self {
            MatchResult::NoMatch => None,
            MatchResult::Exact(c) => Some(*c),
            MatchResult::Candidates(cs) => cs.first().map(|c| c.coefficients),
        }
    }

    pub fn is_match(&self) -> bool {
        self.preferred().is_some()
    }
}

/// Match against a slice of normalised rows.
///
/// With a gravity, a single containing row is an exact match; zero or several
/// containing rows return every group/taxon row as candidates. Without a
/// gravity all group/taxon rows are candidates.
pub fn match_taxon(rows: &[ReferenceRow], group: &str, taxon: &str, spg: Option<f64>) -> MatchResult {
    let group = group.trim();
    let taxon = taxon.trim();
    let matching: Vec<&ReferenceRow> = rows
        .iter()
        .filter(|r| r.group == group && r.has_taxon(taxon))
        .collect();

    if matching.is_empty() {
        return MatchResult::NoMatch;
    }

    if let Some(spg) = spg {
        let mut containing = matching.iter().filter(|r| r.spg.contains(spg));
        if let (Some(only), None) = (containing.next(), containing.next()) {
            return MatchResult::Exact(only.coefficients);
        }
    }

    MatchResult::Candidates(matching.into_iter().map(Candidate::from_row).collect())
}

impl ReferenceTable {
    pub fn match_taxon(&self, group: &str, taxon: &str, spg: Option<f64>) -> MatchResult {
        match_taxon(self.rows(), group, taxon, spg)
    }
}
