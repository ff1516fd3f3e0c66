//! Taxa-level allometric parameter table.
//!
//! The source table packs two things into its `Taxa` column: one or more
//! taxon names joined by `/`, and an optional specific-gravity qualifier
//! (`< 0.30 spg`, `>= 0.40 spg`, `0.40-0.49 spg`). Both are normalised here,
//! once, into [`ReferenceRow`]s so matching never has to look at raw text.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AgbError, Result};

/// Upper ceiling used for open-ended gravity ranges.
pub const SPG_CEILING: f64 = 1.5;

/// The shipped Chojnacky-style parameter table.
pub const BUILTIN_TABLE: &str = include_str!("../data/taxa_level_agb_model_parameters.csv");

// ── Column layout ─────────────────────────────────────────────────────────────

const COL_GROUP: usize = 0;
const COL_TAXA: usize = 1;
const COL_B0: usize = 3;
const COL_B1: usize = 4;
const COL_DIAMETER_CLASS: usize = 7;
const COL_R_SQUARED: usize = 9;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Diameter convention a regression expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiameterClass {
    /// Diameter at breast height.
    Dbh,
    /// Diameter at root collar.
    Drc,
}

impl FromStr for DiameterClass {
    type Err = AgbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dbh" => Ok(DiameterClass::Dbh),
            "drc" => Ok(DiameterClass::Drc),
            other => Err(AgbError::InvalidDiameterClass(other.to_string())),
        }
    }
}

impl fmt::Display for DiameterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiameterClass::Dbh => "dbh",
            DiameterClass::Drc => "drc",
        })
    }
}

/// Half-open specific-gravity interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpgRange {
    pub lower: f64,
    pub upper: f64,
}

impl SpgRange {
    /// Range of a row with no gravity qualifier.
    pub const UNCONSTRAINED: SpgRange = SpgRange { lower: 0.0, upper: SPG_CEILING };

    /// Returns None unless both bounds are finite and `lower < upper`.
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        (lower.is_finite() && upper.is_finite() && lower < upper).then_some(Self { lower, upper })
    }

    #[inline]
    pub fn contains(&self, spg: f64) -> bool {
        self.lower <= spg && spg < self.upper
    }
}

/// Regression coefficients of one reference row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    /// Fit quality; carried through, never used in computation.
    pub r_squared: f64,
    pub diameter_class: DiameterClass,
}

/// One normalised entry of the parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub group: String,
    /// The `Taxa` cell exactly as it appears in the table.
    pub taxon_label: String,
    pub taxon_names: Vec<String>,
    pub coefficients: Coefficients,
    pub spg: SpgRange,
}

impl ReferenceRow {
    pub fn has_taxon(&self, taxon: &str) -> bool {
        self.taxon_names.iter().any(|n| n == taxon)
    }
}

/// A table row before label parsing, as handed over by whatever read the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReferenceRow {
    pub group: String,
    pub taxon_label: String,
    pub b0: f64,
    pub b1: f64,
    pub r_squared: f64,
    pub diameter_class: String,
}

// ── Label parsing ─────────────────────────────────────────────────────────────

static QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<names>.*?)\s*(?:(?P<op><|>=)\s*(?P<bound>\d*\.?\d+)|(?P<lo>\d*\.?\d+)\s*-\s*(?P<hi>\d*\.?\d+))(?:\s*spg)?$",
    )
    .expect("qualifier pattern is valid")
});

/// Anything that looks like a gravity qualifier; such labels must parse.
static QUALIFIER_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[<>]|\d\s*-\s*\d|spg").expect("qualifier hint pattern is valid")
});

/// Split the name part of a label into trimmed taxon names.
pub fn split_taxon_names(names: &str) -> Vec<String> {
    names
        .split('/')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a `Taxa` cell into its taxon names and specific-gravity range.
///
/// | label                          | range          |
/// |--------------------------------|----------------|
/// | `Larix`                        | `[0.0, 1.5)`   |
/// | `Tsuga < 0.40 spg`             | `[0.0, 0.40)`  |
/// | `Tsuga >= 0.40 spg`            | `[0.40, 1.5)`  |
/// | `Betulaceae 0.40-0.49 spg`     | `[0.40, 0.49)` |
///
/// The trailing `spg` is optional. A label carrying `<`, `>`, a dashed
/// number range or `spg` that fits none of these shapes is rejected.
pub fn parse_taxon_label(label: &str) -> Result<(Vec<String>, SpgRange)> {
    let label = label.trim();
    let bad = |reason: &str| AgbError::data_format(format!("taxon label {label:?}"), reason);

    let Some(caps) = QUALIFIER.captures(label) else {
        if QUALIFIER_HINT.is_match(label) {
            return Err(bad("unrecognised specific-gravity qualifier"));
        }
        let names = split_taxon_names(label);
        if names.is_empty() {
            return Err(bad("no taxon name"));
        }
        return Ok((names, SpgRange::UNCONSTRAINED));
    };
    let number = |name: &str| -> Result<f64> {
        caps[name]
            .parse::<f64>()
            .map_err(|_| bad(&format!("unparsable bound {:?}", &caps[name])))
    };

    let (lower, upper) = match caps.name("op").map(|m| m.as_str()) {
        Some("<") => (0.0, number("bound")?),
        Some(_) => (number("bound")?, SPG_CEILING),
        None => (number("lo")?, number("hi")?),
    };
    let range = SpgRange::new(lower, upper)
        .ok_or_else(|| bad(&format!("empty gravity range [{lower}, {upper})")))?;

    let names = split_taxon_names(&caps["names"]);
    if names.is_empty() {
        return Err(bad("no taxon name before qualifier"));
    }
    Ok((names, range))
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Immutable, normalised parameter table. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    /// Normalise raw rows. The first bad row aborts the whole load.
    /// Duplicate rows are all kept.
    pub fn load<I>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawReferenceRow>,
    {
        let mut rows = Vec::new();
        for (i, r) in raw.into_iter().enumerate() {
            let (taxon_names, spg) = parse_taxon_label(&r.taxon_label).map_err(|e| match e {
                AgbError::DataFormat { reason, .. } => AgbError::data_format(
                    format!("reference row {} ({:?})", i + 1, r.taxon_label),
                    reason,
                ),
                other => other,
            })?;
            let diameter_class = r.diameter_class.parse::<DiameterClass>()?;
            rows.push(ReferenceRow {
                group: r.group.trim().to_string(),
                taxon_label: r.taxon_label,
                taxon_names,
                coefficients: Coefficients {
                    b0: r.b0,
                    b1: r.b1,
                    r_squared: r.r_squared,
                    diameter_class,
                },
                spg,
            });
        }
        Ok(Self { rows })
    }

    /// Read the fixed column layout from CSV with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut raw = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let context = format!("reference row {}", i + 1);
            let field = |col: usize| {
                record
                    .get(col)
                    .ok_or_else(|| AgbError::data_format(&context, format!("missing column {col}")))
            };
            let float = |col: usize| -> Result<f64> {
                let s = field(col)?;
                s.parse::<f64>()
                    .map_err(|_| AgbError::data_format(&context, format!("column {col}: {s:?} is not a number")))
            };
            raw.push(RawReferenceRow {
                group: field(COL_GROUP)?.to_string(),
                taxon_label: field(COL_TAXA)?.to_string(),
                b0: float(COL_B0)?,
                b1: float(COL_B1)?,
                r_squared: float(COL_R_SQUARED)?,
                diameter_class: field(COL_DIAMETER_CLASS)?.to_string(),
            });
        }
        Self::load(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AgbError::io(path, e))?;
        let table = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), rows = table.len(), "loaded reference table");
        Ok(table)
    }

    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self> {
        let table = Self::from_reader(BUILTIN_TABLE.as_bytes())?;
        tracing::debug!(rows = table.len(), "loaded built-in reference table");
        Ok(table)
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
