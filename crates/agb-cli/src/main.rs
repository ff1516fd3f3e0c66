/// Estimate above-ground biomass for every tree in a field inventory and
/// write the augmented records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use agb_core::species::preprocess_trees;
use agb_core::{estimate_all, ModelConfig, ModelSelector, ReferenceTable, SpeciesDictionary, TreeInventory};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "agb-estimate", about = "Estimate above-ground biomass for a tree inventory")]
struct Args {
    /// Tree inventory JSON (`{"trees": [...]}`).
    #[arg(short, long)]
    trees: PathBuf,

    /// Species CSV mapping common names to taxon, group and wood density.
    #[arg(short, long)]
    species: Option<PathBuf>,

    /// Taxa-level parameter table CSV. Defaults to the built-in table.
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Model coefficient JSON; omitted fields keep published defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file. Writes to stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

fn run(args: &Args) -> Result<()> {
    let table = match &args.reference {
        Some(path) => ReferenceTable::from_path(path)
            .with_context(|| format!("loading reference table {}", path.display()))?,
        None => ReferenceTable::builtin().context("loading built-in reference table")?,
    };
    let config = match &args.config {
        Some(path) => ModelConfig::from_path(path)
            .with_context(|| format!("loading model config {}", path.display()))?,
        None => ModelConfig::default(),
    };
    let mut inventory = TreeInventory::from_path(&args.trees)
        .with_context(|| format!("loading tree inventory {}", args.trees.display()))?;

    if let Some(path) = &args.species {
        let species = SpeciesDictionary::from_path(path)
            .with_context(|| format!("loading species table {}", path.display()))?;
        preprocess_trees(&mut inventory.trees, &species).context("resolving species names")?;
    }

    let selector = ModelSelector::new(&table, &config);
    let report = estimate_all(&selector, &mut inventory.trees);
    if !report.failures.is_empty() {
        tracing::warn!(
            failed = report.failures.len(),
            total = inventory.trees.len(),
            "some trees have no biomass estimate"
        );
    }

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match args.format {
        OutputFormat::Csv => inventory.write_csv(sink)?,
        OutputFormat::Json => inventory.write_json(sink)?,
    }
    if let Some(path) = &args.output {
        tracing::info!(path = %path.display(), trees = inventory.trees.len(), "wrote estimates");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(&args)
}
