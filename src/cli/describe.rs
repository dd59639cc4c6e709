use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use mzspeclib::adapters::open_adapter;
use mzspeclib::index::{IndexConfig, IndexedLibrary};
use mzspeclib::text::format_spectrum;

use super::Config;

/// Summarize a library, or print one spectrum looked up through the index
pub fn run(input: PathBuf, key: Option<u64>, config: Config) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    match key {
        Some(key) => describe_spectrum(input, key, config),
        None => describe_library(input),
    }
}

fn describe_spectrum(input: PathBuf, key: u64, config: Config) -> Result<()> {
    let index_config = IndexConfig {
        rebuild_if_stale: config.index.rebuild_if_stale.unwrap_or(true),
    };
    let library = IndexedLibrary::open_with_config(&input, &index_config)
        .with_context(|| format!("Failed to open indexed library {}", input.display()))?;
    let spectrum = library
        .get_spectrum(key)
        .with_context(|| format!("Failed to read spectrum {}", key))?;
    print!(
        "{}",
        format_spectrum(&spectrum).context("Failed to format spectrum")?
    );
    Ok(())
}

fn describe_library(input: PathBuf) -> Result<()> {
    let mut adapter = open_adapter(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    println!("mzSpecLib Library Information");
    println!("=============================");
    println!("File: {}", input.display());
    println!("Format: {}", adapter.format());
    println!();

    println!("Library Attributes:");
    for attribute in adapter.header().attributes.iter() {
        println!("  {}", attribute);
    }
    println!();

    let mut spectra = 0usize;
    let mut peaks = 0usize;
    let mut analytes = 0usize;
    let mut charges: BTreeMap<i64, usize> = BTreeMap::new();
    let mut mz_range: Option<(f64, f64)> = None;
    for spectrum in adapter.spectra() {
        let spectrum =
            spectrum.with_context(|| format!("Failed to read {}", input.display()))?;
        spectra += 1;
        peaks += spectrum.peaks.len();
        analytes += spectrum.analytes.len();
        if let Some(charge) = spectrum.charge() {
            *charges.entry(charge).or_insert(0) += 1;
        }
        if let Some(mz) = spectrum.precursor_mz() {
            mz_range = Some(match mz_range {
                Some((lo, hi)) => (lo.min(mz), hi.max(mz)),
                None => (mz, mz),
            });
        }
    }

    println!("Statistics:");
    println!("  Spectra: {}", spectra);
    println!("  Analytes: {}", analytes);
    println!("  Peaks: {}", peaks);
    if spectra > 0 {
        println!("  Mean peaks per spectrum: {:.1}", peaks as f64 / spectra as f64);
    }
    if let Some((lo, hi)) = mz_range {
        println!("  Precursor m/z: {:.4} - {:.4}", lo, hi);
    }
    if !charges.is_empty() {
        println!("  Charge states:");
        for (charge, count) in &charges {
            println!("    {:+}: {}", charge, count);
        }
    }
    Ok(())
}
