use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzspeclib::adapters::open_adapter;
use mzspeclib::validator::{InMemoryOntology, MzPafChecker, ProfileRegistry, ValidationReport};

use super::Config;

const DEFAULT_PROFILE: &str = "base";

/// Validate a library against a profile; exits with status 1 when the
/// verdict fails
pub fn run(
    input: PathBuf,
    profile: Option<String>,
    ontology: Option<PathBuf>,
    profiles_file: Option<PathBuf>,
    config: Config,
) -> Result<()> {
    let profile_name = profile
        .or(config.validate.profile)
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    let mut registry = ProfileRegistry::builtin().context("Failed to load built-in profiles")?;
    if let Some(path) = profiles_file.or(config.validate.profiles_file) {
        registry
            .add_profiles_file(&path)
            .with_context(|| format!("Failed to load profiles from {}", path.display()))?;
    }
    let profile = registry
        .compose(&profile_name)
        .with_context(|| format!("Failed to compose profile {}", profile_name))?;

    let mut terms = InMemoryOntology::builtin().context("Failed to load built-in terms")?;
    if let Some(path) = ontology.or(config.validate.ontology) {
        let extra = InMemoryOntology::from_file(&path)
            .with_context(|| format!("Failed to load term table {}", path.display()))?;
        terms.merge(extra);
    }

    info!("mzSpecLib Validator");
    info!("File: {}", input.display());
    info!("Profile: {} ({} rules)", profile.name, profile.rules.len());

    let library = open_adapter(&input)
        .and_then(|mut adapter| adapter.read_library())
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let records = profile.validator(&terms, &MzPafChecker).validate(&library);
    let verdict = profile.thresholds.verdict(&records);
    let report = ValidationReport::from_records(input.display().to_string(), &records)
        .with_verdict(verdict);

    #[cfg(feature = "colorized_output")]
    {
        println!("{}", report.format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", report);
    }

    if !verdict.passed {
        std::process::exit(1);
    }
    Ok(())
}
