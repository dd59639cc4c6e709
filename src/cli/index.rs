use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzspeclib::index::{index_path_for, IndexConfig, LibraryIndex};

use super::Config;

/// Build or refresh the side index of a text or JSON library
pub fn run(input: PathBuf, force: bool, config: Config) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    let index_path = index_path_for(&input);

    let index = if force {
        let index = LibraryIndex::build(&input)
            .with_context(|| format!("Failed to index {}", input.display()))?;
        index
            .save(&index_path)
            .with_context(|| format!("Failed to write {}", index_path.display()))?;
        index
    } else {
        let index_config = IndexConfig {
            rebuild_if_stale: config.index.rebuild_if_stale.unwrap_or(true),
        };
        LibraryIndex::load_or_build(&input, &index_config)
            .with_context(|| format!("Failed to index {}", input.display()))?
    };

    info!("Index: {}", index_path.display());
    println!(
        "{}: {} spectra, {} clusters ({} index, built {})",
        input.display(),
        index.len(),
        index.clusters().len(),
        index.format(),
        index.created().to_rfc3339()
    );
    Ok(())
}
