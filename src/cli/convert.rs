use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use mzspeclib::adapters::open_adapter;
use mzspeclib::json;
use mzspeclib::text::{TextWriter, TextWriterConfig};

use super::{Config, OutputFormat};

/// Convert any readable library to mzSpecLib text or JSON
pub fn run(
    input: PathBuf,
    output: PathBuf,
    format: Option<OutputFormat>,
    config: Config,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    let format = format.unwrap_or_else(|| infer_format(&output));

    let mut adapter = open_adapter(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    info!("mzSpecLib Converter - {} to {:?}", adapter.format(), format);
    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());

    let library = adapter
        .read_library()
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let writer = BufWriter::new(file);
    match format {
        OutputFormat::Text => {
            let writer_config = TextWriterConfig {
                compact_interpretations: config.convert.compact_interpretations.unwrap_or(false),
            };
            let mut writer = TextWriter::with_config(writer, writer_config);
            writer
                .write_library(&library)
                .context("Failed to write text library")?;
            writer.finish().context("Failed to flush text library")?;
        }
        OutputFormat::Json => {
            json::write_library(writer, &library, config.convert.pretty_json.unwrap_or(false))
                .context("Failed to write JSON library")?;
        }
    }

    info!("Conversion complete!");
    info!("  Spectra converted: {}", library.spectra.len());
    info!("  Clusters converted: {}", library.clusters.len());
    info!(
        "  Total peaks: {}",
        library.spectra.iter().map(|s| s.peaks.len()).sum::<usize>()
    );
    Ok(())
}

fn infer_format(output: &Path) -> OutputFormat {
    let name = output.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}
