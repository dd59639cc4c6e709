//! # Foreign-Format Adapters
//!
//! Readers that present other spectral library formats as mzSpecLib
//! [`Spectrum`] streams:
//!
//! - [`msp`] - NIST-style MSP flat text
//! - [`bibliospec`] - BiblioSpec `.blib` SQLite libraries
//! - [`encyclopedia`] - EncyclopeDIA `.dlib`/`.elib` SQLite libraries
//! - [`diann`] - DIA-NN TSV spectral libraries
//! - [`spectronaut`] - Spectronaut TSV spectral libraries
//!
//! Native text and JSON libraries are served by the same interface so
//! callers can treat every readable file alike.
//!
//! ```rust,no_run
//! use mzspeclib::adapters::open_adapter;
//!
//! let mut adapter = open_adapter("library.msp")?;
//! for spectrum in adapter.spectra() {
//!     let spectrum = spectrum?;
//!     println!("{} {:?}", spectrum.key, spectrum.name());
//! }
//! # Ok::<(), mzspeclib::adapters::AdapterError>(())
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use flate2::read::GzDecoder;
use log::debug;

use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::ms_terms;
use crate::model::{Library, LibraryHeader, Spectrum};

pub use error::AdapterError;

pub mod bibliospec;
pub mod diann;
pub mod encyclopedia;
pub mod msp;
pub mod native;
pub mod spectronaut;

mod blob;
mod error;
mod tabular;

#[cfg(test)]
mod tests;

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const GZIP_MAGIC: &[u8] = b"\x1f\x8b";

/// Library formats this crate can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// mzSpecLib text
    Text,
    /// mzSpecLib JSON
    Json,
    /// NIST MSP
    Msp,
    /// BiblioSpec SQLite
    BiblioSpec,
    /// EncyclopeDIA SQLite
    EncyclopeDia,
    /// DIA-NN TSV
    DiaNn,
    /// Spectronaut TSV
    Spectronaut,
}

impl Format {
    /// Short lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Msp => "msp",
            Format::BiblioSpec => "bibliospec",
            Format::EncyclopeDia => "encyclopedia",
            Format::DiaNn => "diann",
            Format::Spectronaut => "spectronaut",
        }
    }

    /// Whether this is one of the native mzSpecLib serializations
    pub fn is_native(&self) -> bool {
        matches!(self, Format::Text | Format::Json)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" | "mzlib.txt" => Ok(Format::Text),
            "json" | "mzlib.json" => Ok(Format::Json),
            "msp" => Ok(Format::Msp),
            "bibliospec" | "blib" => Ok(Format::BiblioSpec),
            "encyclopedia" | "dlib" | "elib" => Ok(Format::EncyclopeDia),
            "diann" | "dia-nn" => Ok(Format::DiaNn),
            "spectronaut" => Ok(Format::Spectronaut),
            other => Err(AdapterError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A source of mzSpecLib spectra
pub trait Adapter {
    /// Format being read
    fn format(&self) -> Format;

    /// Library header synthesized from the source
    fn header(&self) -> &LibraryHeader;

    /// Stream spectra in source order
    fn spectra(&mut self) -> Box<dyn Iterator<Item = Result<Spectrum, AdapterError>> + '_>;

    /// Read every remaining spectrum into a [`Library`]
    fn read_library(&mut self) -> Result<Library, AdapterError> {
        let mut library = Library::new(self.header().clone());
        for spectrum in self.spectra() {
            library.push_spectrum(spectrum?);
        }
        Ok(library)
    }
}

/// Determine the format of a library file.
///
/// SQLite files are told apart by their tables. Otherwise the extension
/// decides when it is specific, and the first line decides when it is not.
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<Format, AdapterError> {
    let path = path.as_ref();
    let mut magic = [0u8; 16];
    let read = File::open(path)?.read(&mut magic)?;
    if &magic[..read] == SQLITE_MAGIC {
        return detect_sqlite(path);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension {
        "json" => return Ok(Format::Json),
        "msp" => return Ok(Format::Msp),
        "blib" | "dlib" | "elib" => return detect_sqlite(path),
        _ => {}
    }

    let mut reader = open_text_source(path)?;
    let mut first = String::new();
    while first.trim().is_empty() {
        first.clear();
        if reader.read_line(&mut first)? == 0 {
            break;
        }
    }
    let line = first.trim_start();
    let format = if line.starts_with("<mzSpecLib") || line.starts_with("MS:") {
        Format::Text
    } else if line.starts_with('{') {
        Format::Json
    } else if msp::is_leader_line(line) {
        Format::Msp
    } else {
        let columns: Vec<&str> = line.trim_end().split('\t').collect();
        if columns.contains(&"transition_group_id") {
            Format::DiaNn
        } else if columns.contains(&"ModifiedPeptide") && columns.contains(&"FragmentMz") {
            Format::Spectronaut
        } else {
            return Err(AdapterError::UnsupportedFormat(path.display().to_string()));
        }
    };
    debug!("Detected {} format for {}", format, path.display());
    Ok(format)
}

fn detect_sqlite(path: &Path) -> Result<Format, AdapterError> {
    let connection = blob::open_read_only(path, Format::BiblioSpec)?;
    let tables = blob::table_names(&connection, Format::BiblioSpec)?;
    if tables.iter().any(|t| t.eq_ignore_ascii_case("RefSpectra")) {
        Ok(Format::BiblioSpec)
    } else if tables.iter().any(|t| t.eq_ignore_ascii_case("entries")) {
        Ok(Format::EncyclopeDia)
    } else {
        Err(AdapterError::UnsupportedFormat(format!(
            "{}: SQLite database without RefSpectra or entries tables",
            path.display()
        )))
    }
}

/// Open a library with the adapter for its detected format
pub fn open_adapter<P: AsRef<Path>>(path: P) -> Result<Box<dyn Adapter>, AdapterError> {
    let format = detect_format(path.as_ref())?;
    open_adapter_as(path, format)
}

/// Open a library with the adapter for `format`
pub fn open_adapter_as<P: AsRef<Path>>(
    path: P,
    format: Format,
) -> Result<Box<dyn Adapter>, AdapterError> {
    let path = path.as_ref();
    let adapter: Box<dyn Adapter> = match format {
        Format::Text | Format::Json => Box::new(native::NativeAdapter::open(path, format)?),
        Format::Msp => Box::new(msp::MspAdapter::open(path)?),
        Format::BiblioSpec => Box::new(bibliospec::BiblioSpecAdapter::open(path)?),
        Format::EncyclopeDia => Box::new(encyclopedia::EncyclopeDiaAdapter::open(path)?),
        Format::DiaNn => Box::new(diann::DiaNnAdapter::open(path)?),
        Format::Spectronaut => Box::new(spectronaut::SpectronautAdapter::open(path)?),
    };
    Ok(adapter)
}

/// Open a flat file for line reading, decompressing gzip transparently
pub(crate) fn open_text_source(path: &Path) -> Result<Box<dyn BufRead>, AdapterError> {
    let mut file = BufReader::new(File::open(path)?);
    let is_gzip = file.fill_buf()?.starts_with(GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Library name derived from a file name: the stem without `.gz` and extension
pub(crate) fn library_name_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Header shared by every adapter: format version, name and creation software
pub(crate) fn adapter_header(name: &str, software: impl Into<Value>) -> LibraryHeader {
    let mut header = LibraryHeader::new();
    header.attributes.add_value(ms_terms::library_name(), name);
    header
        .attributes
        .add_value(ms_terms::library_creation_software(), software);
    header
}

/// Interpret a foreign value: integer, then finite float, then string
pub(crate) fn cast_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Int(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::Str(raw.to_string()),
    }
}

/// Record a key without a CV mapping as an `other attribute name/value` pair
pub(crate) fn add_other_attribute(attributes: &mut AttributeManager, name: &str, value: Value) {
    attributes.add_group([
        Attribute::new(ms_terms::other_attribute_name(), name),
        Attribute::new(ms_terms::other_attribute_value(), value),
    ]);
}

/// Build an mzPAF-style fragment label such as `y7-H2O^2`
pub(crate) fn fragment_annotation(series: &str, ordinal: &str, loss: &str, charge: i64) -> String {
    let mut label = format!("{}{}", series.trim(), ordinal.trim());
    let loss = loss.trim();
    if !loss.is_empty() && !loss.eq_ignore_ascii_case("noloss") {
        label.push('-');
        label.push_str(loss);
    }
    if charge > 1 {
        label.push('^');
        label.push_str(&charge.to_string());
    }
    label
}
