//! # mzspeclib - mzSpecLib spectral libraries
//!
//! `mzspeclib` reads, writes, indexes and validates spectral libraries in the
//! HUPO-PSI mzSpecLib format, and reads several foreign library formats into
//! the same entity model.
//!
//! ## Key Features
//!
//! - **One entity model**: Library, Spectrum, Analyte, Interpretation,
//!   InterpretationMember, Cluster and Peak, each carrying an ordered list of
//!   controlled-vocabulary attributes.
//!
//! - **Attribute sets**: named templates merged into entities at parse time,
//!   in a fixed `all`, declared sets, local attributes order.
//!
//! - **Text and JSON codecs**: streaming readers and writers for both native
//!   serializations, with lossless conversion between them.
//!
//! - **Random-access index**: a checksummed side file mapping spectrum keys,
//!   positions and names to byte ranges, so one spectrum can be read from a
//!   multi-gigabyte library without a scan.
//!
//! - **Foreign formats**: MSP, BiblioSpec, EncyclopeDIA, DIA-NN and
//!   Spectronaut libraries behind one [`adapters::Adapter`] trait.
//!
//! - **Semantic validation**: declarative rules composed into profiles and
//!   evaluated against any library.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzspeclib::text::{TextReader, TextWriter};
//!
//! let library = TextReader::open("library.mzlib.txt")?.read_library()?;
//! for spectrum in &library.spectra {
//!     println!("{} {:?} {} peaks", spectrum.key, spectrum.name(), spectrum.peaks.len());
//! }
//!
//! let mut writer = TextWriter::new(std::fs::File::create("copy.mzlib.txt")?);
//! writer.write_library(&library)?;
//! writer.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Random Access
//!
//! ```rust,no_run
//! use mzspeclib::index::IndexedLibrary;
//!
//! // Loads `library.mzlib.txt.index.json`, building it when missing or stale
//! let library = IndexedLibrary::open("library.mzlib.txt")?;
//! let spectrum = library.get_spectrum(42)?;
//! # Ok::<(), mzspeclib::index::IndexError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`attributes`]: values, attributes and the ordered attribute container
//! - [`controlled_vocabulary`]: CV terms and the accessions the crate relies on
//! - [`model`]: the entity hierarchy
//! - [`attribute_sets`]: attribute-set templates and their resolution
//! - [`text`]: the line-oriented text format
//! - [`json`]: the JSON format
//! - [`index`]: byte-range index and indexed lookups
//! - [`adapters`]: foreign-format readers and format detection
//! - [`validator`]: rules, profiles and reports

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod adapters;
pub mod attribute_sets;
pub mod attributes;
pub mod controlled_vocabulary;
pub mod index;
pub mod json;
pub mod model;
pub mod text;
pub mod validator;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::adapters::{detect_format, open_adapter, Adapter, AdapterError, Format};
    pub use crate::attribute_sets::{AttributeSet, AttributeSetRegistry};
    pub use crate::attributes::{Attribute, AttributeManager, Value, ValueType};
    pub use crate::controlled_vocabulary::{accessions, ms_terms, unit_terms, CvTerm};
    pub use crate::index::{IndexConfig, IndexError, IndexQuery, IndexedLibrary, LibraryIndex};
    pub use crate::json::JsonError;
    pub use crate::model::{
        Analyte, Cluster, Interpretation, InterpretationMember, Library, LibraryHeader, Peak,
        Spectrum,
    };
    pub use crate::text::{TextError, TextReader, TextWriter, TextWriterConfig};
    pub use crate::validator::{
        InMemoryOntology, MzPafChecker, ProfileRegistry, ValidationRecord, ValidationReport,
        Validator,
    };
}
