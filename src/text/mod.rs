//! # mzSpecLib Text Format
//!
//! Streaming reader and writer for the line-oriented mzSpecLib text format
//! (`.mzlib.txt`).
//!
//! ```text
//! <mzSpecLib>
//! MS:1003186|library format version=1.0
//! MS:1003188|library name=example
//! <Spectrum=1>
//! MS:1003061|library spectrum name=PEPTIDE/2
//! <Analyte=1>
//! MS:1003270|proforma peptidoform ion notation=PEPTIDE/2
//! <Peaks>
//! 147.1128	1234.5	y1/0.2ppm
//! ```
//!
//! The reader parses the header eagerly and then yields one entry at a time,
//! so memory use is bounded by the largest spectrum rather than the file.
//!
//! ```rust,no_run
//! use mzspeclib::text::TextReader;
//!
//! let reader = TextReader::open("library.mzlib.txt")?;
//! for spectrum in reader.spectra() {
//!     let spectrum = spectrum?;
//!     println!("{} {:?}", spectrum.key, spectrum.name());
//! }
//! # Ok::<(), mzspeclib::text::TextError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::model::{Cluster, Library, LibraryHeader, Spectrum};

pub use cursor::{Line, SectionCursor};
pub use error::TextError;
pub use iterators::{EntryIterator, SpectrumIterator};
pub use writer::{format_spectrum, TextWriter, TextWriterConfig};

mod cursor;
mod error;
mod grammar;
mod iterators;
mod parser;
mod writer;


pub(crate) use parser::ParsedEntry;

/// Default input buffer size for text parsing (64KB)
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Reader configuration
#[derive(Debug, Clone)]
pub struct TextReaderConfig {
    /// Size of the buffered reader wrapped around files
    pub buffer_size: usize,
}

impl Default for TextReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

/// A top-level library entry
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A `<Spectrum=...>` section
    Spectrum(Spectrum),
    /// A `<Cluster=...>` section
    Cluster(Cluster),
}

/// Streaming reader for mzSpecLib text libraries
pub struct TextReader<R: BufRead> {
    cursor: SectionCursor<R>,
    header: LibraryHeader,
    spectrum_count: usize,
}

impl<R: BufRead> TextReader<R> {
    /// Create a reader and parse the library header
    pub fn new(reader: R) -> Result<Self, TextError> {
        let mut cursor = SectionCursor::new(reader);
        let header = parser::read_header(&mut cursor)?;
        Ok(Self {
            cursor,
            header,
            spectrum_count: 0,
        })
    }

    /// Library attributes and attribute sets
    pub fn header(&self) -> &LibraryHeader {
        &self.header
    }

    /// Byte offset where the next entry would start
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Read the next spectrum or cluster
    pub fn next_entry(&mut self) -> Result<Option<Entry>, TextError> {
        Ok(self.next_entry_with_range()?.map(|parsed| parsed.entry))
    }

    /// Read the next entry along with its byte range in the source
    pub(crate) fn next_entry_with_range(&mut self) -> Result<Option<ParsedEntry>, TextError> {
        let parsed = parser::parse_next_section(
            &mut self.cursor,
            &self.header.attribute_sets,
            self.spectrum_count,
        )?;
        if let Some(ParsedEntry {
            entry: Entry::Spectrum(_),
            ..
        }) = &parsed
        {
            self.spectrum_count += 1;
        }
        Ok(parsed)
    }

    /// Read the next spectrum, skipping clusters
    pub fn next_spectrum(&mut self) -> Result<Option<Spectrum>, TextError> {
        while let Some(entry) = self.next_entry()? {
            if let Entry::Spectrum(spectrum) = entry {
                return Ok(Some(spectrum));
            }
        }
        Ok(None)
    }

    /// Lazily iterate over spectra
    pub fn spectra(self) -> SpectrumIterator<R> {
        SpectrumIterator { reader: self }
    }

    /// Lazily iterate over spectra and clusters
    pub fn entries(self) -> EntryIterator<R> {
        EntryIterator { reader: self }
    }

    /// Read every remaining entry into a [`Library`]
    pub fn read_library(mut self) -> Result<Library, TextError> {
        let mut library = Library::new(self.header.clone());
        while let Some(entry) = self.next_entry()? {
            match entry {
                Entry::Spectrum(spectrum) => library.push_spectrum(spectrum),
                Entry::Cluster(cluster) => library.push_cluster(cluster),
            }
        }
        Ok(library)
    }
}

impl TextReader<BufReader<File>> {
    /// Open a text library with the default buffer size (64KB)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TextError> {
        Self::open_with_config(path, TextReaderConfig::default())
    }

    /// Open a text library with a custom configuration
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: TextReaderConfig,
    ) -> Result<Self, TextError> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::with_capacity(config.buffer_size, file))
    }
}

/// Parse one isolated `<Spectrum>` section, resolving attribute sets against `header`
pub fn parse_spectrum_section(
    bytes: &[u8],
    header: &LibraryHeader,
    index: usize,
) -> Result<Spectrum, TextError> {
    match parser::parse_single_section(bytes, header, index)? {
        Entry::Spectrum(spectrum) => Ok(spectrum),
        Entry::Cluster(cluster) => Err(TextError::UnexpectedSection {
            expected: "<Spectrum>".to_string(),
            found: format!("<Cluster={}>", cluster.key),
            line_no: 1,
        }),
    }
}

/// Parse one isolated `<Cluster>` section
pub fn parse_cluster_section(bytes: &[u8], header: &LibraryHeader) -> Result<Cluster, TextError> {
    match parser::parse_single_section(bytes, header, 0)? {
        Entry::Cluster(cluster) => Ok(cluster),
        Entry::Spectrum(spectrum) => Err(TextError::UnexpectedSection {
            expected: "<Cluster>".to_string(),
            found: format!("<Spectrum={}>", spectrum.key),
            line_no: 1,
        }),
    }
}

/// Read only the header of a text library
pub fn read_header<R: BufRead>(reader: R) -> Result<LibraryHeader, TextError> {
    let mut cursor = SectionCursor::new(reader);
    parser::read_header(&mut cursor)
}
