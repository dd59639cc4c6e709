use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::json;
use crate::model::{Cluster, LibraryHeader, Spectrum};
use crate::text;

use super::{ByteRange, IndexConfig, IndexEntry, IndexError, IndexQuery, LibraryFormat, LibraryIndex};

/// A library opened for random access through its index.
///
/// The header is parsed once. Every lookup opens its own file handle, reads
/// only the entry's byte range and parses it, so lookups may run
/// concurrently from several threads.
#[derive(Debug)]
pub struct IndexedLibrary {
    path: PathBuf,
    index: LibraryIndex,
    header: LibraryHeader,
}

impl IndexedLibrary {
    /// Open a library, loading or building its index
    pub fn open<P: AsRef<Path>>(source: P) -> Result<Self, IndexError> {
        Self::open_with_config(source, &IndexConfig::default())
    }

    /// Open a library with custom index options
    pub fn open_with_config<P: AsRef<Path>>(
        source: P,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        let index = LibraryIndex::load_or_build(source.as_ref(), config)?;
        Self::with_index(source, index)
    }

    /// Open a library with an already built index
    pub fn with_index<P: AsRef<Path>>(source: P, index: LibraryIndex) -> Result<Self, IndexError> {
        let path = source.as_ref().to_path_buf();
        let file = BufReader::new(File::open(&path)?);
        let header = match index.format() {
            LibraryFormat::Text => text::read_header(file)?,
            LibraryFormat::Json => json::read_header(file)?,
        };
        Ok(Self {
            path,
            index,
            header,
        })
    }

    /// Library attributes and attribute sets
    pub fn header(&self) -> &LibraryHeader {
        &self.header
    }

    /// The underlying index
    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of spectra
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the library holds no spectra
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn read_range(&self, range: ByteRange) -> Result<Vec<u8>, IndexError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut bytes = Vec::with_capacity(range.len() as usize);
        file.take(range.len()).read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn read_spectrum(&self, entry: &IndexEntry) -> Result<Spectrum, IndexError> {
        let bytes = self.read_range(entry.range())?;
        let spectrum = match self.index.format() {
            LibraryFormat::Text => text::parse_spectrum_section(&bytes, &self.header, entry.index)?,
            LibraryFormat::Json => json::parse_spectrum_object(&bytes, &self.header, entry.index)?,
        };
        Ok(spectrum)
    }

    /// Spectrum matching a query
    pub fn get(&self, query: &IndexQuery) -> Result<Spectrum, IndexError> {
        let entry = self.index.entry(query)?;
        self.read_spectrum(entry)
    }

    /// Spectrum with `key`
    pub fn get_spectrum(&self, key: u64) -> Result<Spectrum, IndexError> {
        self.get(&IndexQuery::Key(key))
    }

    /// Spectrum at `position` in library order
    pub fn get_spectrum_by_index(&self, position: usize) -> Result<Spectrum, IndexError> {
        self.get(&IndexQuery::Position(position))
    }

    /// First spectrum named `name`
    pub fn get_spectrum_by_name(&self, name: &str) -> Result<Spectrum, IndexError> {
        self.get(&IndexQuery::Name(name.to_string()))
    }

    /// Cluster with `key`
    pub fn get_cluster(&self, key: u64) -> Result<Cluster, IndexError> {
        let entry = self.index.entry(&IndexQuery::Cluster(key))?;
        let bytes = self.read_range(entry.range())?;
        let cluster = match self.index.format() {
            LibraryFormat::Text => text::parse_cluster_section(&bytes, &self.header)?,
            LibraryFormat::Json => json::parse_cluster_object(&bytes, &self.header)?,
        };
        Ok(cluster)
    }

    /// Fetch several spectra in parallel
    #[cfg(feature = "parallel")]
    pub fn get_many(&self, keys: &[u64]) -> Vec<Result<Spectrum, IndexError>> {
        keys.par_iter().map(|&key| self.get_spectrum(key)).collect()
    }
}
