//! # Random-Access Index
//!
//! A byte-range index over the spectra and clusters of a text or JSON
//! library. The index is built in one linear pass, saved next to the source
//! as `<source>.index.json` and checked against the source's size and
//! modification time before reuse.
//!
//! ```rust,no_run
//! use mzspeclib::index::IndexedLibrary;
//!
//! let library = IndexedLibrary::open("library.mzlib.txt")?;
//! let spectrum = library.get_spectrum(42)?;
//! println!("{:?}", spectrum.name());
//! # Ok::<(), mzspeclib::index::IndexError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::controlled_vocabulary::accessions;
use crate::json::{self, AttributeDocument, ElementKind, JsonError};
use crate::text::{Entry, TextReader, DEFAULT_INPUT_BUFFER_SIZE};

pub use error::IndexError;
pub use indexed::IndexedLibrary;
pub use persist::{index_path_for, INDEX_FILE_VERSION};

mod error;
mod indexed;
mod persist;

#[cfg(test)]
mod tests;

/// Entries between progress log lines during a build
const PROGRESS_INTERVAL: u64 = 10_000;

/// Serialization of a library that can be indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryFormat {
    /// Line-oriented text format
    Text,
    /// JSON format
    Json,
}

impl LibraryFormat {
    /// Determine the format from the file name, sniffing the first
    /// non-whitespace byte when the extension is not conclusive
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => return Ok(LibraryFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("txt") => return Ok(LibraryFormat::Text),
            _ => {}
        }

        let mut head = [0u8; 512];
        let read = File::open(path)?.read(&mut head)?;
        match head[..read].iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Ok(LibraryFormat::Json),
            Some(b'<') | Some(b'#') | Some(b'M') => Ok(LibraryFormat::Text),
            _ => Err(IndexError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl fmt::Display for LibraryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryFormat::Text => write!(f, "text"),
            LibraryFormat::Json => write!(f, "json"),
        }
    }
}

/// Half-open byte range `[start, end)` in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte
    pub start: u64,
    /// One past the last byte
    pub end: u64,
}

impl ByteRange {
    /// Length in bytes
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One indexed spectrum or cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Spectrum or cluster key
    pub key: u64,
    /// Position among entries of the same kind
    pub index: usize,
    /// Spectrum name, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Section start offset
    pub start: u64,
    /// Section end offset (exclusive)
    pub end: u64,
}

impl IndexEntry {
    /// Byte range of the section
    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Source size and modification time captured at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch, 0 if unavailable
    pub modified_nanos: u64,
}

impl Fingerprint {
    /// Fingerprint a file as it is now
    pub fn of<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified_nanos = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Self {
            size: metadata.len(),
            modified_nanos,
        })
    }
}

/// What to look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Spectrum key
    Key(u64),
    /// Spectrum position in the library
    Position(usize),
    /// Spectrum name
    Name(String),
    /// Cluster key
    Cluster(u64),
}

impl fmt::Display for IndexQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexQuery::Key(key) => write!(f, "spectrum key {}", key),
            IndexQuery::Position(i) => write!(f, "spectrum position {}", i),
            IndexQuery::Name(name) => write!(f, "spectrum name {:?}", name),
            IndexQuery::Cluster(key) => write!(f, "cluster key {}", key),
        }
    }
}

/// Index build and reuse options
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Rebuild a saved index whose source fingerprint no longer matches
    pub rebuild_if_stale: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            rebuild_if_stale: true,
        }
    }
}

/// Byte-range index over one library file
#[derive(Debug, Clone)]
pub struct LibraryIndex {
    format: LibraryFormat,
    fingerprint: Fingerprint,
    created: DateTime<Utc>,
    spectra: Vec<IndexEntry>,
    clusters: Vec<IndexEntry>,
    by_key: HashMap<u64, usize>,
    by_name: HashMap<String, usize>,
    clusters_by_key: HashMap<u64, usize>,
}

impl PartialEq for LibraryIndex {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.fingerprint == other.fingerprint
            && self.spectra == other.spectra
            && self.clusters == other.clusters
    }
}

impl LibraryIndex {
    pub(crate) fn from_parts(
        format: LibraryFormat,
        fingerprint: Fingerprint,
        created: DateTime<Utc>,
        spectra: Vec<IndexEntry>,
        clusters: Vec<IndexEntry>,
    ) -> Self {
        let mut by_key = HashMap::with_capacity(spectra.len());
        let mut by_name = HashMap::with_capacity(spectra.len());
        for (i, entry) in spectra.iter().enumerate() {
            if by_key.contains_key(&entry.key) {
                warn!("Duplicate spectrum key {}; lookups return the first", entry.key);
            } else {
                by_key.insert(entry.key, i);
            }
            if let Some(name) = &entry.name {
                by_name.entry(name.clone()).or_insert(i);
            }
        }
        let mut clusters_by_key = HashMap::with_capacity(clusters.len());
        for (i, entry) in clusters.iter().enumerate() {
            clusters_by_key.entry(entry.key).or_insert(i);
        }
        Self {
            format,
            fingerprint,
            created,
            spectra,
            clusters,
            by_key,
            by_name,
            clusters_by_key,
        }
    }

    /// Build an index with one linear pass over `path`
    pub fn build<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let format = LibraryFormat::detect(path)?;
        let fingerprint = Fingerprint::of(path)?;
        info!("Building {} index for {}", format, path.display());

        let (spectra, clusters) = match format {
            LibraryFormat::Text => build_text(path)?,
            LibraryFormat::Json => build_json(path)?,
        };
        info!(
            "Indexed {} spectra and {} clusters",
            spectra.len(),
            clusters.len()
        );
        Ok(Self::from_parts(
            format,
            fingerprint,
            Utc::now(),
            spectra,
            clusters,
        ))
    }

    /// Source format
    pub fn format(&self) -> LibraryFormat {
        self.format
    }

    /// Fingerprint of the source at build time
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Build time
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Whether `source` changed since the index was built
    pub fn is_stale<P: AsRef<Path>>(&self, source: P) -> Result<bool, IndexError> {
        Ok(Fingerprint::of(source)? != self.fingerprint)
    }

    /// Find the entry for a query
    pub fn entry(&self, query: &IndexQuery) -> Result<&IndexEntry, IndexError> {
        let found = match query {
            IndexQuery::Key(key) => self.by_key.get(key).map(|&i| &self.spectra[i]),
            IndexQuery::Position(i) => self.spectra.get(*i),
            IndexQuery::Name(name) => self.by_name.get(name).map(|&i| &self.spectra[i]),
            IndexQuery::Cluster(key) => self.clusters_by_key.get(key).map(|&i| &self.clusters[i]),
        };
        found.ok_or_else(|| IndexError::NotFound(query.clone()))
    }

    /// Byte range for a query
    pub fn lookup(&self, query: &IndexQuery) -> Result<ByteRange, IndexError> {
        self.entry(query).map(IndexEntry::range)
    }

    /// Byte range of the spectrum with `key`
    pub fn lookup_key(&self, key: u64) -> Result<ByteRange, IndexError> {
        self.lookup(&IndexQuery::Key(key))
    }

    /// Byte range of the spectrum at `position`
    pub fn lookup_index(&self, position: usize) -> Result<ByteRange, IndexError> {
        self.lookup(&IndexQuery::Position(position))
    }

    /// Byte range of the first spectrum named `name`
    pub fn lookup_name(&self, name: &str) -> Result<ByteRange, IndexError> {
        self.lookup(&IndexQuery::Name(name.to_string()))
    }

    /// Byte range of the cluster with `key`
    pub fn lookup_cluster(&self, key: u64) -> Result<ByteRange, IndexError> {
        self.lookup(&IndexQuery::Cluster(key))
    }

    /// Spectrum entries in library order
    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.spectra.iter()
    }

    /// Cluster entries in library order
    pub fn clusters(&self) -> &[IndexEntry] {
        &self.clusters
    }

    /// Number of indexed spectra
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether no spectra are indexed
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

fn log_progress(count: u64) {
    if count > 0 && count % PROGRESS_INTERVAL == 0 {
        info!("Progress: {} entries indexed", count);
    }
}

fn build_text(path: &Path) -> Result<(Vec<IndexEntry>, Vec<IndexEntry>), IndexError> {
    let file = File::open(path)?;
    let mut reader = TextReader::new(BufReader::with_capacity(DEFAULT_INPUT_BUFFER_SIZE, file))?;
    let mut spectra = Vec::new();
    let mut clusters = Vec::new();
    while let Some(parsed) = reader.next_entry_with_range()? {
        match parsed.entry {
            Entry::Spectrum(spectrum) => spectra.push(IndexEntry {
                key: spectrum.key,
                index: spectra.len(),
                name: spectrum.name().map(str::to_string),
                start: parsed.start,
                end: parsed.end,
            }),
            Entry::Cluster(cluster) => clusters.push(IndexEntry {
                key: cluster.key,
                index: clusters.len(),
                name: None,
                start: parsed.start,
                end: parsed.end,
            }),
        }
        log_progress((spectra.len() + clusters.len()) as u64);
    }
    Ok((spectra, clusters))
}

/// Only the attributes of an entry object; the rest is skipped
#[derive(Deserialize)]
struct EntryProbe {
    #[serde(default)]
    attributes: Vec<AttributeDocument>,
}

fn probe_key(probe: &EntryProbe, accession: &str, context: &str) -> Result<u64, JsonError> {
    probe
        .attributes
        .iter()
        .find(|a| a.accession == accession)
        .and_then(|a| a.value.as_u64())
        .ok_or_else(|| JsonError::MissingField {
            context: context.to_string(),
            field: accession.to_string(),
        })
}

fn build_json(path: &Path) -> Result<(Vec<IndexEntry>, Vec<IndexEntry>), IndexError> {
    let file = File::open(path)?;
    let mut spectra = Vec::new();
    let mut clusters = Vec::new();
    json::scan_elements(file, |kind, start, end, bytes| {
        let probe: EntryProbe = serde_json::from_slice(bytes).map_err(JsonError::from)?;
        match kind {
            ElementKind::Spectrum => {
                let context = format!("spectrum at byte {}", start);
                let key = probe_key(&probe, accessions::SPECTRUM_KEY, &context)?;
                let name = probe
                    .attributes
                    .iter()
                    .find(|a| a.accession == accessions::SPECTRUM_NAME)
                    .and_then(|a| a.value.as_str())
                    .map(str::to_string);
                spectra.push(IndexEntry {
                    key,
                    index: spectra.len(),
                    name,
                    start,
                    end,
                });
            }
            ElementKind::Cluster => {
                let context = format!("cluster at byte {}", start);
                let key = probe_key(&probe, accessions::CLUSTER_KEY, &context)?;
                clusters.push(IndexEntry {
                    key,
                    index: clusters.len(),
                    name: None,
                    start,
                    end,
                });
            }
        }
        log_progress((spectra.len() + clusters.len()) as u64);
        Ok::<(), IndexError>(())
    })?;
    Ok((spectra, clusters))
}
