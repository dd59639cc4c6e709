use std::collections::HashMap;

use log::warn;

use crate::attribute_sets::AttributeSetRegistry;
use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::{accessions, ms_terms};

use super::{Cluster, Spectrum};

/// Format version assumed when a library does not declare one
pub const DEFAULT_FORMAT_VERSION: &str = "1.0";

/// Library-scope attributes and attribute set definitions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibraryHeader {
    /// Library attributes, format version first
    pub attributes: AttributeManager,
    /// Attribute set templates available to entities
    pub attribute_sets: AttributeSetRegistry,
}

impl LibraryHeader {
    /// A header carrying only the default format version
    pub fn new() -> Self {
        let mut header = Self::default();
        header.ensure_format_version();
        header
    }

    /// Insert `MS:1003186|library format version` at the front when missing.
    ///
    /// Returns `true` if the default had to be inserted.
    pub fn ensure_format_version(&mut self) -> bool {
        if self.attributes.has(accessions::FORMAT_VERSION) {
            return false;
        }
        self.attributes.insert_front(Attribute::new(
            ms_terms::format_version(),
            DEFAULT_FORMAT_VERSION,
        ));
        true
    }

    /// Declared format version
    pub fn format_version(&self) -> Option<String> {
        self.attributes
            .get_value(accessions::FORMAT_VERSION)
            .map(|v| match v {
                Value::Str(s) => s.clone(),
                other => other.format_text(),
            })
    }

    /// `MS:1003188|library name`
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .get_value(accessions::LIBRARY_NAME)
            .and_then(Value::as_str)
    }
}

/// An mzSpecLib spectral library
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Library {
    /// Library attributes and attribute sets
    pub header: LibraryHeader,
    /// Spectra in library order
    pub spectra: Vec<Spectrum>,
    /// Clusters in library order
    pub clusters: Vec<Cluster>,
}

impl Library {
    /// Create an empty library around a header
    pub fn new(header: LibraryHeader) -> Self {
        Self {
            header,
            spectra: Vec::new(),
            clusters: Vec::new(),
        }
    }

    /// Append a spectrum, assigning its index from its position
    pub fn push_spectrum(&mut self, mut spectrum: Spectrum) {
        spectrum.index = self.spectra.len();
        self.spectra.push(spectrum);
    }

    /// Append a cluster
    pub fn push_cluster(&mut self, cluster: Cluster) {
        self.clusters.push(cluster);
    }

    /// First spectrum with the given key
    pub fn get_spectrum(&self, key: u64) -> Option<&Spectrum> {
        self.spectra.iter().find(|s| s.key == key)
    }

    /// First spectrum with the given name
    pub fn get_spectrum_by_name(&self, name: &str) -> Option<&Spectrum> {
        self.spectra.iter().find(|s| s.name() == Some(name))
    }

    /// First cluster with the given key
    pub fn get_cluster(&self, key: u64) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.key == key)
    }

    /// Keys carried by more than one spectrum, in first-seen order
    pub fn duplicate_spectrum_keys(&self) -> Vec<u64> {
        let mut counts: HashMap<u64, usize> = HashMap::new();
        let mut duplicates = Vec::new();
        for spectrum in &self.spectra {
            let count = counts.entry(spectrum.key).or_insert(0);
            *count += 1;
            if *count == 2 {
                duplicates.push(spectrum.key);
            }
        }
        if !duplicates.is_empty() {
            warn!("Library has {} duplicated spectrum keys", duplicates.len());
        }
        duplicates
    }

    /// Renumber spectrum indices to match their positions
    pub fn reindex(&mut self) {
        for (i, spectrum) in self.spectra.iter_mut().enumerate() {
            spectrum.index = i;
        }
    }

    /// Number of spectra
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the library has no spectra
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}
