//! Native mzSpecLib text and JSON libraries behind the [`Adapter`] interface.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use crate::json::{self, JsonError};
use crate::model::{Cluster, Library, LibraryHeader, Spectrum};
use crate::text::{Entry, TextError, TextReader};

use super::{open_text_source, Adapter, AdapterError, Format};

fn text_error(e: TextError) -> AdapterError {
    AdapterError::format(Format::Text, e)
}

fn json_error(e: JsonError) -> AdapterError {
    AdapterError::format(Format::Json, e)
}

enum Source {
    /// Text is parsed entry by entry
    Text(TextReader<Box<dyn BufRead>>),
    /// JSON documents are read whole
    Json {
        spectra: VecDeque<Spectrum>,
        clusters: Vec<Cluster>,
    },
}

/// Adapter over `.mzlib.txt` and `.mzlib.json` files
pub struct NativeAdapter {
    header: LibraryHeader,
    source: Source,
    /// Clusters met while streaming text spectra
    clusters: Vec<Cluster>,
}

impl NativeAdapter {
    /// Open a native library; `format` must be [`Format::Text`] or [`Format::Json`]
    pub fn open<P: AsRef<Path>>(path: P, format: Format) -> Result<Self, AdapterError> {
        let reader = open_text_source(path.as_ref())?;
        match format {
            Format::Text => {
                let reader = TextReader::new(reader).map_err(text_error)?;
                Ok(Self {
                    header: reader.header().clone(),
                    source: Source::Text(reader),
                    clusters: Vec::new(),
                })
            }
            Format::Json => {
                let library = json::read_library(reader).map_err(json_error)?;
                Ok(Self::from_library(library))
            }
            other => Err(AdapterError::UnsupportedFormat(format!(
                "{} is not a native mzSpecLib format",
                other
            ))),
        }
    }

    fn from_library(library: Library) -> Self {
        Self {
            header: library.header,
            source: Source::Json {
                spectra: library.spectra.into(),
                clusters: library.clusters,
            },
            clusters: Vec::new(),
        }
    }

    fn next_spectrum(&mut self) -> Result<Option<Spectrum>, AdapterError> {
        match &mut self.source {
            Source::Text(reader) => {
                while let Some(entry) = reader.next_entry().map_err(text_error)? {
                    match entry {
                        Entry::Spectrum(spectrum) => return Ok(Some(spectrum)),
                        Entry::Cluster(cluster) => self.clusters.push(cluster),
                    }
                }
                Ok(None)
            }
            Source::Json { spectra, .. } => Ok(spectra.pop_front()),
        }
    }
}

impl Adapter for NativeAdapter {
    fn format(&self) -> Format {
        match self.source {
            Source::Text(_) => Format::Text,
            Source::Json { .. } => Format::Json,
        }
    }

    fn header(&self) -> &LibraryHeader {
        &self.header
    }

    fn spectra(&mut self) -> Box<dyn Iterator<Item = Result<Spectrum, AdapterError>> + '_> {
        Box::new(std::iter::from_fn(move || self.next_spectrum().transpose()))
    }

    /// Keeps clusters as well as spectra
    fn read_library(&mut self) -> Result<Library, AdapterError> {
        let mut library = Library::new(self.header.clone());
        while let Some(spectrum) = self.next_spectrum()? {
            library.push_spectrum(spectrum);
        }
        library.clusters.append(&mut self.clusters);
        if let Source::Json { clusters, .. } = &mut self.source {
            library.clusters.append(clusters);
        }
        Ok(library)
    }
}
