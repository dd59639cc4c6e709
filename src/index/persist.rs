//! Side-file persistence for [`LibraryIndex`].
//!
//! The side file is a JSON object whose `checksum` field is the SeaHash of
//! the compact serialization of every other field.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{Fingerprint, IndexConfig, IndexEntry, IndexError, LibraryFormat, LibraryIndex};

/// Side file layout version
pub const INDEX_FILE_VERSION: u32 = 1;

/// Suffix appended to the source file name
const INDEX_SUFFIX: &str = ".index.json";

#[derive(Debug, Serialize, Deserialize)]
struct IndexPayload {
    version: u32,
    format: LibraryFormat,
    created: DateTime<Utc>,
    fingerprint: Fingerprint,
    spectra: Vec<IndexEntry>,
    clusters: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    #[serde(flatten)]
    payload: IndexPayload,
    checksum: u64,
}

fn checksum(payload: &IndexPayload) -> Result<u64, serde_json::Error> {
    Ok(seahash::hash(&serde_json::to_vec(payload)?))
}

/// Side file path for a library: `<source>.index.json`
pub fn index_path_for<P: AsRef<Path>>(source: P) -> PathBuf {
    let mut name = source.as_ref().as_os_str().to_owned();
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

impl LibraryIndex {
    /// Write the index to `path`, replacing any existing file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IndexError> {
        let path = path.as_ref();
        let payload = IndexPayload {
            version: INDEX_FILE_VERSION,
            format: self.format,
            created: self.created,
            fingerprint: self.fingerprint,
            spectra: self.spectra.clone(),
            clusters: self.clusters.clone(),
        };
        let checksum = checksum(&payload).map_err(|e| IndexError::CorruptIndex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file = IndexFile { payload, checksum };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, &file).map_err(std::io::Error::from)?;
            writer.flush()?;
        }
        temp.persist(path).map_err(|e| IndexError::Io(e.error))?;
        debug!("Saved index to {}", path.display());
        Ok(())
    }

    /// Read an index from `path`, verifying its checksum
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let corrupt = |reason: String| IndexError::CorruptIndex {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path)?;
        let file: IndexFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
        if file.payload.version != INDEX_FILE_VERSION {
            return Err(corrupt(format!(
                "unsupported index version {}",
                file.payload.version
            )));
        }
        let expected = checksum(&file.payload).map_err(|e| corrupt(e.to_string()))?;
        if expected != file.checksum {
            return Err(corrupt(format!(
                "checksum mismatch (stored {:016x}, computed {:016x})",
                file.checksum, expected
            )));
        }

        let payload = file.payload;
        Ok(Self::from_parts(
            payload.format,
            payload.fingerprint,
            payload.created,
            payload.spectra,
            payload.clusters,
        ))
    }

    /// Load the side file for `source`, rebuilding and saving it when it is
    /// missing, corrupt or stale
    pub fn load_or_build<P: AsRef<Path>>(source: P, config: &IndexConfig) -> Result<Self, IndexError> {
        let source = source.as_ref();
        let index_path = index_path_for(source);

        if index_path.exists() {
            match Self::load(&index_path) {
                Ok(index) => {
                    if !config.rebuild_if_stale || !index.is_stale(source)? {
                        debug!("Using index {}", index_path.display());
                        return Ok(index);
                    }
                    info!("Index {} is stale, rebuilding", index_path.display());
                }
                Err(IndexError::CorruptIndex { reason, .. }) => {
                    warn!(
                        "Index {} is corrupt ({}), rebuilding",
                        index_path.display(),
                        reason
                    );
                }
                Err(e) => return Err(e),
            }
        } else {
            info!("No index for {}, building", source.display());
        }

        let index = Self::build(source)?;
        index.save(&index_path)?;
        Ok(index)
    }
}
