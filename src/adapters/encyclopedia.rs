//! EncyclopeDIA `.dlib`/`.elib` libraries.
//!
//! Each row of `entries` is one spectrum. `MassArray` holds zlib-compressed
//! big-endian f64 values and `IntensityArray` big-endian f32 values.
//! Library-level key/value pairs live in `metadata`.

use std::path::Path;

use rusqlite::{params, Connection, Row};

use crate::controlled_vocabulary::{ms_terms, unit_terms};
use crate::model::{Analyte, Interpretation, LibraryHeader, Peak, Spectrum, FIRST_ENTITY_ID};

use super::blob::{self, Endian};
use super::{
    adapter_header, add_other_attribute, cast_value, library_name_from_path, Adapter,
    AdapterError, Format,
};

const FORMAT: Format = Format::EncyclopeDia;

fn sql_error(e: rusqlite::Error) -> AdapterError {
    AdapterError::format(FORMAT, e)
}

/// Reader for EncyclopeDIA SQLite libraries
pub struct EncyclopeDiaAdapter {
    connection: Connection,
    header: LibraryHeader,
    row_ids: Vec<i64>,
    position: usize,
}

impl EncyclopeDiaAdapter {
    /// Open a `.dlib` or `.elib` file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let connection = blob::open_read_only(path, FORMAT)?;
        let header = read_header(&connection, &library_name_from_path(path))?;

        let row_ids = {
            let mut statement = connection
                .prepare("SELECT rowid FROM entries ORDER BY rowid")
                .map_err(sql_error)?;
            let row_ids = statement
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_error)?;
            row_ids
        };

        Ok(Self {
            connection,
            header,
            row_ids,
            position: 0,
        })
    }

    /// Number of spectra in the library
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    /// Whether the library holds no spectra
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    fn read_entry(&self, position: usize, row_id: i64) -> Result<Spectrum, AdapterError> {
        let entry = self
            .connection
            .query_row(
                "SELECT * FROM entries WHERE rowid = ?1",
                params![row_id],
                |row| Ok(Entry::from_row(row)),
            )
            .map_err(sql_error)??;
        entry.into_spectrum(position)
    }
}

impl Adapter for EncyclopeDiaAdapter {
    fn format(&self) -> Format {
        FORMAT
    }

    fn header(&self) -> &LibraryHeader {
        &self.header
    }

    fn spectra(&mut self) -> Box<dyn Iterator<Item = Result<Spectrum, AdapterError>> + '_> {
        Box::new(std::iter::from_fn(move || {
            let position = self.position;
            let row_id = *self.row_ids.get(position)?;
            self.position += 1;
            Some(self.read_entry(position, row_id))
        }))
    }
}

fn read_header(connection: &Connection, name: &str) -> Result<LibraryHeader, AdapterError> {
    let mut header = adapter_header(name, "EncyclopeDIA");
    let has_metadata = blob::table_names(connection, FORMAT)?
        .iter()
        .any(|t| t.eq_ignore_ascii_case("metadata"));
    if !has_metadata {
        return Ok(header);
    }

    let mut statement = connection
        .prepare("SELECT Key, Value FROM metadata")
        .map_err(sql_error)?;
    let pairs = statement
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;
    for (key, value) in pairs {
        let value = value.unwrap_or_default();
        if key.eq_ignore_ascii_case("version") {
            header.attributes.add_value(ms_terms::library_version(), value);
        } else {
            add_other_attribute(&mut header.attributes, &key, cast_value(&value));
        }
    }
    Ok(header)
}

/// One `entries` row
struct Entry {
    precursor_mz: f64,
    precursor_charge: i64,
    peptide_mod_seq: String,
    peptide_seq: String,
    copies: Option<i64>,
    rt_seconds: Option<f64>,
    score: Option<f64>,
    source_file: Option<String>,
    mass_length: usize,
    masses: Vec<u8>,
    intensity_length: usize,
    intensities: Vec<u8>,
}

impl Entry {
    fn from_row(row: &Row<'_>) -> Result<Self, AdapterError> {
        let optional_i64 = |name: &str| row.get::<_, Option<i64>>(name).ok().flatten();
        let optional_f64 = |name: &str| row.get::<_, Option<f64>>(name).ok().flatten();
        let optional_str = |name: &str| row.get::<_, Option<String>>(name).ok().flatten();
        Ok(Self {
            precursor_mz: row.get("PrecursorMz").map_err(sql_error)?,
            precursor_charge: row.get("PrecursorCharge").map_err(sql_error)?,
            peptide_mod_seq: row.get("PeptideModSeq").map_err(sql_error)?,
            peptide_seq: row.get("PeptideSeq").map_err(sql_error)?,
            copies: optional_i64("Copies"),
            rt_seconds: optional_f64("RTInSeconds"),
            score: optional_f64("Score"),
            source_file: optional_str("SourceFile"),
            mass_length: optional_i64("MassEncodedLength").unwrap_or(0).max(0) as usize,
            masses: row.get("MassArray").map_err(sql_error)?,
            intensity_length: optional_i64("IntensityEncodedLength").unwrap_or(0).max(0) as usize,
            intensities: row.get("IntensityArray").map_err(sql_error)?,
        })
    }

    fn decode_peaks(&self) -> Result<Vec<Peak>, AdapterError> {
        let blob_error = |e: std::io::Error| {
            AdapterError::format(FORMAT, format!("{}: {}", self.peptide_mod_seq, e))
        };
        let mass_bytes = blob::inflate(&self.masses).map_err(blob_error)?;
        let intensity_bytes = blob::inflate(&self.intensities).map_err(blob_error)?;
        if self.mass_length > 0 && mass_bytes.len() != self.mass_length {
            return Err(AdapterError::format(
                FORMAT,
                format!(
                    "{}: mass array inflated to {} bytes, expected {}",
                    self.peptide_mod_seq,
                    mass_bytes.len(),
                    self.mass_length
                ),
            ));
        }
        if self.intensity_length > 0 && intensity_bytes.len() != self.intensity_length {
            return Err(AdapterError::format(
                FORMAT,
                format!(
                    "{}: intensity array inflated to {} bytes, expected {}",
                    self.peptide_mod_seq,
                    intensity_bytes.len(),
                    self.intensity_length
                ),
            ));
        }
        let mzs = blob::decode_f64(&mass_bytes, Endian::Big).map_err(blob_error)?;
        let intensities = blob::decode_f32(&intensity_bytes, Endian::Big).map_err(blob_error)?;
        if mzs.len() != intensities.len() {
            return Err(AdapterError::format(
                FORMAT,
                format!(
                    "{}: {} m/z values but {} intensities",
                    self.peptide_mod_seq,
                    mzs.len(),
                    intensities.len()
                ),
            ));
        }
        Ok(mzs
            .into_iter()
            .zip(intensities)
            .map(|(mz, intensity)| Peak::new(mz, intensity))
            .collect())
    }

    fn into_spectrum(self, position: usize) -> Result<Spectrum, AdapterError> {
        let mut spectrum = Spectrum::new(position as u64 + 1);
        spectrum.index = position;
        spectrum.peaks = self.decode_peaks()?;

        let name = format!("{}/{}", self.peptide_mod_seq, self.precursor_charge);
        let attrs = &mut spectrum.attributes;
        attrs.add_value(ms_terms::spectrum_name(), name.as_str());
        attrs.add_value(ms_terms::selected_ion_mz(), self.precursor_mz);
        attrs.add_value(ms_terms::charge_state(), self.precursor_charge);
        if let Some(rt) = self.rt_seconds {
            attrs.add_with_unit(ms_terms::retention_time(), rt, unit_terms::second());
        }
        if let Some(copies) = self.copies {
            attrs.add_value(ms_terms::replicate_spectra_available(), copies);
        }
        if let Some(source_file) = self.source_file {
            attrs.add_value(ms_terms::source_file(), source_file);
        }
        attrs.add_value(ms_terms::number_of_peaks(), spectrum.peaks.len() as i64);

        let mut analyte = Analyte::new(FIRST_ENTITY_ID);
        analyte
            .attributes
            .add_value(ms_terms::proforma_ion(), name);
        analyte
            .attributes
            .add_value(ms_terms::stripped_peptide_sequence(), self.peptide_seq);
        spectrum.add_analyte(analyte);

        let mut interpretation = Interpretation::new(FIRST_ENTITY_ID);
        if let Some(score) = self.score {
            add_other_attribute(&mut interpretation.attributes, "Score", score.into());
        }
        spectrum.add_interpretation(interpretation);
        spectrum.link_interpretations();
        Ok(spectrum)
    }
}
