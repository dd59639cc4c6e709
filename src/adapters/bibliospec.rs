//! BiblioSpec `.blib` libraries.
//!
//! Spectra live in `RefSpectra`, their peaks in `RefSpectraPeaks` joined on
//! `RefSpectraID`. Peak m/z values are little-endian f64 and intensities
//! little-endian f32, each zlib-compressed unless compression did not help.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::attributes::Value;
use crate::controlled_vocabulary::{ms_terms, unit_terms};
use crate::model::{Analyte, Interpretation, LibraryHeader, Peak, Spectrum, FIRST_ENTITY_ID};

use super::blob::{self, Endian};
use super::{adapter_header, library_name_from_path, Adapter, AdapterError, Format};

const FORMAT: Format = Format::BiblioSpec;

fn sql_error(e: rusqlite::Error) -> AdapterError {
    AdapterError::format(FORMAT, e)
}

/// Reader for BiblioSpec SQLite libraries
pub struct BiblioSpecAdapter {
    connection: Connection,
    header: LibraryHeader,
    ids: Vec<i64>,
    position: usize,
}

impl BiblioSpecAdapter {
    /// Open a `.blib` file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let connection = blob::open_read_only(path, FORMAT)?;
        let header = read_header(&connection, &library_name_from_path(path))?;

        let ids = {
            let mut statement = connection
                .prepare("SELECT id FROM RefSpectra ORDER BY id")
                .map_err(sql_error)?;
            let ids = statement
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_error)?;
            ids
        };

        Ok(Self {
            connection,
            header,
            ids,
            position: 0,
        })
    }

    /// Number of spectra in the library
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the library holds no spectra
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Read the spectrum with `RefSpectra.id = id`
    pub fn get_spectrum(&self, id: i64) -> Result<Spectrum, AdapterError> {
        let spectrum = self
            .connection
            .query_row(
                "SELECT * FROM RefSpectra WHERE id = ?1",
                params![id],
                |row| Ok(RefSpectrum::from_row(row)),
            )
            .map_err(sql_error)??;
        spectrum.into_spectrum(&self.connection)
    }
}

impl Adapter for BiblioSpecAdapter {
    fn format(&self) -> Format {
        FORMAT
    }

    fn header(&self) -> &LibraryHeader {
        &self.header
    }

    fn spectra(&mut self) -> Box<dyn Iterator<Item = Result<Spectrum, AdapterError>> + '_> {
        Box::new(std::iter::from_fn(move || {
            let id = *self.ids.get(self.position)?;
            self.position += 1;
            Some(self.get_spectrum(id))
        }))
    }
}

fn read_header(connection: &Connection, fallback_name: &str) -> Result<LibraryHeader, AdapterError> {
    let info = connection
        .query_row(
            "SELECT libLSID, majorVersion, minorVersion FROM LibInfo",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()
        .map_err(sql_error)?;

    let Some((lsid, major, minor)) = info else {
        return Ok(adapter_header(fallback_name, "BiblioSpec"));
    };
    // urn:lsid:<authority>:spectral_library:bibliospec:<type>:<name>
    let name = lsid
        .split_once("bibliospec:")
        .and_then(|(_, rest)| rest.split_once(':'))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| fallback_name.to_string());
    let mut header = adapter_header(&name, "BiblioSpec");
    header
        .attributes
        .add_value(ms_terms::library_identifier(), lsid);
    header
        .attributes
        .add_value(ms_terms::library_version(), format!("{}.{}", major, minor));
    Ok(header)
}

/// One `RefSpectra` row
struct RefSpectrum {
    id: i64,
    peptide_seq: String,
    peptide_mod_seq: String,
    precursor_mz: f64,
    precursor_charge: i64,
    num_peaks: usize,
    retention_time: Option<f64>,
    copies: Option<i64>,
    file_id: Option<i64>,
    spec_id_in_file: Option<String>,
}

impl RefSpectrum {
    fn from_row(row: &Row<'_>) -> Result<Self, AdapterError> {
        // Optional columns differ between schema versions
        let optional_f64 = |name: &str| row.get::<_, Option<f64>>(name).ok().flatten();
        let optional_i64 = |name: &str| row.get::<_, Option<i64>>(name).ok().flatten();
        let spec_id_in_file = row
            .get::<_, Option<String>>("SpecIDinFile")
            .ok()
            .flatten()
            .or_else(|| optional_i64("SpecIDinFile").map(|v| v.to_string()));

        Ok(Self {
            id: row.get("id").map_err(sql_error)?,
            peptide_seq: row.get("peptideSeq").map_err(sql_error)?,
            peptide_mod_seq: row.get("peptideModSeq").map_err(sql_error)?,
            precursor_mz: row.get("precursorMZ").map_err(sql_error)?,
            precursor_charge: row.get("precursorCharge").map_err(sql_error)?,
            num_peaks: row.get::<_, i64>("numPeaks").map_err(sql_error)?.max(0) as usize,
            retention_time: optional_f64("retentionTime"),
            copies: optional_i64("copies"),
            file_id: optional_i64("fileID"),
            spec_id_in_file,
        })
    }

    fn into_spectrum(self, connection: &Connection) -> Result<Spectrum, AdapterError> {
        let mut spectrum = Spectrum::new(self.id.max(0) as u64);
        spectrum.index = (self.id - 1).max(0) as usize;
        let name = format!("{}/{}", self.peptide_mod_seq, self.precursor_charge);

        let attrs = &mut spectrum.attributes;
        attrs.add_value(ms_terms::spectrum_name(), name.as_str());
        attrs.add_value(ms_terms::selected_ion_mz(), self.precursor_mz);
        attrs.add_value(ms_terms::charge_state(), self.precursor_charge);
        if let Some(rt) = self.retention_time {
            attrs.add_with_unit(ms_terms::retention_time(), rt, unit_terms::minute());
        }
        if let Some(copies) = self.copies {
            attrs.add_value(ms_terms::replicate_spectra_available(), copies);
            attrs.add_value(ms_terms::replicate_spectra_used(), 1i64);
        }
        attrs.add_value(ms_terms::number_of_peaks(), self.num_peaks as i64);
        if let Some(file_id) = self.file_id {
            let file_name = connection
                .query_row(
                    "SELECT fileName FROM SpectrumSourceFiles WHERE id = ?1",
                    params![file_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(sql_error)?;
            if let Some(file_name) = file_name {
                attrs.add_value(ms_terms::source_file(), file_name);
            }
        }
        if let Some(scan) = self.spec_id_in_file {
            attrs.add_value(ms_terms::scan_number(), Value::from(scan));
        }

        let mut analyte = Analyte::new(FIRST_ENTITY_ID);
        analyte.attributes.add_value(
            ms_terms::proforma_ion(),
            format!("{}/{}", self.peptide_mod_seq, self.precursor_charge),
        );
        analyte
            .attributes
            .add_value(ms_terms::stripped_peptide_sequence(), self.peptide_seq);
        spectrum.add_analyte(analyte);
        spectrum.add_interpretation(Interpretation::new(FIRST_ENTITY_ID));
        spectrum.link_interpretations();

        spectrum.peaks = read_peaks(connection, self.id, self.num_peaks)?;
        Ok(spectrum)
    }
}

fn read_peaks(connection: &Connection, id: i64, num_peaks: usize) -> Result<Vec<Peak>, AdapterError> {
    let (mz_blob, intensity_blob) = connection
        .query_row(
            "SELECT peakMZ, peakIntensity FROM RefSpectraPeaks WHERE RefSpectraID = ?1",
            params![id],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .map_err(sql_error)?;

    let blob_error = |e: std::io::Error| AdapterError::format(FORMAT, format!("spectrum {}: {}", id, e));
    let mzs = blob::decode_f64(&blob::inflate_or_raw(&mz_blob), Endian::Little).map_err(blob_error)?;
    let intensities =
        blob::decode_f32(&blob::inflate_or_raw(&intensity_blob), Endian::Little).map_err(blob_error)?;

    if mzs.len() != num_peaks || intensities.len() != num_peaks {
        return Err(AdapterError::format(
            FORMAT,
            format!(
                "spectrum {}: expected {} peaks, decoded {} m/z and {} intensity values",
                id,
                num_peaks,
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
