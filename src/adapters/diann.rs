//! DIA-NN TSV spectral libraries.
//!
//! Each row is one fragment; rows sharing a `transition_group_id` form a
//! spectrum. Peptides are written with UniMod modifications in parentheses,
//! e.g. `AAC(UniMod:4)K`, and are rewritten as ProForma.

use std::path::Path;

use crate::attributes::Attribute;
use crate::controlled_vocabulary::ms_terms;
use crate::model::{Analyte, Interpretation, LibraryHeader, Peak, Spectrum, FIRST_ENTITY_ID};

use super::tabular::{RecordGroup, RecordGrouper};
use super::{
    adapter_header, fragment_annotation, library_name_from_path, open_text_source, Adapter,
    AdapterError, Format,
};

const FORMAT: Format = Format::DiaNn;

const REQUIRED_COLUMNS: &[&str] = &[
    "transition_group_id",
    "PrecursorMz",
    "PrecursorCharge",
    "FullUniModPeptideName",
    "ProductMz",
    "LibraryIntensity",
    "FragmentType",
    "FragmentSeriesNumber",
    "FragmentCharge",
    "FragmentLossType",
];

const SPECTRUM_CUSTOM_KEYS: &[&str] = &["ExcludeFromAssay", "AllowForNormalization"];
const ANALYTE_CUSTOM_KEYS: &[&str] = &["Proteotypic", "ProteinGroup"];

/// `AAC(UniMod:4)K` to `AAC[UNIMOD:4]K`
pub fn unimod_to_proforma(sequence: &str) -> String {
    sequence
        .replace('(', "[")
        .replace(')', "]")
        .replace("UniMod", "UNIMOD")
}

/// Reader for DIA-NN TSV libraries
pub struct DiaNnAdapter {
    grouper: RecordGrouper,
    header: LibraryHeader,
    position: usize,
}

impl DiaNnAdapter {
    /// Open a DIA-NN TSV file, decompressing gzip transparently
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let grouper = RecordGrouper::new(
            open_text_source(path)?,
            FORMAT,
            REQUIRED_COLUMNS,
            &["transition_group_id"],
            &["PrecursorMz", "PrecursorCharge"],
        )?;
        let header = adapter_header(&library_name_from_path(path), ms_terms::diann());
        Ok(Self {
            grouper,
            header,
            position: 0,
        })
    }

    fn next_spectrum(&mut self) -> Result<Option<Spectrum>, AdapterError> {
        let Some(group) = self.grouper.next_group()? else {
            return Ok(None);
        };
        let spectrum = self.build_spectrum(&group)?;
        self.position += 1;
        Ok(Some(spectrum))
    }

    fn build_spectrum(&self, group: &RecordGroup) -> Result<Spectrum, AdapterError> {
        let columns = self.grouper.columns();
        let row = group.first();

        let mut spectrum = Spectrum::new(self.position as u64 + 1);
        spectrum.index = self.position;
        let charge: i64 = columns.parse(FORMAT, row, "PrecursorCharge")?;

        let attrs = &mut spectrum.attributes;
        attrs.add_value(
            ms_terms::spectrum_name(),
            columns.require(FORMAT, row, "transition_group_id")?,
        );
        attrs.add_value(
            ms_terms::selected_ion_mz(),
            columns.parse::<f64>(FORMAT, row, "PrecursorMz")?,
        );
        attrs.add_value(ms_terms::charge_state(), charge);
        if let Some(file_name) = columns.get(row, "FileName") {
            attrs.add_value(ms_terms::source_file(), file_name);
        }
        let decoy = columns
            .get(row, "decoy")
            .and_then(|v| v.parse::<i64>().ok())
            .is_some_and(|v| v != 0);
        let origin = if decoy {
            ms_terms::decoy_spectrum()
        } else {
            ms_terms::predicted_spectrum()
        };
        attrs.add_value(ms_terms::spectrum_origin_type(), origin);
        attrs.add_value(
            ms_terms::spectrum_aggregation_type(),
            ms_terms::singleton_spectrum(),
        );
        if columns.get(row, "IonMobility").is_some() {
            attrs.add_value(
                ms_terms::ion_mobility_drift_time(),
                columns.parse::<f64>(FORMAT, row, "IonMobility")?,
            );
        }
        columns.add_custom(row, SPECTRUM_CUSTOM_KEYS, attrs);

        let mut analyte = Analyte::new(FIRST_ENTITY_ID);
        let peptide = unimod_to_proforma(columns.require(FORMAT, row, "FullUniModPeptideName")?);
        analyte
            .attributes
            .add_value(ms_terms::proforma_ion(), format!("{}/{}", peptide, charge));
        if let Some(sequence) = columns.get(row, "PeptideSequence") {
            analyte
                .attributes
                .add_value(ms_terms::stripped_peptide_sequence(), sequence);
        }
        let mut protein = Vec::new();
        if let Some(accession) = columns.get(row, "UniprotID") {
            protein.push(Attribute::new(ms_terms::protein_accession(), accession));
        }
        if let Some(name) = columns.get(row, "ProteinName") {
            protein.push(Attribute::new(ms_terms::protein_name(), name));
        }
        if !protein.is_empty() {
            analyte.attributes.add_group(protein);
        }
        columns.add_custom(row, ANALYTE_CUSTOM_KEYS, &mut analyte.attributes);
        spectrum.add_analyte(analyte);
        spectrum.add_interpretation(Interpretation::new(FIRST_ENTITY_ID));
        spectrum.link_interpretations();

        for record in &group.rows {
            let mut peak = Peak::new(
                columns.parse(FORMAT, record, "ProductMz")?,
                columns.parse(FORMAT, record, "LibraryIntensity")?,
            );
            peak.annotations.push(fragment_annotation(
                columns.require(FORMAT, record, "FragmentType")?,
                columns.require(FORMAT, record, "FragmentSeriesNumber")?,
                columns.get(record, "FragmentLossType").unwrap_or(""),
                columns.parse(FORMAT, record, "FragmentCharge")?,
            ));
            spectrum.peaks.push(peak);
        }
        let peak_count = spectrum.peaks.len() as i64;
        spectrum
            .attributes
            .add_value(ms_terms::number_of_peaks(), peak_count);
        Ok(spectrum)
    }
}

impl Adapter for DiaNnAdapter {
    fn format(&self) -> Format {
        FORMAT
    }

    fn header(&self) -> &LibraryHeader {
        &self.header
    }

    fn spectra(&mut self) -> Box<dyn Iterator<Item = Result<Spectrum, AdapterError>> + '_> {
        Box::new(std::iter::from_fn(move || self.next_spectrum().transpose()))
    }
}
