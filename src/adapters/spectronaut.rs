//! Spectronaut TSV spectral libraries.
//!
//! Rows sharing `(ModifiedPeptide, PrecursorCharge)` form a spectrum.
//! Modified peptides look like `_[Acetyl (Protein N-term)]M[Oxidation (M)]PEK_`;
//! the parenthesized site rule is dropped when rewriting as ProForma.

use std::path::Path;

use crate::attributes::Attribute;
use crate::controlled_vocabulary::{ms_terms, unit_terms};
use crate::model::{Analyte, Interpretation, LibraryHeader, Peak, Spectrum, FIRST_ENTITY_ID};

use super::tabular::{RecordGroup, RecordGrouper};
use super::{
    adapter_header, add_other_attribute, cast_value, fragment_annotation, library_name_from_path,
    open_text_source, Adapter, AdapterError, Format,
};

const FORMAT: Format = Format::Spectronaut;

const REQUIRED_COLUMNS: &[&str] = &[
    "PrecursorMz",
    "PrecursorCharge",
    "ModifiedPeptide",
    "StrippedPeptide",
    "FragmentMz",
    "RelativeIntensity",
    "FragmentType",
    "FragmentNumber",
    "FragmentCharge",
    "FragmentLossType",
];

const SPECTRUM_CUSTOM_KEYS: &[&str] = &[
    "ExcludeFromAssay",
    "BGSInferenceId",
    "AllowForNormalization",
    "Workflow",
];
const ANALYTE_CUSTOM_KEYS: &[&str] = &["IsProteotypic", "FASTAName", "Database", "ProteinGroups"];

/// Rewrite a Spectronaut modified peptide as ProForma.
///
/// `_[Acetyl (Protein N-term)]PEPM[Oxidation (M)]K_` becomes
/// `[Acetyl]-PEPM[Oxidation]K`.
pub fn modified_peptide_to_proforma(sequence: &str) -> Result<String, String> {
    let sequence = sequence.trim_matches('_');
    let mut out = String::with_capacity(sequence.len());
    let mut in_bracket = false;
    let mut in_rule = false;
    for c in sequence.chars() {
        match c {
            '[' => {
                in_bracket = true;
                out.push(c);
            }
            ']' => {
                in_bracket = false;
                in_rule = false;
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                out.push(c);
            }
            '(' if in_bracket => in_rule = true,
            ')' if in_rule => in_rule = false,
            _ if in_rule => {}
            _ => out.push(c),
        }
    }
    if in_bracket {
        return Err(format!("unclosed modification in {:?}", sequence));
    }
    // A leading modification is an N-terminal one and needs a '-'
    if out.starts_with('[') {
        if let Some(end) = out.find(']') {
            out.insert(end + 1, '-');
        }
    }
    Ok(out)
}

/// Reader for Spectronaut TSV libraries
pub struct SpectronautAdapter {
    grouper: RecordGrouper,
    header: LibraryHeader,
    position: usize,
}

impl SpectronautAdapter {
    /// Open a Spectronaut TSV file, decompressing gzip transparently
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let grouper = RecordGrouper::new(
            open_text_source(path)?,
            FORMAT,
            REQUIRED_COLUMNS,
            &["ModifiedPeptide", "PrecursorCharge"],
            &["PrecursorMz"],
        )?;
        let header = adapter_header(&library_name_from_path(path), ms_terms::spectronaut());
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

        let modified = columns.require(FORMAT, row, "ModifiedPeptide")?;
        let charge: i64 = columns.parse(FORMAT, row, "PrecursorCharge")?;
        let peptide = modified_peptide_to_proforma(modified)
            .map_err(|e| AdapterError::format(FORMAT, e))?;

        let mut spectrum = Spectrum::new(self.position as u64 + 1);
        spectrum.index = self.position;
        let attrs = &mut spectrum.attributes;
        attrs.add_value(
            ms_terms::spectrum_name(),
            format!("{}/{}", modified.trim_matches('_'), charge),
        );
        attrs.add_value(
            ms_terms::precursor_mz(),
            columns.parse::<f64>(FORMAT, row, "PrecursorMz")?,
        );
        attrs.add_value(ms_terms::charge_state(), charge);
        if let Some(run) = columns.get(row, "ReferenceRun") {
            attrs.add_value(ms_terms::source_file(), run);
        }
        // Theoretical fragment m/z with intensities from the reference run
        attrs.add_value(
            ms_terms::spectrum_origin_type(),
            ms_terms::observed_spectrum(),
        );
        attrs.add_value(
            ms_terms::spectrum_aggregation_type(),
            ms_terms::consensus_spectrum(),
        );
        if let Some(labeled) = columns.get(row, "LabeledPeptide") {
            add_other_attribute(attrs, "LabeledPeptide", cast_value(labeled));
        }
        if columns.get(row, "IonMobility").is_some() {
            attrs.add_value(
                ms_terms::ion_mobility_drift_time(),
                columns.parse::<f64>(FORMAT, row, "IonMobility")?,
            );
        }
        if columns.get(row, "CV").is_some() {
            attrs.add_value(
                ms_terms::faims_compensation_voltage(),
                columns.parse::<f64>(FORMAT, row, "CV")?,
            );
        }
        if columns.get(row, "iRT").is_some() {
            attrs.add_with_unit(
                ms_terms::normalized_retention_time(),
                columns.parse::<f64>(FORMAT, row, "iRT")?,
                unit_terms::minute(),
            );
        }
        columns.add_custom(row, SPECTRUM_CUSTOM_KEYS, attrs);

        let mut analyte = Analyte::new(FIRST_ENTITY_ID);
        analyte
            .attributes
            .add_value(ms_terms::proforma_ion(), format!("{}/{}", peptide, charge));
        analyte.attributes.add_value(
            ms_terms::stripped_peptide_sequence(),
            columns.require(FORMAT, row, "StrippedPeptide")?,
        );
        let mut protein = Vec::new();
        if let Some(accession) = columns.get(row, "UniProtIds") {
            protein.push(Attribute::new(ms_terms::protein_accession(), accession));
        }
        if let Some(name) = columns.get(row, "Protein Name") {
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
                columns.parse(FORMAT, record, "FragmentMz")?,
                columns.parse(FORMAT, record, "RelativeIntensity")?,
            );
            peak.annotations.push(fragment_annotation(
                columns.require(FORMAT, record, "FragmentType")?,
                columns.require(FORMAT, record, "FragmentNumber")?,
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

impl Adapter for SpectronautAdapter {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_peptide_to_proforma() {
        assert_eq!(
            modified_peptide_to_proforma("_[Acetyl (Protein N-term)]PEPM[Oxidation (M)]K_").unwrap(),
            "[Acetyl]-PEPM[Oxidation]K"
        );
        assert_eq!(modified_peptide_to_proforma("_PEPTIDE_").unwrap(), "PEPTIDE");
        assert_eq!(
            modified_peptide_to_proforma("C[Carbamidomethyl]K").unwrap(),
            "C[Carbamidomethyl]K"
        );
        assert!(modified_peptide_to_proforma("_PEP[Oxidation_").is_err());
    }
}
