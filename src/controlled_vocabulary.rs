//! # PSI-MS Controlled Vocabulary Terms for mzSpecLib
//!
//! Every attribute in an mzSpecLib library is keyed by a controlled vocabulary
//! term written as `ACCESSION|name`, for example `MS:1003061|library spectrum name`.
//! This module provides the term type and the terms the readers, writers and
//! adapters in this crate produce or interpret.
//!
//! ## Reference
//! - OBO file: https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo
//! - Format documentation: https://github.com/HUPO-PSI/mzSpecLib

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A controlled vocabulary term with its accession and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CvTerm {
    /// CV accession (e.g., "MS:1000041")
    pub accession: String,
    /// Human-readable name
    pub name: String,
}

impl CvTerm {
    /// Create a new CV term with accession and name
    pub fn new(accession: &str, name: &str) -> Self {
        Self {
            accession: accession.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a term known only by its accession
    pub fn from_accession(accession: &str) -> Self {
        Self {
            accession: accession.to_string(),
            name: String::new(),
        }
    }

    /// The namespace prefix of the accession ("MS" for "MS:1000041")
    pub fn prefix(&self) -> &str {
        self.accession
            .split_once(':')
            .map(|(prefix, _)| prefix)
            .unwrap_or(self.accession.as_str())
    }

    /// Whether this term carries the given accession
    pub fn is(&self, accession: &str) -> bool {
        self.accession == accession
    }
}

impl fmt::Display for CvTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.accession)
        } else {
            write!(f, "{}|{}", self.accession, self.name)
        }
    }
}

/// Error returned when a string is not a `PREFIX:accession[|name]` reference
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Not a CV term reference: {0:?}")]
pub struct InvalidCurie(pub String);

/// Check that `text` is a CURIE: an alphanumeric prefix, a colon, and an
/// accession made of digits (or the `X` placeholder used by draft terms).
pub fn is_curie(text: &str) -> bool {
    let Some((prefix, code)) = text.split_once(':') else {
        return false;
    };
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        && prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && !code.is_empty()
        && code.chars().all(|c| c.is_ascii_digit() || c == 'X')
}

impl FromStr for CvTerm {
    type Err = InvalidCurie;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (accession, name) = match s.split_once('|') {
            Some((acc, name)) => (acc, name),
            None => (s, ""),
        };
        if !is_curie(accession) {
            return Err(InvalidCurie(s.to_string()));
        }
        Ok(CvTerm::new(accession, name))
    }
}

/// Accession constants used for matching attributes
pub mod accessions {
    // Library-level
    /// MS:1003186 - library format version
    pub const FORMAT_VERSION: &str = "MS:1003186";
    /// MS:1003187 - library identifier
    pub const LIBRARY_IDENTIFIER: &str = "MS:1003187";
    /// MS:1003188 - library name
    pub const LIBRARY_NAME: &str = "MS:1003188";
    /// MS:1003189 - library description
    pub const LIBRARY_DESCRIPTION: &str = "MS:1003189";
    /// MS:1003190 - library version
    pub const LIBRARY_VERSION: &str = "MS:1003190";
    /// MS:1003207 - library creation software
    pub const LIBRARY_CREATION_SOFTWARE: &str = "MS:1003207";
    /// MS:1003212 - library attribute set name
    pub const ATTRIBUTE_SET_NAME: &str = "MS:1003212";

    // Spectrum-level
    /// MS:1003061 - library spectrum name
    pub const SPECTRUM_NAME: &str = "MS:1003061";
    /// MS:1003237 - library spectrum key
    pub const SPECTRUM_KEY: &str = "MS:1003237";
    /// MS:1003062 - library spectrum index
    pub const SPECTRUM_INDEX: &str = "MS:1003062";
    /// MS:1003208 - experimental precursor monoisotopic m/z
    pub const PRECURSOR_MZ: &str = "MS:1003208";
    /// MS:1000744 - selected ion m/z
    pub const SELECTED_ION_MZ: &str = "MS:1000744";
    /// MS:1000041 - charge state
    pub const CHARGE_STATE: &str = "MS:1000041";
    /// MS:1003059 - number of peaks
    pub const NUMBER_OF_PEAKS: &str = "MS:1003059";
    /// MS:1003254 - peak attribute
    pub const PEAK_ATTRIBUTE: &str = "MS:1003254";
    /// MS:1003065 - spectrum aggregation type
    pub const SPECTRUM_AGGREGATION_TYPE: &str = "MS:1003065";
    /// MS:1003072 - spectrum origin type
    pub const SPECTRUM_ORIGIN_TYPE: &str = "MS:1003072";

    // Analyte-level
    /// MS:1003270 - proforma peptidoform ion notation
    pub const PROFORMA_ION: &str = "MS:1003270";
    /// MS:1000888 - stripped peptide sequence
    pub const STRIPPED_PEPTIDE_SEQUENCE: &str = "MS:1000888";
    /// MS:1003163 - analyte mixture members
    pub const ANALYTE_MIXTURE_MEMBERS: &str = "MS:1003163";

    // Cluster-level
    /// MS:1003267 - library spectrum cluster key
    pub const CLUSTER_KEY: &str = "MS:1003267";
    /// MS:1003268 - library spectrum cluster member keys
    pub const CLUSTER_MEMBER_KEYS: &str = "MS:1003268";

    // Uncontrolled attributes
    /// MS:1003275 - other attribute name
    pub const OTHER_ATTRIBUTE_NAME: &str = "MS:1003275";
    /// MS:1003276 - other attribute value
    pub const OTHER_ATTRIBUTE_VALUE: &str = "MS:1003276";

    /// UO:0000000 - unit
    pub const UNIT: &str = "UO:0000000";
}

/// Common MS CV terms used in mzSpecLib libraries
pub mod ms_terms {
    use super::{accessions as acc, CvTerm};

    // =========================================================================
    // Library-level terms
    // =========================================================================

    /// MS:1003186 - library format version
    pub fn format_version() -> CvTerm {
        CvTerm::new(acc::FORMAT_VERSION, "library format version")
    }

    /// MS:1003187 - library identifier
    pub fn library_identifier() -> CvTerm {
        CvTerm::new(acc::LIBRARY_IDENTIFIER, "library identifier")
    }

    /// MS:1003188 - library name
    pub fn library_name() -> CvTerm {
        CvTerm::new(acc::LIBRARY_NAME, "library name")
    }

    /// MS:1003189 - library description
    pub fn library_description() -> CvTerm {
        CvTerm::new(acc::LIBRARY_DESCRIPTION, "library description")
    }

    /// MS:1003190 - library version
    pub fn library_version() -> CvTerm {
        CvTerm::new(acc::LIBRARY_VERSION, "library version")
    }

    /// MS:1003207 - library creation software
    pub fn library_creation_software() -> CvTerm {
        CvTerm::new(acc::LIBRARY_CREATION_SOFTWARE, "library creation software")
    }

    /// MS:1003253 - DIA-NN
    pub fn diann() -> CvTerm {
        CvTerm::new("MS:1003253", "DIA-NN")
    }

    /// MS:1001327 - Spectronaut
    pub fn spectronaut() -> CvTerm {
        CvTerm::new("MS:1001327", "Spectronaut")
    }

    /// MS:1003212 - library attribute set name
    pub fn attribute_set_name() -> CvTerm {
        CvTerm::new(acc::ATTRIBUTE_SET_NAME, "library attribute set name")
    }

    // =========================================================================
    // Spectrum identity
    // =========================================================================

    /// MS:1003061 - library spectrum name
    pub fn spectrum_name() -> CvTerm {
        CvTerm::new(acc::SPECTRUM_NAME, "library spectrum name")
    }

    /// MS:1003237 - library spectrum key
    pub fn spectrum_key() -> CvTerm {
        CvTerm::new(acc::SPECTRUM_KEY, "library spectrum key")
    }

    /// MS:1003062 - library spectrum index
    pub fn spectrum_index() -> CvTerm {
        CvTerm::new(acc::SPECTRUM_INDEX, "library spectrum index")
    }

    // =========================================================================
    // Precursor and acquisition terms
    // =========================================================================

    /// MS:1003208 - experimental precursor monoisotopic m/z
    pub fn precursor_mz() -> CvTerm {
        CvTerm::new(acc::PRECURSOR_MZ, "experimental precursor monoisotopic m/z")
    }

    /// MS:1000744 - selected ion m/z
    pub fn selected_ion_mz() -> CvTerm {
        CvTerm::new(acc::SELECTED_ION_MZ, "selected ion m/z")
    }

    /// MS:1003053 - theoretical monoisotopic m/z
    pub fn theoretical_mz() -> CvTerm {
        CvTerm::new("MS:1003053", "theoretical monoisotopic m/z")
    }

    /// MS:1000041 - charge state
    pub fn charge_state() -> CvTerm {
        CvTerm::new(acc::CHARGE_STATE, "charge state")
    }

    /// MS:1000894 - retention time
    pub fn retention_time() -> CvTerm {
        CvTerm::new("MS:1000894", "retention time")
    }

    /// MS:1000896 - normalized retention time
    pub fn normalized_retention_time() -> CvTerm {
        CvTerm::new("MS:1000896", "normalized retention time")
    }

    /// MS:1002476 - ion mobility drift time
    pub fn ion_mobility_drift_time() -> CvTerm {
        CvTerm::new("MS:1002476", "ion mobility drift time")
    }

    /// MS:1001581 - FAIMS compensation voltage
    pub fn faims_compensation_voltage() -> CvTerm {
        CvTerm::new("MS:1001581", "FAIMS compensation voltage")
    }

    /// MS:1000045 - collision energy
    pub fn collision_energy() -> CvTerm {
        CvTerm::new("MS:1000045", "collision energy")
    }

    /// MS:1000044 - dissociation method
    pub fn dissociation_method() -> CvTerm {
        CvTerm::new("MS:1000044", "dissociation method")
    }

    /// MS:1000422 - beam-type collision-induced dissociation (HCD)
    pub fn hcd() -> CvTerm {
        CvTerm::new("MS:1000422", "beam-type collision-induced dissociation")
    }

    /// MS:1002472 - trap-type collision-induced dissociation
    pub fn trap_cid() -> CvTerm {
        CvTerm::new("MS:1002472", "trap-type collision-induced dissociation")
    }

    /// MS:1003057 - scan number
    pub fn scan_number() -> CvTerm {
        CvTerm::new("MS:1003057", "scan number")
    }

    /// MS:1003203 - constituent spectrum file
    pub fn source_file() -> CvTerm {
        CvTerm::new("MS:1003203", "constituent spectrum file")
    }

    /// MS:1000028 - detector resolution
    pub fn detector_resolution() -> CvTerm {
        CvTerm::new("MS:1000028", "detector resolution")
    }

    // =========================================================================
    // Spectrum description terms
    // =========================================================================

    /// MS:1003059 - number of peaks
    pub fn number_of_peaks() -> CvTerm {
        CvTerm::new(acc::NUMBER_OF_PEAKS, "number of peaks")
    }

    /// MS:1003254 - peak attribute
    pub fn peak_attribute() -> CvTerm {
        CvTerm::new(acc::PEAK_ATTRIBUTE, "peak attribute")
    }

    /// MS:1003065 - spectrum aggregation type
    pub fn spectrum_aggregation_type() -> CvTerm {
        CvTerm::new(acc::SPECTRUM_AGGREGATION_TYPE, "spectrum aggregation type")
    }

    /// MS:1003066 - singleton spectrum
    pub fn singleton_spectrum() -> CvTerm {
        CvTerm::new("MS:1003066", "singleton spectrum")
    }

    /// MS:1003067 - consensus spectrum
    pub fn consensus_spectrum() -> CvTerm {
        CvTerm::new("MS:1003067", "consensus spectrum")
    }

    /// MS:1003072 - spectrum origin type
    pub fn spectrum_origin_type() -> CvTerm {
        CvTerm::new(acc::SPECTRUM_ORIGIN_TYPE, "spectrum origin type")
    }

    /// MS:1003073 - observed spectrum
    pub fn observed_spectrum() -> CvTerm {
        CvTerm::new("MS:1003073", "observed spectrum")
    }

    /// MS:1003074 - predicted spectrum
    pub fn predicted_spectrum() -> CvTerm {
        CvTerm::new("MS:1003074", "predicted spectrum")
    }

    /// MS:1003192 - decoy spectrum
    pub fn decoy_spectrum() -> CvTerm {
        CvTerm::new("MS:1003192", "decoy spectrum")
    }

    /// MS:1003069 - number of replicate spectra available
    pub fn replicate_spectra_available() -> CvTerm {
        CvTerm::new("MS:1003069", "number of replicate spectra available")
    }

    /// MS:1003070 - number of replicate spectra used
    pub fn replicate_spectra_used() -> CvTerm {
        CvTerm::new("MS:1003070", "number of replicate spectra used")
    }

    // =========================================================================
    // Analyte terms
    // =========================================================================

    /// MS:1003270 - proforma peptidoform ion notation
    pub fn proforma_ion() -> CvTerm {
        CvTerm::new(acc::PROFORMA_ION, "proforma peptidoform ion notation")
    }

    /// MS:1000888 - stripped peptide sequence
    pub fn stripped_peptide_sequence() -> CvTerm {
        CvTerm::new(acc::STRIPPED_PEPTIDE_SEQUENCE, "stripped peptide sequence")
    }

    /// MS:1001471 - peptide modification details
    pub fn peptide_modification_details() -> CvTerm {
        CvTerm::new("MS:1001471", "peptide modification details")
    }

    /// MS:1001117 - theoretical mass
    pub fn theoretical_mass() -> CvTerm {
        CvTerm::new("MS:1001117", "theoretical mass")
    }

    /// MS:1000866 - molecular formula
    pub fn molecular_formula() -> CvTerm {
        CvTerm::new("MS:1000866", "molecular formula")
    }

    /// MS:1000885 - protein accession
    pub fn protein_accession() -> CvTerm {
        CvTerm::new("MS:1000885", "protein accession")
    }

    /// MS:1000886 - protein name
    pub fn protein_name() -> CvTerm {
        CvTerm::new("MS:1000886", "protein name")
    }

    /// MS:1003044 - number of missed cleavages
    pub fn missed_cleavages() -> CvTerm {
        CvTerm::new("MS:1003044", "number of missed cleavages")
    }

    /// MS:1003043 - number of residues
    pub fn number_of_residues() -> CvTerm {
        CvTerm::new("MS:1003043", "number of residues")
    }

    /// MS:1003163 - analyte mixture members
    pub fn analyte_mixture_members() -> CvTerm {
        CvTerm::new(acc::ANALYTE_MIXTURE_MEMBERS, "analyte mixture members")
    }

    /// MS:1002354 - PSM-level q-value
    pub fn q_value() -> CvTerm {
        CvTerm::new("MS:1002354", "PSM-level q-value")
    }

    // =========================================================================
    // Cluster terms
    // =========================================================================

    /// MS:1003267 - library spectrum cluster key
    pub fn cluster_key() -> CvTerm {
        CvTerm::new(acc::CLUSTER_KEY, "library spectrum cluster key")
    }

    /// MS:1003268 - library spectrum cluster member keys
    pub fn cluster_member_keys() -> CvTerm {
        CvTerm::new(acc::CLUSTER_MEMBER_KEYS, "library spectrum cluster member keys")
    }

    // =========================================================================
    // Uncontrolled attributes
    // =========================================================================

    /// MS:1003275 - other attribute name
    pub fn other_attribute_name() -> CvTerm {
        CvTerm::new(acc::OTHER_ATTRIBUTE_NAME, "other attribute name")
    }

    /// MS:1003276 - other attribute value
    pub fn other_attribute_value() -> CvTerm {
        CvTerm::new(acc::OTHER_ATTRIBUTE_VALUE, "other attribute value")
    }
}

/// Unit ontology (UO) terms
pub mod unit_terms {
    use super::CvTerm;

    /// UO:0000000 - unit (the attribute that links a unit to a grouped value)
    pub fn unit() -> CvTerm {
        CvTerm::new(super::accessions::UNIT, "unit")
    }

    /// MS:1000040 - m/z
    pub fn mz() -> CvTerm {
        CvTerm::new("MS:1000040", "m/z")
    }

    /// UO:0000010 - second
    pub fn second() -> CvTerm {
        CvTerm::new("UO:0000010", "second")
    }

    /// UO:0000031 - minute
    pub fn minute() -> CvTerm {
        CvTerm::new("UO:0000031", "minute")
    }

    /// UO:0000028 - millisecond
    pub fn millisecond() -> CvTerm {
        CvTerm::new("UO:0000028", "millisecond")
    }

    /// UO:0000266 - electronvolt
    pub fn electronvolt() -> CvTerm {
        CvTerm::new("UO:0000266", "electronvolt")
    }

    /// UO:0000169 - parts per million
    pub fn ppm() -> CvTerm {
        CvTerm::new("UO:0000169", "parts per million")
    }

    /// UO:0000221 - dalton
    pub fn dalton() -> CvTerm {
        CvTerm::new("UO:0000221", "dalton")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cv_term_display() {
        let term = ms_terms::charge_state();
        assert_eq!(term.to_string(), "MS:1000041|charge state");
        assert_eq!(term.prefix(), "MS");
        assert_eq!(CvTerm::from_accession("UO:0000010").to_string(), "UO:0000010");
    }

    #[test]
    fn test_software_terms() {
        assert_eq!(ms_terms::diann().to_string(), "MS:1003253|DIA-NN");
        assert_eq!(ms_terms::spectronaut().to_string(), "MS:1001327|Spectronaut");
    }

    #[test]
    fn test_cv_term_from_str() {
        let term: CvTerm = "MS:1003061|library spectrum name".parse().unwrap();
        assert_eq!(term.accession, "MS:1003061");
        assert_eq!(term.name, "library spectrum name");

        let bare: CvTerm = "UO:0000010".parse().unwrap();
        assert!(bare.name.is_empty());

        assert!("not a term".parse::<CvTerm>().is_err());
        assert!("MS:abc|x".parse::<CvTerm>().is_err());
    }

    #[test]
    fn test_is_curie() {
        assert!(is_curie("MS:1000041"));
        assert!(is_curie("UO:0000000"));
        assert!(is_curie("MS:100XXXX"));
        assert!(!is_curie("y10/3.7ppm"));
        assert!(!is_curie(":123"));
        assert!(!is_curie("MS:"));
        assert!(!is_curie("12:34"));
    }
}
