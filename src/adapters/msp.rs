//! NIST-style MSP libraries.
//!
//! ```text
//! Name: AAAACALTPGPLADLAAR/2_1(4,C,CAM)_46eV
//! MW: 1797.9615
//! Comment: Parent=899.9880 Mods=1(4,C,CAM) Inst=qtof
//! Num peaks: 2
//! 147.1128	1234.5	"y1/0.2ppm"
//! 260.1969	2500.0	"y2/-0.4ppm,b2/1.1ppm"
//! ```
//!
//! An entry starts at a `Name:` (or `NAME:`, `Compound:`) line and its
//! header ends at `Num peaks`. Keys without a CV mapping are kept as
//! `other attribute name/value` groups.

use std::io::BufRead;
use std::path::Path;

use log::{debug, warn};

use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::{accessions, ms_terms, CvTerm};
use crate::model::{Analyte, Interpretation, LibraryHeader, Peak, Spectrum, FIRST_ENTITY_ID};
use crate::text::SectionCursor;

use super::{
    adapter_header, add_other_attribute, cast_value, library_name_from_path, open_text_source,
    Adapter, AdapterError, Format,
};

const FORMAT: Format = Format::Msp;

const LEADER_KEYS: &[&str] = &["Name", "NAME", "Compound", "COMPOUND"];

/// Whether `line` starts an MSP entry
pub fn is_leader_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((key, _)) => LEADER_KEYS.contains(&key.trim()),
        None => false,
    }
}

fn is_num_peaks_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "num peaks" | "num_peaks" | "numpeaks"
    )
}

/// Where a recognized key lands
enum Target {
    Spectrum(CvTerm),
    Analyte(CvTerm),
}

fn known_key(key: &str) -> Option<Target> {
    let target = match key.to_ascii_lowercase().as_str() {
        "charge" | "precursor_charge" | "precursorcharge" => Target::Spectrum(ms_terms::charge_state()),
        "parent" => Target::Spectrum(ms_terms::selected_ion_mz()),
        "precursormz" | "precursormonoisomz" | "observedprecursormz" | "precursor"
        | "precursor_mass" | "precursormass" | "mz_exact" => Target::Spectrum(ms_terms::precursor_mz()),
        "scan" => Target::Spectrum(ms_terms::scan_number()),
        "origfile" | "filename" | "file_name" | "run" => Target::Spectrum(ms_terms::source_file()),
        "ftresolution" => Target::Spectrum(ms_terms::detector_resolution()),
        "nreps" => Target::Spectrum(ms_terms::replicate_spectra_used()),
        "mw" => Target::Analyte(ms_terms::theoretical_mass()),
        "formula" | "molecular formula" => Target::Analyte(ms_terms::molecular_formula()),
        "mods" => Target::Analyte(ms_terms::peptide_modification_details()),
        "naa" => Target::Analyte(ms_terms::number_of_residues()),
        "mc" | "nmc" => Target::Analyte(ms_terms::missed_cleavages()),
        "protein" => Target::Analyte(ms_terms::protein_name()),
        _ => return None,
    };
    Some(target)
}

/// Reader for MSP files
pub struct MspAdapter {
    cursor: SectionCursor<Box<dyn BufRead>>,
    header: LibraryHeader,
    position: usize,
}

impl MspAdapter {
    /// Open an MSP file, decompressing gzip transparently
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let source = open_text_source(path)?;
        Ok(Self::from_reader(source, &library_name_from_path(path)))
    }

    /// Read MSP entries from any buffered source
    pub fn from_reader(reader: Box<dyn BufRead>, name: &str) -> Self {
        Self {
            cursor: SectionCursor::new(reader),
            header: adapter_header(name, "MSP"),
            position: 0,
        }
    }

    /// Collect the raw key/value pairs and peak lines of the next entry
    fn next_record(&mut self) -> Result<Option<MspRecord>, AdapterError> {
        // Skip to the next leader line
        let leader = loop {
            match self.cursor.next_non_blank()? {
                None => return Ok(None),
                Some(line) if is_leader_line(&line.text) => break line,
                Some(line) => debug!("Skipping line {} outside an MSP entry", line.line_no),
            }
        };

        let mut record = MspRecord::default();
        record.push_header_line(&leader.text);
        let mut in_peaks = false;
        while let Some(line) = self.cursor.next_line()? {
            if is_leader_line(&line.text) {
                self.cursor.push_back(line);
                break;
            }
            if line.is_blank() {
                if in_peaks {
                    break;
                }
                continue;
            }
            if in_peaks {
                parse_peak_line(&line.text, &mut record.peaks).map_err(|cause| {
                    AdapterError::format(FORMAT, format!("line {}: {}", line.line_no, cause))
                })?;
            } else if let Some(key) = record.push_header_line(&line.text) {
                in_peaks = is_num_peaks_key(&key);
            } else {
                // A header line that is neither key:value nor key=value
                // but holds tab-separated numbers starts the peak list
                in_peaks = true;
                parse_peak_line(&line.text, &mut record.peaks).map_err(|cause| {
                    AdapterError::format(FORMAT, format!("line {}: {}", line.line_no, cause))
                })?;
            }
        }
        Ok(Some(record))
    }

    fn next_spectrum(&mut self) -> Result<Option<Spectrum>, AdapterError> {
        let Some(record) = self.next_record()? else {
            return Ok(None);
        };
        let spectrum = record.into_spectrum(self.position);
        self.position += 1;
        Ok(Some(spectrum))
    }
}

impl Adapter for MspAdapter {
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

/// Raw content of one MSP entry
#[derive(Debug, Default)]
struct MspRecord {
    name: Option<String>,
    pairs: Vec<(String, Option<String>)>,
    peaks: Vec<Peak>,
}

impl MspRecord {
    /// Record a header line and return its key, or `None` if the line has no key
    fn push_header_line(&mut self, line: &str) -> Option<String> {
        let (key, value) = if let Some((key, value)) = line.split_once(':') {
            (key.trim(), value.trim())
        } else if let Some((key, value)) = line.split_once('=') {
            (key.trim(), value.trim())
        } else if line.contains('\t') {
            return None;
        } else {
            let key = line.trim().to_string();
            self.pairs.push((key.clone(), None));
            return Some(key);
        };

        if LEADER_KEYS.contains(&key) {
            self.name = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("comment") || key.eq_ignore_ascii_case("comments") {
            self.pairs.extend(parse_comment(value));
        } else {
            self.pairs.push((key.to_string(), Some(value.to_string())));
        }
        Some(key.to_string())
    }

    fn into_spectrum(self, position: usize) -> Spectrum {
        let mut spectrum = Spectrum::new(position as u64 + 1);
        spectrum.index = position;
        let mut analyte = Analyte::new(FIRST_ENTITY_ID);

        if let Some(name) = &self.name {
            spectrum
                .attributes
                .add_value(ms_terms::spectrum_name(), name.as_str());
            apply_name(name, &mut analyte.attributes);
        }

        for (key, value) in self.pairs {
            if is_num_peaks_key(&key) {
                let declared = value.as_deref().and_then(|v| v.trim().parse::<usize>().ok());
                if declared.is_some_and(|n| n != self.peaks.len()) {
                    warn!(
                        "MSP entry {:?} declares {:?} peaks but lists {}",
                        self.name,
                        declared,
                        self.peaks.len()
                    );
                }
                continue;
            }
            apply_pair(&key, value.as_deref(), &mut spectrum.attributes, &mut analyte.attributes);
        }

        // An explicit Charge key wins over the charge parsed from the name
        if spectrum.attributes.has(accessions::CHARGE_STATE) {
            analyte.attributes.remove_all(accessions::CHARGE_STATE);
        }
        spectrum
            .attributes
            .add_value(ms_terms::number_of_peaks(), self.peaks.len() as i64);
        spectrum.peaks = self.peaks;

        if !analyte.attributes.is_empty() {
            spectrum.add_analyte(analyte);
            spectrum.add_interpretation(Interpretation::new(FIRST_ENTITY_ID));
            spectrum.link_interpretations();
        }
        spectrum
    }
}

/// Pull the stripped sequence and charge out of a `PEPTIDE/CHARGE[_...]` name
fn apply_name(name: &str, analyte: &mut AttributeManager) {
    let Some((sequence, rest)) = name.split_once('/') else {
        return;
    };
    if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_uppercase()) {
        return;
    }
    analyte.add_value(ms_terms::stripped_peptide_sequence(), sequence);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if let Ok(charge) = digits.parse::<i64>() {
        analyte.add_value(ms_terms::charge_state(), charge);
    }
}

fn apply_pair(
    key: &str,
    value: Option<&str>,
    spectrum: &mut AttributeManager,
    analyte: &mut AttributeManager,
) {
    if let Some(target) = known_key(key) {
        let raw = value.unwrap_or("");
        let value = if key.eq_ignore_ascii_case("charge") {
            cast_value(raw.trim_end_matches('+'))
        } else {
            cast_value(raw)
        };
        match target {
            Target::Spectrum(term) => spectrum.add(Attribute::new(term, value)),
            Target::Analyte(term) => analyte.add(Attribute::new(term, value)),
        }
        return;
    }

    match (key.to_ascii_lowercase().as_str(), value) {
        ("inst" | "instrument_type", Some(inst)) => {
            let method = match inst.to_ascii_lowercase().as_str() {
                "it" => Some(ms_terms::trap_cid()),
                "hcd" | "qexactive" | "elite" => Some(ms_terms::hcd()),
                _ => None,
            };
            match method {
                Some(method) => spectrum.add_value(ms_terms::dissociation_method(), method),
                None => add_other_attribute(spectrum, key, cast_value(inst)),
            }
        }
        ("spec", Some(spec)) if spec.eq_ignore_ascii_case("consensus") => {
            spectrum.add_value(
                ms_terms::spectrum_aggregation_type(),
                ms_terms::consensus_spectrum(),
            );
        }
        ("consensus", None) => spectrum.add_value(
            ms_terms::spectrum_aggregation_type(),
            ms_terms::consensus_spectrum(),
        ),
        ("single", None) => spectrum.add_value(
            ms_terms::spectrum_aggregation_type(),
            ms_terms::singleton_spectrum(),
        ),
        (_, value) => {
            warn!("Unknown MSP key {:?}; kept as an uncontrolled attribute", key);
            let value = value.map(cast_value).unwrap_or_else(|| Value::Str(String::new()));
            add_other_attribute(spectrum, key, value);
        }
    }
}

/// Split a `Comment:` value into `key=value` items, keeping quoted spaces
fn parse_comment(comment: &str) -> Vec<(String, Option<String>)> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in comment.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }

    items
        .into_iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) => {
                let unquoted_key = key.trim_matches('"');
                let value = if unquoted_key.len() != key.len() || value.starts_with('"') {
                    value.trim_matches('"')
                } else {
                    value
                };
                (unquoted_key.to_string(), Some(value.to_string()))
            }
            None => (item, None),
        })
        .collect()
}

/// Parse `mz intensity ["annotation ..."]`, or several `mz intensity;` pairs on one line
fn parse_peak_line(line: &str, peaks: &mut Vec<Peak>) -> Result<(), String> {
    if line.contains(';') {
        for block in line.split(';') {
            let block = block.trim();
            if !block.is_empty() {
                peaks.push(parse_single_peak(block)?);
            }
        }
        return Ok(());
    }
    peaks.push(parse_single_peak(line)?);
    Ok(())
}

fn parse_single_peak(text: &str) -> Result<Peak, String> {
    let mut tokens = text.trim().splitn(3, char::is_whitespace);
    let mz = tokens.next().unwrap_or("");
    let intensity = tokens.next().map(str::trim).unwrap_or("");
    let mz: f64 = mz
        .parse()
        .map_err(|_| format!("invalid m/z {:?} in peak line {:?}", mz, text))?;
    let intensity: f64 = intensity
        .parse()
        .map_err(|_| format!("invalid intensity {:?} in peak line {:?}", intensity, text))?;

    let mut peak = Peak::new(mz, intensity);
    if let Some(rest) = tokens.next() {
        let annotation = rest.trim().trim_matches('"');
        let first = annotation.split_whitespace().next().unwrap_or("");
        if !first.is_empty() && first != "?" {
            peak.annotations = first.split(',').map(str::to_string).collect();
        }
    }
    Ok(peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MSP: &str = "Name: AAAACALTPGPLADLAAR/2_1(4,C,CAM)_46eV
MW: 1797.9615
Comment: Parent=899.9880 Mods=1(4,C,CAM) Inst=qtof Spec=Consensus Nreps=3/5 \"Sample Id\"=\"a b\"
Num peaks: 3
147.1128\t1234.5\t\"y1/0.2ppm\"
260.1969\t2500.0\t\"y2/-0.4ppm,b2/1.1ppm 2/3 0.5\"
300.5\t50.0\t\"?\"

NAME: PEPTIDE/3
Charge: 3+
Num Peaks: 2
100.0 10.0; 200.0 20.0;
";

    fn adapter() -> MspAdapter {
        MspAdapter::from_reader(Box::new(Cursor::new(MSP)), "test")
    }

    #[test]
    fn test_read_entries() {
        let library = adapter().read_library().unwrap();
        assert_eq!(library.spectra.len(), 2);
        assert_eq!(library.header.name(), Some("test"));

        let first = &library.spectra[0];
        assert_eq!(first.key, 1);
        assert_eq!(first.name(), Some("AAAACALTPGPLADLAAR/2_1(4,C,CAM)_46eV"));
        assert_eq!(first.charge(), Some(2));
        assert_eq!(first.peaks.len(), 3);
        assert_eq!(first.peaks[1].annotations, vec!["y2/-0.4ppm", "b2/1.1ppm"]);
        assert!(first.peaks[2].annotations.is_empty());
        assert_eq!(
            first
                .attributes
                .get_value(accessions::SELECTED_ION_MZ),
            Some(&Value::Float(899.988))
        );
        let analyte = &first.analytes[0];
        assert_eq!(
            analyte
                .attributes
                .get_value(accessions::STRIPPED_PEPTIDE_SEQUENCE)
                .and_then(Value::as_str),
            Some("AAAACALTPGPLADLAAR")
        );

        let second = &library.spectra[1];
        assert_eq!(second.key, 2);
        assert_eq!(second.charge(), Some(3));
        assert_eq!(second.peaks.len(), 2);
        assert_eq!(second.peaks[1].mz, 200.0);
    }

    #[test]
    fn test_unknown_keys_become_other_attributes() {
        let library = adapter().read_library().unwrap();
        let attrs = &library.spectra[0].attributes;
        let names: Vec<&str> = attrs
            .get_all(accessions::OTHER_ATTRIBUTE_NAME)
            .into_iter()
            .filter_map(|a| a.value.as_str())
            .collect();
        assert_eq!(names, vec!["Inst", "Sample Id"]);

        let inst = attrs
            .get_all(accessions::OTHER_ATTRIBUTE_NAME)
            .into_iter()
            .find(|a| a.value.as_str() == Some("Inst"))
            .unwrap();
        let group = attrs.get_in_group(inst.group.unwrap());
        assert_eq!(group[1].value, Value::Str("qtof".to_string()));
    }

    #[test]
    fn test_comment_quotes() {
        let items = parse_comment("A=1 \"B C\"=\"x y\" D");
        assert_eq!(
            items,
            vec![
                ("A".to_string(), Some("1".to_string())),
                ("B C".to_string(), Some("x y".to_string())),
                ("D".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_bad_peak_line() {
        let msp = "Name: X/1\nNum peaks: 1\n100.0\tabc\n";
        let mut adapter = MspAdapter::from_reader(Box::new(Cursor::new(msp)), "bad");
        assert!(matches!(
            adapter.read_library(),
            Err(AdapterError::Format {
                format: Format::Msp,
                ..
            })
        ));
    }

    #[test]
    fn test_leader_line() {
        assert!(is_leader_line("Name: X"));
        assert!(is_leader_line("COMPOUND: glucose"));
        assert!(!is_leader_line("MW: 12"));
        assert!(!is_leader_line("147.1\t10"));
    }
}
