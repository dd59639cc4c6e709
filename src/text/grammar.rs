//! Line-level grammar of the text format: section headers, attribute lines
//! and peak lines.

use log::warn;

use crate::attributes::{Attribute, Value};
use crate::controlled_vocabulary::{is_curie, CvTerm};
use crate::model::{EntityType, Peak};

use super::TextError;

/// A recognized `<...>` section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SectionHeader {
    /// `<mzSpecLib>` with an optional trailing version tag
    Library(Option<String>),
    /// `<AttributeSet Type=Name>`
    AttributeSet(EntityType, String),
    /// `<Spectrum=Key>`
    Spectrum(String),
    /// `<Cluster=Key>`
    Cluster(String),
    /// `<Analyte=Id>`
    Analyte(String),
    /// `<Interpretation=Id>`
    Interpretation(String),
    /// `<InterpretationMember=Id>`
    InterpretationMember(String),
    /// `<Peaks>`
    Peaks,
}

impl SectionHeader {
    /// Short label used in error messages
    pub(crate) fn label(&self) -> String {
        match self {
            SectionHeader::Library(_) => "<mzSpecLib>".to_string(),
            SectionHeader::AttributeSet(ty, name) => format!("<AttributeSet {}={}>", ty, name),
            SectionHeader::Spectrum(k) => format!("<Spectrum={}>", k),
            SectionHeader::Cluster(k) => format!("<Cluster={}>", k),
            SectionHeader::Analyte(id) => format!("<Analyte={}>", id),
            SectionHeader::Interpretation(id) => format!("<Interpretation={}>", id),
            SectionHeader::InterpretationMember(id) => format!("<InterpretationMember={}>", id),
            SectionHeader::Peaks => "<Peaks>".to_string(),
        }
    }
}

/// Recognize a section header line
pub(crate) fn parse_section_header(line: &str) -> Option<SectionHeader> {
    let inner = line.trim().strip_prefix('<')?.strip_suffix('>')?;

    if inner == "Peaks" {
        return Some(SectionHeader::Peaks);
    }
    if let Some(rest) = inner.strip_prefix("mzSpecLib") {
        let tag = rest.trim();
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(SectionHeader::Library(
                (!tag.is_empty()).then(|| tag.to_string()),
            ));
        }
        return None;
    }
    if let Some(rest) = inner.strip_prefix("AttributeSet ") {
        let (ty, name) = rest.split_once('=')?;
        let entity_type = ty.trim().parse::<EntityType>().ok()?;
        return Some(SectionHeader::AttributeSet(
            entity_type,
            name.trim().to_string(),
        ));
    }

    let (tag, id) = inner.split_once('=')?;
    let id = id.trim().to_string();
    match tag.trim() {
        "Spectrum" => Some(SectionHeader::Spectrum(id)),
        "Cluster" => Some(SectionHeader::Cluster(id)),
        "Analyte" => Some(SectionHeader::Analyte(id)),
        "Interpretation" => Some(SectionHeader::Interpretation(id)),
        "InterpretationMember" => Some(SectionHeader::InterpretationMember(id)),
        _ => None,
    }
}

/// Parse `[group]CURIE|name=value` or `[group]CURIE=value`
pub(crate) fn parse_attribute_line(line: &str) -> Option<Attribute> {
    let (group, rest) = match line.strip_prefix('[') {
        Some(after) => {
            let (digits, rest) = after.split_once(']')?;
            (Some(digits.parse::<u32>().ok()?), rest)
        }
        None => (None, line),
    };

    let (key, raw_value) = rest.split_once('=')?;
    let (accession, name) = match key.split_once('|') {
        Some((acc, name)) => (acc, name),
        None => (key, ""),
    };
    if !is_curie(accession) || name.trim() != name {
        return None;
    }

    Some(Attribute {
        term: CvTerm::new(accession, name),
        value: Value::parse_text(raw_value),
        group,
        origin: None,
    })
}

/// Parse a tab-separated peak line
pub(crate) fn parse_peak_line(line: &str, line_no: usize) -> Result<Peak, TextError> {
    let malformed = || TextError::MalformedLine {
        line_no,
        text: line.to_string(),
    };

    let mut tokens: Vec<&str> = line.split('\t').collect();
    if tokens.len() == 1 && line.contains(' ') {
        warn!("Space character delimiter found in peak line {}", line_no);
        tokens = line.split_whitespace().collect();
    }
    if tokens.len() < 2 {
        return Err(malformed());
    }

    let mz = tokens[0].trim().parse::<f64>().map_err(|_| malformed())?;
    let intensity = tokens[1].trim().parse::<f64>().map_err(|_| malformed())?;

    let annotations = tokens
        .get(2)
        .map(|raw| Peak::split_annotations(raw))
        .unwrap_or_default();
    let aggregations = tokens
        .iter()
        .skip(3)
        .map(|raw| Value::parse_text(raw.trim()))
        .collect();

    Ok(Peak {
        mz,
        intensity,
        annotations,
        aggregations,
    })
}
