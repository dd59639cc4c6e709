use log::warn;

use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::{accessions, ms_terms};

use super::{Analyte, Interpretation};

/// A single peak of a library spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    /// m/z value
    pub mz: f64,
    /// Intensity
    pub intensity: f64,
    /// Opaque annotation strings (empty means unannotated)
    pub annotations: Vec<String>,
    /// Per-peak aggregation statistics, as declared by `MS:1003254|peak attribute`
    pub aggregations: Vec<Value>,
}

impl Peak {
    /// Create an unannotated peak
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz,
            intensity,
            annotations: Vec::new(),
            aggregations: Vec::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Split a serialized annotation field into annotations.
    ///
    /// Commas separate annotations only outside brackets and quotes, so
    /// `b2{Glycan,x},y1` holds two. `?` and the empty string mean none.
    pub fn split_annotations(raw: &str) -> Vec<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "?" {
            return Vec::new();
        }
        let mut annotations = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut start = 0;
        for (i, c) in raw.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '[' | '(' | '{') => depth += 1,
                (None, ']' | ')' | '}') => depth = depth.saturating_sub(1),
                (None, ',') if depth == 0 => {
                    annotations.push(raw[start..i].to_string());
                    start = i + 1;
                }
                _ => {}
            }
        }
        annotations.push(raw[start..].to_string());
        annotations
    }
}

/// A library spectrum
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    /// Permanent identity of the spectrum within its library
    pub key: u64,
    /// Position in the source, reassigned when the library is rewritten
    pub index: usize,
    /// Spectrum attributes, inherited ones first
    pub attributes: AttributeManager,
    /// Peaks in file order
    pub peaks: Vec<Peak>,
    /// Analytes in declaration order, unique by id
    pub analytes: Vec<Analyte>,
    /// Interpretations in declaration order, unique by id
    pub interpretations: Vec<Interpretation>,
}

impl Spectrum {
    /// Create an empty spectrum with the given key
    pub fn new(key: u64) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// `MS:1003061|library spectrum name`
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .get_value(accessions::SPECTRUM_NAME)
            .and_then(Value::as_str)
    }

    /// Precursor m/z, falling back to the selected ion m/z
    pub fn precursor_mz(&self) -> Option<f64> {
        self.attributes
            .get_value(accessions::PRECURSOR_MZ)
            .or_else(|| self.attributes.get_value(accessions::SELECTED_ION_MZ))
            .and_then(Value::as_float)
    }

    /// Precursor charge, looked up on the spectrum then on its first analyte
    pub fn charge(&self) -> Option<i64> {
        self.attributes
            .get_value(accessions::CHARGE_STATE)
            .or_else(|| {
                self.analytes
                    .first()
                    .and_then(|a| a.attributes.get_value(accessions::CHARGE_STATE))
            })
            .and_then(Value::as_int)
    }

    /// Declared per-peak aggregation measures
    pub fn peak_aggregations(&self) -> Vec<&Value> {
        self.attributes
            .get_all(accessions::PEAK_ATTRIBUTE)
            .into_iter()
            .map(|a| &a.value)
            .collect()
    }

    /// Key and index rendered as attributes, followed by the stored attributes
    pub fn identity_attributes(&self) -> AttributeManager {
        let mut out = AttributeManager::new();
        out.add(Attribute::new(ms_terms::spectrum_key(), Value::from(self.key)));
        out.add(Attribute::new(
            ms_terms::spectrum_index(),
            Value::from(self.index as u64),
        ));
        out.extend(self.attributes.iter().cloned());
        out
    }

    /// Look up an analyte by id
    pub fn analyte(&self, id: &str) -> Option<&Analyte> {
        self.analytes.iter().find(|a| a.id == id)
    }

    /// Look up an interpretation by id
    pub fn interpretation(&self, id: &str) -> Option<&Interpretation> {
        self.interpretations.iter().find(|i| i.id == id)
    }

    /// Add an analyte, replacing any existing one with the same id
    pub fn add_analyte(&mut self, analyte: Analyte) {
        match self.analytes.iter_mut().find(|a| a.id == analyte.id) {
            Some(existing) => {
                warn!(
                    "Spectrum {} has duplicate analyte {}, keeping the last one",
                    self.key, analyte.id
                );
                *existing = analyte
            }
            None => self.analytes.push(analyte),
        }
    }

    /// Add an interpretation, replacing any existing one with the same id
    pub fn add_interpretation(&mut self, interpretation: Interpretation) {
        match self
            .interpretations
            .iter_mut()
            .find(|i| i.id == interpretation.id)
        {
            Some(existing) => {
                warn!(
                    "Spectrum {} has duplicate interpretation {}, keeping the last one",
                    self.key, interpretation.id
                );
                *existing = interpretation
            }
            None => self.interpretations.push(interpretation),
        }
    }

    /// Number of peaks
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    /// Fill in `analyte_ids` for interpretations and members that do not list any.
    ///
    /// `MS:1003163|analyte mixture members` names them when present. Otherwise
    /// an interpretation covers every analyte of the spectrum, and a member
    /// refers to the analyte sharing its id, falling back to the
    /// interpretation's analytes.
    pub fn link_interpretations(&mut self) {
        let all_ids: Vec<String> = self.analytes.iter().map(|a| a.id.clone()).collect();
        for interpretation in &mut self.interpretations {
            if interpretation.analyte_ids.is_empty() {
                interpretation.analyte_ids = match interpretation
                    .attributes
                    .get_value(accessions::ANALYTE_MIXTURE_MEMBERS)
                {
                    Some(value) => mixture_ids(value),
                    None => all_ids.clone(),
                };
            }
            for member in &mut interpretation.members {
                if !member.analyte_ids.is_empty() {
                    continue;
                }
                member.analyte_ids = match member
                    .attributes
                    .get_value(accessions::ANALYTE_MIXTURE_MEMBERS)
                {
                    Some(value) => mixture_ids(value),
                    None if all_ids.contains(&member.id) => vec![member.id.clone()],
                    None => interpretation.analyte_ids.clone(),
                };
            }
        }
    }
}

fn mixture_ids(value: &Value) -> Vec<String> {
    match value {
        Value::Int(id) => vec![id.to_string()],
        Value::Str(s) => s
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        Value::List(items) => items
            .iter()
            .map(|v| match v {
                Value::Str(s) => s.clone(),
                other => other.format_text(),
            })
            .collect(),
        other => vec![other.format_text()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlled_vocabulary::accessions;
    use crate::model::InterpretationMember;

    #[test]
    fn test_accessors() {
        let mut spectrum = Spectrum::new(7);
        spectrum
            .attributes
            .add_value(ms_terms::spectrum_name(), "PEPTIDE/2");
        spectrum.attributes.add_value(ms_terms::selected_ion_mz(), 400.5);

        let mut analyte = Analyte::new("1");
        analyte.attributes.add_value(ms_terms::charge_state(), 2i64);
        spectrum.add_analyte(analyte);

        assert_eq!(spectrum.name(), Some("PEPTIDE/2"));
        assert_eq!(spectrum.precursor_mz(), Some(400.5));
        assert_eq!(spectrum.charge(), Some(2));
    }

    #[test]
    fn test_identity_attributes() {
        let mut spectrum = Spectrum::new(42);
        spectrum.index = 3;
        let identity = spectrum.identity_attributes();
        assert_eq!(
            identity.get_value(accessions::SPECTRUM_KEY),
            Some(&Value::Int(42))
        );
        assert_eq!(
            identity.get_value(accessions::SPECTRUM_INDEX),
            Some(&Value::Int(3))
        );
        assert!(spectrum.attributes.is_empty());
    }

    #[test]
    fn test_link_interpretations() {
        let mut spectrum = Spectrum::new(1);
        spectrum.add_analyte(Analyte::new("1"));
        spectrum.add_analyte(Analyte::new("2"));
        spectrum.add_interpretation(Interpretation::new("1"));
        let mut mixture = Interpretation::new("2");
        mixture
            .attributes
            .add_value(ms_terms::analyte_mixture_members(), "2");
        spectrum.add_interpretation(mixture);

        spectrum.link_interpretations();
        assert_eq!(spectrum.interpretations[0].analyte_ids, vec!["1", "2"]);
        assert_eq!(spectrum.interpretations[1].analyte_ids, vec!["2"]);
    }

    #[test]
    fn test_split_annotations() {
        assert!(Peak::split_annotations("?").is_empty());
        assert!(Peak::split_annotations("").is_empty());
        assert_eq!(Peak::split_annotations("b2,y1-H2O"), vec!["b2", "y1-H2O"]);
        assert_eq!(
            Peak::split_annotations("b2{Glycan,x}/0.1,y2-[Foo,Bar]"),
            vec!["b2{Glycan,x}/0.1", "y2-[Foo,Bar]"]
        );
        assert_eq!(
            Peak::split_annotations("_{\"a,b\"},p"),
            vec!["_{\"a,b\"}", "p"]
        );
    }

    #[test]
    fn test_link_interpretation_members() {
        let mut spectrum = Spectrum::new(1);
        spectrum.add_analyte(Analyte::new("1"));
        spectrum.add_analyte(Analyte::new("2"));
        let mut interpretation = Interpretation::new("1");
        interpretation.add_member(InterpretationMember::new("2"));
        interpretation.add_member(InterpretationMember::new("9"));
        spectrum.add_interpretation(interpretation);

        spectrum.link_interpretations();
        let linked = &spectrum.interpretations[0];
        assert_eq!(linked.members[0].analyte_ids, vec!["2"]);
        assert_eq!(linked.members[1].analyte_ids, vec!["1", "2"]);
    }

    #[test]
    fn test_duplicate_interpretation_keeps_last() {
        let mut spectrum = Spectrum::new(1);
        spectrum.add_interpretation(Interpretation::new("1"));
        let mut replacement = Interpretation::new("1");
        replacement
            .attributes
            .add_value(ms_terms::q_value(), 0.01);
        replacement.add_member(InterpretationMember::new("1"));
        replacement.add_member(InterpretationMember::new("1"));
        spectrum.add_interpretation(replacement);

        assert_eq!(spectrum.interpretations.len(), 1);
        assert!(spectrum.interpretations[0].attributes.has("MS:1002354"));
        assert_eq!(spectrum.interpretations[0].members.len(), 1);
    }

    #[test]
    fn test_add_analyte_replaces_same_id() {
        let mut spectrum = Spectrum::new(1);
        spectrum.add_analyte(Analyte::new("1"));
        let mut replacement = Analyte::new("1");
        replacement.attributes.add_value(ms_terms::charge_state(), 3i64);
        spectrum.add_analyte(replacement);
        assert_eq!(spectrum.analytes.len(), 1);
        assert_eq!(spectrum.charge(), Some(3));
    }
}
