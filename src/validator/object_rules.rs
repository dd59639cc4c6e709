//! Checks that look at a whole entity rather than matching attribute patterns.

use std::fmt;
use std::str::FromStr;

use crate::attributes::{AttributeManager, Value, ValueType};
use crate::controlled_vocabulary::accessions;
use crate::model::{Library, Spectrum};

use super::annotation::AnnotationParser;
use super::engine::{entities_at, ValidationRecord};
use super::ontology::Ontology;
use super::rule::{EntityPath, RequirementLevel};
use super::ValidationError;

/// Built-in whole-object check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRule {
    /// The first library attribute is the format version
    LibraryFormatVersionFirst,
    /// Every peak annotation parses and refers to a present analyte
    SpectrumPeakAnnotations,
    /// Attribute values have the type and unit their term declares.
    ///
    /// Runs over every entity; terms the ontology does not know are skipped.
    AttributeValues,
}

impl ObjectRule {
    /// Every object rule
    pub const ALL: [ObjectRule; 3] = [
        ObjectRule::LibraryFormatVersionFirst,
        ObjectRule::SpectrumPeakAnnotations,
        ObjectRule::AttributeValues,
    ];

    /// Name used in profile files
    pub fn name(&self) -> &'static str {
        match self {
            ObjectRule::LibraryFormatVersionFirst => "library_format_version_first",
            ObjectRule::SpectrumPeakAnnotations => "spectrum_peak_annotations",
            ObjectRule::AttributeValues => "attribute_values",
        }
    }

    /// Rule id used in records
    pub fn id(&self) -> &'static str {
        match self {
            ObjectRule::LibraryFormatVersionFirst => "Library_format_version_is_first",
            ObjectRule::SpectrumPeakAnnotations => "Spectrum_peak_annotations_are_valid",
            ObjectRule::AttributeValues => "Attribute_values_match_term_definitions",
        }
    }

    /// Path the rule applies to; records of `AttributeValues` carry their
    /// entity's own path
    pub fn path(&self) -> EntityPath {
        match self {
            ObjectRule::LibraryFormatVersionFirst | ObjectRule::AttributeValues => {
                EntityPath::Library
            }
            ObjectRule::SpectrumPeakAnnotations => EntityPath::Spectrum,
        }
    }

    /// Severity when unsatisfied
    pub fn level(&self) -> RequirementLevel {
        match self {
            ObjectRule::LibraryFormatVersionFirst => RequirementLevel::Must,
            ObjectRule::SpectrumPeakAnnotations | ObjectRule::AttributeValues => {
                RequirementLevel::Should
            }
        }
    }

    /// Evaluate the rule on every entity at its path
    pub fn evaluate(
        &self,
        library: &Library,
        ontology: &dyn Ontology,
        annotations: &dyn AnnotationParser,
    ) -> Vec<ValidationRecord> {
        match self {
            ObjectRule::LibraryFormatVersionFirst => {
                let outcome = match library.header.attributes.iter().next() {
                    Some(first) if first.is(accessions::FORMAT_VERSION) => Ok(()),
                    Some(first) => Err(format!(
                        "first library attribute is {}, expected {}",
                        first.accession(),
                        accessions::FORMAT_VERSION
                    )),
                    None => Err("library has no attributes".to_string()),
                };
                vec![self.record(EntityPath::Library.to_string(), outcome)]
            }
            ObjectRule::SpectrumPeakAnnotations => library
                .spectra
                .iter()
                .map(|spectrum| {
                    self.record(
                        format!("/Library/Spectrum={}", spectrum.key),
                        check_annotations(spectrum, annotations),
                    )
                })
                .collect(),
            ObjectRule::AttributeValues => {
                let mut records = Vec::new();
                for path in EntityPath::ALL {
                    for entity in entities_at(library, path) {
                        let outcome = check_attribute_values(&entity.attributes, ontology);
                        records.push(ValidationRecord::new(
                            self.id(),
                            path,
                            entity.instance,
                            self.level(),
                            outcome,
                        ));
                    }
                }
                records
            }
        }
    }

    fn record(&self, entity: String, outcome: Result<(), String>) -> ValidationRecord {
        ValidationRecord::new(self.id(), self.path(), entity, self.level(), outcome)
    }
}

fn check_annotations(spectrum: &Spectrum, parser: &dyn AnnotationParser) -> Result<(), String> {
    let mut problems = Vec::new();
    for (i, peak) in spectrum.peaks.iter().enumerate() {
        for text in &peak.annotations {
            match parser.parse(text) {
                Ok(annotation) => {
                    if let Some(id) = &annotation.analyte {
                        if spectrum.analyte(id).is_none() {
                            problems.push(format!(
                                "peak {} annotation {:?} refers to missing analyte {}",
                                i + 1,
                                text,
                                id
                            ));
                        }
                    }
                }
                Err(e) => problems.push(format!("peak {}: {}", i + 1, e)),
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

fn check_attribute_values(
    attributes: &AttributeManager,
    ontology: &dyn Ontology,
) -> Result<(), String> {
    let mut problems = Vec::new();
    for attribute in attributes.iter() {
        let Some(info) = ontology.resolve(attribute.accession()) else {
            continue;
        };

        if let Some(expected) = info.value_type {
            let mismatch = match &attribute.value {
                Value::List(items) if expected != ValueType::List => {
                    items.iter().find(|v| !expected.accepts(v.value_type()))
                }
                value => (!expected.accepts(value.value_type())).then_some(value),
            };
            if let Some(value) = mismatch {
                problems.push(format!(
                    "{} has {} value {}, expected {}",
                    attribute.term,
                    value.value_type(),
                    value.format_text(),
                    expected
                ));
            }
        }

        if info.units.is_empty() {
            continue;
        }
        if let Some(unit) = attributes.unit_of(attribute) {
            let allowed = unit.value.as_term().is_some_and(|term| {
                info.units
                    .iter()
                    .any(|allowed| ontology.is_a(&term.accession, allowed))
            });
            if !allowed {
                problems.push(format!(
                    "{} has unit {}, expected one of {}",
                    attribute.term,
                    unit.value.format_text(),
                    info.units.join(", ")
                ));
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

impl fmt::Display for ObjectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectRule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectRule::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or_else(|| ValidationError::UnknownObjectRule(s.to_string()))
    }
}
