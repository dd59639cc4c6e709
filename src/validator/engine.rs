//! Rule evaluation over a parsed library.

use std::borrow::Cow;
use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::attributes::{Attribute, AttributeManager};
use crate::controlled_vocabulary::ms_terms;
use crate::model::{Cluster, Library};

use super::annotation::AnnotationParser;
use super::object_rules::ObjectRule;
use super::ontology::Ontology;
use super::rule::{
    AttributePattern, CombinationLogic, EntityPath, RequirementLevel, Rule, ValueRule,
};

/// Outcome of one rule on one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    /// Rule identifier
    pub rule_id: String,
    /// Path the rule applies to
    pub path: EntityPath,
    /// Instance path, e.g. `/Library/Spectrum=3/Analyte=1`
    pub entity: String,
    /// Severity of the rule
    pub level: RequirementLevel,
    /// Whether the rule held
    pub satisfied: bool,
    /// Why the rule failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRecord {
    pub(crate) fn new(
        rule_id: impl Into<String>,
        path: EntityPath,
        entity: impl Into<String>,
        level: RequirementLevel,
        outcome: Result<(), String>,
    ) -> Self {
        let (satisfied, message) = match outcome {
            Ok(()) => (true, None),
            Err(message) => (false, Some(message)),
        };
        Self {
            rule_id: rule_id.into(),
            path,
            entity: entity.into(),
            level,
            satisfied,
            message,
        }
    }

    /// A failed MUST rule
    pub fn is_error(&self) -> bool {
        !self.satisfied && self.level == RequirementLevel::Must
    }

    /// A failed SHOULD rule
    pub fn is_warning(&self) -> bool {
        !self.satisfied && self.level == RequirementLevel::Should
    }

    /// Log the record if it failed; MAY failures only at debug
    pub(crate) fn log(&self) {
        if self.satisfied {
            return;
        }
        let message = self.message.as_deref().unwrap_or_default();
        match self.level {
            RequirementLevel::May => {
                debug!("{} not met for {}: {}", self.rule_id, self.entity, message)
            }
            level => warn!("{} {} failed for {}: {}", level, self.rule_id, self.entity, message),
        }
    }
}

/// One entity at a path, with its instance path
pub(super) struct EntityView<'l> {
    pub(super) instance: String,
    pub(super) attributes: Cow<'l, AttributeManager>,
}

/// Evaluates semantic rules and object rules against a library
pub struct Validator<'a> {
    rules: Vec<Rule>,
    object_rules: Vec<ObjectRule>,
    ontology: &'a dyn Ontology,
    annotations: &'a dyn AnnotationParser,
}

impl<'a> Validator<'a> {
    /// Validator over `rules` with injected term and annotation lookups
    pub fn new(
        rules: Vec<Rule>,
        ontology: &'a dyn Ontology,
        annotations: &'a dyn AnnotationParser,
    ) -> Self {
        Self {
            rules,
            object_rules: Vec::new(),
            ontology,
            annotations,
        }
    }

    /// Also run these whole-object checks
    pub fn with_object_rules(mut self, object_rules: Vec<ObjectRule>) -> Self {
        self.object_rules = object_rules;
        self
    }

    /// Semantic rules, in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every rule on every entity at its path.
    ///
    /// Records come out in rule order, then entity order, followed by the
    /// object rules. Unsatisfied MAY rules are not reported.
    pub fn validate(&self, library: &Library) -> Vec<ValidationRecord> {
        let mut views: HashMap<EntityPath, Vec<EntityView<'_>>> = HashMap::new();
        let mut records = Vec::new();

        for rule in &self.rules {
            let entities = views
                .entry(rule.path)
                .or_insert_with(|| entities_at(library, rule.path));
            let uniqueness = self.value_counts(rule, entities);

            for entity in entities.iter() {
                let outcome = self.check_rule(rule, &entity.attributes, &uniqueness);
                let record = ValidationRecord::new(
                    &rule.id,
                    rule.path,
                    &entity.instance,
                    rule.requirement_level,
                    outcome,
                );
                record.log();
                if record.satisfied || record.level != RequirementLevel::May {
                    records.push(record);
                }
            }
        }

        for object_rule in &self.object_rules {
            for record in object_rule.evaluate(library, self.ontology, self.annotations) {
                record.log();
                records.push(record);
            }
        }
        records
    }

    fn matches(&self, pattern: &AttributePattern, attribute: &Attribute) -> bool {
        attribute.is(&pattern.accession)
            || (pattern.allow_children && self.ontology.is_a(attribute.accession(), &pattern.accession))
    }

    /// Occurrence counts of every value a `value_is_unique` pattern sees,
    /// keyed by pattern position and rendered value
    fn value_counts(
        &self,
        rule: &Rule,
        entities: &[EntityView<'_>],
    ) -> HashMap<(usize, String), usize> {
        let mut counts = HashMap::new();
        for (i, pattern) in rule.attr.iter().enumerate() {
            if pattern.value != Some(ValueRule::ValueIsUnique) {
                continue;
            }
            for entity in entities {
                for attribute in entity.attributes.iter() {
                    if self.matches(pattern, attribute) {
                        *counts.entry((i, attribute.value.format_text())).or_insert(0) += 1;
                    }
                }
            }
        }
        counts
    }

    fn check_rule(
        &self,
        rule: &Rule,
        attributes: &AttributeManager,
        uniqueness: &HashMap<(usize, String), usize>,
    ) -> Result<(), String> {
        let outcomes: Vec<Result<(), String>> = rule
            .attr
            .iter()
            .enumerate()
            .map(|(i, pattern)| self.check_pattern(i, pattern, attributes, uniqueness))
            .collect();
        let matched = outcomes.iter().filter(|o| o.is_ok()).count();
        let failures = || {
            outcomes
                .iter()
                .filter_map(|o| o.as_ref().err().cloned())
                .collect::<Vec<_>>()
                .join("; ")
        };

        match rule.combination_logic {
            CombinationLogic::And if matched == outcomes.len() => Ok(()),
            CombinationLogic::And => Err(failures()),
            CombinationLogic::Or if matched > 0 => Ok(()),
            CombinationLogic::Or => Err(format!("none of the alternatives matched: {}", failures())),
            CombinationLogic::Xor if matched == 1 => Ok(()),
            CombinationLogic::Xor if matched == 0 => {
                Err(format!("none of the alternatives matched: {}", failures()))
            }
            CombinationLogic::Xor => {
                let labels: Vec<String> = rule
                    .attr
                    .iter()
                    .zip(&outcomes)
                    .filter(|(_, o)| o.is_ok())
                    .map(|(p, _)| p.label())
                    .collect();
                Err(format!("expected exactly one of: {}", labels.join(", ")))
            }
        }
    }

    fn check_pattern(
        &self,
        position: usize,
        pattern: &AttributePattern,
        attributes: &AttributeManager,
        uniqueness: &HashMap<(usize, String), usize>,
    ) -> Result<(), String> {
        let found: Vec<&Attribute> = attributes
            .iter()
            .filter(|a| self.matches(pattern, a))
            .collect();
        if found.is_empty() {
            return Err(format!("missing {}", pattern.label()));
        }
        // Grouped occurrences describe distinct things (one per precursor, say)
        let ungrouped = found.iter().filter(|a| a.group.is_none()).count();
        if ungrouped > 1 && !pattern.repeatable {
            return Err(format!("{} appears {} times", pattern.label(), ungrouped));
        }
        let Some(value_rule) = &pattern.value else {
            return Ok(());
        };
        for attribute in found {
            match value_rule {
                ValueRule::ValueOfType { value } => {
                    let actual = attribute.value.value_type();
                    if !value.accepts(actual) {
                        return Err(format!(
                            "{} has a {} value, expected {}",
                            pattern.label(),
                            actual,
                            value
                        ));
                    }
                }
                ValueRule::ValueIsChildOf { accession } => {
                    let is_child = attribute
                        .value
                        .as_term()
                        .is_some_and(|term| self.ontology.is_a(&term.accession, accession));
                    if !is_child {
                        return Err(format!(
                            "{} value {} is not a kind of {}",
                            pattern.label(),
                            attribute.value.format_text(),
                            accession
                        ));
                    }
                }
                ValueRule::ValueIsUnique => {
                    let text = attribute.value.format_text();
                    let count = uniqueness.get(&(position, text.clone())).copied().unwrap_or(0);
                    if count > 1 {
                        return Err(format!(
                            "{} value {} is shared by {} entities",
                            pattern.label(),
                            text,
                            count
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Cluster attributes with its key and members written back as attributes
fn cluster_attributes(cluster: &Cluster) -> AttributeManager {
    let mut out = AttributeManager::new();
    out.add_value(ms_terms::cluster_key(), cluster.key);
    if !cluster.members.is_empty() {
        out.add_value(ms_terms::cluster_member_keys(), cluster.members_value());
    }
    out.extend(cluster.attributes.iter().cloned());
    out
}

pub(super) fn entities_at(library: &Library, path: EntityPath) -> Vec<EntityView<'_>> {
    let mut out = Vec::new();
    match path {
        EntityPath::Library => out.push(EntityView {
            instance: path.to_string(),
            attributes: Cow::Borrowed(&library.header.attributes),
        }),
        EntityPath::Spectrum => {
            for spectrum in &library.spectra {
                out.push(EntityView {
                    instance: format!("/Library/Spectrum={}", spectrum.key),
                    attributes: Cow::Owned(spectrum.identity_attributes()),
                });
            }
        }
        EntityPath::Analyte => {
            for spectrum in &library.spectra {
                for analyte in &spectrum.analytes {
                    out.push(EntityView {
                        instance: format!("/Library/Spectrum={}/Analyte={}", spectrum.key, analyte.id),
                        attributes: Cow::Borrowed(&analyte.attributes),
                    });
                }
            }
        }
        EntityPath::Interpretation => {
            for spectrum in &library.spectra {
                for interpretation in &spectrum.interpretations {
                    out.push(EntityView {
                        instance: format!(
                            "/Library/Spectrum={}/Interpretation={}",
                            spectrum.key, interpretation.id
                        ),
                        attributes: Cow::Borrowed(&interpretation.attributes),
                    });
                }
            }
        }
        EntityPath::InterpretationMember => {
            for spectrum in &library.spectra {
                for interpretation in &spectrum.interpretations {
                    for member in &interpretation.members {
                        out.push(EntityView {
                            instance: format!(
                                "/Library/Spectrum={}/Interpretation={}/InterpretationMember={}",
                                spectrum.key, interpretation.id, member.id
                            ),
                            attributes: Cow::Borrowed(&member.attributes),
                        });
                    }
                }
            }
        }
        EntityPath::Cluster => {
            for cluster in &library.clusters {
                out.push(EntityView {
                    instance: format!("/Library/Cluster={}", cluster.key),
                    attributes: Cow::Owned(cluster_attributes(cluster)),
                });
            }
        }
    }
    out
}
