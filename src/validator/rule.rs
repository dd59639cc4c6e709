//! Declarative semantic rules and rule sets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::ValueType;

use super::ValidationError;

/// Entity hierarchy level a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityPath {
    /// The library header
    #[serde(rename = "/Library")]
    Library,
    /// Every spectrum
    #[serde(rename = "/Library/Spectrum")]
    Spectrum,
    /// Every analyte of every spectrum
    #[serde(rename = "/Library/Spectrum/Analyte")]
    Analyte,
    /// Every interpretation of every spectrum
    #[serde(rename = "/Library/Spectrum/Interpretation")]
    Interpretation,
    /// Every member of every interpretation
    #[serde(rename = "/Library/Spectrum/Interpretation/InterpretationMember")]
    InterpretationMember,
    /// Every cluster
    #[serde(rename = "/Library/Cluster")]
    Cluster,
}

impl EntityPath {
    /// Every path, outermost first
    pub const ALL: [EntityPath; 6] = [
        EntityPath::Library,
        EntityPath::Spectrum,
        EntityPath::Analyte,
        EntityPath::Interpretation,
        EntityPath::InterpretationMember,
        EntityPath::Cluster,
    ];

    /// Path as written in rule files
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPath::Library => "/Library",
            EntityPath::Spectrum => "/Library/Spectrum",
            EntityPath::Analyte => "/Library/Spectrum/Analyte",
            EntityPath::Interpretation => "/Library/Spectrum/Interpretation",
            EntityPath::InterpretationMember => {
                "/Library/Spectrum/Interpretation/InterpretationMember"
            }
            EntityPath::Cluster => "/Library/Cluster",
        }
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the patterns of a rule combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombinationLogic {
    /// Every pattern must match
    And,
    /// At least one pattern must match
    Or,
    /// Exactly one pattern must match
    Xor,
}

/// Severity of an unsatisfied rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequirementLevel {
    /// Failing is an error
    Must,
    /// Failing is a warning
    Should,
    /// Informational; only reported when satisfied
    May,
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequirementLevel::Must => "MUST",
            RequirementLevel::Should => "SHOULD",
            RequirementLevel::May => "MAY",
        })
    }
}

/// Constraint on the value of a matched attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueRule {
    /// The value has this primitive type (integers satisfy `float`)
    ValueOfType {
        /// Required type
        value: ValueType,
    },
    /// The value is a CV term at or below `accession`
    ValueIsChildOf {
        /// Ancestor accession
        accession: String,
    },
    /// No other entity at the same path carries the same value
    ValueIsUnique,
}

/// One attribute requirement within a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePattern {
    /// Accession to match
    pub accession: String,
    /// Term name, for messages
    #[serde(default)]
    pub name: String,
    /// Also match descendants of `accession`
    #[serde(default)]
    pub allow_children: bool,
    /// Whether the attribute may appear more than once
    #[serde(default)]
    pub repeatable: bool,
    /// Optional value constraint
    #[serde(default)]
    pub value: Option<ValueRule>,
}

impl AttributePattern {
    /// `accession|name`, or the bare accession
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.accession.clone()
        } else {
            format!("{}|{}", self.accession, self.name)
        }
    }
}

/// A semantic requirement on every entity at `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,
    /// Entities the rule applies to
    pub path: EntityPath,
    /// Attribute patterns, in order
    pub attr: Vec<AttributePattern>,
    /// How pattern results combine
    pub combination_logic: CombinationLogic,
    /// Severity when unsatisfied
    pub requirement_level: RequirementLevel,
    /// Free-text explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A named collection of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule set name, referenced by profiles
    pub name: String,
    /// Rules in evaluation order
    pub rules: Vec<Rule>,
}

const BUILTIN_RULE_SETS: &[(&str, &str)] = &[
    ("base", include_str!("rules/base.json")),
    ("peptide", include_str!("rules/peptide.json")),
    ("silver", include_str!("rules/silver.json")),
    ("gold", include_str!("rules/gold.json")),
];

impl RuleSet {
    /// Parse a rule set document
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(ValidationError::RuleSet)
    }

    /// Load a rule set document from disk
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ValidationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// One of the embedded rule sets: `base`, `peptide`, `silver` or `gold`
    pub fn builtin(name: &str) -> Result<Self, ValidationError> {
        let (_, text) = BUILTIN_RULE_SETS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(|| ValidationError::UnknownRuleSet(name.to_string()))?;
        Self::from_json(text)
    }

    /// Names of the embedded rule sets
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_RULE_SETS.iter().map(|(name, _)| *name)
    }
}
