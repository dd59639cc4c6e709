//! # Semantic validation
//!
//! Checks a parsed [`Library`](crate::model::Library) against declarative
//! rules. A rule names an entity path, a list of attribute patterns and how
//! they combine; a profile composes rule sets and decides how many failures
//! are tolerated.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mzspeclib::validator::{InMemoryOntology, MzPafChecker, ProfileRegistry, ValidationReport};
//! # fn run(library: &mzspeclib::model::Library) -> Result<(), Box<dyn std::error::Error>> {
//! let profile = ProfileRegistry::builtin()?.compose("peptide")?;
//! let ontology = InMemoryOntology::builtin()?;
//! let records = profile.validator(&ontology, &MzPafChecker).validate(library);
//! let verdict = profile.thresholds.verdict(&records);
//! println!("{}", ValidationReport::from_records("library.mzlib.txt", &records).with_verdict(verdict));
//! # Ok(())
//! # }
//! ```

pub use annotation::{AcceptAll, AnnotationParseError, AnnotationParser, IonKind, MzPafChecker, PeakAnnotation};
pub use engine::{ValidationRecord, Validator};
pub use object_rules::ObjectRule;
pub use ontology::{InMemoryOntology, Ontology, TermInfo};
pub use profile::{Profile, ProfileDefinition, ProfileRegistry, ProfileThresholds, Verdict};
pub use report::{CheckStatus, ValidationCheck, ValidationReport};
pub use rule::{
    AttributePattern, CombinationLogic, EntityPath, RequirementLevel, Rule, RuleSet, ValueRule,
};

mod annotation;
mod engine;
mod object_rules;
mod ontology;
mod profile;
mod report;
mod rule;

#[cfg(test)]
mod tests;

/// Errors raised while loading rules, profiles or term tables.
///
/// Rule outcomes are never errors; they are [`ValidationRecord`]s.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Two composed rule sets define the same rule id
    #[error("Duplicate rule id {id} in rule set {rule_set}")]
    DuplicateRuleId {
        /// The repeated id
        id: String,
        /// Rule set where it was seen again
        rule_set: String,
    },

    /// A profile names a rule set that is not registered
    #[error("Unknown rule set: {0}")]
    UnknownRuleSet(String),

    /// No profile with this name
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// A profile names an object rule that does not exist
    #[error("Unknown object rule: {0}")]
    UnknownObjectRule(String),

    /// Profiles extend each other in a loop
    #[error("Profile inheritance cycle: {0}")]
    CyclicProfile(String),

    /// Malformed rule set document
    #[error("Rule set error: {0}")]
    RuleSet(serde_json::Error),

    /// Malformed profiles document
    #[error("Profile error: {0}")]
    Profile(toml::de::Error),

    /// Malformed term table
    #[error("Ontology error: {0}")]
    Ontology(serde_json::Error),

    /// I/O error while reading a rule, profile or term file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
