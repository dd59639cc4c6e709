//! Validation profiles: named compositions of rule sets with a pass policy.
//!
//! Profiles are declared in TOML:
//!
//! ```toml
//! [profiles.strict]
//! extends = "peptide"
//! rule_sets = ["gold"]
//! object_rules = ["spectrum_peak_annotations"]
//! max_must_failures = 0
//! max_should_failures = 10
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use super::annotation::AnnotationParser;
use super::engine::{ValidationRecord, Validator};
use super::object_rules::ObjectRule;
use super::ontology::Ontology;
use super::rule::{Rule, RuleSet};
use super::ValidationError;

/// A profile as written in a profiles file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    /// Rule sets added by this profile
    #[serde(default)]
    pub rule_sets: Vec<String>,
    /// Profile whose rule sets come first
    #[serde(default)]
    pub extends: Option<String>,
    /// Object rules added by this profile
    #[serde(default)]
    pub object_rules: Vec<String>,
    /// Tolerated MUST failures; inherited when absent
    #[serde(default)]
    pub max_must_failures: Option<usize>,
    /// Tolerated SHOULD failures; inherited when absent
    #[serde(default)]
    pub max_should_failures: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, ProfileDefinition>,
}

/// Pass policy of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileThresholds {
    /// Tolerated MUST failures
    pub max_must_failures: usize,
    /// Tolerated SHOULD failures; unlimited when `None`
    pub max_should_failures: Option<usize>,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            max_must_failures: 0,
            max_should_failures: None,
        }
    }
}

/// Outcome of applying a profile's thresholds to validation records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the library passes the profile
    pub passed: bool,
    /// Number of failed MUST records
    pub must_failures: usize,
    /// Number of failed SHOULD records
    pub should_failures: usize,
}

impl ProfileThresholds {
    /// Count failures and compare them against the thresholds
    pub fn verdict(&self, records: &[ValidationRecord]) -> Verdict {
        let must_failures = records.iter().filter(|r| r.is_error()).count();
        let should_failures = records.iter().filter(|r| r.is_warning()).count();
        let passed = must_failures <= self.max_must_failures
            && self
                .max_should_failures
                .map_or(true, |max| should_failures <= max);
        Verdict {
            passed,
            must_failures,
            should_failures,
        }
    }
}

/// A composed profile, ready to build a validator from
#[derive(Debug, Clone)]
pub struct Profile {
    /// Profile name
    pub name: String,
    /// Rule set names, parents first
    pub rule_sets: Vec<String>,
    /// Rules of every rule set, in order
    pub rules: Vec<Rule>,
    /// Object rules to run
    pub object_rules: Vec<ObjectRule>,
    /// Pass policy
    pub thresholds: ProfileThresholds,
}

impl Profile {
    /// Validator running this profile's rules and object rules
    pub fn validator<'a>(
        &self,
        ontology: &'a dyn Ontology,
        annotations: &'a dyn AnnotationParser,
    ) -> Validator<'a> {
        Validator::new(self.rules.clone(), ontology, annotations)
            .with_object_rules(self.object_rules.clone())
    }
}

/// Known profiles and rule sets
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ProfileDefinition>,
    rule_sets: BTreeMap<String, RuleSet>,
}

/// Flattened profile before rule sets are loaded
#[derive(Default)]
struct Resolved {
    rule_sets: Vec<String>,
    object_rules: Vec<String>,
    max_must_failures: Option<usize>,
    max_should_failures: Option<usize>,
}

impl ProfileRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rule sets and the `base`, `peptide`, `silver` and `gold` profiles
    pub fn builtin() -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        for name in RuleSet::builtin_names() {
            registry.add_rule_set(RuleSet::builtin(name)?);
        }
        registry.add_profiles_toml(include_str!("rules/profiles.toml"))?;
        Ok(registry)
    }

    /// Registry holding only the profiles of a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        registry.add_profiles_toml(text)?;
        Ok(registry)
    }

    /// Add the profiles of a TOML document, replacing same-named ones
    pub fn add_profiles_toml(&mut self, text: &str) -> Result<(), ValidationError> {
        let file: ProfileFile = toml::from_str(text).map_err(ValidationError::Profile)?;
        self.profiles.extend(file.profiles);
        Ok(())
    }

    /// Add the profiles of a TOML file
    pub fn add_profiles_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ValidationError> {
        let text = std::fs::read_to_string(path)?;
        self.add_profiles_toml(&text)
    }

    /// Register a rule set under its own name
    pub fn add_rule_set(&mut self, rule_set: RuleSet) {
        self.rule_sets.insert(rule_set.name.clone(), rule_set);
    }

    /// Register a profile
    pub fn add_profile(&mut self, name: impl Into<String>, definition: ProfileDefinition) {
        self.profiles.insert(name.into(), definition);
    }

    /// Names of the known profiles
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Compose a profile: parents first, rule sets deduplicated by name,
    /// rule ids checked for collisions
    pub fn compose(&self, name: &str) -> Result<Profile, ValidationError> {
        let resolved = self.resolve(name, &mut Vec::new())?;

        let mut rules = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for set_name in &resolved.rule_sets {
            let rule_set = self
                .rule_sets
                .get(set_name)
                .ok_or_else(|| ValidationError::UnknownRuleSet(set_name.clone()))?;
            for rule in &rule_set.rules {
                if !seen.insert(rule.id.clone()) {
                    return Err(ValidationError::DuplicateRuleId {
                        id: rule.id.clone(),
                        rule_set: set_name.clone(),
                    });
                }
                rules.push(rule.clone());
            }
        }

        let object_rules = resolved
            .object_rules
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<ObjectRule>, _>>()?;

        debug!(
            "Composed profile {} from rule sets {:?} ({} rules)",
            name,
            resolved.rule_sets,
            rules.len()
        );
        Ok(Profile {
            name: name.to_string(),
            rule_sets: resolved.rule_sets,
            rules,
            object_rules,
            thresholds: ProfileThresholds {
                max_must_failures: resolved.max_must_failures.unwrap_or(0),
                max_should_failures: resolved.max_should_failures,
            },
        })
    }

    fn resolve(&self, name: &str, stack: &mut Vec<String>) -> Result<Resolved, ValidationError> {
        if stack.iter().any(|n| n == name) {
            stack.push(name.to_string());
            return Err(ValidationError::CyclicProfile(stack.join(" -> ")));
        }
        let definition = self
            .profiles
            .get(name)
            .ok_or_else(|| ValidationError::UnknownProfile(name.to_string()))?;

        stack.push(name.to_string());
        let mut resolved = match &definition.extends {
            Some(parent) => self.resolve(parent, stack)?,
            None => Resolved::default(),
        };
        stack.pop();

        for set in &definition.rule_sets {
            if !resolved.rule_sets.contains(set) {
                resolved.rule_sets.push(set.clone());
            }
        }
        for rule in &definition.object_rules {
            if !resolved.object_rules.contains(rule) {
                resolved.object_rules.push(rule.clone());
            }
        }
        if definition.max_must_failures.is_some() {
            resolved.max_must_failures = definition.max_must_failures;
        }
        if definition.max_should_failures.is_some() {
            resolved.max_should_failures = definition.max_should_failures;
        }
        Ok(resolved)
    }
}
