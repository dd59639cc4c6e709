//! Controlled vocabulary lookups used by child and type checks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attributes::ValueType;

use super::ValidationError;

/// What the ontology knows about one accession
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermInfo {
    /// Term accession
    pub accession: String,
    /// Term name
    pub name: String,
    /// Direct `is_a` parents
    #[serde(default)]
    pub parents: Vec<String>,
    /// Declared value type, if the term takes a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Units a value may carry; a unit below one of these also qualifies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<String>,
}

/// Source of CV term relationships
pub trait Ontology {
    /// Look up an accession
    fn resolve(&self, accession: &str) -> Option<TermInfo>;

    /// Whether `accession` is `ancestor` or lies below it
    fn is_a(&self, accession: &str, ancestor: &str) -> bool {
        if accession == ancestor {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([accession.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(info) = self.resolve(&current) else {
                continue;
            };
            for parent in info.parents {
                if parent == ancestor {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }
}

/// Term table held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryOntology {
    terms: HashMap<String, TermInfo>,
}

impl InMemoryOntology {
    /// Empty ontology; only exact accession matches succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// The small term table shipped with the crate, covering the terms the
    /// built-in rule sets refer to
    pub fn builtin() -> Result<Self, ValidationError> {
        Self::from_json(include_str!("rules/terms.json"))
    }

    /// Parse a JSON array of `{accession, name, parents, value_type, units}`
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        let terms: Vec<TermInfo> = serde_json::from_str(text).map_err(ValidationError::Ontology)?;
        Ok(terms.into_iter().collect())
    }

    /// Load a term table from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ValidationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Add or replace a term
    pub fn insert(&mut self, term: TermInfo) {
        self.terms.insert(term.accession.clone(), term);
    }

    /// Add every term of `other`, replacing duplicates
    pub fn merge(&mut self, other: InMemoryOntology) {
        self.terms.extend(other.terms);
    }

    /// Number of known terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether no terms are known
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromIterator<TermInfo> for InMemoryOntology {
    fn from_iter<I: IntoIterator<Item = TermInfo>>(iter: I) -> Self {
        let mut ontology = Self::new();
        for term in iter {
            ontology.insert(term);
        }
        ontology
    }
}

impl Ontology for InMemoryOntology {
    fn resolve(&self, accession: &str) -> Option<TermInfo> {
        self.terms.get(accession).cloned()
    }
}
