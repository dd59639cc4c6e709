use log::warn;

use crate::attributes::AttributeManager;

/// A molecular entity a spectrum is attributed to
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Analyte {
    /// Identifier, unique within the spectrum
    pub id: String,
    /// Analyte attributes
    pub attributes: AttributeManager,
}

impl Analyte {
    /// Create an analyte with no attributes
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: AttributeManager::new(),
        }
    }
}

/// An explanation of a spectrum in terms of one or more analytes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interpretation {
    /// Identifier, unique within the spectrum
    pub id: String,
    /// Interpretation attributes
    pub attributes: AttributeManager,
    /// Ids of the analytes this interpretation refers to
    pub analyte_ids: Vec<String>,
    /// Per-analyte members in declaration order
    pub members: Vec<InterpretationMember>,
}

impl Interpretation {
    /// Create an interpretation with no attributes or members
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Look up a member by id
    pub fn member(&self, id: &str) -> Option<&InterpretationMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Add a member, replacing any existing one with the same id
    pub fn add_member(&mut self, member: InterpretationMember) {
        match self.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => {
                warn!(
                    "Interpretation {} has duplicate member {}, keeping the last one",
                    self.id, member.id
                );
                *existing = member
            }
            None => self.members.push(member),
        }
    }

    /// An interpretation without explicit members is its own sole member
    pub fn is_implicit_member(&self) -> bool {
        self.members.is_empty()
    }
}

/// Analyte-specific details of an interpretation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterpretationMember {
    /// Identifier, matching the analyte it describes
    pub id: String,
    /// Member attributes
    pub attributes: AttributeManager,
    /// Ids of the analytes this member refers to
    pub analyte_ids: Vec<String>,
}

impl InterpretationMember {
    /// Create a member with no attributes
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}
