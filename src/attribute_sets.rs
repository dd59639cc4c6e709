//! # Attribute Sets
//!
//! Libraries can declare named attribute templates once in the header and
//! reference them from entities with `MS:1003212|library attribute set name`.
//! A set named `all` applies to every entity of its type without a reference.
//!
//! Entity attributes are assembled in a fixed order:
//!
//! ```text
//! all ++ referenced set 1 ++ referenced set 2 ++ ... ++ entity-local attributes
//! ```
//!
//! Inherited attributes carry `origin = Some(set name)` so writers can emit
//! only the entity-local ones.

use std::collections::{BTreeMap, HashMap};

use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::accessions;
use crate::model::EntityType;

/// Name of the implicit attribute set applied to every entity of its type
pub const ALL_SET: &str = "all";

/// Errors raised while resolving attribute set references
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeSetError {
    /// A referenced set is not defined for the entity type
    #[error("Unknown {entity_type} attribute set: {name}")]
    UnknownAttributeSet {
        /// Entity type the reference was made from
        entity_type: EntityType,
        /// Referenced set name
        name: String,
    },
}

/// A named attribute template scoped to one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    /// Set name
    pub name: String,
    /// Entity type the set applies to
    pub entity_type: EntityType,
    /// Template attributes as declared, with their declared group ids
    pub attributes: Vec<Attribute>,
}

impl AttributeSet {
    /// Create an empty set
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            attributes: Vec::new(),
        }
    }
}

/// All attribute sets defined by a library, ordered by entity type then name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSetRegistry {
    sets: BTreeMap<(EntityType, String), AttributeSet>,
}

impl AttributeSetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set, replacing an earlier definition with the same type and name
    pub fn define(&mut self, set: AttributeSet) {
        self.sets.insert((set.entity_type, set.name.clone()), set);
    }

    /// Look up a set
    pub fn get(&self, entity_type: EntityType, name: &str) -> Option<&AttributeSet> {
        self.sets.get(&(entity_type, name.to_string()))
    }

    /// Sets for one entity type, ordered by name
    pub fn sets_for(&self, entity_type: EntityType) -> impl Iterator<Item = &AttributeSet> {
        self.sets.values().filter(move |s| s.entity_type == entity_type)
    }

    /// All sets
    pub fn iter(&self) -> impl Iterator<Item = &AttributeSet> {
        self.sets.values()
    }

    /// Number of sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no sets are defined
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Template attributes for an entity referencing `names`.
    ///
    /// `all` comes first when defined, then each referenced set in reference
    /// order. A set is applied at most once.
    pub fn resolve(
        &self,
        entity_type: EntityType,
        names: &[String],
    ) -> Result<Vec<Attribute>, AttributeSetError> {
        let mut out = AttributeManager::new();
        self.apply_templates(entity_type, names, true, &mut out)?;
        Ok(out.into_vec())
    }

    /// Build an entity's attribute list from its local attributes.
    ///
    /// References are read from the `MS:1003212` values among `local`. The
    /// result holds the resolved templates followed by every local attribute
    /// (references included) with local group ids renumbered after the
    /// template groups.
    pub fn build_attributes(
        &self,
        entity_type: EntityType,
        local: Vec<Attribute>,
    ) -> Result<AttributeManager, AttributeSetError> {
        self.build(entity_type, local, true)
    }

    /// Build an interpretation member's attribute list.
    ///
    /// Members reference `Interpretation` sets explicitly. The `all` set of
    /// that type belongs to the interpretation itself and is not repeated.
    pub fn build_member_attributes(
        &self,
        local: Vec<Attribute>,
    ) -> Result<AttributeManager, AttributeSetError> {
        self.build(EntityType::Interpretation, local, false)
    }

    fn build(
        &self,
        entity_type: EntityType,
        local: Vec<Attribute>,
        with_all: bool,
    ) -> Result<AttributeManager, AttributeSetError> {
        let names: Vec<String> = local
            .iter()
            .filter(|a| a.is(accessions::ATTRIBUTE_SET_NAME))
            .map(|a| match &a.value {
                Value::Str(s) => s.clone(),
                other => other.format_text(),
            })
            .collect();

        let mut out = AttributeManager::new();
        self.apply_templates(entity_type, &names, with_all, &mut out)?;

        let mut remap = HashMap::new();
        for attribute in local {
            push_remapped(attribute, &mut remap, &mut out);
        }
        Ok(out)
    }

    fn apply_templates(
        &self,
        entity_type: EntityType,
        names: &[String],
        with_all: bool,
        out: &mut AttributeManager,
    ) -> Result<(), AttributeSetError> {
        let mut applied: Vec<&str> = Vec::new();
        if let Some(all) = self.get(entity_type, ALL_SET).filter(|_| with_all) {
            apply_set(all, out);
            applied.push(ALL_SET);
        }
        for name in names {
            if applied.contains(&name.as_str()) {
                continue;
            }
            let set = self.get(entity_type, name).ok_or_else(|| {
                AttributeSetError::UnknownAttributeSet {
                    entity_type,
                    name: name.clone(),
                }
            })?;
            apply_set(set, out);
            applied.push(name.as_str());
        }
        Ok(())
    }
}

/// Append a set's attributes with a fresh group remap table
fn apply_set(set: &AttributeSet, out: &mut AttributeManager) {
    let mut remap = HashMap::new();
    for attribute in &set.attributes {
        let attribute = attribute.clone().with_origin(set.name.clone());
        push_remapped(attribute, &mut remap, out);
    }
}

/// Append `attribute`, moving its group to a fresh id on first sight
fn push_remapped(
    mut attribute: Attribute,
    remap: &mut HashMap<u32, u32>,
    out: &mut AttributeManager,
) {
    if let Some(group) = attribute.group {
        let next = match remap.get(&group) {
            Some(g) => *g,
            None => {
                let g = out.next_group_id();
                remap.insert(group, g);
                g
            }
        };
        attribute.group = Some(next);
    }
    out.add(attribute);
}
