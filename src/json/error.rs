use crate::model::EntityType;

/// Errors that can occur while reading or writing the JSON format
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// Error from serde_json
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required field is missing from an object
    #[error("Missing {field} in {context}")]
    MissingField {
        /// Object that lacks the field
        context: String,
        /// Missing field or attribute
        field: String,
    },

    /// An entity referenced an attribute set that is not defined for its type
    #[error("Unknown {entity_type} attribute set {name:?} referenced by {context}")]
    UnknownAttributeSet {
        /// Entity type of the referencing entity
        entity_type: EntityType,
        /// Referenced set name
        name: String,
        /// Referencing entity
        context: String,
    },

    /// An attribute value cannot be represented
    #[error("Invalid value for {accession}: {reason}")]
    InvalidValue {
        /// Accession of the attribute
        accession: String,
        /// Description of the problem
        reason: String,
    },

    /// The byte scanner met unbalanced brackets
    #[error("Unbalanced JSON structure at byte {0}")]
    Unbalanced(u64),
}

impl JsonError {
    pub(crate) fn from_attribute_set(
        err: crate::attribute_sets::AttributeSetError,
        context: impl Into<String>,
    ) -> Self {
        match err {
            crate::attribute_sets::AttributeSetError::UnknownAttributeSet { entity_type, name } => {
                JsonError::UnknownAttributeSet {
                    entity_type,
                    name,
                    context: context.into(),
                }
            }
        }
    }
}
