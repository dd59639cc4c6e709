use crate::model::EntityType;

/// Errors that can occur while reading the mzSpecLib text format
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// A line matches neither a section header nor the attribute or peak grammar
    #[error("Malformed line {line_no}: {text:?}")]
    MalformedLine {
        /// 1-based line number
        line_no: usize,
        /// Offending line
        text: String,
    },

    /// A section header appeared where it is not allowed
    #[error("Unexpected section at line {line_no}: expected {expected}, found {found}")]
    UnexpectedSection {
        /// What the parser could accept at this point
        expected: String,
        /// The header that was found
        found: String,
        /// 1-based line number
        line_no: usize,
    },

    /// An entity referenced an attribute set that is not defined for its type
    #[error("Unknown {entity_type} attribute set {name:?} referenced by entity at line {line_no}")]
    UnknownAttributeSet {
        /// Entity type of the referencing entity
        entity_type: EntityType,
        /// Referenced set name
        name: String,
        /// Line of the referencing entity's header
        line_no: usize,
    },

    /// A section header carries an unusable key or id
    #[error("Invalid section header at line {line_no}: {message}")]
    InvalidHeader {
        /// 1-based line number
        line_no: usize,
        /// Description of the problem
        message: String,
    },

    /// I/O error while reading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TextError {
    pub(crate) fn from_attribute_set(
        err: crate::attribute_sets::AttributeSetError,
        line_no: usize,
    ) -> Self {
        match err {
            crate::attribute_sets::AttributeSetError::UnknownAttributeSet { entity_type, name } => {
                TextError::UnknownAttributeSet {
                    entity_type,
                    name,
                    line_no,
                }
            }
        }
    }
}
