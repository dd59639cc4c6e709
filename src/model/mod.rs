//! # Entity Model
//!
//! The in-memory tree every reader and adapter produces:
//!
//! ```text
//! Library
//! ├── LibraryHeader (library attributes + attribute set definitions)
//! ├── Spectrum*
//! │   ├── Analyte*
//! │   ├── Interpretation*
//! │   │   └── InterpretationMember*
//! │   └── Peak*
//! └── Cluster*
//! ```

mod analyte;
mod cluster;
mod library;
mod spectrum;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use analyte::{Analyte, Interpretation, InterpretationMember};
pub use cluster::Cluster;
pub use library::{Library, LibraryHeader, DEFAULT_FORMAT_VERSION};
pub use spectrum::{Peak, Spectrum};

/// Id given to the first analyte and interpretation of a spectrum
pub const FIRST_ENTITY_ID: &str = "1";

/// Entity kinds an attribute set can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// Library spectrum
    Spectrum,
    /// Analyte within a spectrum
    Analyte,
    /// Interpretation within a spectrum
    Interpretation,
    /// Spectrum cluster
    Cluster,
}

impl EntityType {
    /// All entity types in text-writer order
    pub const ALL: [EntityType; 4] = [
        EntityType::Spectrum,
        EntityType::Analyte,
        EntityType::Interpretation,
        EntityType::Cluster,
    ];

    /// Name as written in section headers
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Spectrum => "Spectrum",
            EntityType::Analyte => "Analyte",
            EntityType::Interpretation => "Interpretation",
            EntityType::Cluster => "Cluster",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Spectrum" => Ok(EntityType::Spectrum),
            "Analyte" => Ok(EntityType::Analyte),
            "Interpretation" => Ok(EntityType::Interpretation),
            "Cluster" => Ok(EntityType::Cluster),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}
