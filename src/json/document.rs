//! serde mirror of the JSON document layout.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One attribute: `{accession, name, value, value_accession?, cv_param_group?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDocument {
    /// Key term accession
    pub accession: String,
    /// Key term name
    #[serde(default)]
    pub name: String,
    /// Value; the term name when `value_accession` is set
    pub value: serde_json::Value,
    /// Accession of a term-valued attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_accession: Option<String>,
    /// Group id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_param_group: Option<u32>,
}

/// Analyte, interpretation or interpretation member
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDocument {
    /// Entity id (falls back to the map key when absent)
    #[serde(default)]
    pub id: String,
    /// Entity-local attributes
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    /// Analytes an interpretation or member refers to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyte_ids: Vec<String>,
    /// Members of an interpretation
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_keyed",
        deserialize_with = "deserialize_keyed"
    )]
    pub members: Vec<EntityDocument>,
}

/// A spectrum object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumDocument {
    /// Spectrum attributes, key first
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    /// Peak m/z values
    #[serde(default)]
    pub mzs: Vec<f64>,
    /// Peak intensities
    #[serde(default)]
    pub intensities: Vec<f64>,
    /// Comma-joined annotations per peak, `?` when unannotated
    #[serde(default)]
    pub peak_annotations: Vec<String>,
    /// Aggregation values per peak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<Vec<serde_json::Value>>>,
    /// Analytes keyed by id
    #[serde(
        default,
        serialize_with = "serialize_keyed",
        deserialize_with = "deserialize_keyed"
    )]
    pub analytes: Vec<EntityDocument>,
    /// Interpretations keyed by id
    #[serde(
        default,
        serialize_with = "serialize_keyed",
        deserialize_with = "deserialize_keyed"
    )]
    pub interpretations: Vec<EntityDocument>,
}

/// A cluster object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterDocument {
    /// Cluster attributes: key, member keys, then the rest
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
}

/// Attribute sets of one entity type, keyed by name
pub type AttributeSetDocuments = BTreeMap<String, Vec<AttributeDocument>>;

/// Top-level library document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LibraryDocument {
    /// Format version
    #[serde(default)]
    pub format_version: String,
    /// Library attributes
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    /// Spectrum attribute sets
    #[serde(default)]
    pub spectrum_attribute_sets: AttributeSetDocuments,
    /// Analyte attribute sets
    #[serde(default)]
    pub analyte_attribute_sets: AttributeSetDocuments,
    /// Interpretation attribute sets
    #[serde(default)]
    pub interpretation_attribute_sets: AttributeSetDocuments,
    /// Cluster attribute sets
    #[serde(default)]
    pub cluster_attribute_sets: AttributeSetDocuments,
    /// Spectra in library order
    #[serde(default)]
    pub spectra: Vec<SpectrumDocument>,
    /// Clusters in library order
    #[serde(default)]
    pub clusters: Vec<ClusterDocument>,
}

/// Everything in a library document except its spectra and clusters
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HeaderDocument {
    /// Format version
    #[serde(default)]
    pub format_version: String,
    /// Library attributes
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    /// Spectrum attribute sets
    #[serde(default)]
    pub spectrum_attribute_sets: AttributeSetDocuments,
    /// Analyte attribute sets
    #[serde(default)]
    pub analyte_attribute_sets: AttributeSetDocuments,
    /// Interpretation attribute sets
    #[serde(default)]
    pub interpretation_attribute_sets: AttributeSetDocuments,
    /// Cluster attribute sets
    #[serde(default)]
    pub cluster_attribute_sets: AttributeSetDocuments,
}

/// Write entities as a JSON object keyed by id, keeping their order
fn serialize_keyed<S: Serializer>(items: &[EntityDocument], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(items.len()))?;
    for item in items {
        map.serialize_entry(&item.id, item)?;
    }
    map.end()
}

/// Read an id-keyed object back into a list in document order
fn deserialize_keyed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<EntityDocument>, D::Error> {
    struct KeyedVisitor(PhantomData<EntityDocument>);

    impl<'de> Visitor<'de> for KeyedVisitor {
        type Value = Vec<EntityDocument>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of entities keyed by id")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, mut entity)) = map.next_entry::<String, EntityDocument>()? {
                if entity.id.is_empty() {
                    entity.id = key;
                }
                out.push(entity);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(KeyedVisitor(PhantomData))
}
