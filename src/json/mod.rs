//! # mzSpecLib JSON Format
//!
//! Reader and writer for the JSON serialization of an mzSpecLib library
//! (`.mzlib.json`). The document mirrors the entity model:
//!
//! ```text
//! {
//!   "format_version": "1.0",
//!   "attributes": [{"accession": "MS:1003188", "name": "library name", "value": "example"}],
//!   "spectrum_attribute_sets": {"all": [...]},
//!   "spectra": [{
//!     "attributes": [{"accession": "MS:1003237", "name": "library spectrum key", "value": 1}, ...],
//!     "mzs": [...], "intensities": [...], "peak_annotations": [...],
//!     "analytes": {"1": {"id": "1", "attributes": [...]}},
//!     "interpretations": {"1": {"id": "1", "attributes": [...], "members": {...}}}
//!   }],
//!   "clusters": [{"attributes": [...]}]
//! }
//! ```
//!
//! Term-valued attributes carry the value term's accession in
//! `value_accession` and its name in `value`. Grouped attributes carry
//! `cv_param_group`.

use std::io::{BufReader, Read, Write};

use crate::attribute_sets::{AttributeSet, AttributeSetRegistry};
use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::{accessions, is_curie, ms_terms, CvTerm};
use crate::model::{
    Analyte, Cluster, EntityType, Interpretation, InterpretationMember, Library, LibraryHeader,
    Peak, Spectrum, DEFAULT_FORMAT_VERSION,
};

pub use document::{
    AttributeDocument, AttributeSetDocuments, ClusterDocument, EntityDocument, HeaderDocument,
    LibraryDocument, SpectrumDocument,
};
pub use error::JsonError;
pub use scan::{scan_elements, ElementKind};

mod document;
mod error;
mod scan;


// ============================================================================
// Values and attributes
// ============================================================================

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Value::from(*v),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Term(t) => serde_json::Value::String(t.to_string()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

fn value_from_json(accession: &str, json: serde_json::Value) -> Result<Value, JsonError> {
    let invalid = |reason: &str| JsonError::InvalidValue {
        accession: accession.to_string(),
        reason: reason.to_string(),
    };
    match json {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(v) => Ok(Value::Int(v)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| invalid("number out of range")),
        },
        serde_json::Value::String(s) => Ok(term_or_string(s)),
        serde_json::Value::Bool(b) => Ok(Value::Str(b.to_string())),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| value_from_json(accession, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        serde_json::Value::Null => Err(invalid("null value")),
        serde_json::Value::Object(_) => Err(invalid("object value")),
    }
}

/// `ACC|name` strings inside lists are term references
fn term_or_string(s: String) -> Value {
    match s.split_once('|') {
        Some((acc, name)) if is_curie(acc) => Value::Term(CvTerm::new(acc, name)),
        _ => Value::Str(s),
    }
}

/// JSON has no literal for NaN or infinity; refuse them instead of writing `null`
fn ensure_finite(accession: &str, value: &Value) -> Result<(), JsonError> {
    match value {
        Value::Float(v) if !v.is_finite() => Err(JsonError::InvalidValue {
            accession: accession.to_string(),
            reason: format!("{} cannot be written as a JSON number", v),
        }),
        Value::List(items) => items.iter().try_for_each(|item| ensure_finite(accession, item)),
        _ => Ok(()),
    }
}

fn ensure_finite_attributes<'a>(
    attributes: impl IntoIterator<Item = &'a Attribute>,
) -> Result<(), JsonError> {
    attributes
        .into_iter()
        .try_for_each(|a| ensure_finite(&a.term.accession, &a.value))
}

fn ensure_finite_spectrum(spectrum: &Spectrum) -> Result<(), JsonError> {
    ensure_finite_attributes(spectrum.attributes.iter())?;
    for analyte in &spectrum.analytes {
        ensure_finite_attributes(analyte.attributes.iter())?;
    }
    for interpretation in &spectrum.interpretations {
        ensure_finite_attributes(interpretation.attributes.iter())?;
        for member in &interpretation.members {
            ensure_finite_attributes(member.attributes.iter())?;
        }
    }
    for peak in &spectrum.peaks {
        ensure_finite("mzs", &Value::Float(peak.mz))?;
        ensure_finite("intensities", &Value::Float(peak.intensity))?;
        for aggregation in &peak.aggregations {
            ensure_finite("aggregations", aggregation)?;
        }
    }
    Ok(())
}

fn ensure_finite_library(library: &Library) -> Result<(), JsonError> {
    ensure_finite_attributes(library.header.attributes.iter())?;
    for set in library.header.attribute_sets.iter() {
        ensure_finite_attributes(&set.attributes)?;
    }
    for spectrum in &library.spectra {
        ensure_finite_spectrum(spectrum)?;
    }
    for cluster in &library.clusters {
        ensure_finite_attributes(cluster.attributes.iter())?;
    }
    Ok(())
}

/// Convert an attribute to its JSON object form
pub fn attribute_to_document(attribute: &Attribute) -> AttributeDocument {
    let (value, value_accession) = match &attribute.value {
        Value::Term(term) => (
            serde_json::Value::String(term.name.clone()),
            Some(term.accession.clone()),
        ),
        other => (value_to_json(other), None),
    };
    AttributeDocument {
        accession: attribute.term.accession.clone(),
        name: attribute.term.name.clone(),
        value,
        value_accession,
        cv_param_group: attribute.group,
    }
}

/// Convert a JSON attribute object back to an attribute
pub fn attribute_from_document(doc: AttributeDocument) -> Result<Attribute, JsonError> {
    let value = match doc.value_accession {
        Some(value_accession) => {
            let name = match doc.value {
                serde_json::Value::String(name) => name,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            Value::Term(CvTerm::new(&value_accession, &name))
        }
        None => match doc.value {
            serde_json::Value::String(s) => Value::Str(s),
            other => value_from_json(&doc.accession, other)?,
        },
    };
    Ok(Attribute {
        term: CvTerm::new(&doc.accession, &doc.name),
        value,
        group: doc.cv_param_group,
        origin: None,
    })
}

fn local_documents(attributes: &AttributeManager) -> Vec<AttributeDocument> {
    attributes.local().map(attribute_to_document).collect()
}

fn attributes_from_documents(docs: Vec<AttributeDocument>) -> Result<Vec<Attribute>, JsonError> {
    docs.into_iter().map(attribute_from_document).collect()
}

fn key_document(term: CvTerm, key: u64) -> AttributeDocument {
    attribute_to_document(&Attribute::new(term, Value::from(key)))
}

/// Remove the key attribute from `attributes` and return its value
fn take_key(
    attributes: &mut Vec<Attribute>,
    accession: &str,
    context: &str,
) -> Result<u64, JsonError> {
    let position = attributes
        .iter()
        .position(|a| a.is(accession))
        .ok_or_else(|| JsonError::MissingField {
            context: context.to_string(),
            field: accession.to_string(),
        })?;
    let attribute = attributes.remove(position);
    attribute
        .value
        .as_int()
        .and_then(|k| u64::try_from(k).ok())
        .ok_or_else(|| JsonError::InvalidValue {
            accession: accession.to_string(),
            reason: format!("key {} is not a non-negative integer", attribute.value),
        })
}

// ============================================================================
// Header
// ============================================================================

fn sets_to_documents(registry: &AttributeSetRegistry, entity_type: EntityType) -> AttributeSetDocuments {
    registry
        .sets_for(entity_type)
        .map(|set| {
            (
                set.name.clone(),
                set.attributes.iter().map(attribute_to_document).collect(),
            )
        })
        .collect()
}

fn header_to_parts(header: &LibraryHeader) -> LibraryDocument {
    let registry = &header.attribute_sets;
    LibraryDocument {
        format_version: header
            .format_version()
            .unwrap_or_else(|| DEFAULT_FORMAT_VERSION.to_string()),
        attributes: header.attributes.iter().map(attribute_to_document).collect(),
        spectrum_attribute_sets: sets_to_documents(registry, EntityType::Spectrum),
        analyte_attribute_sets: sets_to_documents(registry, EntityType::Analyte),
        interpretation_attribute_sets: sets_to_documents(registry, EntityType::Interpretation),
        cluster_attribute_sets: sets_to_documents(registry, EntityType::Cluster),
        spectra: Vec::new(),
        clusters: Vec::new(),
    }
}

/// Build a header from the non-entry parts of a document
pub fn header_from_document(doc: HeaderDocument) -> Result<LibraryHeader, JsonError> {
    let mut header = LibraryHeader::default();
    for attribute in attributes_from_documents(doc.attributes)? {
        header.attributes.add(attribute);
    }
    if !header.attributes.has(accessions::FORMAT_VERSION) {
        let version = if doc.format_version.is_empty() {
            DEFAULT_FORMAT_VERSION.to_string()
        } else {
            doc.format_version
        };
        header
            .attributes
            .insert_front(Attribute::new(ms_terms::format_version(), version));
    }

    let groups = [
        (EntityType::Spectrum, doc.spectrum_attribute_sets),
        (EntityType::Analyte, doc.analyte_attribute_sets),
        (EntityType::Interpretation, doc.interpretation_attribute_sets),
        (EntityType::Cluster, doc.cluster_attribute_sets),
    ];
    for (entity_type, sets) in groups {
        for (name, attributes) in sets {
            let mut set = AttributeSet::new(name, entity_type);
            set.attributes = attributes_from_documents(attributes)?;
            header.attribute_sets.define(set);
        }
    }
    Ok(header)
}

// ============================================================================
// Spectra
// ============================================================================

/// Convert a spectrum to its JSON object form
pub fn spectrum_to_document(spectrum: &Spectrum) -> SpectrumDocument {
    let mut attributes = vec![key_document(ms_terms::spectrum_key(), spectrum.key)];
    attributes.extend(local_documents(&spectrum.attributes));

    let has_aggregations = spectrum.peaks.iter().any(|p| !p.aggregations.is_empty());
    SpectrumDocument {
        attributes,
        mzs: spectrum.peaks.iter().map(|p| p.mz).collect(),
        intensities: spectrum.peaks.iter().map(|p| p.intensity).collect(),
        peak_annotations: spectrum
            .peaks
            .iter()
            .map(|p| {
                if p.annotations.is_empty() {
                    "?".to_string()
                } else {
                    p.annotations.join(",")
                }
            })
            .collect(),
        aggregations: has_aggregations.then(|| {
            spectrum
                .peaks
                .iter()
                .map(|p| p.aggregations.iter().map(value_to_json).collect())
                .collect()
        }),
        analytes: spectrum
            .analytes
            .iter()
            .map(|a| EntityDocument {
                id: a.id.clone(),
                attributes: local_documents(&a.attributes),
                ..Default::default()
            })
            .collect(),
        interpretations: spectrum
            .interpretations
            .iter()
            .map(|i| EntityDocument {
                id: i.id.clone(),
                attributes: local_documents(&i.attributes),
                analyte_ids: i.analyte_ids.clone(),
                members: i
                    .members
                    .iter()
                    .map(|m| EntityDocument {
                        id: m.id.clone(),
                        attributes: local_documents(&m.attributes),
                        analyte_ids: m.analyte_ids.clone(),
                        members: Vec::new(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Build a spectrum from its JSON object form.
///
/// The key comes from the `MS:1003237` attribute; `index` is assigned as given.
pub fn spectrum_from_document(
    doc: SpectrumDocument,
    header: &LibraryHeader,
    index: usize,
) -> Result<Spectrum, JsonError> {
    let registry = &header.attribute_sets;
    let context = format!("spectrum at position {}", index);

    let mut attributes = attributes_from_documents(doc.attributes)?;
    let key = take_key(&mut attributes, accessions::SPECTRUM_KEY, &context)?;
    attributes.retain(|a| !a.is(accessions::SPECTRUM_INDEX));
    let context = format!("spectrum {}", key);

    let mut spectrum = Spectrum::new(key);
    spectrum.index = index;
    spectrum.attributes = registry
        .build_attributes(EntityType::Spectrum, attributes)
        .map_err(|e| JsonError::from_attribute_set(e, &context))?;

    if doc.intensities.len() != doc.mzs.len() {
        return Err(JsonError::MissingField {
            context,
            field: format!(
                "intensities ({} m/z values but {} intensities)",
                doc.mzs.len(),
                doc.intensities.len()
            ),
        });
    }
    let mut aggregations = doc.aggregations.unwrap_or_default().into_iter();
    let mut annotations = doc.peak_annotations.into_iter();
    for (mz, intensity) in doc.mzs.into_iter().zip(doc.intensities) {
        let annotations = annotations
            .next()
            .map(|raw| Peak::split_annotations(&raw))
            .unwrap_or_default();
        let aggregations = aggregations
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|v| value_from_json("aggregations", v))
            .collect::<Result<Vec<_>, _>>()?;
        spectrum.peaks.push(Peak {
            mz,
            intensity,
            annotations,
            aggregations,
        });
    }

    for analyte_doc in doc.analytes {
        let mut analyte = Analyte::new(analyte_doc.id);
        analyte.attributes = registry
            .build_attributes(
                EntityType::Analyte,
                attributes_from_documents(analyte_doc.attributes)?,
            )
            .map_err(|e| JsonError::from_attribute_set(e, &context))?;
        spectrum.add_analyte(analyte);
    }
    for interpretation_doc in doc.interpretations {
        let mut interpretation = Interpretation::new(interpretation_doc.id);
        interpretation.attributes = registry
            .build_attributes(
                EntityType::Interpretation,
                attributes_from_documents(interpretation_doc.attributes)?,
            )
            .map_err(|e| JsonError::from_attribute_set(e, &context))?;
        interpretation.analyte_ids = interpretation_doc.analyte_ids;
        for member_doc in interpretation_doc.members {
            let mut member = InterpretationMember::new(member_doc.id);
            member.attributes = registry
                .build_member_attributes(attributes_from_documents(member_doc.attributes)?)
                .map_err(|e| JsonError::from_attribute_set(e, &context))?;
            member.analyte_ids = member_doc.analyte_ids;
            interpretation.add_member(member);
        }
        spectrum.add_interpretation(interpretation);
    }
    spectrum.link_interpretations();
    Ok(spectrum)
}

// ============================================================================
// Clusters
// ============================================================================

/// Convert a cluster to its JSON object form
pub fn cluster_to_document(cluster: &Cluster) -> ClusterDocument {
    let mut attributes = vec![key_document(ms_terms::cluster_key(), cluster.key)];
    if !cluster.members.is_empty() {
        attributes.push(attribute_to_document(&Attribute::new(
            ms_terms::cluster_member_keys(),
            cluster.members_value(),
        )));
    }
    attributes.extend(local_documents(&cluster.attributes));
    ClusterDocument { attributes }
}

/// Build a cluster from its JSON object form
pub fn cluster_from_document(
    doc: ClusterDocument,
    header: &LibraryHeader,
) -> Result<Cluster, JsonError> {
    let mut attributes = attributes_from_documents(doc.attributes)?;
    let key = take_key(&mut attributes, accessions::CLUSTER_KEY, "cluster")?;
    let mut cluster = Cluster::new(key);
    cluster.attributes = header
        .attribute_sets
        .build_attributes(EntityType::Cluster, attributes)
        .map_err(|e| JsonError::from_attribute_set(e, format!("cluster {}", key)))?;
    cluster
        .extract_members()
        .map_err(|token| JsonError::InvalidValue {
            accession: accessions::CLUSTER_MEMBER_KEYS.to_string(),
            reason: format!("{:?} is not a spectrum key", token),
        })?;
    Ok(cluster)
}

// ============================================================================
// Documents and I/O
// ============================================================================

/// Convert a library to its JSON document.
///
/// Non-finite floats become `null` here; [`write_library`] rejects them.
pub fn to_document(library: &Library) -> LibraryDocument {
    let mut doc = header_to_parts(&library.header);
    doc.spectra = library.spectra.iter().map(spectrum_to_document).collect();
    doc.clusters = library.clusters.iter().map(cluster_to_document).collect();
    doc
}

/// Build a library from a JSON document
pub fn from_document(doc: LibraryDocument) -> Result<Library, JsonError> {
    let header = header_from_document(HeaderDocument {
        format_version: doc.format_version,
        attributes: doc.attributes,
        spectrum_attribute_sets: doc.spectrum_attribute_sets,
        analyte_attribute_sets: doc.analyte_attribute_sets,
        interpretation_attribute_sets: doc.interpretation_attribute_sets,
        cluster_attribute_sets: doc.cluster_attribute_sets,
    })?;
    let mut library = Library::new(header);
    for (i, spectrum_doc) in doc.spectra.into_iter().enumerate() {
        let spectrum = spectrum_from_document(spectrum_doc, &library.header, i)?;
        library.push_spectrum(spectrum);
    }
    for cluster_doc in doc.clusters {
        let cluster = cluster_from_document(cluster_doc, &library.header)?;
        library.push_cluster(cluster);
    }
    Ok(library)
}

/// Serialize a library as JSON.
///
/// Fails with [`JsonError::InvalidValue`] on NaN or infinite numbers.
pub fn write_library<W: Write>(writer: W, library: &Library, pretty: bool) -> Result<(), JsonError> {
    ensure_finite_library(library)?;
    let doc = to_document(library);
    if pretty {
        serde_json::to_writer_pretty(writer, &doc)?;
    } else {
        serde_json::to_writer(writer, &doc)?;
    }
    Ok(())
}

/// Read a complete JSON library
pub fn read_library<R: Read>(reader: R) -> Result<Library, JsonError> {
    let doc: LibraryDocument = serde_json::from_reader(BufReader::new(reader))?;
    from_document(doc)
}

/// Read only the header of a JSON library; spectra are skipped without being kept
pub fn read_header<R: Read>(reader: R) -> Result<LibraryHeader, JsonError> {
    let doc: HeaderDocument = serde_json::from_reader(BufReader::new(reader))?;
    header_from_document(doc)
}

/// Parse one isolated spectrum object, resolving attribute sets against `header`
pub fn parse_spectrum_object(
    bytes: &[u8],
    header: &LibraryHeader,
    index: usize,
) -> Result<Spectrum, JsonError> {
    let doc: SpectrumDocument = serde_json::from_slice(bytes)?;
    spectrum_from_document(doc, header, index)
}

/// Parse one isolated cluster object
pub fn parse_cluster_object(bytes: &[u8], header: &LibraryHeader) -> Result<Cluster, JsonError> {
    let doc: ClusterDocument = serde_json::from_slice(bytes)?;
    cluster_from_document(doc, header)
}

/// Render a single spectrum as a JSON object
pub fn format_spectrum(spectrum: &Spectrum, pretty: bool) -> Result<String, JsonError> {
    ensure_finite_spectrum(spectrum)?;
    let doc = spectrum_to_document(spectrum);
    let text = if pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    Ok(text)
}
