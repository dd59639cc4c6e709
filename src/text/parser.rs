//! Section state machine shared by the streaming reader and index lookups.

use std::io::BufRead;

use log::warn;

use crate::attribute_sets::{AttributeSet, AttributeSetRegistry};
use crate::attributes::{Attribute, Value};
use crate::controlled_vocabulary::accessions;
use crate::model::{
    Analyte, Cluster, EntityType, Interpretation, InterpretationMember, LibraryHeader, Spectrum,
};

use super::cursor::{Line, SectionCursor};
use super::grammar::{parse_attribute_line, parse_peak_line, parse_section_header, SectionHeader};
use super::{Entry, TextError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Spectrum,
    Analyte,
    Interpretation,
    InterpretationMember,
    Peaks,
    Cluster,
}

impl State {
    fn describe(self) -> &'static str {
        match self {
            State::Spectrum => "<Spectrum> content",
            State::Analyte => "<Analyte> content",
            State::Interpretation => "<Interpretation> content",
            State::InterpretationMember => "<InterpretationMember> content",
            State::Peaks => "peak lines",
            State::Cluster => "<Cluster> content",
        }
    }
}

struct RawEntity {
    id: String,
    line_no: usize,
    attributes: Vec<Attribute>,
}

impl RawEntity {
    fn new(id: String, line_no: usize) -> Self {
        Self {
            id,
            line_no,
            attributes: Vec::new(),
        }
    }
}

struct RawInterpretation {
    entity: RawEntity,
    members: Vec<RawEntity>,
}

/// Read the library header: library attributes and attribute set definitions.
///
/// Stops in front of the first `<Spectrum=` or `<Cluster=` header.
pub(crate) fn read_header<R: BufRead>(
    cursor: &mut SectionCursor<R>,
) -> Result<LibraryHeader, TextError> {
    let mut header = LibraryHeader::default();
    let mut library_attributes: Vec<Attribute> = Vec::new();
    let mut current_set: Option<AttributeSet> = None;

    while let Some(line) = cursor.next_line()? {
        if line.is_blank() {
            continue;
        }
        match parse_section_header(&line.text) {
            Some(SectionHeader::Library(version)) => {
                if let Some(version) = version {
                    warn!(
                        "Ignoring format version tag {:?} in <mzSpecLib> header, use MS:1003186 instead",
                        version
                    );
                }
            }
            Some(SectionHeader::AttributeSet(entity_type, name)) => {
                if let Some(set) = current_set.take() {
                    header.attribute_sets.define(gather_set(set));
                }
                current_set = Some(AttributeSet::new(name, entity_type));
            }
            Some(SectionHeader::Spectrum(_)) | Some(SectionHeader::Cluster(_)) => {
                cursor.push_back(line);
                break;
            }
            Some(other) => {
                return Err(TextError::UnexpectedSection {
                    expected: "library attributes, <AttributeSet>, <Spectrum> or <Cluster>"
                        .to_string(),
                    found: other.label(),
                    line_no: line.line_no,
                });
            }
            None => {
                let attribute = attribute_or_malformed(&line)?;
                match current_set.as_mut() {
                    Some(set) => set.attributes.push(attribute),
                    None => library_attributes.push(attribute),
                }
            }
        }
    }
    if let Some(set) = current_set.take() {
        header.attribute_sets.define(gather_set(set));
    }
    header.attributes = gather_lists(library_attributes).into_iter().collect();

    if header.ensure_format_version() {
        warn!(
            "Library does not declare MS:1003186|library format version, assuming {}",
            crate::model::DEFAULT_FORMAT_VERSION
        );
    }
    Ok(header)
}

/// A parsed entry with the byte range it was read from
pub(crate) struct ParsedEntry {
    pub entry: Entry,
    pub start: u64,
    pub end: u64,
}

/// Parse the next `<Spectrum>` or `<Cluster>` section from the cursor.
///
/// `index` is assigned to a parsed spectrum.
pub(crate) fn parse_next_section<R: BufRead>(
    cursor: &mut SectionCursor<R>,
    registry: &AttributeSetRegistry,
    index: usize,
) -> Result<Option<ParsedEntry>, TextError> {
    let Some(first) = cursor.next_non_blank()? else {
        return Ok(None);
    };
    let start = first.offset;

    let mut builder = match parse_section_header(&first.text) {
        Some(SectionHeader::Spectrum(key)) => {
            SectionBuilder::spectrum(parse_key(&key, &first)?, first.line_no)
        }
        Some(SectionHeader::Cluster(key)) => {
            SectionBuilder::cluster(parse_key(&key, &first)?, first.line_no)
        }
        Some(other) => {
            return Err(TextError::UnexpectedSection {
                expected: "<Spectrum> or <Cluster>".to_string(),
                found: other.label(),
                line_no: first.line_no,
            })
        }
        None => {
            return Err(TextError::MalformedLine {
                line_no: first.line_no,
                text: first.text,
            })
        }
    };

    while let Some(line) = cursor.next_line()? {
        if line.is_blank() {
            if builder.state == State::Peaks {
                break;
            }
            continue;
        }
        match parse_section_header(&line.text) {
            Some(SectionHeader::Spectrum(_)) | Some(SectionHeader::Cluster(_)) => {
                cursor.push_back(line);
                break;
            }
            Some(header) => builder.enter(header, &line)?,
            None if builder.state == State::Peaks => {
                let peak = parse_peak_line(line.text.trim(), line.line_no)?;
                builder.peaks.push(peak);
            }
            None => {
                let attribute = attribute_or_malformed(&line)?;
                builder.add_attribute(attribute, &line)?;
            }
        }
    }

    let end = cursor.position();
    let entry = builder.finish(registry, index)?;
    Ok(Some(ParsedEntry { entry, start, end }))
}

fn parse_key(raw: &str, line: &Line) -> Result<u64, TextError> {
    raw.parse::<u64>().map_err(|_| TextError::InvalidHeader {
        line_no: line.line_no,
        message: format!("key {:?} is not a non-negative integer", raw),
    })
}

/// Fold runs of same-term lines sharing a group into one list value.
///
/// The writer spreads a list over such lines. A group left holding only the
/// list is dropped again.
fn gather_lists(attributes: Vec<Attribute>) -> Vec<Attribute> {
    let mut out: Vec<Attribute> = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        if let Some(last) = out.last_mut() {
            if attribute.group.is_some()
                && last.group == attribute.group
                && last.is(&attribute.term.accession)
            {
                let folded = std::mem::replace(&mut last.value, Value::List(Vec::new()));
                last.value = match folded {
                    Value::List(mut items) => {
                        items.push(attribute.value);
                        Value::List(items)
                    }
                    first => Value::List(vec![first, attribute.value]),
                };
                continue;
            }
        }
        out.push(attribute);
    }

    for i in 0..out.len() {
        let Some(group) = out[i].group else { continue };
        if !matches!(out[i].value, Value::List(_)) {
            continue;
        }
        let shared = out
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.group == Some(group));
        if !shared {
            out[i].group = None;
        }
    }
    out
}

fn gather_set(mut set: AttributeSet) -> AttributeSet {
    set.attributes = gather_lists(std::mem::take(&mut set.attributes));
    set
}

/// Key given by a `MS:1003237` or `MS:1003267` line
fn literal_key(attribute: &Attribute, line: &Line) -> Result<Option<u64>, TextError> {
    let Some(key) = attribute.value.as_int() else {
        return Ok(None);
    };
    u64::try_from(key)
        .map(Some)
        .map_err(|_| TextError::InvalidHeader {
            line_no: line.line_no,
            message: format!("{} {} is not a non-negative integer", attribute.term, key),
        })
}

fn attribute_or_malformed(line: &Line) -> Result<Attribute, TextError> {
    parse_attribute_line(line.text.trim_end()).ok_or_else(|| TextError::MalformedLine {
        line_no: line.line_no,
        text: line.text.clone(),
    })
}

struct SectionBuilder {
    state: State,
    is_cluster: bool,
    key: u64,
    line_no: usize,
    attributes: Vec<Attribute>,
    analytes: Vec<RawEntity>,
    interpretations: Vec<RawInterpretation>,
    peaks: Vec<crate::model::Peak>,
}

impl SectionBuilder {
    fn spectrum(key: u64, line_no: usize) -> Self {
        Self {
            state: State::Spectrum,
            is_cluster: false,
            key,
            line_no,
            attributes: Vec::new(),
            analytes: Vec::new(),
            interpretations: Vec::new(),
            peaks: Vec::new(),
        }
    }

    fn cluster(key: u64, line_no: usize) -> Self {
        Self {
            state: State::Cluster,
            is_cluster: true,
            ..Self::spectrum(key, line_no)
        }
    }

    fn unexpected(&self, header: &SectionHeader, line: &Line, expected: &str) -> TextError {
        TextError::UnexpectedSection {
            expected: expected.to_string(),
            found: format!("{} after {}", header.label(), self.state.describe()),
            line_no: line.line_no,
        }
    }

    fn enter(&mut self, header: SectionHeader, line: &Line) -> Result<(), TextError> {
        if self.state == State::Cluster {
            return Err(self.unexpected(&header, line, "cluster attributes"));
        }
        if self.state == State::Peaks {
            return Err(self.unexpected(&header, line, "peak lines"));
        }
        match header {
            SectionHeader::Analyte(id) => {
                if matches!(
                    self.state,
                    State::Interpretation | State::InterpretationMember
                ) {
                    warn!(
                        "Analyte {} declared after an interpretation at line {}",
                        id, line.line_no
                    );
                }
                self.analytes.push(RawEntity::new(id, line.line_no));
                self.state = State::Analyte;
            }
            SectionHeader::Interpretation(id) => {
                self.interpretations.push(RawInterpretation {
                    entity: RawEntity::new(id, line.line_no),
                    members: Vec::new(),
                });
                self.state = State::Interpretation;
            }
            SectionHeader::InterpretationMember(id) => {
                let in_interpretation = matches!(
                    self.state,
                    State::Interpretation | State::InterpretationMember
                );
                let Some(interpretation) = self
                    .interpretations
                    .last_mut()
                    .filter(|_| in_interpretation)
                else {
                    return Err(TextError::UnexpectedSection {
                        expected: "<Interpretation> before <InterpretationMember>".to_string(),
                        found: format!("<InterpretationMember={}>", id),
                        line_no: line.line_no,
                    });
                };
                interpretation
                    .members
                    .push(RawEntity::new(id, line.line_no));
                self.state = State::InterpretationMember;
            }
            SectionHeader::Peaks => self.state = State::Peaks,
            other => {
                return Err(self.unexpected(
                    &other,
                    line,
                    "<Analyte>, <Interpretation>, <InterpretationMember> or <Peaks>",
                ))
            }
        }
        Ok(())
    }

    fn add_attribute(&mut self, attribute: Attribute, line: &Line) -> Result<(), TextError> {
        match self.state {
            State::Spectrum => {
                if attribute.is(accessions::SPECTRUM_KEY) {
                    if let Some(key) = literal_key(&attribute, line)? {
                        self.key = key;
                    }
                } else if !attribute.is(accessions::SPECTRUM_INDEX) {
                    self.attributes.push(attribute);
                }
            }
            State::Cluster => {
                if attribute.is(accessions::CLUSTER_KEY) {
                    if let Some(key) = literal_key(&attribute, line)? {
                        self.key = key;
                    }
                } else {
                    self.attributes.push(attribute);
                }
            }
            State::Analyte => {
                if let Some(analyte) = self.analytes.last_mut() {
                    analyte.attributes.push(attribute);
                }
            }
            State::Interpretation => {
                if let Some(interpretation) = self.interpretations.last_mut() {
                    interpretation.entity.attributes.push(attribute);
                }
            }
            State::InterpretationMember => {
                if let Some(member) = self
                    .interpretations
                    .last_mut()
                    .and_then(|i| i.members.last_mut())
                {
                    member.attributes.push(attribute);
                }
            }
            State::Peaks => {}
        }
        Ok(())
    }

    fn finish(self, registry: &AttributeSetRegistry, index: usize) -> Result<Entry, TextError> {
        let build = |entity_type: EntityType, attributes: Vec<Attribute>, line_no: usize| {
            registry
                .build_attributes(entity_type, gather_lists(attributes))
                .map_err(|e| TextError::from_attribute_set(e, line_no))
        };

        if self.is_cluster {
            let mut cluster = Cluster::new(self.key);
            cluster.attributes = build(EntityType::Cluster, self.attributes, self.line_no)?;
            cluster
                .extract_members()
                .map_err(|token| TextError::MalformedLine {
                    line_no: self.line_no,
                    text: format!("invalid cluster member key {:?}", token),
                })?;
            return Ok(Entry::Cluster(cluster));
        }

        let mut spectrum = Spectrum::new(self.key);
        spectrum.index = index;
        spectrum.attributes = build(EntityType::Spectrum, self.attributes, self.line_no)?;
        spectrum.peaks = self.peaks;

        for raw in self.analytes {
            let mut analyte = Analyte::new(raw.id);
            analyte.attributes = build(EntityType::Analyte, raw.attributes, raw.line_no)?;
            spectrum.add_analyte(analyte);
        }
        for raw in self.interpretations {
            let mut interpretation = Interpretation::new(raw.entity.id);
            interpretation.attributes = build(
                EntityType::Interpretation,
                raw.entity.attributes,
                raw.entity.line_no,
            )?;
            for member in raw.members {
                let mut built = InterpretationMember::new(member.id);
                built.attributes = registry
                    .build_member_attributes(gather_lists(member.attributes))
                    .map_err(|e| TextError::from_attribute_set(e, member.line_no))?;
                interpretation.add_member(built);
            }
            spectrum.add_interpretation(interpretation);
        }
        spectrum.link_interpretations();
        Ok(Entry::Spectrum(spectrum))
    }
}

/// Parse a byte slice holding exactly one section
pub(crate) fn parse_single_section(
    bytes: &[u8],
    header: &LibraryHeader,
    index: usize,
) -> Result<Entry, TextError> {
    let mut cursor = SectionCursor::new(bytes);
    match parse_next_section(&mut cursor, &header.attribute_sets, index)? {
        Some(parsed) => Ok(parsed.entry),
        None => Err(TextError::InvalidHeader {
            line_no: 1,
            message: "byte range holds no section".to_string(),
        }),
    }
}
