//! # Attribute Model
//!
//! Every entity in an mzSpecLib library (library, spectrum, analyte,
//! interpretation, cluster) is described by an ordered list of attributes.
//! An attribute is a controlled vocabulary term paired with a typed value,
//! optionally linked to other attributes on the same entity through a shared
//! group id.
//!
//! ```text
//! MS:1003208|experimental precursor monoisotopic m/z=443.7112
//! [1]MS:1000894|retention time=1894.2
//! [1]UO:0000000|unit=UO:0000010|second
//! ```
//!
//! The second and third lines form a group: the unit applies to the retention time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controlled_vocabulary::{accessions, is_curie, CvTerm};

/// The typed value carried by an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Free text
    Str(String),
    /// Reference to another controlled vocabulary term
    Term(CvTerm),
    /// Ordered list of values (produced by the JSON codec)
    List(Vec<Value>),
}

/// The kind of a [`Value`], used by validator type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Integer value
    Integer,
    /// Floating point value (integers also satisfy this type)
    Float,
    /// String value
    String,
    /// Controlled vocabulary term value
    CvTerm,
    /// List value
    List,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::CvTerm => "cv_term",
            ValueType::List => "list",
        };
        f.write_str(name)
    }
}

impl ValueType {
    /// Whether a value of type `actual` is acceptable where `self` is required
    pub fn accepts(self, actual: ValueType) -> bool {
        self == actual || (self == ValueType::Float && actual == ValueType::Integer)
    }
}

impl Value {
    /// Integer view of the value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view of the value; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view of the value (only for `Str`)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Term view of the value
    pub fn as_term(&self) -> Option<&CvTerm> {
        match self {
            Value::Term(t) => Some(t),
            _ => None,
        }
    }

    /// List view of the value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// The [`ValueType`] of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::String,
            Value::Term(_) => ValueType::CvTerm,
            Value::List(_) => ValueType::List,
        }
    }

    /// Short name of the variant, for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Term(_) => "cv_term",
            Value::List(_) => "list",
        }
    }

    /// Parse a value as written on the right-hand side of a text attribute line.
    ///
    /// Quoted text is always a string. Otherwise integers, floats and
    /// `CURIE|name` references are recognized, and anything else is a string.
    /// A single line never produces `List`; the text reader folds grouped
    /// lines of one term into a list.
    pub fn parse_text(raw: &str) -> Value {
        if let Some(inner) = strip_quotes(raw) {
            return Value::Str(unescape(inner));
        }
        if looks_numeric(raw) {
            if let Ok(v) = raw.parse::<i64>() {
                return Value::Int(v);
            }
            if let Ok(v) = raw.parse::<f64>() {
                return Value::Float(v);
            }
        }
        if let Some(term) = parse_term_reference(raw) {
            return Value::Term(term);
        }
        Value::Str(raw.to_string())
    }

    /// Render the value for a text attribute line.
    ///
    /// The output re-parses with [`Value::parse_text`] to an equal value for
    /// every variant except `List`, which is written comma-joined here. The
    /// text writer spreads lists over one line per element instead.
    pub fn format_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Str(s) => {
                if needs_quoting(s) {
                    quote(s)
                } else {
                    s.clone()
                }
            }
            Value::Term(t) => t.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::format_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_text())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<CvTerm> for Value {
    fn from(v: CvTerm) -> Self {
        Value::Term(v)
    }
}

fn strip_quotes(raw: &str) -> Option<&str> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Rust's float parser also accepts `inf` and `NaN`; those stay strings.
fn looks_numeric(raw: &str) -> bool {
    !raw.is_empty()
        && raw.chars().any(|c| c.is_ascii_digit())
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && raw
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

fn parse_term_reference(raw: &str) -> Option<CvTerm> {
    match raw.split_once('|') {
        Some((acc, name)) if is_curie(acc) => Some(CvTerm::new(acc, name)),
        Some(_) => None,
        None if is_curie(raw) => Some(CvTerm::from_accession(raw)),
        None => None,
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.starts_with('"')
        || s.trim() != s
        || s.contains('\n')
        || (looks_numeric(s) && (s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok()))
        || parse_term_reference(s).is_some()
}

fn format_float(v: f64) -> String {
    if v.is_finite() {
        // Debug keeps a fractional part ("1.0") and round-trips exactly.
        format!("{:?}", v)
    } else {
        v.to_string()
    }
}

/// A single CV-keyed attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// The attribute's key term
    pub term: CvTerm,
    /// The attribute's value
    pub value: Value,
    /// Group id linking related attributes on the same entity
    pub group: Option<u32>,
    /// Name of the attribute set this attribute was inherited from
    pub origin: Option<String>,
}

impl Attribute {
    /// Create an ungrouped, entity-local attribute
    pub fn new(term: CvTerm, value: impl Into<Value>) -> Self {
        Self {
            term,
            value: value.into(),
            group: None,
            origin: None,
        }
    }

    /// Set the group id
    pub fn with_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }

    /// Mark the attribute as contributed by an attribute set
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Accession of the key term
    pub fn accession(&self) -> &str {
        &self.term.accession
    }

    /// Name of the key term
    pub fn name(&self) -> &str {
        &self.term.name
    }

    /// Whether the key term has the given accession
    pub fn is(&self, accession: &str) -> bool {
        self.term.accession == accession
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = self.group {
            write!(f, "[{}]", group)?;
        }
        write!(f, "{}={}", self.term, self.value.format_text())
    }
}

/// Ordered attribute container embedded in every entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeManager {
    attributes: Vec<Attribute>,
}

impl AttributeManager {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute
    pub fn add(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Append an ungrouped attribute built from a term and value
    pub fn add_value(&mut self, term: CvTerm, value: impl Into<Value>) {
        self.add(Attribute::new(term, value));
    }

    /// Append a set of linked attributes under a freshly allocated group id
    pub fn add_group(&mut self, attributes: impl IntoIterator<Item = Attribute>) -> u32 {
        let group = self.next_group_id();
        for attribute in attributes {
            self.attributes.push(attribute.with_group(group));
        }
        group
    }

    /// Append a value with its unit as a two-attribute group
    pub fn add_with_unit(&mut self, term: CvTerm, value: impl Into<Value>, unit: CvTerm) -> u32 {
        self.add_group([
            Attribute::new(term, value),
            Attribute::new(crate::controlled_vocabulary::unit_terms::unit(), Value::Term(unit)),
        ])
    }

    /// Insert an attribute before all others
    pub fn insert_front(&mut self, attribute: Attribute) {
        self.attributes.insert(0, attribute);
    }

    /// Replace the value of the first attribute with this accession, or append one
    pub fn set(&mut self, term: CvTerm, value: impl Into<Value>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.is(&term.accession)) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::new(term, value)),
        }
    }

    /// First attribute with the given accession
    pub fn get(&self, accession: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(accession))
    }

    /// Value of the first attribute with the given accession
    pub fn get_value(&self, accession: &str) -> Option<&Value> {
        self.get(accession).map(|a| &a.value)
    }

    /// All attributes with the given accession, in insertion order
    pub fn get_all(&self, accession: &str) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| a.is(accession)).collect()
    }

    /// All attributes in the given group
    pub fn get_in_group(&self, group: u32) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.group == Some(group))
            .collect()
    }

    /// The unit attribute grouped with `attribute`, if any
    pub fn unit_of(&self, attribute: &Attribute) -> Option<&Attribute> {
        let group = attribute.group?;
        self.attributes
            .iter()
            .find(|a| a.group == Some(group) && a.is(accessions::UNIT))
    }

    /// Whether any attribute has the given accession
    pub fn has(&self, accession: &str) -> bool {
        self.get(accession).is_some()
    }

    /// Remove every attribute with the given accession and return them
    pub fn remove_all(&mut self, accession: &str) -> Vec<Attribute> {
        let (removed, kept) = std::mem::take(&mut self.attributes)
            .into_iter()
            .partition(|a| a.is(accession));
        self.attributes = kept;
        removed
    }

    /// The next unused group id (`max + 1`, starting at 1)
    pub fn next_group_id(&self) -> u32 {
        self.attributes
            .iter()
            .filter_map(|a| a.group)
            .max()
            .map_or(1, |g| g + 1)
    }

    /// Iterate over all attributes in order
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    /// Iterate over attributes that were not inherited from an attribute set
    pub fn local(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.origin.is_none())
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Consume into the underlying list
    pub fn into_vec(self) -> Vec<Attribute> {
        self.attributes
    }
}

impl FromIterator<Attribute> for AttributeManager {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Attribute> for AttributeManager {
    fn extend<I: IntoIterator<Item = Attribute>>(&mut self, iter: I) {
        self.attributes.extend(iter);
    }
}

impl<'a> IntoIterator for &'a AttributeManager {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

impl IntoIterator for AttributeManager {
    type Item = Attribute;
    type IntoIter = std::vec::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}
