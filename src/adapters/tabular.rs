//! Row grouping shared by the TSV adapters.
//!
//! One spectrum spans the consecutive rows that share a key tuple. A key
//! that comes back after a different group, or rows of one group that
//! disagree on their precursor columns, make the grouping ambiguous.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use csv::StringRecord;

use crate::attributes::AttributeManager;

use super::{add_other_attribute, cast_value, AdapterError, Format};

/// Column name to position lookup
#[derive(Debug, Clone, Default)]
pub(crate) struct Columns {
    positions: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { positions }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Trimmed cell value, `None` when the column is absent or the cell empty
    pub(crate) fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let position = *self.positions.get(name)?;
        record
            .get(position)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Like [`get`](Self::get), failing for a required cell
    pub(crate) fn require<'r>(
        &self,
        format: Format,
        record: &'r StringRecord,
        name: &str,
    ) -> Result<&'r str, AdapterError> {
        self.get(record, name)
            .ok_or_else(|| AdapterError::format(format, format!("empty {} cell", name)))
    }

    /// Parse a required cell
    pub(crate) fn parse<T>(
        &self,
        format: Format,
        record: &StringRecord,
        name: &str,
    ) -> Result<T, AdapterError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(format, record, name)?;
        raw.parse().map_err(|e: T::Err| {
            AdapterError::format(format, format!("{} value {:?}: {}", name, raw, e))
        })
    }

    /// Copy the listed columns that are present as `other attribute` pairs
    pub(crate) fn add_custom(&self, record: &StringRecord, keys: &[&str], attributes: &mut AttributeManager) {
        for key in keys {
            if let Some(value) = self.get(record, key) {
                add_other_attribute(attributes, key, cast_value(value));
            }
        }
    }
}

/// Rows making up one spectrum
#[derive(Debug)]
pub(crate) struct RecordGroup {
    /// Key tuple shared by the rows
    pub key: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RecordGroup {
    /// First row, which carries the precursor-level columns
    pub(crate) fn first(&self) -> &StringRecord {
        &self.rows[0]
    }
}

/// Groups consecutive TSV rows by a key tuple
pub(crate) struct RecordGrouper {
    format: Format,
    reader: csv::Reader<Box<dyn BufRead>>,
    columns: Columns,
    key_columns: Vec<String>,
    precursor_columns: Vec<String>,
    pending: Option<(usize, StringRecord)>,
    seen: HashSet<Vec<String>>,
    row: usize,
}

impl RecordGrouper {
    /// Read the header row and check that every required column is present
    pub(crate) fn new(
        source: Box<dyn BufRead>,
        format: Format,
        required: &[&str],
        key_columns: &[&str],
        precursor_columns: &[&str],
    ) -> Result<Self, AdapterError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .has_headers(true)
            .quoting(false)
            .from_reader(source);
        let headers = reader
            .headers()
            .map_err(|e| AdapterError::format(format, e))?;
        let columns = Columns::from_headers(headers);

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !columns.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(AdapterError::format(
                format,
                format!("missing required columns: {}", missing.join(", ")),
            ));
        }

        Ok(Self {
            format,
            reader,
            columns,
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            precursor_columns: precursor_columns.iter().map(|c| c.to_string()).collect(),
            pending: None,
            seen: HashSet::new(),
            row: 0,
        })
    }

    pub(crate) fn columns(&self) -> &Columns {
        &self.columns
    }

    fn read_record(&mut self) -> Result<Option<(usize, StringRecord)>, AdapterError> {
        let mut record = StringRecord::new();
        let more = self
            .reader
            .read_record(&mut record)
            .map_err(|e| AdapterError::format(self.format, e))?;
        if !more {
            return Ok(None);
        }
        self.row += 1;
        Ok(Some((self.row, record)))
    }

    fn tuple(&self, record: &StringRecord, names: &[String]) -> Vec<String> {
        names
            .iter()
            .map(|name| self.columns.get(record, name).unwrap_or("").to_string())
            .collect()
    }

    fn ambiguous(&self, key: &[String], row: usize) -> AdapterError {
        AdapterError::AmbiguousRecordGrouping {
            format: self.format,
            group: key.join("/"),
            row,
        }
    }

    /// Rows of the next spectrum, in source order
    pub(crate) fn next_group(&mut self) -> Result<Option<RecordGroup>, AdapterError> {
        let (first_row, first) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.read_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        let key = self.tuple(&first, &self.key_columns);
        if !self.seen.insert(key.clone()) {
            return Err(self.ambiguous(&key, first_row));
        }
        let precursor = self.tuple(&first, &self.precursor_columns);

        let mut rows = vec![first];
        while let Some((row, record)) = self.read_record()? {
            if self.tuple(&record, &self.key_columns) != key {
                self.pending = Some((row, record));
                break;
            }
            if self.tuple(&record, &self.precursor_columns) != precursor {
                return Err(self.ambiguous(&key, row));
            }
            rows.push(record);
        }
        Ok(Some(RecordGroup { key, rows }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn grouper(tsv: &'static str) -> RecordGrouper {
        RecordGrouper::new(
            Box::new(Cursor::new(tsv)),
            Format::DiaNn,
            &["id", "mz"],
            &["id"],
            &["mz"],
        )
        .unwrap()
    }

    #[test]
    fn test_groups_consecutive_rows() {
        let mut grouper = grouper("id\tmz\tfragment\nA\t500\t1\nA\t500\t2\nB\t600\t3\n");
        let first = grouper.next_group().unwrap().unwrap();
        assert_eq!(first.key, vec!["A"]);
        assert_eq!(first.rows.len(), 2);
        assert_eq!(grouper.columns().get(&first.rows[1], "fragment"), Some("2"));

        let second = grouper.next_group().unwrap().unwrap();
        assert_eq!(second.key, vec!["B"]);
        assert_eq!(second.rows.len(), 1);
        assert!(grouper.next_group().unwrap().is_none());
    }

    #[test]
    fn test_reappearing_key() {
        let mut grouper = grouper("id\tmz\nA\t500\nB\t600\nA\t500\n");
        grouper.next_group().unwrap();
        grouper.next_group().unwrap();
        match grouper.next_group() {
            Err(AdapterError::AmbiguousRecordGrouping { group, row, .. }) => {
                assert_eq!(group, "A");
                assert_eq!(row, 3);
            }
            other => panic!("expected ambiguous grouping, got {:?}", other.map(|g| g.map(|g| g.key))),
        }
    }

    #[test]
    fn test_disagreeing_precursor() {
        let mut grouper = grouper("id\tmz\nA\t500\nA\t501\n");
        assert!(matches!(
            grouper.next_group(),
            Err(AdapterError::AmbiguousRecordGrouping { row: 2, .. })
        ));
    }

    #[test]
    fn test_missing_columns() {
        let result = RecordGrouper::new(
            Box::new(Cursor::new("id\tother\n")),
            Format::Spectronaut,
            &["id", "mz"],
            &["id"],
            &[],
        );
        match result {
            Err(AdapterError::Format { format, cause }) => {
                assert_eq!(format, Format::Spectronaut);
                assert!(cause.contains("mz"));
            }
            _ => panic!("expected a format error"),
        }
    }
}
