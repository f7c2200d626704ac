//! Bibliographic records and their wire format.
//!
//! A record travels as a sequence of text lines:
//!
//! ```text
//! {mfn}#{status}
//! 0#{version}
//! {tag}#{value}^{code}{value}...   one line per field
//! ```
//!
//! Inside a single protocol line the record lines are joined with
//! [`IRBIS_DELIMITER`](crate::encoding::IRBIS_DELIMITER).
//!
//! # Example
//! ```rust
//! use irbis::Record;
//!
//! let mut record = Record::new();
//! record.add(200, "Title").unwrap().add('a', "Sub").unwrap();
//!
//! let lines = record.encode();
//! assert_eq!(lines, vec!["0#0", "0#0", "200#Title^aSub"]);
//!
//! let mut copy = Record::new();
//! copy.parse(&lines).unwrap();
//! assert_eq!(copy, record);
//! ```
mod field;

use std::{collections::BTreeMap, fmt};

use bitflags::bitflags;

use crate::error::{IrbisError, Result};

pub use field::{Field, SUBFIELD_MARKER, SubField};

bitflags! {
    /// Record status bits as stored by the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RecordStatus: u32 {
        const LOGICALLY_DELETED = 1;
        const PHYSICALLY_DELETED = 2;
        const ABSENT = 4;
        const NON_ACTUALIZED = 8;
        const LAST_VERSION = 32;
        const LOCKED = 64;
    }
}

impl RecordStatus {
    pub const DELETED: RecordStatus = RecordStatus::LOGICALLY_DELETED
        .union(RecordStatus::PHYSICALLY_DELETED);
}

/// Record with MFN, status, version and fields.
///
/// Equality compares everything but the database name, which travels
/// alongside the record rather than inside its wire form.
#[derive(Debug, Clone, Default, Eq)]
pub struct Record {
    pub database: Option<String>,
    pub mfn: u32,
    pub version: u32,
    pub status: RecordStatus,
    fields: Vec<Field>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.mfn == other.mfn
            && self.version == other.version
            && self.status == other.status
            && self.fields == other.fields
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Build a record from bare values grouped by tag.
    pub fn from_tags<S: Into<String>>(tags: BTreeMap<u32, Vec<S>>) -> Result<Self> {
        let mut record = Record::new();
        for (tag, values) in tags {
            for value in values {
                record.fields.push(Field::with_value(tag, value)?);
            }
        }
        Ok(record)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<Field> {
        &mut self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field with a bare value and return it for further subfields.
    pub fn add(&mut self, tag: u32, value: impl Into<String>) -> Result<&mut Field> {
        let index = self.fields.len();
        self.fields.push(Field::with_value(tag, value)?);
        Ok(&mut self.fields[index])
    }

    pub fn push(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Append a field only when `value` is not empty.
    pub fn add_non_empty(&mut self, tag: u32, value: &str) -> Result<&mut Self> {
        if !value.is_empty() {
            self.add(tag, value)?;
        }
        Ok(self)
    }

    pub fn insert_at(&mut self, index: usize, field: Field) -> Result<&mut Self> {
        if index > self.fields.len() {
            return Err(IrbisError::validation(format!(
                "field index {index} out of range"
            )));
        }
        self.fields.insert(index, field);
        Ok(self)
    }

    /// Remove every field with the given tag.
    pub fn remove_field(&mut self, tag: u32) -> &mut Self {
        self.fields.retain(|f| f.tag() != tag);
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.fields.clear();
        self
    }

    /// Detach the record from its database, keeping the fields.
    pub fn reset(&mut self) -> &mut Self {
        self.mfn = 0;
        self.version = 0;
        self.status = RecordStatus::empty();
        self.database = None;
        self
    }

    pub fn first(&self, tag: u32) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag() == tag)
    }

    pub fn first_mut(&mut self, tag: u32) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.tag() == tag)
    }

    pub fn all(&self, tag: u32) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.tag() == tag)
    }

    pub fn has_field(&self, tag: u32) -> bool {
        self.first(tag).is_some()
    }

    /// Distinct tags in order of first appearance.
    pub fn keys(&self) -> Vec<u32> {
        let mut seen = Vec::new();
        for field in &self.fields {
            if !seen.contains(&field.tag()) {
                seen.push(field.tag());
            }
        }
        seen
    }

    /// Text of the first field with `tag`: the subfield `code` when given,
    /// otherwise the bare value.
    pub fn fm(&self, tag: u32, code: Option<char>) -> Option<&str> {
        let field = self.first(tag)?;
        match code {
            Some(code) => field.first_value(code),
            None => field.value(),
        }
    }

    /// Like [`Record::fm`] for every field with `tag`, skipping empty results.
    pub fn fma(&self, tag: u32, code: Option<char>) -> Vec<&str> {
        self.all(tag)
            .filter_map(|field| match code {
                Some(code) => field.first_value(code),
                None => field.value(),
            })
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Set the bare value of the first field with `tag`. An empty value
    /// removes that field.
    pub fn set_field(&mut self, tag: u32, value: Option<&str>) -> Result<&mut Self> {
        match value {
            Some(value) if !value.is_empty() => match self.first_mut(tag) {
                Some(field) => field.set_value(Some(value.to_string()))?,
                None => {
                    self.add(tag, value)?;
                }
            },
            _ => {
                if let Some(index) = self.fields.iter().position(|f| f.tag() == tag) {
                    self.fields.remove(index);
                }
            }
        }
        Ok(self)
    }

    /// Set a subfield of the first field with `tag`, creating the field when
    /// a value is given and none exists.
    pub fn set_subfield(&mut self, tag: u32, code: char, value: Option<&str>) -> Result<&mut Self> {
        let wanted = value.is_some_and(|v| !v.is_empty());
        if wanted && !self.has_field(tag) {
            self.push(Field::new(tag)?);
        }
        if let Some(field) = self.first_mut(tag) {
            field.set_subfield(code, value)?;
        }
        Ok(self)
    }

    pub fn is_deleted(&self) -> bool {
        self.status.intersects(RecordStatus::DELETED)
    }

    /// Wire lines of the record.
    pub fn encode(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        lines.push(format!("{}#{}", self.mfn, self.status.bits()));
        lines.push(format!("0#{}", self.version));
        lines.extend(self.fields.iter().map(Field::to_string));
        lines
    }

    /// Replace MFN, status, version and fields from wire lines.
    pub fn parse<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        let (first, rest) = lines
            .split_first()
            .ok_or_else(|| IrbisError::malformed("record text is empty"))?;

        let mut parts = first.as_ref().split('#');
        let mfn = parse_number(parts.next(), "mfn")?;
        let status = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(status) => parse_number(Some(status), "status")?,
            None => 0,
        };

        let (second, fields) = rest
            .split_first()
            .ok_or_else(|| IrbisError::malformed("record version line is missing"))?;
        let version = match second.as_ref().split('#').nth(1) {
            Some(version) => parse_number(Some(version), "version")?,
            None => 0,
        };

        let fields = fields
            .iter()
            .map(|line| line.as_ref())
            .filter(|line| !line.trim().is_empty())
            .map(Field::parse)
            .collect::<Result<Vec<_>>>()?;

        self.mfn = mfn;
        self.status = RecordStatus::from_bits_retain(status);
        self.version = version;
        self.fields = fields;
        Ok(())
    }
}

fn parse_number(text: Option<&str>, what: &str) -> Result<u32> {
    let text = text.unwrap_or_default().trim();
    text.parse::<u32>()
        .map_err(|_| IrbisError::malformed(format!("bad record {what}: {text:?}")))
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.fields.iter().map(Field::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}
