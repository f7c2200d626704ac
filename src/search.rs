use crate::error::{IrbisError, Result};

/// Search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParameters {
    /// Database to search; the session's current one when `None`.
    pub database: Option<String>,
    pub expression: String,
    /// Maximum number of MFNs to return, 0 for all of them.
    pub number_of_records: u32,
    pub first_record: u32,
    /// Format applied to every found record.
    pub format: Option<String>,
    pub min_mfn: u32,
    pub max_mfn: u32,
    /// Sequential search expression applied to the direct search result.
    pub sequential: Option<String>,
}

impl SearchParameters {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            database: None,
            expression: String::new(),
            number_of_records: 0,
            first_record: 1,
            format: None,
            min_mfn: 0,
            max_mfn: 0,
            sequential: None,
        }
    }
}

/// One found record with its formatted description, if one was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundLine {
    pub mfn: u32,
    pub description: Option<String>,
}

impl FoundLine {
    /// Parse `mfn` or `mfn#description`.
    pub fn parse(line: &str) -> Result<Self> {
        let (mfn, description) = match line.split_once('#') {
            Some((mfn, description)) => (mfn, Some(description.to_string())),
            None => (line, None),
        };
        let mfn = mfn
            .trim()
            .parse()
            .map_err(|_| IrbisError::malformed(format!("bad found line {line:?}")))?;
        Ok(Self { mfn, description })
    }
}
