//! Dictionary browsing: terms and the postings behind them.
use crate::error::{IrbisError, Result};

fn number<T: std::str::FromStr>(text: &str, line: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| IrbisError::malformed(format!("bad number {text:?} in {line:?}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermParameters {
    pub database: Option<String>,
    pub start_term: String,
    pub number_of_terms: u32,
    /// Walk the dictionary backwards from `start_term`.
    pub reverse: bool,
    pub format: Option<String>,
}

impl TermParameters {
    pub fn new(start_term: impl Into<String>) -> Self {
        Self {
            database: None,
            start_term: start_term.into(),
            number_of_terms: 10,
            reverse: false,
            format: None,
        }
    }
}

/// Dictionary entry with the number of its postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermInfo {
    pub count: u32,
    pub text: String,
}

impl TermInfo {
    /// Parse `count#text`.
    pub fn parse(line: &str) -> Result<Self> {
        let (count, text) = line
            .split_once('#')
            .ok_or_else(|| IrbisError::malformed(format!("bad term line {line:?}")))?;
        Ok(Self {
            count: number(count, line)?,
            text: text.to_string(),
        })
    }

    /// Parse every non-blank line.
    pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Self>> {
        lines
            .iter()
            .map(|line| line.as_ref())
            .filter(|line| !line.is_empty())
            .map(Self::parse)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingParameters {
    pub database: Option<String>,
    pub first_posting: u32,
    pub number_of_postings: u32,
    pub format: Option<String>,
    pub terms: Vec<String>,
}

impl PostingParameters {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            database: None,
            first_posting: 1,
            number_of_postings: 0,
            format: None,
            terms: vec![term.into()],
        }
    }
}

/// Occurrence of a term in a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermPosting {
    pub mfn: u32,
    pub tag: u32,
    pub occurrence: u32,
    pub count: u32,
    /// Formatted text, when the request carried a format.
    pub text: String,
}

impl TermPosting {
    /// Parse `mfn#tag#occurrence#count#text`.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.splitn(5, '#').collect();
        if parts.len() < 4 {
            return Err(IrbisError::malformed(format!("bad posting line {line:?}")));
        }
        Ok(Self {
            mfn: number(parts[0], line)?,
            tag: number(parts[1], line)?,
            occurrence: number(parts[2], line)?,
            count: number(parts[3], line)?,
            text: parts.get(4).copied().unwrap_or_default().to_string(),
        })
    }

    pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Self>> {
        lines
            .iter()
            .map(|line| line.as_ref())
            .filter(|line| !line.is_empty())
            .map(Self::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_lines() {
        let terms = TermInfo::parse_lines(&["12#K=ALGEBRA", "", "3#K=ALG#1"]).unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].count, 12);
        assert_eq!(terms[1].text, "K=ALG#1");

        assert!(TermInfo::parse("no count").is_err());
    }

    #[test]
    fn posting_lines() {
        let posting = TermPosting::parse("15#200#1#3#Algebra").unwrap();
        assert_eq!(
            posting,
            TermPosting {
                mfn: 15,
                tag: 200,
                occurrence: 1,
                count: 3,
                text: "Algebra".to_string()
            }
        );

        let bare = TermPosting::parse("1#2#3#4").unwrap();
        assert!(bare.text.is_empty());
        assert!(TermPosting::parse("1#2").is_err());
    }

    #[test]
    fn parameter_defaults() {
        assert_eq!(TermParameters::new("K=").number_of_terms, 10);
        assert_eq!(PostingParameters::new("K=ALG").first_posting, 1);
    }
}
