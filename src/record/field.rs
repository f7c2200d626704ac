use std::fmt;

use crate::error::{IrbisError, Result};

/// Marker that starts every subfield in the wire form of a field.
pub const SUBFIELD_MARKER: char = '^';

fn check_text(what: &str, text: &str) -> Result<()> {
    if text.contains(SUBFIELD_MARKER) {
        return Err(IrbisError::validation(format!(
            "{what} may not contain '{SUBFIELD_MARKER}'"
        )));
    }
    if text.chars().any(|c| matches!(c, '\r' | '\n' | '\x1E' | '\x1F')) {
        return Err(IrbisError::validation(format!(
            "{what} may not contain line delimiters"
        )));
    }
    Ok(())
}

/// Coded element of a [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubField {
    code: char,
    value: String,
}

impl SubField {
    pub fn new(code: char, value: impl Into<String>) -> Result<Self> {
        if code == SUBFIELD_MARKER || code == '#' || code.is_control() {
            return Err(IrbisError::validation(format!(
                "invalid subfield code {code:?}"
            )));
        }
        let value = value.into();
        check_text("subfield value", &value)?;
        Ok(Self { code, value })
    }

    pub fn code(&self) -> char {
        self.code
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        check_text("subfield value", &value)?;
        self.value = value;
        Ok(())
    }

    fn matches(&self, code: char) -> bool {
        self.code.eq_ignore_ascii_case(&code)
    }
}

impl fmt::Display for SubField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SUBFIELD_MARKER}{}{}", self.code, self.value)
    }
}

/// Tagged field of a record: optional text before the first subfield
/// followed by any number of subfields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    tag: u32,
    value: Option<String>,
    subfields: Vec<SubField>,
}

impl Field {
    pub fn new(tag: u32) -> Result<Self> {
        if tag == 0 {
            return Err(IrbisError::validation("field tag must be positive"));
        }
        Ok(Self {
            tag,
            value: None,
            subfields: Vec::new(),
        })
    }

    /// Field with a bare value. An empty value leaves the field without one.
    pub fn with_value(tag: u32, value: impl Into<String>) -> Result<Self> {
        let mut field = Field::new(tag)?;
        field.set_value(Some(value.into()))?;
        Ok(field)
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: Option<String>) -> Result<()> {
        match value {
            Some(value) if !value.is_empty() => {
                check_text("field value", &value)?;
                self.value = Some(value);
            }
            _ => self.value = None,
        }
        Ok(())
    }

    pub fn subfields(&self) -> &[SubField] {
        &self.subfields
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.subfields.is_empty()
    }

    /// Append a subfield.
    pub fn add(&mut self, code: char, value: impl Into<String>) -> Result<&mut Self> {
        self.subfields.push(SubField::new(code, value)?);
        Ok(self)
    }

    pub fn push(&mut self, subfield: SubField) -> &mut Self {
        self.subfields.push(subfield);
        self
    }

    /// Remove every subfield with the given code.
    pub fn remove_subfield(&mut self, code: char) -> &mut Self {
        self.subfields.retain(|sf| !sf.matches(code));
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.value = None;
        self.subfields.clear();
        self
    }

    /// First subfield with the given code. Codes compare case-insensitively.
    pub fn first(&self, code: char) -> Option<&SubField> {
        self.subfields.iter().find(|sf| sf.matches(code))
    }

    pub fn first_mut(&mut self, code: char) -> Option<&mut SubField> {
        self.subfields.iter_mut().find(|sf| sf.matches(code))
    }

    pub fn first_value(&self, code: char) -> Option<&str> {
        self.first(code).map(SubField::value)
    }

    pub fn first_value_or<'a>(&'a self, code: char, default: &'a str) -> &'a str {
        self.first_value(code).unwrap_or(default)
    }

    pub fn all(&self, code: char) -> impl Iterator<Item = &SubField> {
        self.subfields.iter().filter(move |sf| sf.matches(code))
    }

    /// Set the first subfield with `code`, adding it when missing. `None`
    /// or an empty value removes it instead.
    pub fn set_subfield(&mut self, code: char, value: Option<&str>) -> Result<&mut Self> {
        match value {
            Some(value) if !value.is_empty() => match self.first_mut(code) {
                Some(subfield) => subfield.set_value(value)?,
                None => {
                    self.add(code, value)?;
                }
            },
            _ => {
                if let Some(index) = self.subfields.iter().position(|sf| sf.matches(code)) {
                    self.subfields.remove(index);
                }
            }
        }
        Ok(self)
    }

    /// Parse the wire form `tag#value^acode...`.
    pub fn parse(line: &str) -> Result<Self> {
        let (tag, body) = line
            .split_once('#')
            .ok_or_else(|| IrbisError::malformed(format!("field without tag: {line:?}")))?;
        let tag = tag
            .trim()
            .parse::<u32>()
            .map_err(|_| IrbisError::malformed(format!("bad field tag in {line:?}")))?;
        let mut field = Field::new(tag).map_err(|_| IrbisError::malformed("zero field tag"))?;

        let mut parts = body.split(SUBFIELD_MARKER);
        if let Some(value) = parts.next().filter(|v| !v.is_empty()) {
            field.value = Some(value.to_string());
        }
        for part in parts {
            let mut chars = part.chars();
            if let Some(code) = chars.next() {
                field.subfields.push(SubField {
                    code,
                    value: chars.as_str().to_string(),
                });
            }
        }
        Ok(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tag, self.value.as_deref().unwrap_or_default())?;
        for subfield in &self.subfields {
            write!(f, "{subfield}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_to_wire() {
        let mut field = Field::with_value(200, "Title").unwrap();
        field.add('a', "Sub").unwrap().add('e', "more").unwrap();

        assert_eq!(field.to_string(), "200#Title^aSub^emore");
    }

    #[test]
    fn parse_field_with_value_and_subfields() {
        let field = Field::parse("700#^aИванов^bИ. И.").unwrap();

        assert_eq!(field.tag(), 700);
        assert_eq!(field.value(), None);
        assert_eq!(field.first_value('A'), Some("Иванов"));
        assert_eq!(field.first_value('b'), Some("И. И."));
        assert_eq!(field.first_value_or('z', "none"), "none");
    }

    #[test]
    fn parse_bare_value_only() {
        let field = Field::parse("920#PAZK").unwrap();
        assert_eq!(field.value(), Some("PAZK"));
        assert!(field.subfields().is_empty());
    }

    #[test]
    fn parse_rejects_missing_tag() {
        assert!(matches!(Field::parse("no tag"), Err(IrbisError::Malformed(_))));
        assert!(matches!(Field::parse("0#x"), Err(IrbisError::Malformed(_))));
    }

    #[test]
    fn repeated_subfields_are_kept_in_order() {
        let field = Field::parse("10#^a1^b2^a3").unwrap();
        let values: Vec<&str> = field.all('a').map(SubField::value).collect();
        assert_eq!(values, vec!["1", "3"]);
        assert_eq!(field.to_string(), "10#^a1^b2^a3");
    }

    #[test]
    fn set_and_remove_subfield() {
        let mut field = Field::new(10).unwrap();
        field.set_subfield('a', Some("one")).unwrap();
        field.set_subfield('a', Some("two")).unwrap();
        assert_eq!(field.to_string(), "10#^atwo");

        field.set_subfield('a', None).unwrap();
        assert!(field.is_empty());
    }

    #[test]
    fn rejects_values_that_break_wire_form() {
        assert!(Field::new(0).is_err());
        assert!(Field::with_value(1, "a^b").is_err());
        assert!(SubField::new('^', "x").is_err());
        assert!(SubField::new('a', "line\nbreak").is_err());
    }

    #[test]
    fn empty_bare_value_is_absent() {
        let field = Field::with_value(5, "").unwrap();
        assert_eq!(field.value(), None);
        assert_eq!(field, Field::parse(&field.to_string()).unwrap());
    }
}
