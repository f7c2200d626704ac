use std::fmt::Display;

use crate::{
    encoding::{IRBIS_DELIMITER, encode_ansi, find_unmappable},
    error::{IrbisError, Result},
};

/// Encoding a query line was appended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEncoding {
    Ansi,
    Utf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    encoding: LineEncoding,
    bytes: Vec<u8>,
}

/// Session values every query starts with.
#[derive(Debug, Clone, Copy)]
pub struct QueryHeader<'a> {
    pub command: &'a str,
    pub workstation: &'a str,
    pub client_id: u32,
    pub query_id: u32,
    pub username: &'a str,
    pub password: &'a str,
}

/// Request under construction.
///
/// Lines are appended in order, each in the encoding the command expects,
/// and become a packet only through [`Query::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    command: String,
    segments: Vec<Segment>,
    /// First character an ANSI line could not carry.
    unmappable: Option<char>,
}

impl Query {
    pub fn new(header: &QueryHeader<'_>) -> Result<Self> {
        if header.command.is_empty() {
            return Err(IrbisError::validation("query without command code"));
        }
        if header.workstation.is_empty() {
            return Err(IrbisError::validation("query without workstation"));
        }

        let mut query = Self {
            command: header.command.to_string(),
            segments: Vec::new(),
            unmappable: None,
        };
        query
            .ansi(header.command)
            .ansi(header.workstation)
            .ansi(header.command)
            .add(header.client_id)
            .add(header.query_id)
            .ansi(header.password)
            .ansi(header.username)
            .new_line()
            .new_line()
            .new_line();
        Ok(query)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Append a Windows-1251 line.
    pub fn ansi(&mut self, text: &str) -> &mut Self {
        if self.unmappable.is_none() {
            self.unmappable = find_unmappable(text);
        }
        self.push(LineEncoding::Ansi, encode_ansi(text))
    }

    /// Append a UTF-8 line.
    pub fn utf(&mut self, text: &str) -> &mut Self {
        self.push(LineEncoding::Utf, text.as_bytes().to_vec())
    }

    /// Append a number as its decimal text.
    pub fn add(&mut self, number: impl Display) -> &mut Self {
        self.ansi(&number.to_string())
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.push(LineEncoding::Ansi, Vec::new())
    }

    /// Append a format script. `@name` references a server-side file and
    /// goes as ANSI; inline scripts go as UTF-8 behind a `!` marker.
    pub fn format(&mut self, script: Option<&str>) -> &mut Self {
        let Some(script) = script.filter(|s| !s.is_empty()) else {
            return self.new_line();
        };

        let prepared = prepare_format(script);
        if script.starts_with('@') {
            self.ansi(&prepared)
        } else if script.starts_with('!') {
            self.utf(&prepared)
        } else {
            self.utf(&format!("!{prepared}"))
        }
    }

    /// Encodings of the appended lines, preamble included.
    pub fn encodings(&self) -> Vec<LineEncoding> {
        self.segments.iter().map(|s| s.encoding).collect()
    }

    /// Final packet: body length in ASCII decimal, `\n`, then the body.
    /// Fails when an ANSI line holds a character Windows-1251 lacks.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if let Some(ch) = self.unmappable {
            return Err(IrbisError::validation(format!(
                "{ch:?} cannot be sent in a Windows-1251 line of command {:?}",
                self.command
            )));
        }
        let length: usize = self.segments.iter().map(|s| s.bytes.len() + 1).sum();
        let prefix = format!("{length}\n");

        let mut packet = Vec::with_capacity(prefix.len() + length);
        packet.extend_from_slice(prefix.as_bytes());
        for segment in &self.segments {
            packet.extend_from_slice(&segment.bytes);
            packet.push(b'\n');
        }
        Ok(packet)
    }

    fn push(&mut self, encoding: LineEncoding, bytes: Vec<u8>) -> &mut Self {
        self.segments.push(Segment { encoding, bytes });
        self
    }
}

/// Strip `/*` comments (outside quoted literals) up to the end of their
/// line, fold line breaks into [`IRBIS_DELIMITER`] and drop any other
/// control characters, so the script fits on one protocol line.
pub(crate) fn prepare_format(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), _) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '\'' | '"' | '|') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '/') if chars.peek() == Some(&'*') => {
                while chars.peek().is_some_and(|&n| n != '\r' && n != '\n') {
                    chars.next();
                }
            }
            (_, '\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(IRBIS_DELIMITER);
            }
            (_, '\n') => out.push_str(IRBIS_DELIMITER),
            (_, c) if c.is_control() => {}
            (_, c) => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(command: &str) -> QueryHeader<'_> {
        QueryHeader {
            command,
            workstation: "C",
            client_id: 123456,
            query_id: 1,
            username: "librarian",
            password: "secret",
        }
    }

    #[test]
    fn preamble_layout() {
        let query = Query::new(&header("A")).unwrap();
        let packet = query.encode().unwrap();

        let body = "A\nC\nA\n123456\n1\nsecret\nlibrarian\n\n\n\n";
        assert_eq!(packet, format!("{}\n{body}", body.len()).into_bytes());
    }

    #[test]
    fn length_prefix_counts_encoded_bytes() {
        let mut query = Query::new(&header("K")).unwrap();
        query.ansi("Ёж").utf("Ёж");
        let packet = query.encode().unwrap();

        let newline = packet.iter().position(|&b| b == b'\n').unwrap();
        let declared: usize = std::str::from_utf8(&packet[..newline]).unwrap().parse().unwrap();
        assert_eq!(declared, packet.len() - newline - 1);
        assert!(packet.ends_with(&[0xA8, 0xE6, b'\n', 0xD0, 0x81, 0xD0, 0xB6, b'\n']));
    }

    #[test]
    fn numbers_and_encodings_are_tracked() {
        let mut query = Query::new(&header("C")).unwrap();
        query.ansi("IBIS").add(-2).utf("x");

        let encodings = query.encodings();
        assert_eq!(encodings.len(), 13);
        assert_eq!(encodings[12], LineEncoding::Utf);
        assert!(query.encode().unwrap().ends_with(b"IBIS\n-2\nx\n"));
    }

    #[test]
    fn characters_outside_cp1251_are_refused() {
        let mut query = Query::new(&header("C")).unwrap();
        query.utf("Müller").ansi("IBIS");
        assert!(query.encode().is_ok());

        query.ansi("Müller");
        assert!(matches!(query.encode(), Err(IrbisError::Validation(_))));

        let mut foreign = header("A");
        foreign.password = "pässwörd";
        let query = Query::new(&foreign).unwrap();
        assert!(query.encode().is_err());
    }

    #[test]
    fn missing_preamble_values_fail_eagerly() {
        assert!(matches!(Query::new(&header("")), Err(IrbisError::Validation(_))));

        let mut no_workstation = header("A");
        no_workstation.workstation = "";
        assert!(Query::new(&no_workstation).is_err());
    }

    #[test]
    fn format_script_is_one_line() {
        let mut query = Query::new(&header("G")).unwrap();
        query.format(Some("v200^a, /* title\r\n' / 'v200^e"));

        let packet = query.encode().unwrap();
        assert!(packet.ends_with("!v200^a, \x1F\x1E' / 'v200^e\n".as_bytes()));
    }

    #[test]
    fn format_references_and_prefixed_scripts() {
        assert_eq!(prepare_format("'/* kept'"), "'/* kept'");
        assert_eq!(prepare_format("a\tb\nc"), "ab\x1F\x1Ec");

        let mut query = Query::new(&header("G")).unwrap();
        query.format(Some("@brief")).format(Some("!v200")).format(None);
        assert!(query.encode().unwrap().ends_with(b"@brief\n!v200\n\n"));
    }
}
