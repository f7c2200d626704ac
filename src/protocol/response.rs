use log::trace;

use crate::{
    encoding::{decode_ansi, decode_utf},
    error::{IrbisError, Result},
};

use super::BINARY_DATA_MARKER;

/// One fully received server answer with a read cursor.
///
/// The ten preamble lines are consumed on construction; everything after
/// them is read line by line in whichever encoding the command uses.
#[derive(Debug, Clone)]
pub struct Response {
    data: Vec<u8>,
    position: usize,
    command: String,
    client_id: i32,
    query_id: i32,
    answer_size: i32,
    server_version: String,
    return_code: Option<i32>,
}

impl Response {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(IrbisError::malformed("server closed the connection without answering"));
        }

        let mut response = Self {
            data,
            position: 0,
            command: String::new(),
            client_id: 0,
            query_id: 0,
            answer_size: 0,
            server_version: String::new(),
            return_code: None,
        };
        response.initial_parse()?;
        Ok(response)
    }

    fn initial_parse(&mut self) -> Result<()> {
        self.command = self.ansi();
        self.client_id = self.number()?;
        self.query_id = self.number()?;
        // Older servers leave these two empty.
        self.answer_size = self.number().unwrap_or_default();
        self.server_version = self.ansi();
        for _ in 0..5 {
            self.next_line();
        }
        trace!(
            "response to {:?}: client {}, query {}, {} bytes",
            self.command,
            self.client_id,
            self.query_id,
            self.data.len()
        );
        Ok(())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    pub fn query_id(&self) -> i32 {
        self.query_id
    }

    pub fn answer_size(&self) -> i32 {
        self.answer_size
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.data.len()
    }

    fn next_line(&mut self) -> &[u8] {
        let rest = &self.data[self.position..];
        let Some(end) = rest.iter().position(|&b| b == b'\r' || b == b'\n') else {
            self.position = self.data.len();
            return rest;
        };

        let mut consumed = end + 1;
        if rest[end] == b'\r' && rest.get(end + 1) == Some(&b'\n') {
            consumed += 1;
        }
        let start = self.position;
        self.position += consumed;
        &self.data[start..start + end]
    }

    /// Next line as an integer; 0 once the payload is exhausted.
    pub fn number(&mut self) -> Result<i32> {
        let line = self.ansi();
        let line = line.trim();
        if line.is_empty() {
            return Ok(0);
        }
        line.parse()
            .map_err(|_| IrbisError::malformed(format!("expected a number, got {line:?}")))
    }

    pub fn ansi(&mut self) -> String {
        decode_ansi(self.next_line())
    }

    pub fn utf(&mut self) -> String {
        decode_utf(self.next_line())
    }

    pub fn ansi_remaining_text(&mut self) -> String {
        decode_ansi(self.take_rest())
    }

    pub fn utf_remaining_text(&mut self) -> String {
        decode_utf(self.take_rest())
    }

    pub fn ansi_remaining_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while !self.is_exhausted() {
            lines.push(self.ansi());
        }
        lines
    }

    pub fn utf_remaining_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while !self.is_exhausted() {
            lines.push(self.utf());
        }
        lines
    }

    fn take_rest(&mut self) -> &[u8] {
        let start = self.position;
        self.position = self.data.len();
        &self.data[start..]
    }

    /// Return code of the answer, read from the payload on first use.
    pub fn return_code(&mut self) -> Result<i32> {
        if let Some(code) = self.return_code {
            return Ok(code);
        }
        let code = self.number()?;
        self.return_code = Some(code);
        Ok(code)
    }

    /// Fail with [`IrbisError::Protocol`] when the return code is negative
    /// and not listed in `accepted`.
    pub fn check_return_code(&mut self, accepted: &[i32]) -> Result<i32> {
        let code = self.return_code()?;
        if code < 0 && !accepted.contains(&code) {
            return Err(IrbisError::Protocol { code });
        }
        Ok(code)
    }

    pub fn is_success(&mut self, accepted: &[i32]) -> bool {
        self.check_return_code(accepted).is_ok()
    }

    /// Bytes following the binary data marker, if the answer carries one.
    pub fn binary_payload(&self) -> Option<&[u8]> {
        let body = &self.data[self.position..];
        body.windows(BINARY_DATA_MARKER.len())
            .position(|window| window == BINARY_DATA_MARKER)
            .map(|start| &body[start + BINARY_DATA_MARKER.len()..])
    }
}
