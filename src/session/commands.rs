//! Commands as sans-IO values.
//!
//! A [`Command`] builds its query from the session state and decodes the
//! server answer back into a typed result. It never touches the network,
//! so both connection flavours drive the very same encode and decode code.
use std::{
    borrow::{Borrow, BorrowMut},
    iter,
};

use log::debug;

use crate::{
    encoding::{ALT_DELIMITER, IRBIS_DELIMITER, SHORT_DELIMITER, irbis_to_dos, irbis_to_lines},
    error::{IrbisError, Result},
    info::{DatabaseInfo, ServerVersion},
    protocol::{
        ALL_FORMAT, MAX_POSTINGS, Query, Response,
        codes::{CLIENT_ALREADY_EXISTS, CommandFamily},
        command,
    },
    record::{Record, RecordStatus},
    search::{FoundLine, SearchParameters},
    specification::FileSpecification,
    terms::{PostingParameters, TermInfo, TermParameters, TermPosting},
};

use super::{ServerIni, SessionState, TextFileParser};

pub trait Command {
    type Output;

    /// Build the request. Errors here happen before any I/O.
    fn build(&self, state: &mut SessionState) -> Result<Query>;

    fn decode(self, state: &mut SessionState, response: Response) -> Result<Self::Output>;
}

/// Command whose arguments are plain ANSI lines and whose answer is just a
/// return code.
#[derive(Debug, Clone)]
pub struct Simple {
    code: &'static str,
    lines: Vec<String>,
    checked: bool,
}

impl Simple {
    pub fn new(code: &'static str) -> Self {
        Self {
            code,
            lines: Vec::new(),
            checked: true,
        }
    }

    pub fn line(mut self, line: impl ToString) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Ignore the return code.
    pub fn unchecked(mut self) -> Self {
        self.checked = false;
        self
    }
}

impl Command for Simple {
    type Output = i32;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(self.code)?;
        for line in &self.lines {
            query.ansi(line);
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<i32> {
        if self.checked {
            response.check_return_code(&[])
        } else {
            Ok(response.return_code().unwrap_or_default())
        }
    }
}

/// Outcome of one registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// Another client holds the id; pick a new one and try again.
    ClientIdTaken,
}

#[derive(Debug, Clone, Copy)]
pub struct Register;

impl Command for Register {
    type Output = Registration;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::REGISTER_CLIENT)?;
        query
            .ansi(&state.settings().username)
            .ansi(&state.settings().password);
        Ok(query)
    }

    fn decode(self, state: &mut SessionState, mut response: Response) -> Result<Registration> {
        if response.return_code()? == CLIENT_ALREADY_EXISTS {
            return Ok(Registration::ClientIdTaken);
        }
        response.check_return_code(&[])?;

        let version = response.server_version().to_string();
        let text = response.ansi_remaining_text();
        let lines = irbis_to_lines(&text)
            .into_iter()
            .next()
            .unwrap_or_default()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect();
        state.finish_registration(version, ServerIni::from_lines(lines)?);
        Ok(Registration::Registered)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Unregister;

impl Command for Unregister {
    type Output = ();

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::UNREGISTER_CLIENT)?;
        query.ansi(&state.settings().username);
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, _response: Response) -> Result<()> {
        Ok(())
    }
}

fn decode_record(database: &str, mfn: u32, lines: &[String]) -> Result<Record> {
    let mut record = Record::new();
    record.database = Some(database.to_string());
    if lines.iter().all(|line| line.trim().is_empty()) {
        record.mfn = mfn;
        record.status = RecordStatus::ABSENT;
    } else {
        record.parse(lines)?;
    }
    Ok(record)
}

#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub database: String,
    pub mfn: u32,
    /// Read this version instead of the current one.
    pub version: Option<u32>,
}

impl Command for ReadRecord {
    type Output = Record;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        if self.mfn == 0 {
            return Err(IrbisError::validation("MFN must be positive"));
        }
        let mut query = state.new_query(command::READ_RECORD)?;
        query.ansi(&self.database).add(self.mfn);
        if let Some(version) = self.version {
            query.add(version);
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Record> {
        response.check_return_code(CommandFamily::ReadRecord.accepted())?;
        decode_record(&self.database, self.mfn, &response.utf_remaining_lines())
    }
}

/// Flags of a record save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Keep the record locked after saving.
    pub lock: bool,
    pub actualize: bool,
    /// Refresh the record from the server's answer.
    pub parse_back: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            lock: false,
            actualize: true,
            parse_back: true,
        }
    }
}

/// Save one record, borrowed or owned. Answers with the new max MFN of
/// the database.
#[derive(Debug)]
pub struct WriteRecord<R> {
    pub record: R,
    pub database: String,
    pub options: WriteOptions,
}

impl<R: BorrowMut<Record>> Command for WriteRecord<R> {
    type Output = u32;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let record: &Record = self.record.borrow();
        if record.is_empty() {
            return Err(IrbisError::validation("cannot save a record without fields"));
        }
        let mut query = state.new_query(command::UPDATE_RECORD)?;
        query
            .ansi(&self.database)
            .add(u8::from(self.options.lock))
            .add(u8::from(self.options.actualize))
            .utf(&record.encode().join(IRBIS_DELIMITER));
        Ok(query)
    }

    fn decode(mut self, _state: &mut SessionState, mut response: Response) -> Result<u32> {
        let max_mfn = response.check_return_code(&[])?;
        let record: &mut Record = self.record.borrow_mut();
        if self.options.parse_back {
            let first = response.utf();
            let rest = response.utf();
            let lines: Vec<String> = iter::once(first.as_str())
                .chain(rest.split(SHORT_DELIMITER))
                .map(|line| line.trim_matches(ALT_DELIMITER).to_string())
                .collect();
            record.parse(&lines)?;
        }
        record.database = Some(self.database);
        Ok(u32::try_from(max_mfn).unwrap_or_default())
    }
}

/// Save several records, possibly into different databases, without
/// refreshing them.
#[derive(Debug)]
pub struct WriteRecords<'a> {
    pub records: &'a [Record],
    /// Database of records that name none.
    pub database: String,
}

impl Command for WriteRecords<'_> {
    type Output = ();

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::SAVE_RECORD_GROUP)?;
        query.add(0).add(1);
        for record in self.records {
            let database = record.database.as_deref().unwrap_or(&self.database);
            query.utf(&format!(
                "{database}{IRBIS_DELIMITER}{}",
                record.encode().join(IRBIS_DELIMITER)
            ));
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<()> {
        response.check_return_code(&[])?;
        Ok(())
    }
}

fn require_script(script: &str) -> Result<()> {
    if script.trim().is_empty() {
        return Err(IrbisError::validation("format script is empty"));
    }
    Ok(())
}

/// What to format: a stored record or one built locally.
#[derive(Debug, Clone, Copy)]
pub enum FormatTarget<'a> {
    Mfn(u32),
    Record(&'a Record),
}

#[derive(Debug, Clone)]
pub struct FormatRecord<'a> {
    pub database: String,
    pub script: String,
    pub target: FormatTarget<'a>,
}

impl Command for FormatRecord<'_> {
    type Output = String;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        require_script(&self.script)?;
        let mut query = state.new_query(command::FORMAT_RECORD)?;
        query.ansi(&self.database).format(Some(&self.script));
        match self.target {
            FormatTarget::Mfn(mfn) => query.add(1).add(mfn),
            FormatTarget::Record(record) => query.add(-2).utf(&record.encode().join(IRBIS_DELIMITER)),
        };
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<String> {
        response.check_return_code(&[])?;
        let text = response.utf_remaining_text();
        Ok(text.trim_matches(['\r', '\n']).to_string())
    }
}

/// Format lines with their `mfn#` prefix removed.
fn formatted_lines(response: &mut Response) -> Vec<String> {
    response
        .utf_remaining_lines()
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('#') {
            Some((_, text)) => text.to_string(),
            None => line,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FormatRecords {
    pub database: String,
    pub script: String,
    pub mfns: Vec<u32>,
}

impl Command for FormatRecords {
    type Output = Vec<String>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        if self.mfns.len() > MAX_POSTINGS {
            return Err(IrbisError::validation(format!(
                "cannot format {} records at once, the limit is {MAX_POSTINGS}",
                self.mfns.len()
            )));
        }
        require_script(&self.script)?;

        let mut query = state.new_query(command::FORMAT_RECORD)?;
        query
            .ansi(&self.database)
            .format(Some(&self.script))
            .add(self.mfns.len());
        for mfn in &self.mfns {
            query.add(mfn);
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<String>> {
        response.check_return_code(&[])?;
        Ok(formatted_lines(&mut response)
            .iter()
            .map(|line| irbis_to_dos(line))
            .collect())
    }
}

/// Read several records in one round trip through the full-record format.
#[derive(Debug, Clone)]
pub struct ReadRecords {
    inner: FormatRecords,
}

impl ReadRecords {
    pub fn new(database: String, mfns: Vec<u32>) -> Self {
        Self {
            inner: FormatRecords {
                database,
                script: ALL_FORMAT.to_string(),
                mfns,
            },
        }
    }
}

impl Command for ReadRecords {
    type Output = Vec<Record>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        self.inner.build(state)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<Record>> {
        response.check_return_code(&[])?;

        let mut records = Vec::new();
        for line in formatted_lines(&mut response) {
            let parts: Vec<&str> = line
                .split(SHORT_DELIMITER)
                .skip(1)
                .map(|part| part.trim_matches(ALT_DELIMITER))
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                continue;
            }
            let mut record = Record::new();
            record.parse(&parts)?;
            record.database = Some(self.inner.database.clone());
            records.push(record);
        }
        Ok(records)
    }
}

#[derive(Debug, Clone)]
pub struct Search {
    pub database: String,
    pub parameters: SearchParameters,
}

impl Command for Search {
    type Output = Vec<FoundLine>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let params = &self.parameters;
        let mut query = state.new_query(command::SEARCH)?;
        query
            .ansi(&self.database)
            .utf(&params.expression)
            .add(params.number_of_records)
            .add(params.first_record)
            .format(params.format.as_deref())
            .add(params.min_mfn)
            .add(params.max_mfn)
            .ansi(params.sequential.as_deref().unwrap_or_default());
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<FoundLine>> {
        response.check_return_code(&[])?;
        let found = response.number()?;
        debug!("search {:?} found {found} records", self.parameters.expression);

        response
            .utf_remaining_lines()
            .iter()
            .filter(|line| !line.is_empty())
            .map(|line| FoundLine::parse(line))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SearchCount {
    pub database: String,
    pub expression: String,
}

impl Command for SearchCount {
    type Output = u32;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::SEARCH)?;
        query.ansi(&self.database).utf(&self.expression).add(0).add(0);
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<u32> {
        response.check_return_code(&[])?;
        Ok(u32::try_from(response.number()?).unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct ReadTerms {
    pub database: String,
    pub parameters: TermParameters,
}

impl Command for ReadTerms {
    type Output = Vec<TermInfo>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let params = &self.parameters;
        let code = if params.reverse {
            command::READ_TERMS_REVERSE
        } else {
            command::READ_TERMS
        };
        let mut query = state.new_query(code)?;
        query
            .ansi(&self.database)
            .utf(&params.start_term)
            .add(params.number_of_terms)
            .format(params.format.as_deref());
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<TermInfo>> {
        response.check_return_code(CommandFamily::ReadTerms.accepted())?;
        TermInfo::parse_lines(&response.utf_remaining_lines())
    }
}

#[derive(Debug, Clone)]
pub struct ReadPostings {
    pub database: String,
    pub parameters: PostingParameters,
}

impl Command for ReadPostings {
    type Output = Vec<TermPosting>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let params = &self.parameters;
        if params.terms.is_empty() {
            return Err(IrbisError::validation("no terms to read postings for"));
        }
        let mut query = state.new_query(command::READ_POSTINGS)?;
        query
            .ansi(&self.database)
            .add(params.number_of_postings)
            .add(params.first_posting)
            .format(params.format.as_deref());
        for term in &params.terms {
            query.utf(term);
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<TermPosting>> {
        response.check_return_code(CommandFamily::ReadTerms.accepted())?;
        TermPosting::parse_lines(&response.utf_remaining_lines())
    }
}

/// Postings of one record for terms starting with a prefix.
#[derive(Debug, Clone)]
pub struct ReadRecordPostings {
    pub database: String,
    pub mfn: u32,
    pub prefix: String,
}

impl Command for ReadRecordPostings {
    type Output = Vec<TermPosting>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        if self.mfn == 0 {
            return Err(IrbisError::validation("MFN must be positive"));
        }
        let mut query = state.new_query(command::READ_RECORD_POSTINGS)?;
        query.ansi(&self.database).add(self.mfn).utf(&self.prefix);
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<TermPosting>> {
        response.check_return_code(&[])?;
        TermPosting::parse_lines(&response.utf_remaining_lines())
    }
}

#[derive(Debug, Clone)]
pub struct GetDatabaseInfo {
    pub database: String,
}

impl Command for GetDatabaseInfo {
    type Output = DatabaseInfo;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::RECORD_LIST)?;
        query.ansi(&self.database);
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<DatabaseInfo> {
        response.check_return_code(&[])?;
        DatabaseInfo::parse(&self.database, &mut response)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetServerVersion;

impl Command for GetServerVersion {
    type Output = ServerVersion;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        state.new_query(command::SERVER_INFO)
    }

    fn decode(self, state: &mut SessionState, mut response: Response) -> Result<ServerVersion> {
        response.check_return_code(&[])?;
        let version = ServerVersion::parse(&response.ansi_remaining_lines())?;
        state.remember_server_version(&version.version);
        Ok(version)
    }
}

#[derive(Debug, Clone)]
pub struct ListFiles {
    pub specifications: Vec<FileSpecification>,
}

impl Command for ListFiles {
    type Output = Vec<String>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::LIST_FILES)?;
        for spec in &self.specifications {
            query.ansi(&spec.to_wire_string());
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<Vec<String>> {
        Ok(response
            .ansi_remaining_lines()
            .iter()
            .flat_map(|line| irbis_to_lines(line))
            .filter(|name| !name.is_empty())
            .collect())
    }
}

/// Text file request answered with the raw response, positioned at the
/// file content.
#[derive(Debug, Clone)]
pub struct ReadDocument {
    pub specification: FileSpecification,
}

impl Command for ReadDocument {
    type Output = Response;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::READ_DOCUMENT)?;
        query.ansi(&self.specification.to_wire_string());
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, response: Response) -> Result<Response> {
        Ok(response)
    }
}

/// Binary file content, `None` when the server sent no data marker.
#[derive(Debug, Clone)]
pub struct ReadBinaryFile {
    specification: FileSpecification,
}

impl ReadBinaryFile {
    pub fn new(specification: FileSpecification) -> Self {
        Self {
            specification: specification.binary(),
        }
    }
}

impl Command for ReadBinaryFile {
    type Output = Option<Vec<u8>>;

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        let mut query = state.new_query(command::READ_DOCUMENT)?;
        query.ansi(&self.specification.to_wire_string());
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, response: Response) -> Result<Option<Vec<u8>>> {
        Ok(response.binary_payload().map(<[u8]>::to_vec))
    }
}

#[derive(Debug, Clone)]
pub struct WriteTextFiles {
    pub specifications: Vec<FileSpecification>,
}

impl Command for WriteTextFiles {
    type Output = ();

    fn build(&self, state: &mut SessionState) -> Result<Query> {
        if let Some(spec) = self.specifications.iter().find(|spec| spec.content.is_none()) {
            return Err(IrbisError::validation(format!(
                "no content to write into {}",
                spec.filename
            )));
        }
        let mut query = state.new_query(command::READ_DOCUMENT)?;
        for spec in &self.specifications {
            query.ansi(&spec.to_wire_string());
        }
        Ok(query)
    }

    fn decode(self, _state: &mut SessionState, mut response: Response) -> Result<()> {
        response.check_return_code(&[])?;
        Ok(())
    }
}

/// Flip the logically-deleted bit. Returns whether the record changed.
pub(crate) fn mark_deleted(record: &mut Record, deleted: bool) -> bool {
    if record.status.contains(RecordStatus::LOGICALLY_DELETED) == deleted {
        return false;
    }
    record.status.set(RecordStatus::LOGICALLY_DELETED, deleted);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::testing::answer, settings::ConnectionSettings};

    fn state() -> SessionState {
        let mut state = SessionState::new(ConnectionSettings::new("librarian", "secret"));
        state.set_client_id(123456);
        state
    }

    fn body(query: &Query) -> Vec<String> {
        let packet = query.encode().unwrap();
        let text = String::from_utf8(packet).unwrap();
        let mut lines: Vec<String> = text.split('\n').skip(1).map(str::to_string).collect();
        lines.pop();
        lines.split_off(10)
    }

    fn respond<C: Command>(command: C, state: &mut SessionState, lines: &[&str]) -> Result<C::Output> {
        command.decode(state, Response::new(answer("X", lines)).unwrap())
    }

    #[test]
    fn registration_stores_version_and_ini() {
        let mut state = state();
        let query = Register.build(&mut state).unwrap();
        assert_eq!(body(&query), vec!["librarian", "secret"]);

        let outcome = respond(
            Register,
            &mut state,
            &["0", "30\r\n[MAIN]\r\nSTTFNT=1\x1F\x1Eignored"],
        )
        .unwrap();
        assert_eq!(outcome, Registration::Registered);
        assert!(state.is_connected());
        assert_eq!(state.server_version(), Some("64.2018.1"));
        assert_eq!(state.ini().lines(), ["[MAIN]", "STTFNT=1"]);
    }

    #[test]
    fn registration_collision_is_not_an_error() {
        let mut state = state();
        let outcome = respond(Register, &mut state, &["-3337"]).unwrap();
        assert_eq!(outcome, Registration::ClientIdTaken);
        assert!(!state.is_connected());

        let err = respond(Register, &mut state, &["-4444"]).unwrap_err();
        assert_eq!(err.code(), Some(-4444));
    }

    #[test]
    fn read_record_accepts_informational_codes() {
        let mut state = state();
        let command = ReadRecord {
            database: "IBIS".into(),
            mfn: 5,
            version: None,
        };
        assert_eq!(body(&command.build(&mut state).unwrap()), vec!["IBIS", "5"]);

        let record = respond(command.clone(), &mut state, &["-603", "5#1", "0#3", "200#^aTitle"]).unwrap();
        assert_eq!(record.mfn, 5);
        assert!(record.is_deleted());
        assert_eq!(record.fm(200, Some('a')), Some("Title"));
        assert_eq!(record.database.as_deref(), Some("IBIS"));

        let absent = respond(command.clone(), &mut state, &["-201"]).unwrap();
        assert_eq!(absent.status, RecordStatus::ABSENT);

        let err = respond(command, &mut state, &["-140"]).unwrap_err();
        assert!(matches!(err, IrbisError::Protocol { code: -140 }));
    }

    #[test]
    fn zero_mfn_is_rejected_before_io() {
        let command = ReadRecord {
            database: "IBIS".into(),
            mfn: 0,
            version: None,
        };
        assert!(matches!(command.build(&mut state()), Err(IrbisError::Validation(_))));
    }

    #[test]
    fn write_record_refreshes_in_place() {
        let mut state = state();
        let mut record = Record::new();
        record.add(200, "").unwrap().add('a', "Title").unwrap();

        let command = WriteRecord {
            record: &mut record,
            database: "IBIS".into(),
            options: WriteOptions::default(),
        };
        assert_eq!(
            body(&command.build(&mut state).unwrap()),
            vec!["IBIS", "0", "1", "0#0\x1F\x1E0#0\x1F\x1E200#^aTitle"]
        );

        let max_mfn = respond(
            command,
            &mut state,
            &["43", "42#0", "0#1\x1F\x1E200#^aTitle\x1F\x1E920#PAZK\x1F\x1E"],
        )
        .unwrap();
        assert_eq!(max_mfn, 43);
        assert_eq!(record.mfn, 42);
        assert_eq!(record.version, 1);
        assert_eq!(record.fm(920, None), Some("PAZK"));
    }

    #[test]
    fn write_records_prefixes_database() {
        let mut state = state();
        let mut one = Record::new();
        one.add(920, "PAZK").unwrap();
        let mut two = one.clone();
        two.database = Some("RDR".into());

        let records = [one, two];
        let command = WriteRecords {
            records: &records,
            database: "IBIS".into(),
        };
        let lines = body(&command.build(&mut state).unwrap());
        assert_eq!(lines[..2], ["0", "1"]);
        assert!(lines[2].starts_with("IBIS\x1F\x1E0#0"));
        assert!(lines[3].starts_with("RDR\x1F\x1E"));
    }

    #[test]
    fn format_records_bound_and_output() {
        let mut state = state();
        let too_many = FormatRecords {
            database: "IBIS".into(),
            script: "@brief".into(),
            mfns: vec![1; MAX_POSTINGS + 1],
        };
        assert!(matches!(too_many.build(&mut state), Err(IrbisError::Validation(_))));
        assert_eq!(state.query_id(), 0);

        let command = FormatRecords {
            database: "IBIS".into(),
            script: "@brief".into(),
            mfns: vec![1, 2],
        };
        assert_eq!(body(&command.build(&mut state).unwrap()), vec!["IBIS", "@brief", "2", "1", "2"]);

        let texts = respond(command, &mut state, &["0", "1#First\x1F\x1Eline", "2#Second"]).unwrap();
        assert_eq!(texts, vec!["First\r\nline", "Second"]);
    }

    #[test]
    fn format_single_record_object() {
        let mut state = state();
        let mut record = Record::new();
        record.add(200, "Title").unwrap();
        let command = FormatRecord {
            database: "IBIS".into(),
            script: "v200".into(),
            target: FormatTarget::Record(&record),
        };
        assert_eq!(
            body(&command.build(&mut state).unwrap()),
            vec!["IBIS", "!v200", "-2", "0#0\x1F\x1E0#0\x1F\x1E200#Title"]
        );
        assert_eq!(respond(command, &mut state, &["0", "Title", ""]).unwrap(), "Title");

        let empty = FormatRecord {
            database: "IBIS".into(),
            script: " ".into(),
            target: FormatTarget::Mfn(1),
        };
        assert!(empty.build(&mut state).is_err());
    }

    #[test]
    fn read_records_splits_full_format() {
        let mut state = state();
        let command = ReadRecords::new("IBIS".into(), vec![1, 2]);
        assert_eq!(body(&command.build(&mut state).unwrap())[1], "!&uf('+0')");

        let records = respond(
            command,
            &mut state,
            &[
                "0",
                "1#0\x1E1#0\x1F\x1E0#1\x1F\x1E200#^aOne\x1F\x1E",
                "2#0\x1E2#0\x1F\x1E0#1\x1F\x1E200#^aTwo\x1F\x1E",
            ],
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].mfn, 2);
        assert_eq!(records[1].fm(200, Some('a')), Some("Two"));
    }

    #[test]
    fn search_lines() {
        let mut state = state();
        let command = Search {
            database: "IBIS".into(),
            parameters: SearchParameters::new("K=ALG$"),
        };
        assert_eq!(
            body(&command.build(&mut state).unwrap()),
            vec!["IBIS", "K=ALG$", "0", "1", "", "0", "0", ""]
        );

        let found = respond(command, &mut state, &["0", "2", "10", "12#desc"]).unwrap();
        assert_eq!(found.iter().map(|f| f.mfn).collect::<Vec<_>>(), vec![10, 12]);
        assert_eq!(found[1].description.as_deref(), Some("desc"));
    }

    #[test]
    fn terms_tolerate_dictionary_edges() {
        let mut state = state();
        let mut params = TermParameters::new("K=");
        params.reverse = true;
        let command = ReadTerms {
            database: "IBIS".into(),
            parameters: params,
        };
        assert_eq!(command.build(&mut state).unwrap().command(), "P");

        let terms = respond(command, &mut state, &["-204", "3#K=A"]).unwrap();
        assert_eq!(terms[0].text, "K=A");
    }

    #[test]
    fn postings_need_terms() {
        let mut params = PostingParameters::new("K=A");
        params.terms.clear();
        let command = ReadPostings {
            database: "IBIS".into(),
            parameters: params,
        };
        assert!(command.build(&mut state()).is_err());
    }

    #[test]
    fn server_version_is_remembered() {
        let mut state = state();
        let version = respond(GetServerVersion, &mut state, &["0", "Library", "64.2018.1", "1", "10"]).unwrap();
        assert_eq!(version.max_clients, 10);
        assert_eq!(state.server_version(), Some("64.2018.1"));
    }

    #[test]
    fn list_files_flattens_delimited_names() {
        let mut state = state();
        let command = ListFiles {
            specifications: vec![FileSpecification::near_master("IBIS", "*.pft")],
        };
        assert_eq!(body(&command.build(&mut state).unwrap()), vec!["2.IBIS.*.pft"]);

        let names = respond(command, &mut state, &["brief.pft\x1F\x1Eitems.pft", "", "order.pft"]).unwrap();
        assert_eq!(names, vec!["brief.pft", "items.pft", "order.pft"]);
    }

    #[test]
    fn write_text_needs_content() {
        let command = WriteTextFiles {
            specifications: vec![FileSpecification::near_master("IBIS", "x.pft")],
        };
        assert!(matches!(command.build(&mut state()), Err(IrbisError::Validation(_))));
    }

    #[test]
    fn simple_commands() {
        let mut state = state();
        let command = Simple::new(command::UNLOCK_RECORDS).line("IBIS").line(3).line(4);
        assert_eq!(body(&command.build(&mut state).unwrap()), vec!["IBIS", "3", "4"]);
        assert!(respond(command, &mut state, &["-602"]).is_err());

        let forget = Simple::new(command::UPDATE_INI_FILE).line("[MAIN]").unchecked();
        assert_eq!(respond(forget, &mut state, &["-1"]).unwrap(), -1);
    }

    #[test]
    fn deleted_bit_only() {
        let mut record = Record::new();
        record.status = RecordStatus::LAST_VERSION;

        assert!(mark_deleted(&mut record, true));
        assert_eq!(record.status, RecordStatus::LAST_VERSION | RecordStatus::LOGICALLY_DELETED);
        assert!(!mark_deleted(&mut record, true));
        assert!(mark_deleted(&mut record, false));
        assert_eq!(record.status, RecordStatus::LAST_VERSION);
    }
}
