use log::debug;

use crate::{
    error::Result,
    info::{DatabaseInfo, ServerVersion},
    protocol::{Query, Response, TcpTransport, Transport},
    record::Record,
    search::{FoundLine, SearchParameters},
    settings::ConnectionSettings,
    specification::{FileRef, FileSpecification},
    terms::{PostingParameters, TermInfo, TermParameters, TermPosting},
};

use super::{
    ServerIni, SessionState, TextFileParser,
    commands::{Command, WriteOptions},
    operation::{Operation, Step, single},
    ops,
};

/// Blocking session with an IRBIS64 server.
///
/// Each call performs one or more request/answer round trips over fresh
/// connections and returns once the last answer is decoded.
///
/// ```no_run
/// use irbis::{Connection, ConnectionSettings};
///
/// # fn main() -> irbis::Result<()> {
/// let settings: ConnectionSettings = "host=127.0.0.1;user=librarian;password=secret;".parse()?;
/// let mut connection = Connection::new(settings);
/// connection.connect()?;
/// let max_mfn = connection.get_max_mfn(None)?;
/// println!("IBIS holds {} records", max_mfn.saturating_sub(1));
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connection<T: Transport = TcpTransport> {
    state: SessionState,
    transport: T,
}

impl Connection<TcpTransport> {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_transport(settings, TcpTransport)
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(settings: ConnectionSettings, transport: T) -> Self {
        Self {
            state: SessionState::new(settings),
            transport,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn database(&self) -> &str {
        self.state.database()
    }

    /// Send a raw query and hand back the undecoded answer.
    pub fn execute(&mut self, query: &Query) -> Result<Response> {
        debug!("executing command {:?}", query.command());
        let packet = query.encode()?;
        let answer = self.transport.exchange(&self.state.endpoint(), &packet)?;
        Response::new(answer)
    }

    /// Send a raw query and drop the answer.
    pub fn execute_forget(&mut self, query: &Query) -> Result<()> {
        self.execute(query).map(drop)
    }

    /// Drive an operation to completion, one exchange per query it sends.
    pub fn perform<O: Operation>(&mut self, mut operation: O) -> Result<O::Output> {
        let mut step = operation.start(&mut self.state)?;
        loop {
            match step {
                Step::Done(output) => return Ok(output),
                Step::Send(query) => {
                    let answer = self.execute(&query);
                    step = operation.resume(&mut self.state, answer)?;
                }
            }
        }
    }

    /// Run one command: build, exchange, decode.
    pub fn run<C: Command>(&mut self, command: C) -> Result<C::Output> {
        self.perform(single(command))
    }

    /// Register with the server and return its client INI. Does nothing
    /// but return the cached INI when already connected.
    pub fn connect(&mut self) -> Result<&ServerIni> {
        self.perform(ops::Connect)?;
        Ok(self.state.ini())
    }

    /// Unregister from the server. Failures are logged and ignored.
    pub fn disconnect(&mut self) {
        self.perform(ops::Disconnect).unwrap_or_default()
    }

    pub fn push_database(&mut self, database: &str) -> Result<String> {
        self.state.push_database(database)
    }

    pub fn pop_database(&mut self) -> Result<String> {
        self.state.pop_database()
    }

    pub fn actualize_record(&mut self, mfn: u32, database: Option<&str>) -> Result<()> {
        self.perform(ops::actualize_record(mfn, database))
    }

    pub fn create_database(&mut self, database: &str, description: &str, reader_access: bool) -> Result<()> {
        self.perform(ops::create_database(database, description, reader_access))
    }

    pub fn create_dictionary(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::create_dictionary(database))
    }

    pub fn delete_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::delete_database(database))
    }

    /// Remove every record of the database.
    pub fn truncate_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::truncate_database(database))
    }

    pub fn reload_dictionary(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::reload_dictionary(database))
    }

    pub fn reload_master_file(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::reload_master_file(database))
    }

    pub fn unlock_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::unlock_database(database))
    }

    pub fn unlock_records(&mut self, mfns: &[u32], database: Option<&str>) -> Result<()> {
        self.perform(ops::unlock_records(mfns, database))
    }

    pub fn restart_server(&mut self) -> Result<()> {
        self.perform(ops::restart_server())
    }

    /// Keep-alive request.
    pub fn nop(&mut self) -> Result<()> {
        self.perform(ops::nop())
    }

    /// Replace lines of the server INI for this client. The answer is ignored.
    pub fn update_ini_file(&mut self, lines: &[String]) -> Result<()> {
        self.perform(ops::update_ini_file(lines))
    }

    /// MFN the next new record of the database will get.
    pub fn get_max_mfn(&mut self, database: Option<&str>) -> Result<u32> {
        self.perform(ops::get_max_mfn(database))
    }

    pub fn get_database_info(&mut self, database: Option<&str>) -> Result<DatabaseInfo> {
        self.perform(ops::get_database_info(database))
    }

    pub fn get_server_version(&mut self) -> Result<ServerVersion> {
        self.perform(ops::get_server_version())
    }

    /// Read a record of the current database. Absent records come back
    /// with the `ABSENT` status.
    pub fn read_record(&mut self, mfn: u32) -> Result<Record> {
        self.perform(ops::read_record(mfn))
    }

    /// Read an older version of a record, then release the lock the read
    /// leaves on it.
    pub fn read_record_version(&mut self, mfn: u32, version: u32) -> Result<Record> {
        self.perform(ops::read_record_version(mfn, version))
    }

    pub fn require_record(&mut self, mfn: u32) -> Result<Record> {
        self.perform(ops::require_record(mfn))
    }

    pub fn read_records(&mut self, mfns: &[u32]) -> Result<Vec<Record>> {
        self.perform(ops::read_records(mfns))
    }

    /// Save a record and refresh it from the server. Returns the new max MFN.
    pub fn write_record(&mut self, record: &mut Record) -> Result<u32> {
        self.perform(ops::write_record(record))
    }

    pub fn write_record_with(&mut self, record: &mut Record, options: WriteOptions) -> Result<u32> {
        self.perform(ops::write_record_with(record, options))
    }

    pub fn write_records(&mut self, records: &mut [Record]) -> Result<()> {
        self.perform(ops::write_records(records))
    }

    /// Set the logically-deleted bit of a record.
    pub fn delete_record(&mut self, mfn: u32) -> Result<()> {
        self.perform(ops::delete_record(mfn))
    }

    pub fn undelete_record(&mut self, mfn: u32) -> Result<()> {
        self.perform(ops::undelete_record(mfn))
    }

    pub fn format_record(&mut self, script: &str, mfn: u32) -> Result<String> {
        self.perform(ops::format_record(script, mfn))
    }

    /// Format a record that need not exist on the server.
    pub fn format_virtual_record(&mut self, script: &str, record: &Record) -> Result<String> {
        self.perform(ops::format_virtual_record(script, record))
    }

    pub fn format_records(&mut self, script: &str, mfns: &[u32]) -> Result<Vec<String>> {
        self.perform(ops::format_records(script, mfns))
    }

    /// MFNs of the records matching a search expression.
    pub fn search(&mut self, expression: &str) -> Result<Vec<u32>> {
        self.perform(ops::search(expression))
    }

    pub fn search_ex(&mut self, parameters: &SearchParameters) -> Result<Vec<FoundLine>> {
        self.perform(ops::search_ex(parameters))
    }

    pub fn search_count(&mut self, expression: &str) -> Result<u32> {
        self.perform(ops::search_count(expression))
    }

    pub fn read_terms(&mut self, parameters: &TermParameters) -> Result<Vec<TermInfo>> {
        self.perform(ops::read_terms(parameters))
    }

    pub fn read_postings(&mut self, parameters: &PostingParameters) -> Result<Vec<TermPosting>> {
        self.perform(ops::read_postings(parameters))
    }

    pub fn read_record_postings(&mut self, mfn: u32, prefix: &str) -> Result<Vec<TermPosting>> {
        self.perform(ops::read_record_postings(mfn, prefix))
    }

    pub fn list_files<I, F>(&mut self, files: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = F>,
        F: Into<FileRef>,
    {
        self.perform(ops::list_files(files))
    }

    /// Answer to a text file request, positioned at the file content.
    pub fn read_text_stream(&mut self, file: impl Into<FileRef>) -> Result<Response> {
        self.perform(ops::read_text_stream(file))
    }

    /// Text of a server file with CRLF line breaks; empty when the file is
    /// absent.
    pub fn read_text_file(&mut self, file: impl Into<FileRef>) -> Result<String> {
        self.perform(ops::read_text_file(file))
    }

    pub fn require_text_file(&mut self, file: impl Into<FileRef>) -> Result<String> {
        self.perform(ops::require_text_file(file))
    }

    /// Load a server text file through a parser.
    pub fn read_text_file_as<P: TextFileParser>(&mut self, file: impl Into<FileRef>) -> Result<P> {
        self.perform(ops::read_text_file_as(file))
    }

    pub fn read_binary_file(&mut self, file: impl Into<FileRef>) -> Result<Option<Vec<u8>>> {
        self.perform(ops::read_binary_file(file))
    }

    /// Store text files; every specification must carry its content.
    pub fn write_text_files(&mut self, specifications: &[FileSpecification]) -> Result<()> {
        self.perform(ops::write_text_files(specifications))
    }

    pub fn write_text_file(&mut self, specification: FileSpecification) -> Result<()> {
        self.perform(ops::write_text_file(specification))
    }
}
