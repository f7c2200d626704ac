use log::debug;
use tokio::runtime::Handle;

use crate::{
    error::Result,
    info::{DatabaseInfo, ServerVersion},
    protocol::{AsyncTransport, Query, Response, TokioTransport},
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

/// Suspending session with an IRBIS64 server.
///
/// Same operations and wire traffic as [`Connection`](super::Connection);
/// exchanges run on the tokio runtime given at construction.
///
/// ```no_run
/// use irbis::{AsyncConnection, ConnectionSettings};
///
/// # async fn run() -> irbis::Result<()> {
/// let settings = ConnectionSettings::new("librarian", "secret");
/// let mut connection = AsyncConnection::new(settings, tokio::runtime::Handle::current());
/// connection.connect().await?;
/// let found = connection.search("K=ALG$").await?;
/// println!("{} records found", found.len());
/// connection.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncConnection<T: AsyncTransport = TokioTransport> {
    state: SessionState,
    transport: T,
}

impl AsyncConnection<TokioTransport> {
    pub fn new(settings: ConnectionSettings, handle: Handle) -> Self {
        Self::with_transport(settings, TokioTransport::new(handle))
    }
}

impl<T: AsyncTransport> AsyncConnection<T> {
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

    pub async fn execute(&mut self, query: &Query) -> Result<Response> {
        debug!("executing command {:?}", query.command());
        let packet = query.encode()?;
        let endpoint = self.state.endpoint();
        let answer = self.transport.exchange(&endpoint, packet).await?;
        Response::new(answer)
    }

    pub async fn execute_forget(&mut self, query: &Query) -> Result<()> {
        self.execute(query).await.map(drop)
    }

    /// Drive an operation to completion, one exchange per query it sends.
    pub async fn perform<O: Operation>(&mut self, mut operation: O) -> Result<O::Output> {
        let mut step = operation.start(&mut self.state)?;
        loop {
            match step {
                Step::Done(output) => return Ok(output),
                Step::Send(query) => {
                    let answer = self.execute(&query).await;
                    step = operation.resume(&mut self.state, answer)?;
                }
            }
        }
    }

    /// Run one command: build, exchange, decode.
    pub async fn run<C: Command>(&mut self, command: C) -> Result<C::Output> {
        self.perform(single(command)).await
    }

    pub async fn connect(&mut self) -> Result<&ServerIni> {
        self.perform(ops::Connect).await?;
        Ok(self.state.ini())
    }

    pub async fn disconnect(&mut self) {
        self.perform(ops::Disconnect).await.unwrap_or_default()
    }

    pub fn push_database(&mut self, database: &str) -> Result<String> {
        self.state.push_database(database)
    }

    pub fn pop_database(&mut self) -> Result<String> {
        self.state.pop_database()
    }

    pub async fn actualize_record(&mut self, mfn: u32, database: Option<&str>) -> Result<()> {
        self.perform(ops::actualize_record(mfn, database)).await
    }

    pub async fn create_database(&mut self, database: &str, description: &str, reader_access: bool) -> Result<()> {
        self.perform(ops::create_database(database, description, reader_access)).await
    }

    pub async fn create_dictionary(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::create_dictionary(database)).await
    }

    pub async fn delete_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::delete_database(database)).await
    }

    /// Remove every record of the database.
    pub async fn truncate_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::truncate_database(database)).await
    }

    pub async fn reload_dictionary(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::reload_dictionary(database)).await
    }

    pub async fn reload_master_file(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::reload_master_file(database)).await
    }

    pub async fn unlock_database(&mut self, database: Option<&str>) -> Result<()> {
        self.perform(ops::unlock_database(database)).await
    }

    pub async fn unlock_records(&mut self, mfns: &[u32], database: Option<&str>) -> Result<()> {
        self.perform(ops::unlock_records(mfns, database)).await
    }

    pub async fn restart_server(&mut self) -> Result<()> {
        self.perform(ops::restart_server()).await
    }

    /// Keep-alive request.
    pub async fn nop(&mut self) -> Result<()> {
        self.perform(ops::nop()).await
    }

    /// Replace lines of the server INI for this client. The answer is ignored.
    pub async fn update_ini_file(&mut self, lines: &[String]) -> Result<()> {
        self.perform(ops::update_ini_file(lines)).await
    }

    /// MFN the next new record of the database will get.
    pub async fn get_max_mfn(&mut self, database: Option<&str>) -> Result<u32> {
        self.perform(ops::get_max_mfn(database)).await
    }

    pub async fn get_database_info(&mut self, database: Option<&str>) -> Result<DatabaseInfo> {
        self.perform(ops::get_database_info(database)).await
    }

    pub async fn get_server_version(&mut self) -> Result<ServerVersion> {
        self.perform(ops::get_server_version()).await
    }

    /// Read a record of the current database. Absent records come back
    /// with the `ABSENT` status.
    pub async fn read_record(&mut self, mfn: u32) -> Result<Record> {
        self.perform(ops::read_record(mfn)).await
    }

    /// Read an older version of a record, then release the lock the read
    /// leaves on it.
    pub async fn read_record_version(&mut self, mfn: u32, version: u32) -> Result<Record> {
        self.perform(ops::read_record_version(mfn, version)).await
    }

    pub async fn require_record(&mut self, mfn: u32) -> Result<Record> {
        self.perform(ops::require_record(mfn)).await
    }

    pub async fn read_records(&mut self, mfns: &[u32]) -> Result<Vec<Record>> {
        self.perform(ops::read_records(mfns)).await
    }

    /// Save a record and refresh it from the server. Returns the new max MFN.
    pub async fn write_record(&mut self, record: &mut Record) -> Result<u32> {
        self.perform(ops::write_record(record)).await
    }

    pub async fn write_record_with(&mut self, record: &mut Record, options: WriteOptions) -> Result<u32> {
        self.perform(ops::write_record_with(record, options)).await
    }

    pub async fn write_records(&mut self, records: &mut [Record]) -> Result<()> {
        self.perform(ops::write_records(records)).await
    }

    /// Set the logically-deleted bit of a record.
    pub async fn delete_record(&mut self, mfn: u32) -> Result<()> {
        self.perform(ops::delete_record(mfn)).await
    }

    pub async fn undelete_record(&mut self, mfn: u32) -> Result<()> {
        self.perform(ops::undelete_record(mfn)).await
    }

    pub async fn format_record(&mut self, script: &str, mfn: u32) -> Result<String> {
        self.perform(ops::format_record(script, mfn)).await
    }

    /// Format a record that need not exist on the server.
    pub async fn format_virtual_record(&mut self, script: &str, record: &Record) -> Result<String> {
        self.perform(ops::format_virtual_record(script, record)).await
    }

    pub async fn format_records(&mut self, script: &str, mfns: &[u32]) -> Result<Vec<String>> {
        self.perform(ops::format_records(script, mfns)).await
    }

    /// MFNs of the records matching a search expression.
    pub async fn search(&mut self, expression: &str) -> Result<Vec<u32>> {
        self.perform(ops::search(expression)).await
    }

    pub async fn search_ex(&mut self, parameters: &SearchParameters) -> Result<Vec<FoundLine>> {
        self.perform(ops::search_ex(parameters)).await
    }

    pub async fn search_count(&mut self, expression: &str) -> Result<u32> {
        self.perform(ops::search_count(expression)).await
    }

    pub async fn read_terms(&mut self, parameters: &TermParameters) -> Result<Vec<TermInfo>> {
        self.perform(ops::read_terms(parameters)).await
    }

    pub async fn read_postings(&mut self, parameters: &PostingParameters) -> Result<Vec<TermPosting>> {
        self.perform(ops::read_postings(parameters)).await
    }

    pub async fn read_record_postings(&mut self, mfn: u32, prefix: &str) -> Result<Vec<TermPosting>> {
        self.perform(ops::read_record_postings(mfn, prefix)).await
    }

    pub async fn list_files<I, F>(&mut self, files: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = F>,
        F: Into<FileRef>,
    {
        self.perform(ops::list_files(files)).await
    }

    /// Answer to a text file request, positioned at the file content.
    pub async fn read_text_stream(&mut self, file: impl Into<FileRef>) -> Result<Response> {
        self.perform(ops::read_text_stream(file)).await
    }

    /// Text of a server file with CRLF line breaks; empty when the file is
    /// absent.
    pub async fn read_text_file(&mut self, file: impl Into<FileRef>) -> Result<String> {
        self.perform(ops::read_text_file(file)).await
    }

    pub async fn require_text_file(&mut self, file: impl Into<FileRef>) -> Result<String> {
        self.perform(ops::require_text_file(file)).await
    }

    /// Load a server text file through a parser.
    pub async fn read_text_file_as<P: TextFileParser>(&mut self, file: impl Into<FileRef>) -> Result<P> {
        self.perform(ops::read_text_file_as(file)).await
    }

    pub async fn read_binary_file(&mut self, file: impl Into<FileRef>) -> Result<Option<Vec<u8>>> {
        self.perform(ops::read_binary_file(file)).await
    }

    /// Store text files; every specification must carry its content.
    pub async fn write_text_files(&mut self, specifications: &[FileSpecification]) -> Result<()> {
        self.perform(ops::write_text_files(specifications)).await
    }

    pub async fn write_text_file(&mut self, specification: FileSpecification) -> Result<()> {
        self.perform(ops::write_text_file(specification)).await
    }
}
