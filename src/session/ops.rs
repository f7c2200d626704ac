//! Every session call as an [`Operation`].
//!
//! [`Connection`](super::Connection) and
//! [`AsyncConnection`](super::AsyncConnection) forward their methods here
//! and only differ in how they wait for the exchanges.
use log::{debug, info, warn};

use crate::{
    encoding::{irbis_to_dos, irbis_to_lines},
    error::{IrbisError, Result},
    info::{DatabaseInfo, ServerVersion},
    protocol::{Response, command},
    record::{Record, RecordStatus},
    search::{FoundLine, SearchParameters},
    specification::{FileRef, FileSpecification},
    terms::{PostingParameters, TermInfo, TermParameters, TermPosting},
};

use super::{
    SessionState, TextFileParser,
    commands::{self, Command, FormatTarget, Registration, Simple, WriteOptions, mark_deleted},
    operation::{Either, Operation, Step, plan, ready, single},
};

fn discard<T>(_: T) -> Result<()> {
    Ok(())
}

/// Register with the server, drawing a new client id while the server
/// reports the current one as taken. Does nothing when connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Connect;

impl Connect {
    fn register(state: &mut SessionState) -> Result<Step<()>> {
        state.begin_registration();
        Ok(Step::Send(commands::Register.build(state)?))
    }
}

impl Operation for Connect {
    type Output = ();

    fn start(&mut self, state: &mut SessionState) -> Result<Step<()>> {
        if state.is_connected() {
            return Ok(Step::Done(()));
        }
        state.validate()?;
        Self::register(state)
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<()>> {
        match commands::Register.decode(state, answer?)? {
            Registration::Registered => {
                info!("connected to {} as client {}", state.endpoint(), state.client_id());
                Ok(Step::Done(()))
            }
            Registration::ClientIdTaken => {
                debug!("client id {} is taken, retrying", state.client_id());
                Self::register(state)
            }
        }
    }
}

/// Unregister from the server. Failures are logged and the session ends
/// up disconnected either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnect;

impl Operation for Disconnect {
    type Output = ();

    fn start(&mut self, state: &mut SessionState) -> Result<Step<()>> {
        if !state.is_connected() {
            return Ok(Step::Done(()));
        }
        match commands::Unregister.build(state) {
            Ok(query) => Ok(Step::Send(query)),
            Err(err) => self.resume(state, Err(err)),
        }
    }

    fn resume(&mut self, state: &mut SessionState, answer: Result<Response>) -> Result<Step<()>> {
        if let Err(err) = answer.and_then(|response| commands::Unregister.decode(state, response)) {
            warn!("failed to unregister client {}: {err}", state.client_id());
        }
        state.mark_disconnected();
        Ok(Step::Done(()))
    }
}

fn on_database(code: &'static str, database: Option<&str>) -> impl Operation<Output = i32> + use<> {
    let database = database.map(str::to_string);
    plan(move |state| Ok(single(Simple::new(code).line(state.database_or(database.as_deref())))))
}

pub fn actualize_record(mfn: u32, database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    let database = database.map(str::to_string);
    plan(move |state| {
        let database = state.database_or(database.as_deref());
        Ok(single(Simple::new(command::ACTUALIZE_RECORD).line(database).line(mfn)))
    })
    .map(discard)
}

pub fn create_database(database: &str, description: &str, reader_access: bool) -> impl Operation<Output = ()> + use<> {
    single(
        Simple::new(command::CREATE_DATABASE)
            .line(database)
            .line(description)
            .line(u8::from(reader_access)),
    )
    .map(discard)
}

pub fn create_dictionary(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    on_database(command::CREATE_DICTIONARY, database).map(discard)
}

pub fn delete_database(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    on_database(command::DELETE_DATABASE, database).map(discard)
}

/// Remove every record of the database.
pub fn truncate_database(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    on_database(command::EMPTY_DATABASE, database).map(discard)
}

pub fn reload_dictionary(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    on_database(command::RELOAD_DICTIONARY, database).map(discard)
}

pub fn reload_master_file(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    on_database(command::RELOAD_MASTER_FILE, database).map(discard)
}

/// The answer is ignored.
pub fn unlock_database(database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    let database = database.map(str::to_string);
    plan(move |state| {
        let database = state.database_or(database.as_deref());
        Ok(single(Simple::new(command::UNLOCK_DATABASE).line(database).unchecked()))
    })
    .map(discard)
}

pub fn unlock_records(mfns: &[u32], database: Option<&str>) -> impl Operation<Output = ()> + use<> {
    let mfns = mfns.to_vec();
    let database = database.map(str::to_string);
    plan(move |state| {
        if mfns.is_empty() {
            return Ok(Either::Left(ready(0)));
        }
        let unlock = mfns.iter().fold(
            Simple::new(command::UNLOCK_RECORDS).line(state.database_or(database.as_deref())),
            |unlock, mfn| unlock.line(mfn),
        );
        Ok(Either::Right(single(unlock)))
    })
    .map(discard)
}

pub fn restart_server() -> impl Operation<Output = ()> {
    single(Simple::new(command::RESTART_SERVER)).map(discard)
}

/// Keep-alive request.
pub fn nop() -> impl Operation<Output = ()> {
    single(Simple::new(command::NOP)).map(discard)
}

/// Replace lines of the server INI for this client. The answer is ignored.
pub fn update_ini_file(lines: &[String]) -> impl Operation<Output = ()> + use<> {
    if lines.is_empty() {
        return Either::Left(ready(()));
    }
    let update = lines
        .iter()
        .fold(Simple::new(command::UPDATE_INI_FILE), |update, line| update.line(line))
        .unchecked();
    Either::Right(single(update).map(discard))
}

/// MFN the next new record of the database will get.
pub fn get_max_mfn(database: Option<&str>) -> impl Operation<Output = u32> + use<> {
    on_database(command::GET_MAX_MFN, database).map(|max_mfn| Ok(u32::try_from(max_mfn).unwrap_or_default()))
}

pub fn get_database_info(database: Option<&str>) -> impl Operation<Output = DatabaseInfo> + use<> {
    let database = database.map(str::to_string);
    plan(move |state| {
        Ok(single(commands::GetDatabaseInfo {
            database: state.database_or(database.as_deref()),
        }))
    })
}

pub fn get_server_version() -> impl Operation<Output = ServerVersion> {
    single(commands::GetServerVersion)
}

/// Read a record of the current database. Absent records come back with
/// the `ABSENT` status.
pub fn read_record(mfn: u32) -> impl Operation<Output = Record> {
    plan(move |state| {
        Ok(single(commands::ReadRecord {
            database: state.database_or(None),
            mfn,
            version: None,
        }))
    })
}

/// Read an older version of a record, then release the lock the read
/// leaves on it.
pub fn read_record_version(mfn: u32, version: u32) -> impl Operation<Output = Record> {
    plan(move |state| {
        let database = state.database_or(None);
        let read = single(commands::ReadRecord {
            database: database.clone(),
            mfn,
            version: Some(version),
        });
        Ok(read.then(move |_, record| Ok(unlock_records(&[mfn], Some(&database)).map(move |()| Ok(record)))))
    })
}

pub fn require_record(mfn: u32) -> impl Operation<Output = Record> {
    read_record(mfn).map(move |record| {
        if record.status.contains(RecordStatus::ABSENT) {
            return Err(IrbisError::NotFound(format!(
                "record {mfn} in {}",
                record.database.as_deref().unwrap_or_default()
            )));
        }
        Ok(record)
    })
}

pub fn read_records(mfns: &[u32]) -> impl Operation<Output = Vec<Record>> + use<> {
    match mfns {
        [] => Either::Left(ready(Vec::new())),
        [mfn] => Either::Right(Either::Left(read_record(*mfn).map(|record| Ok(vec![record])))),
        _ => {
            let mfns = mfns.to_vec();
            Either::Right(Either::Right(plan(move |state| {
                Ok(single(commands::ReadRecords::new(state.database_or(None), mfns)))
            })))
        }
    }
}

/// Save a record and refresh it from the server. Returns the new max MFN.
pub fn write_record(record: &mut Record) -> impl Operation<Output = u32> {
    write_record_with(record, WriteOptions::default())
}

pub fn write_record_with(record: &mut Record, options: WriteOptions) -> impl Operation<Output = u32> {
    plan(move |state| {
        let database = state.database_or(record.database.as_deref());
        Ok(single(commands::WriteRecord {
            record,
            database,
            options,
        }))
    })
}

/// Save records. A single record is refreshed like [`write_record`];
/// several go in one batch and are left as they are.
pub fn write_records(records: &mut [Record]) -> impl Operation<Output = ()> {
    match records {
        [] => Either::Left(ready(())),
        [record] => Either::Right(Either::Left(write_record(record).map(discard))),
        records => Either::Right(Either::Right(plan(move |state| {
            Ok(single(commands::WriteRecords {
                records,
                database: state.database_or(None),
            }))
        }))),
    }
}

/// Read a record, flip its logically-deleted bit and save it without a
/// refresh. Nothing is written when the bit already has that value.
fn set_deleted(mfn: u32, deleted: bool) -> impl Operation<Output = ()> {
    read_record(mfn).then(move |state, mut record| {
        if !mark_deleted(&mut record, deleted) {
            return Ok(Either::Left(ready(())));
        }
        let database = state.database_or(record.database.as_deref());
        let options = WriteOptions {
            parse_back: false,
            ..WriteOptions::default()
        };
        Ok(Either::Right(
            single(commands::WriteRecord {
                record,
                database,
                options,
            })
            .map(discard),
        ))
    })
}

/// Set the logically-deleted bit of a record.
pub fn delete_record(mfn: u32) -> impl Operation<Output = ()> {
    set_deleted(mfn, true)
}

pub fn undelete_record(mfn: u32) -> impl Operation<Output = ()> {
    set_deleted(mfn, false)
}

fn format(script: &str, target: FormatTarget<'_>) -> impl Operation<Output = String> {
    let script = script.to_string();
    plan(move |state| {
        Ok(single(commands::FormatRecord {
            database: state.database_or(None),
            script,
            target,
        }))
    })
}

pub fn format_record(script: &str, mfn: u32) -> impl Operation<Output = String> {
    format(script, FormatTarget::Mfn(mfn))
}

/// Format a record that need not exist on the server.
pub fn format_virtual_record(script: &str, record: &Record) -> impl Operation<Output = String> {
    format(script, FormatTarget::Record(record))
}

/// Format several records. More than [`MAX_POSTINGS`](crate::protocol::MAX_POSTINGS)
/// MFNs fail before anything is sent.
pub fn format_records(script: &str, mfns: &[u32]) -> impl Operation<Output = Vec<String>> + use<> {
    if mfns.is_empty() {
        return Either::Left(ready(Vec::new()));
    }
    let script = script.to_string();
    let mfns = mfns.to_vec();
    Either::Right(plan(move |state| {
        Ok(single(commands::FormatRecords {
            database: state.database_or(None),
            script,
            mfns,
        }))
    }))
}

/// MFNs of the records matching a search expression.
pub fn search(expression: &str) -> impl Operation<Output = Vec<u32>> + use<> {
    search_ex(&SearchParameters::new(expression)).map(|found| Ok(found.into_iter().map(|line| line.mfn).collect()))
}

pub fn search_ex(parameters: &SearchParameters) -> impl Operation<Output = Vec<FoundLine>> + use<> {
    let parameters = parameters.clone();
    plan(move |state| {
        Ok(single(commands::Search {
            database: state.database_or(parameters.database.as_deref()),
            parameters,
        }))
    })
}

pub fn search_count(expression: &str) -> impl Operation<Output = u32> + use<> {
    let expression = expression.to_string();
    plan(move |state| {
        Ok(single(commands::SearchCount {
            database: state.database_or(None),
            expression,
        }))
    })
}

pub fn read_terms(parameters: &TermParameters) -> impl Operation<Output = Vec<TermInfo>> + use<> {
    let parameters = parameters.clone();
    plan(move |state| {
        Ok(single(commands::ReadTerms {
            database: state.database_or(parameters.database.as_deref()),
            parameters,
        }))
    })
}

pub fn read_postings(parameters: &PostingParameters) -> impl Operation<Output = Vec<TermPosting>> + use<> {
    let parameters = parameters.clone();
    plan(move |state| {
        Ok(single(commands::ReadPostings {
            database: state.database_or(parameters.database.as_deref()),
            parameters,
        }))
    })
}

pub fn read_record_postings(mfn: u32, prefix: &str) -> impl Operation<Output = Vec<TermPosting>> + use<> {
    let prefix = prefix.to_string();
    plan(move |state| {
        Ok(single(commands::ReadRecordPostings {
            database: state.database_or(None),
            mfn,
            prefix,
        }))
    })
}

pub fn list_files<I, F>(files: I) -> impl Operation<Output = Vec<String>>
where
    I: IntoIterator<Item = F>,
    F: Into<FileRef>,
{
    let files: Vec<FileRef> = files.into_iter().map(Into::into).collect();
    plan(move |state| {
        if files.is_empty() {
            return Ok(Either::Left(ready(Vec::new())));
        }
        let specifications = files.into_iter().map(|file| state.resolve(file)).collect();
        Ok(Either::Right(single(commands::ListFiles { specifications })))
    })
}

/// Answer to a text file request, positioned at the file content.
pub fn read_text_stream(file: impl Into<FileRef>) -> impl Operation<Output = Response> {
    let file = file.into();
    plan(move |state| {
        Ok(single(commands::ReadDocument {
            specification: state.resolve(file),
        }))
    })
}

/// Text of a server file with CRLF line breaks; empty when the file is
/// absent.
pub fn read_text_file(file: impl Into<FileRef>) -> impl Operation<Output = String> {
    read_text_stream(file).map(|mut response| Ok(irbis_to_dos(&response.ansi_remaining_text())))
}

pub fn require_text_file(file: impl Into<FileRef>) -> impl Operation<Output = String> {
    let file = file.into();
    plan(move |state| {
        let specification = state.resolve(file);
        let name = specification.to_wire_string();
        Ok(single(commands::ReadDocument { specification }).map(move |mut response| {
            let text = irbis_to_dos(&response.ansi_remaining_text());
            if text.is_empty() {
                return Err(IrbisError::NotFound(name));
            }
            Ok(text)
        }))
    })
}

/// Load a server text file through a parser.
pub fn read_text_file_as<P: TextFileParser>(file: impl Into<FileRef>) -> impl Operation<Output = P> {
    read_text_stream(file).map(|mut response| P::from_lines(irbis_to_lines(&response.ansi_remaining_text())))
}

pub fn read_binary_file(file: impl Into<FileRef>) -> impl Operation<Output = Option<Vec<u8>>> {
    let file = file.into();
    plan(move |state| Ok(single(commands::ReadBinaryFile::new(state.resolve(file)))))
}

/// Store text files; every specification must carry its content.
pub fn write_text_files(specifications: &[FileSpecification]) -> impl Operation<Output = ()> + use<> {
    if specifications.is_empty() {
        return Either::Left(ready(()));
    }
    Either::Right(single(commands::WriteTextFiles {
        specifications: specifications.to_vec(),
    }))
}

pub fn write_text_file(specification: FileSpecification) -> impl Operation<Output = ()> {
    single(commands::WriteTextFiles {
        specifications: vec![specification],
    })
}
