//! Session state machine.
//!
//! A session moves between two states: disconnected and connected
//! (registered with the server under a random client id). Everything a
//! command needs from the session lives in [`SessionState`]. Commands are
//! sans-IO values in [`commands`], and every session call, retries and
//! follow-up requests included, is an [`operation::Operation`] built in
//! [`ops`]. The blocking [`Connection`] and the suspending
//! [`AsyncConnection`] only differ in how they move the bytes.
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    error::{IrbisError, Result},
    protocol::{Endpoint, Query, QueryHeader},
    settings::ConnectionSettings,
    specification::{FileRef, FileSpecification},
};

mod blocking;
pub mod commands;
mod nonblocking;
pub mod operation;
pub mod ops;

pub use blocking::Connection;
pub use nonblocking::AsyncConnection;

/// Builds a value from the lines of a server text file.
///
/// INI, menu and similar file formats implement this to be loaded with
/// `read_text_file_as`.
pub trait TextFileParser: Sized {
    fn from_lines(lines: Vec<String>) -> Result<Self>;
}

impl TextFileParser for Vec<String> {
    fn from_lines(lines: Vec<String>) -> Result<Self> {
        Ok(lines)
    }
}

/// Client INI sent by the server on registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerIni {
    lines: Vec<String>,
}

impl ServerIni {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Parse the lines with a richer INI representation.
    pub fn parse_as<P: TextFileParser>(&self) -> Result<P> {
        P::from_lines(self.lines.clone())
    }
}

impl TextFileParser for ServerIni {
    fn from_lines(lines: Vec<String>) -> Result<Self> {
        Ok(Self { lines })
    }
}

/// Identity and counters of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    settings: ConnectionSettings,
    client_id: u32,
    query_id: u32,
    connected: bool,
    stack: Vec<String>,
    server_version: Option<String>,
    ini: ServerIni,
    ids: StdRng,
}

impl SessionState {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client_id: 0,
            query_id: 0,
            connected: false,
            stack: Vec::new(),
            server_version: None,
            ini: ServerIni::default(),
            ids: StdRng::from_entropy(),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn endpoint(&self) -> Endpoint {
        self.settings.endpoint()
    }

    /// Current database.
    pub fn database(&self) -> &str {
        &self.settings.database
    }

    pub fn set_database(&mut self, database: impl Into<String>) {
        self.settings.database = database.into();
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Reuse a client id registered elsewhere.
    pub fn set_client_id(&mut self, client_id: u32) {
        self.client_id = client_id;
    }

    /// Draw registration client ids from a fixed seed.
    pub fn seed_client_ids(&mut self, seed: u64) {
        self.ids = StdRng::seed_from_u64(seed);
    }

    pub fn query_id(&self) -> u32 {
        self.query_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Version reported by the server, once known.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub fn ini(&self) -> &ServerIni {
        &self.ini
    }

    /// Check the parameters registration needs, naming the first one
    /// missing.
    pub(crate) fn validate(&self) -> Result<()> {
        let settings = &self.settings;
        let missing = [
            ("host", settings.host.is_empty()),
            ("port", settings.port == 0),
            ("username", settings.username.is_empty()),
            ("password", settings.password.is_empty()),
            ("database", settings.database.is_empty()),
        ]
        .into_iter()
        .find_map(|(name, missing)| missing.then_some(name));

        match missing {
            Some(name) => Err(IrbisError::Configuration(name)),
            None => Ok(()),
        }
    }

    /// Pick a fresh client id and restart query numbering.
    pub(crate) fn begin_registration(&mut self) {
        self.client_id = self.ids.gen_range(100_000..=999_999);
        self.query_id = 0;
        debug!("registering as client {}", self.client_id);
    }

    pub(crate) fn finish_registration(&mut self, server_version: String, ini: ServerIni) {
        self.server_version = Some(server_version).filter(|version| !version.is_empty());
        self.ini = ini;
        self.connected = true;
    }

    pub(crate) fn remember_server_version(&mut self, version: &str) {
        if self.server_version.is_none() && !version.is_empty() {
            self.server_version = Some(version.to_string());
        }
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Start a query with the next query id.
    pub fn new_query(&mut self, command: &str) -> Result<Query> {
        self.query_id += 1;
        Query::new(&QueryHeader {
            command,
            workstation: &self.settings.workstation,
            client_id: self.client_id,
            query_id: self.query_id,
            username: &self.settings.username,
            password: &self.settings.password,
        })
    }

    /// Switch to `database`, remembering the current one. Returns the
    /// previous database.
    pub fn push_database(&mut self, database: &str) -> Result<String> {
        if database.is_empty() {
            return Err(IrbisError::validation("cannot switch to an unnamed database"));
        }
        let previous = std::mem::replace(&mut self.settings.database, database.to_string());
        self.stack.push(previous.clone());
        Ok(previous)
    }

    /// Return to the database saved by the matching [`push_database`].
    /// Returns the database being left.
    ///
    /// [`push_database`]: SessionState::push_database
    pub fn pop_database(&mut self) -> Result<String> {
        let restored = self
            .stack
            .pop()
            .ok_or_else(|| IrbisError::validation("database stack is empty"))?;
        Ok(std::mem::replace(&mut self.settings.database, restored))
    }

    /// `database` if given, otherwise the current one.
    pub(crate) fn database_or(&self, database: Option<&str>) -> String {
        database
            .filter(|db| !db.is_empty())
            .unwrap_or(&self.settings.database)
            .to_string()
    }

    pub fn resolve(&self, file: impl Into<FileRef>) -> FileSpecification {
        file.into().resolve(&self.settings.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::PathCode;

    fn state() -> SessionState {
        SessionState::new(ConnectionSettings::new("librarian", "secret"))
    }

    #[test]
    fn validation_names_first_missing_parameter() {
        assert!(state().validate().is_ok());

        let mut settings = ConnectionSettings::default();
        assert!(matches!(
            SessionState::new(settings.clone()).validate(),
            Err(IrbisError::Configuration("username"))
        ));

        settings.host.clear();
        settings.password = "x".into();
        assert!(matches!(
            SessionState::new(settings).validate(),
            Err(IrbisError::Configuration("host"))
        ));
    }

    #[test]
    fn registration_resets_counters() {
        let mut state = state();
        state.new_query("N").unwrap();
        state.begin_registration();

        assert!((100_000..=999_999).contains(&state.client_id()));
        assert_eq!(state.query_id(), 0);
        state.new_query("A").unwrap();
        assert_eq!(state.query_id(), 1);
    }

    #[test]
    fn seeded_client_ids_repeat() {
        let mut one = state();
        let mut two = state();
        one.seed_client_ids(7);
        two.seed_client_ids(7);

        one.begin_registration();
        two.begin_registration();
        assert_eq!(one.client_id(), two.client_id());
    }

    #[test]
    fn push_and_pop_database() {
        let mut state = state();
        assert_eq!(state.push_database("RDR").unwrap(), "IBIS");
        assert_eq!(state.database(), "RDR");
        assert_eq!(state.pop_database().unwrap(), "RDR");
        assert_eq!(state.database(), "IBIS");

        assert!(matches!(state.pop_database(), Err(IrbisError::Validation(_))));
        assert!(state.push_database("").is_err());
    }

    #[test]
    fn files_resolve_against_current_database() {
        let mut state = state();
        state.set_database("RDR");

        let spec = state.resolve("reader.pft");
        assert_eq!(spec.path, PathCode::MasterFile);
        assert_eq!(spec.database.as_deref(), Some("RDR"));
        assert_eq!(state.database_or(Some("IBIS")), "IBIS");
        assert_eq!(state.database_or(None), "RDR");
    }

    #[test]
    fn ini_parses_through_text_file_parser() {
        let ini = ServerIni::from_lines(vec!["[MAIN]".into(), "STTFNT=1".into()]).unwrap();
        let lines: Vec<String> = ini.parse_as().unwrap();
        assert_eq!(lines, vec!["[MAIN]", "STTFNT=1"]);
    }
}
