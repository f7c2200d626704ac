//! Connection parameters and the IRBIS connection string.
//!
//! A connection string is a list of `name=value;` pairs:
//!
//! ```text
//! host=127.0.0.1;port=6666;username=librarian;password=secret;database=IBIS;
//! ```
//!
//! Several spellings are accepted for most names (`server`, `user`, `pwd`,
//! `db`, `arm`, ...). Parameters missing from the string keep their
//! defaults.
//!
//! Settings can also be kept in a JSON file with the same names:
//!
//! ```text
//! { "host": "127.0.0.1", "user": "librarian", "pwd": "secret" }
//! ```
use std::{fmt, fs, path::Path, str::FromStr};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    error::{IrbisError, Result},
    protocol::Endpoint,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    #[serde(alias = "server", alias = "address")]
    pub host: String,
    pub port: u16,
    #[serde(alias = "user", alias = "name", alias = "login")]
    pub username: String,
    #[serde(alias = "pwd")]
    pub password: String,
    #[serde(alias = "db", alias = "catalog")]
    pub database: String,
    #[serde(alias = "arm")]
    pub workstation: String,
}

impl ConnectionSettings {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 6666;
    pub const DEFAULT_DATABASE: &'static str = "IBIS";
    /// Cataloguer workstation.
    pub const DEFAULT_WORKSTATION: &'static str = "C";

    /// Default settings with the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Override the parameters named in `text`.
    pub fn apply_connection_string(&mut self, text: &str) -> Result<()> {
        for item in text.split(';').map(str::trim).filter(|item| !item.is_empty()) {
            let (name, value) = item
                .split_once('=')
                .ok_or_else(|| IrbisError::validation(format!("connection string item without '=': {item:?}")))?;
            let value = value.trim().to_string();

            match name.trim().to_lowercase().as_str() {
                "host" | "server" | "address" => self.host = value,
                "port" => {
                    self.port = value
                        .parse()
                        .map_err(|_| IrbisError::validation(format!("bad port {value:?}")))?;
                }
                "user" | "username" | "name" | "login" => self.username = value,
                "pwd" | "password" => self.password = value,
                "db" | "database" | "catalog" => self.database = value,
                "arm" | "workstation" => self.workstation = value,
                other => warn!("ignoring unknown connection parameter {other:?}"),
            }
        }
        Ok(())
    }

    pub fn to_connection_string(&self) -> String {
        format!(
            "host={};port={};username={};password={};database={};workstation={};",
            self.host, self.port, self.username, self.password, self.database, self.workstation
        )
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file. Missing names keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| IrbisError::SettingsFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            database: Self::DEFAULT_DATABASE.to_string(),
            workstation: Self::DEFAULT_WORKSTATION.to_string(),
        }
    }
}

impl FromStr for ConnectionSettings {
    type Err = IrbisError;

    fn from_str(text: &str) -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_connection_string(text)?;
        Ok(settings)
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_connection_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;

    use tempdir::TempDir;

    use super::*;

    #[test]
    fn defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 6666);
        assert_eq!(settings.database, "IBIS");
        assert_eq!(settings.workstation, "C");
        assert!(settings.username.is_empty());
    }

    #[test]
    fn parse_with_aliases() {
        let settings: ConnectionSettings = "server=10.0.0.5; port=5555;user=librarian;pwd=secret;db=RDR;arm=R;"
            .parse()
            .unwrap();

        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.port, 5555);
        assert_eq!(settings.username, "librarian");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.database, "RDR");
        assert_eq!(settings.workstation, "R");
    }

    #[test]
    fn render_and_parse_back() {
        let mut settings = ConnectionSettings::new("librarian", "secret");
        settings.host = "irbis.local".to_string();

        let text = settings.to_connection_string();
        assert_eq!(
            text,
            "host=irbis.local;port=6666;username=librarian;password=secret;database=IBIS;workstation=C;"
        );
        assert_eq!(text.parse::<ConnectionSettings>().unwrap(), settings);
    }

    #[test]
    fn bad_items_are_rejected() {
        assert!(matches!("port=abc".parse::<ConnectionSettings>(), Err(IrbisError::Validation(_))));
        assert!("host".parse::<ConnectionSettings>().is_err());
        assert!("colour=red;".parse::<ConnectionSettings>().is_ok());
    }

    #[test]
    fn json_with_aliases() {
        let settings = ConnectionSettings::from_json(r#"{"server": "10.0.0.5", "user": "librarian", "pwd": "secret"}"#).unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.username, "librarian");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.port, 6666);
        assert_eq!(settings.database, "IBIS");

        let json = settings.to_json().unwrap();
        assert_eq!(ConnectionSettings::from_json(&json).unwrap(), settings);

        assert!(matches!(
            ConnectionSettings::from_json(r#"{"port": "abc"}"#),
            Err(IrbisError::SettingsFormat(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new("irbis-settings").unwrap();
        let path = dir.path().join("connection.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{ "host": "127.0.0.1", "port": 7777,"#).unwrap();
        writeln!(file, r#"  "username": "1", "password": "1" }}"#).unwrap();
        drop(file);

        let settings = ConnectionSettings::from_file(&path).unwrap();
        assert_eq!(settings.port, 7777);
        assert_eq!(settings.username, "1");
        assert_eq!(settings.database, "IBIS");

        let missing = ConnectionSettings::from_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(IrbisError::SettingsFile { .. })));
    }
}
