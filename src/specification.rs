//! Server-side file addressing.
//!
//! File commands name their target as `path.database.file`, where the path
//! code selects one of the server's directories. [`FileRef`] lets callers
//! pass either a full [`FileSpecification`] or a bare file name that is
//! resolved against the current database.
use std::{fmt, str::FromStr};

use crate::{
    encoding::dos_to_irbis,
    error::{IrbisError, Result},
};

/// Directory a file lives in on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCode {
    System,
    Data,
    MasterFile,
    InvertedFile,
    ParameterFile,
    FullText,
    InternalResource,
}

impl PathCode {
    pub fn code(self) -> u8 {
        match self {
            PathCode::System => 0,
            PathCode::Data => 1,
            PathCode::MasterFile => 2,
            PathCode::InvertedFile => 3,
            PathCode::ParameterFile => 10,
            PathCode::FullText => 11,
            PathCode::InternalResource => 12,
        }
    }

    /// System and data files are shared by all databases.
    fn is_shared(self) -> bool {
        matches!(self, PathCode::System | PathCode::Data)
    }
}

impl TryFrom<u8> for PathCode {
    type Error = IrbisError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => PathCode::System,
            1 => PathCode::Data,
            2 => PathCode::MasterFile,
            3 => PathCode::InvertedFile,
            10 => PathCode::ParameterFile,
            11 => PathCode::FullText,
            12 => PathCode::InternalResource,
            other => return Err(IrbisError::validation(format!("unknown path code {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpecification {
    pub path: PathCode,
    pub database: Option<String>,
    pub filename: String,
    /// Text to store; only set when writing a file.
    pub content: Option<String>,
    pub binary: bool,
}

impl FileSpecification {
    pub fn new(path: PathCode, database: Option<&str>, filename: impl Into<String>) -> Self {
        Self {
            path,
            database: database.map(str::to_string),
            filename: filename.into(),
            content: None,
            binary: false,
        }
    }

    pub fn system(filename: impl Into<String>) -> Self {
        Self::new(PathCode::System, None, filename)
    }

    /// File next to the master file of `database`.
    pub fn near_master(database: &str, filename: impl Into<String>) -> Self {
        Self::new(PathCode::MasterFile, Some(database), filename)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Form the server expects in file commands.
    pub fn to_wire_string(&self) -> String {
        let name = if self.binary {
            format!("@{}", self.filename)
        } else if self.content.is_some() {
            format!("&{}", self.filename)
        } else {
            self.filename.clone()
        };

        let code = self.path.code();
        let mut result = if self.path.is_shared() {
            format!("{code}..{name}")
        } else {
            format!("{code}.{}.{name}", self.database.as_deref().unwrap_or_default())
        };

        if let Some(content) = &self.content {
            result.push('&');
            result.push_str(&dos_to_irbis(content));
        }
        result
    }
}

impl fmt::Display for FileSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// Parses `path.database.file`; the database part may be empty.
impl FromStr for FileSpecification {
    type Err = IrbisError;

    fn from_str(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '.');
        let (Some(path), Some(database), Some(filename)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(IrbisError::validation(format!("bad file specification {text:?}")));
        };
        let path: u8 = path
            .trim()
            .parse()
            .map_err(|_| IrbisError::validation(format!("bad path code in {text:?}")))?;
        if filename.is_empty() {
            return Err(IrbisError::validation(format!("no file name in {text:?}")));
        }
        let database = Some(database).filter(|db| !db.is_empty());
        Ok(Self::new(PathCode::try_from(path)?, database, filename))
    }
}

/// File argument accepted by file commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Spec(FileSpecification),
    Name(String),
}

impl FileRef {
    /// Resolve to a full specification. Bare names live next to the master
    /// file of `database`, except parameter (`.par`) files, which live in the
    /// data directory.
    pub fn resolve(self, database: &str) -> FileSpecification {
        match self {
            FileRef::Spec(spec) => spec,
            FileRef::Name(name) if name.to_ascii_lowercase().ends_with(".par") => {
                FileSpecification::new(PathCode::Data, None, name)
            }
            FileRef::Name(name) => FileSpecification::near_master(database, name),
        }
    }
}

impl From<FileSpecification> for FileRef {
    fn from(spec: FileSpecification) -> Self {
        FileRef::Spec(spec)
    }
}

impl From<&str> for FileRef {
    fn from(name: &str) -> Self {
        FileRef::Name(name.to_string())
    }
}

impl From<String> for FileRef {
    fn from(name: String) -> Self {
        FileRef::Name(name)
    }
}
