//! Client for the IRBIS64 library automation server.
//!
//! A session registers with the server, then reads, writes, formats and
//! searches bibliographic records, walks the inverted file and exchanges
//! server text files. [`Connection`] blocks the calling thread;
//! [`AsyncConnection`] runs the same commands on a tokio runtime.
pub mod encoding;
pub mod error;
pub mod info;
pub mod protocol;
pub mod record;
pub mod search;
pub mod session;
pub mod settings;
pub mod specification;
pub mod terms;

pub use error::{IrbisError, Result};
pub use info::{DatabaseInfo, ServerVersion};
pub use record::{Field, Record, RecordStatus, SubField};
pub use search::{FoundLine, SearchParameters};
pub use session::{AsyncConnection, Connection, ServerIni, SessionState, TextFileParser, commands::WriteOptions};
pub use settings::ConnectionSettings;
pub use specification::{FileRef, FileSpecification, PathCode};
pub use terms::{PostingParameters, TermInfo, TermParameters, TermPosting};
