//! Client-server communication protocol.
//!
//! This module defines how requests are framed for the IRBIS64 server, how
//! its answers are decoded and how bytes travel between the two.
//!
//! # Overview
//!
//! Every exchange uses a fresh TCP connection: the client writes one packet,
//! the server answers and closes the connection. Both directions are plain
//! text lines, each line encoded either as Windows-1251 ("ANSI") or UTF-8
//! depending on the command. Lines carry no length or encoding tags.
//!
//! # Key Components
//!
//! - [`Query`]: Request under construction, finalized by [`Query::encode`].
//! - [`Response`]: Decoder over one fully received answer.
//! - [`codes`]: Return-code descriptions and per-command accepted codes.
//! - [`Transport`] / [`AsyncTransport`]: Blocking and suspending byte exchange.
//!
//! # Packet Format
//!
//! ```text
//! request:  {body length}\n {command}\n {workstation}\n {command}\n
//!           {client id}\n {query id}\n {password}\n {username}\n \n \n \n
//!           command lines, each followed by \n
//! response: {command}\r\n {client id}\r\n {query id}\r\n {answer size}\r\n
//!           {server version}\r\n five reserved lines, then the payload,
//!           usually starting with the return code
//! ```
pub mod codes;
mod query;
mod response;
mod transport;

pub use query::{LineEncoding, Query, QueryHeader};
pub use response::Response;
pub use transport::{AsyncTransport, Endpoint, TcpTransport, TokioTransport, Transport, TransportError};

#[cfg(test)]
pub(crate) use transport::testing;

/// Command codes understood by the server.
pub mod command {
    pub const ACTUALIZE_RECORD: &str = "F";
    pub const CREATE_DATABASE: &str = "T";
    pub const CREATE_DICTIONARY: &str = "Z";
    pub const DELETE_DATABASE: &str = "W";
    pub const EMPTY_DATABASE: &str = "S";
    pub const FORMAT_RECORD: &str = "G";
    pub const GET_MAX_MFN: &str = "O";
    pub const LIST_FILES: &str = "!";
    pub const NOP: &str = "N";
    pub const READ_DOCUMENT: &str = "L";
    pub const READ_POSTINGS: &str = "I";
    pub const READ_RECORD: &str = "C";
    pub const READ_RECORD_POSTINGS: &str = "V";
    pub const READ_TERMS: &str = "H";
    pub const READ_TERMS_REVERSE: &str = "P";
    pub const RECORD_LIST: &str = "0";
    pub const REGISTER_CLIENT: &str = "A";
    pub const RELOAD_DICTIONARY: &str = "Y";
    pub const RELOAD_MASTER_FILE: &str = "X";
    pub const RESTART_SERVER: &str = "+8";
    pub const SAVE_RECORD_GROUP: &str = "6";
    pub const SEARCH: &str = "K";
    pub const SERVER_INFO: &str = "1";
    pub const UNLOCK_DATABASE: &str = "U";
    pub const UNLOCK_RECORDS: &str = "Q";
    pub const UNREGISTER_CLIENT: &str = "B";
    pub const UPDATE_INI_FILE: &str = "8";
    pub const UPDATE_RECORD: &str = "D";
}

/// Largest number of MFNs the server formats or returns in one request.
pub const MAX_POSTINGS: usize = 32758;

/// Format returning the full wire form of each record.
pub const ALL_FORMAT: &str = "&uf('+0')";

/// Marker preceding the content of a binary file in a response.
pub const BINARY_DATA_MARKER: &[u8] = b"IRBIS_BINARY_DATA";
