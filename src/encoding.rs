//! Text encodings used on the wire.
//!
//! The server mixes two encodings in one byte stream: "ANSI" lines are
//! Windows-1251 (CP1251) and "UTF" lines are UTF-8. Nothing in the stream
//! says which one a line uses; the command being executed decides.
//!
//! The module also holds the delimiter helpers used to fold multi-line text
//! into a single protocol line and back.

/// Line delimiter used inside a single protocol line.
pub const IRBIS_DELIMITER: &str = "\x1F\x1E";

/// Short form of [`IRBIS_DELIMITER`] found in some server answers.
pub const SHORT_DELIMITER: char = '\x1E';

/// Trailing half of [`IRBIS_DELIMITER`].
pub const ALT_DELIMITER: char = '\x1F';

/// Characters for CP1251 bytes 0x80-0xBF.
///
/// 0x98 is unassigned in CP1251 and maps to the C1 control of the same value.
const CP1251_HIGH: [char; 64] = [
    // 0x80-0x8F
    '\u{0402}', '\u{0403}', '\u{201A}', '\u{0453}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{20AC}', '\u{2030}', '\u{0409}', '\u{2039}', '\u{040A}', '\u{040C}', '\u{040B}', '\u{040F}',
    // 0x90-0x9F
    '\u{0452}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{0098}', '\u{2122}', '\u{0459}', '\u{203A}', '\u{045A}', '\u{045C}', '\u{045B}', '\u{045F}',
    // 0xA0-0xAF
    '\u{00A0}', '\u{040E}', '\u{045E}', '\u{0408}', '\u{00A4}', '\u{0490}', '\u{00A6}', '\u{00A7}',
    '\u{0401}', '\u{00A9}', '\u{0404}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{0407}',
    // 0xB0-0xBF
    '\u{00B0}', '\u{00B1}', '\u{0406}', '\u{0456}', '\u{0491}', '\u{00B5}', '\u{00B6}', '\u{00B7}',
    '\u{0451}', '\u{2116}', '\u{0454}', '\u{00BB}', '\u{0458}', '\u{0405}', '\u{0455}', '\u{0457}',
];

/// Byte sent for characters CP1251 cannot represent.
const UNMAPPABLE: u8 = b'?';

/// Convert a CP1251 byte to a character.
///
/// ```
/// use irbis::encoding::ansi_to_char;
///
/// assert_eq!(ansi_to_char(b'A'), 'A');
/// assert_eq!(ansi_to_char(0xC0), 'А');
/// assert_eq!(ansi_to_char(0xB9), '№');
/// ```
pub fn ansi_to_char(byte: u8) -> char {
    match byte {
        0x00..=0x7F => byte as char,
        0x80..=0xBF => CP1251_HIGH[(byte - 0x80) as usize],
        // А..я are contiguous in both tables
        _ => char::from_u32(0x0410 + (byte - 0xC0) as u32).unwrap_or('?'),
    }
}

/// CP1251 byte of a character, if the code page has one.
pub fn try_char_to_ansi(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x00..=0x7F => Some(code as u8),
        0x0410..=0x044F => Some((code - 0x0410) as u8 + 0xC0),
        _ => CP1251_HIGH
            .iter()
            .position(|&c| c == ch)
            .map(|index| index as u8 + 0x80),
    }
}

/// Convert a character to its CP1251 byte, `?` when it has none.
pub fn char_to_ansi(ch: char) -> u8 {
    try_char_to_ansi(ch).unwrap_or(UNMAPPABLE)
}

/// Decode a CP1251 byte slice.
pub fn decode_ansi(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| ansi_to_char(b)).collect()
}

/// Encode text as CP1251, replacing characters it lacks with `?`.
pub fn encode_ansi(text: &str) -> Vec<u8> {
    text.chars().map(char_to_ansi).collect()
}

/// First character of `text` that CP1251 cannot represent.
pub fn find_unmappable(text: &str) -> Option<char> {
    text.chars().find(|&ch| try_char_to_ansi(ch).is_none())
}

/// Decode a UTF-8 byte slice, replacing invalid sequences.
pub fn decode_utf(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split text on [`IRBIS_DELIMITER`].
pub fn irbis_to_lines(text: &str) -> Vec<String> {
    text.split(IRBIS_DELIMITER).map(str::to_string).collect()
}

/// Split text on [`SHORT_DELIMITER`].
pub fn short_irbis_to_lines(text: &str) -> Vec<String> {
    text.split(SHORT_DELIMITER).map(str::to_string).collect()
}

/// Replace [`IRBIS_DELIMITER`] with CRLF.
pub fn irbis_to_dos(text: &str) -> String {
    text.replace(IRBIS_DELIMITER, "\r\n")
}

/// Fold CRLF or LF line breaks into [`IRBIS_DELIMITER`].
pub fn dos_to_irbis(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', IRBIS_DELIMITER)
}
