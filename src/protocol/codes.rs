//! Server return codes.
//!
//! Negative return codes are errors, except where a command family lists
//! them as informational. The families live in one table so a new accepted
//! code is a data change, not a change to command logic.

/// Groups of commands sharing the same accepted negative codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFamily {
    /// Any command without a special table: only codes >= 0 succeed.
    Generic,
    /// Reading a record; older versions, deleted and locked records still
    /// carry a payload.
    ReadRecord,
    /// Term browsing and postings; running off either end of the dictionary
    /// is an empty result.
    ReadTerms,
}

/// Registration answer telling the client id is already taken.
pub const CLIENT_ALREADY_EXISTS: i32 = -3337;

const ACCEPTED: &[(CommandFamily, &[i32])] = &[
    (CommandFamily::Generic, &[]),
    (CommandFamily::ReadRecord, &[-201, -600, -602, -603]),
    (CommandFamily::ReadTerms, &[-202, -203, -204]),
];

impl CommandFamily {
    /// Negative codes the family treats as success.
    pub fn accepted(self) -> &'static [i32] {
        ACCEPTED
            .iter()
            .find(|(family, _)| *family == self)
            .map(|(_, codes)| *codes)
            .unwrap_or(&[])
    }
}

const DESCRIPTIONS: &[(i32, &str)] = &[
    (-100, "MFN outside the database range"),
    (-101, "bad shelf size"),
    (-102, "bad shelf number"),
    (-140, "MFN outside the database range"),
    (-141, "read error"),
    (-200, "field is absent"),
    (-201, "previous version of the record is absent"),
    (-202, "term not found"),
    (-203, "last term in the list"),
    (-204, "first term in the list"),
    (-300, "database is locked"),
    (-301, "database is locked"),
    (-400, "error opening MST or XRF"),
    (-401, "error opening IFP"),
    (-402, "write error"),
    (-403, "actualization error"),
    (-600, "record is logically deleted"),
    (-601, "record is physically deleted"),
    (-602, "record is locked"),
    (-603, "record is logically deleted"),
    (-605, "record is physically deleted"),
    (-607, "autoin.gbl error"),
    (-608, "record version mismatch"),
    (-700, "backup creation failed"),
    (-701, "backup restore failed"),
    (-702, "sort failed"),
    (-703, "bad term"),
    (-704, "dictionary creation failed"),
    (-705, "dictionary load failed"),
    (-800, "bad global correction parameters"),
    (-801, "ERR_GBL_REP"),
    (-802, "ERR_GBL_MET"),
    (-1111, "server execution error"),
    (-2222, "protocol error"),
    (-3333, "unregistered client"),
    (-3334, "client is not logged in"),
    (-3335, "bad client id"),
    (-3336, "no access to workstation commands"),
    (CLIENT_ALREADY_EXISTS, "client already registered"),
    (-3338, "invalid client"),
    (-4444, "wrong password"),
    (-5555, "file does not exist"),
    (-6666, "server overloaded"),
    (-7777, "administrator thread failure"),
    (-8888, "general error"),
];

/// Human-readable text for a return code.
pub fn describe(code: i32) -> &'static str {
    if code >= 0 {
        return "no error";
    }
    DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| *text)
        .unwrap_or("unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_have_documented_codes() {
        assert!(CommandFamily::Generic.accepted().is_empty());
        assert!(CommandFamily::ReadRecord.accepted().contains(&-201));
        assert!(CommandFamily::ReadRecord.accepted().contains(&-600));
        assert!(CommandFamily::ReadTerms.accepted().contains(&-202));
        assert!(!CommandFamily::ReadTerms.accepted().contains(&-201));
    }

    #[test]
    fn descriptions() {
        assert_eq!(describe(0), "no error");
        assert_eq!(describe(-4444), "wrong password");
        assert_eq!(describe(-9), "unknown error");
    }
}
