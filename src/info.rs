use crate::{
    encoding::SHORT_DELIMITER,
    error::{IrbisError, Result},
    protocol::Response,
};

/// State of a database as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,
    pub max_mfn: u32,
    pub logically_deleted: Vec<u32>,
    pub physically_deleted: Vec<u32>,
    pub nonactualized: Vec<u32>,
    pub locked_records: Vec<u32>,
    pub database_locked: bool,
}

fn mfn_list(line: &str) -> Result<Vec<u32>> {
    line.split(SHORT_DELIMITER)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse()
                .map_err(|_| IrbisError::malformed(format!("bad MFN {item:?} in record list")))
        })
        .collect()
}

impl DatabaseInfo {
    /// Read the record lists that follow the return code.
    pub fn parse(name: &str, response: &mut Response) -> Result<Self> {
        let logically_deleted = mfn_list(&response.ansi())?;
        let physically_deleted = mfn_list(&response.ansi())?;
        let nonactualized = mfn_list(&response.ansi())?;
        let locked_records = mfn_list(&response.ansi())?;
        let max_mfn = response.number()?;
        let database_locked = response.number()? != 0;

        Ok(Self {
            name: name.to_string(),
            max_mfn: u32::try_from(max_mfn).unwrap_or_default(),
            logically_deleted,
            physically_deleted,
            nonactualized,
            locked_records,
            database_locked,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVersion {
    pub organization: String,
    pub version: String,
    pub connected_clients: u32,
    pub max_clients: u32,
}

impl ServerVersion {
    /// Older servers omit the licensed organization line.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let lines: Vec<&str> = lines.iter().map(|line| line.as_ref()).collect();
        let count = |text: &str| -> Result<u32> {
            text.trim()
                .parse()
                .map_err(|_| IrbisError::malformed(format!("bad client count {text:?}")))
        };

        match lines.as_slice() {
            &[version, connected, max] => Ok(Self {
                organization: String::new(),
                version: version.to_string(),
                connected_clients: count(connected)?,
                max_clients: count(max)?,
            }),
            &[organization, version, connected, max, ..] => Ok(Self {
                organization: organization.to_string(),
                version: version.to_string(),
                connected_clients: count(connected)?,
                max_clients: count(max)?,
            }),
            _ => Err(IrbisError::malformed(format!(
                "server version answer has {} lines",
                lines.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::answer;

    #[test]
    fn database_info_lists() {
        let data = answer("0", &["0", "3\x1E5\x1E", "", "7", "", "120", "1"]);
        let mut response = Response::new(data).unwrap();
        response.check_return_code(&[]).unwrap();

        let info = DatabaseInfo::parse("IBIS", &mut response).unwrap();
        assert_eq!(info.name, "IBIS");
        assert_eq!(info.logically_deleted, vec![3, 5]);
        assert!(info.physically_deleted.is_empty());
        assert_eq!(info.nonactualized, vec![7]);
        assert_eq!(info.max_mfn, 120);
        assert!(info.database_locked);
    }

    #[test]
    fn version_with_and_without_organization() {
        let short = ServerVersion::parse(&["64.2014", "1", "100"]).unwrap();
        assert!(short.organization.is_empty());
        assert_eq!(short.max_clients, 100);

        let full = ServerVersion::parse(&["Library", "64.2018.1", "3", "50", ""]).unwrap();
        assert_eq!(full.organization, "Library");
        assert_eq!(full.version, "64.2018.1");
        assert_eq!(full.connected_clients, 3);

        assert!(ServerVersion::parse(&["64"]).is_err());
    }
}
