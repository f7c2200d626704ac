use std::{error::Error, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use irbis::{
    AsyncConnection, Connection, ConnectionSettings, FileSpecification, SearchParameters, TermParameters,
    session::{operation::Operation, ops},
};
use log::debug;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Run the session on a tokio runtime
    #[arg(long = "async")]
    nonblocking: bool,
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Connection string, e.g. "host=127.0.0.1;user=librarian;password=secret;"
    #[arg(short, long, env = "IRBIS_CONNECTION")]
    connection: Option<String>,
    #[arg(long, env = "IRBIS_HOST")]
    host: Option<String>,
    #[arg(long, env = "IRBIS_PORT")]
    port: Option<u16>,
    #[arg(short, long, env = "IRBIS_USER")]
    user: Option<String>,
    #[arg(short, long, env = "IRBIS_PASSWORD")]
    password: Option<String>,
    #[arg(short, long, env = "IRBIS_DATABASE")]
    database: Option<String>,
}

impl ConnectionArgs {
    fn resolve(self) -> irbis::Result<ConnectionSettings> {
        let mut settings = match &self.settings {
            Some(path) => ConnectionSettings::from_file(path)?,
            None => ConnectionSettings::default(),
        };
        if let Some(text) = &self.connection {
            settings.apply_connection_string(text)?;
        }
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(user) = self.user {
            settings.username = user;
        }
        if let Some(password) = self.password {
            settings.password = password;
        }
        if let Some(database) = self.database {
            settings.database = database;
        }
        Ok(settings)
    }
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Show the server version and client counts
    Version,
    /// Show the max MFN of the database
    MaxMfn,
    /// Print a record
    Read { mfn: u32 },
    /// Search and print the found MFNs, or formatted lines with --format
    Search {
        expression: String,
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Format records with a script
    Format {
        script: String,
        #[arg(required = true)]
        mfns: Vec<u32>,
    },
    /// Browse the dictionary from a start term
    Terms {
        start: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: u32,
        #[arg(long)]
        reverse: bool,
    },
    /// Print a server text file given as "path.database.filename"
    File { specification: FileSpecification },
}

impl Action {
    fn search_parameters(expression: &str, format: &Option<String>) -> SearchParameters {
        let parameters = SearchParameters::new(expression);
        match format {
            Some(format) => parameters.with_format(format.as_str()),
            None => parameters,
        }
    }

    fn term_parameters(start: &str, count: u32, reverse: bool) -> TermParameters {
        TermParameters {
            number_of_terms: count,
            reverse,
            ..TermParameters::new(start)
        }
    }

    /// The session call behind the action, yielding printable lines.
    fn operation(&self) -> Box<dyn Operation<Output = Vec<String>> + '_> {
        match self {
            Action::Version => Box::new(ops::get_server_version().map(|version| {
                Ok(vec![format!(
                    "{} {} ({}/{} clients)",
                    version.organization, version.version, version.connected_clients, version.max_clients
                )])
            })),
            Action::MaxMfn => Box::new(ops::get_max_mfn(None).map(|max_mfn| Ok(vec![max_mfn.to_string()]))),
            Action::Read { mfn } => Box::new(ops::require_record(*mfn).map(|record| Ok(vec![record.to_string()]))),
            Action::Search { expression, format } => Box::new(
                ops::search_ex(&Action::search_parameters(expression, format)).map(|found| {
                    Ok(found
                        .into_iter()
                        .map(|found| match found.description {
                            Some(description) => format!("{}\t{description}", found.mfn),
                            None => found.mfn.to_string(),
                        })
                        .collect::<Vec<_>>())
                }),
            ),
            Action::Format { script, mfns } => Box::new(ops::format_records(script, mfns)),
            Action::Terms { start, count, reverse } => Box::new(
                ops::read_terms(&Action::term_parameters(start, *count, *reverse)).map(|terms| {
                    Ok(terms
                        .into_iter()
                        .map(|term| format!("{}\t{}", term.count, term.text))
                        .collect::<Vec<_>>())
                }),
            ),
            Action::File { specification } => {
                Box::new(ops::require_text_file(specification.clone()).map(|text| Ok(vec![text])))
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = cli.connection.resolve()?;
    debug!("using {}", settings.endpoint());

    let outcome = if cli.nonblocking {
        let runtime = tokio::runtime::Runtime::new()?;
        let mut connection = AsyncConnection::new(settings, runtime.handle().clone());
        runtime.block_on(async {
            connection.connect().await?;
            let outcome = connection.perform(cli.action.operation()).await;
            connection.disconnect().await;
            outcome
        })
    } else {
        let mut connection = Connection::new(settings);
        connection.connect()?;
        let outcome = connection.perform(cli.action.operation());
        connection.disconnect();
        outcome
    };

    for line in outcome? {
        println!("{line}");
    }
    Ok(())
}
