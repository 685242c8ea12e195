//! CLI argument parsing for the sonometer-etl-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sonometer-etl-worker", about = "Sonometer uplink CSV ingestion worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Consume CSV jobs from the queue (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Ingest one CSV file in-process and print its summary as JSON
    Ingest {
        /// Path of the CSV export
        path: PathBuf,
    },
    /// Queue a CSV file for ingestion by a running worker
    Submit {
        /// Path of the CSV export, as seen by the worker
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["sonometer-etl-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["sonometer-etl-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_ingest_takes_path() {
        let cli = Cli::parse_from(["sonometer-etl-worker", "ingest", "/data/inbound/a.csv"]);
        match cli.command {
            Some(Command::Ingest { path }) => assert_eq!(path, PathBuf::from("/data/inbound/a.csv")),
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn test_cli_submit_requires_path() {
        assert!(Cli::try_parse_from(["sonometer-etl-worker", "submit"]).is_err());
    }
}
