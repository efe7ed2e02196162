use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

pub const DEFAULT_CSV_URL: &str = "https://docs.google.com/spreadsheets/d/1mQLNL9S9h5cuM7pdinbipMF9y6OmRxu_-Qjl0aP5tlk/export?format=csv&gid=0";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://roster-notes.db";

/// Connection and caching flags shared by every subcommand. Each one can
/// also come from the environment or a `.env` file.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Published CSV export of the roster sheet
    #[arg(long, env = "ROSTER_CSV_URL", default_value = DEFAULT_CSV_URL, global = true)]
    pub csv_url: String,

    /// Read the roster from a local CSV file instead of the sheet
    #[arg(long, env = "ROSTER_CSV_FILE", global = true)]
    pub csv_file: Option<PathBuf>,

    /// SQLite database for notes, tags and the last downloaded roster
    #[arg(long, env = "ROSTER_DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Seconds a downloaded roster is reused, across runs, before fetching again
    #[arg(long, env = "ROSTER_CACHE_TTL_SECS", default_value_t = 600, global = true)]
    pub cache_ttl_secs: u64,

    /// Extra download attempts after a failed one
    #[arg(long, env = "ROSTER_FETCH_RETRIES", default_value_t = 2, global = true)]
    pub retries: u32,

    /// Per-request timeout for the sheet download
    #[arg(long, env = "ROSTER_FETCH_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterLocation {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub roster: RosterLocation,
    pub database_url: String,
    pub stale_after: Duration,
    pub retries: u32,
    pub fetch_timeout: Duration,
}

impl From<GlobalArgs> for Settings {
    fn from(args: GlobalArgs) -> Self {
        let roster = match args.csv_file {
            Some(path) => RosterLocation::File(path),
            None => RosterLocation::Url(args.csv_url),
        };

        Self {
            roster,
            database_url: args.database_url,
            stale_after: Duration::from_secs(args.cache_ttl_secs),
            retries: args.retries,
            fetch_timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        global: GlobalArgs,
    }

    #[test]
    fn local_file_takes_precedence_over_url() {
        let cli = TestCli::parse_from([
            "cohort-roster",
            "--csv-file",
            "roster.csv",
            "--cache-ttl-secs",
            "5",
            "--retries",
            "0",
        ]);
        let settings = Settings::from(cli.global);

        assert_eq!(settings.roster, RosterLocation::File(PathBuf::from("roster.csv")));
        assert_eq!(settings.stale_after, Duration::from_secs(5));
        assert_eq!(settings.retries, 0);
    }

    #[test]
    fn url_is_used_without_local_file() {
        let cli = TestCli::parse_from(["cohort-roster", "--csv-url", "https://example.com/r.csv"]);
        let settings = Settings::from(cli.global);
        assert_eq!(
            settings.roster,
            RosterLocation::Url("https://example.com/r.csv".to_string())
        );
    }
}
