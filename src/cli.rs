//! Command-line interface parsing for covidstats
//!
//! This module handles parsing of CLI arguments using clap, resolving
//! credentials (flags or environment) and turning free-form metric names into
//! typed queries against the statistics cache.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::{CountryStat, GlobalMetric};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified worldwide metric is not recognized
    #[error("Invalid metric: '{0}'. Valid metrics: cases, deaths, recovered")]
    InvalidMetric(String),

    /// The specified country statistic is not recognized
    #[error("Invalid statistic: '{0}'. Valid statistics: cases, deaths, recoveries, population")]
    InvalidStat(String),

    /// A required credential was given neither as a flag nor in the environment
    #[error("Missing {0}")]
    MissingCredential(&'static str),

    /// The polling interval must be positive
    #[error("Poll interval must be at least one second")]
    InvalidPollInterval,
}

/// covidstats - Query cached COVID-19 statistics scraped by ParseHub
#[derive(Parser, Debug)]
#[command(name = "covidstats")]
#[command(about = "Query cached COVID-19 statistics scraped by ParseHub")]
#[command(version)]
pub struct Cli {
    /// ParseHub API key
    #[arg(long, env = "PARSEHUB_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// ParseHub project token
    #[arg(long, env = "PARSEHUB_PROJECT_TOKEN", hide_env_values = true)]
    pub project_token: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a worldwide total (cases, deaths, recovered)
    Total {
        /// Metric to print
        metric: String,
    },
    /// Print statistics for one country
    Country {
        /// Country name, case-insensitive (e.g. "usa", "south korea")
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        /// Print only this statistic (cases, deaths, recoveries, population);
        /// prints 0 when missing, with the reason on stderr
        #[arg(long)]
        stat: Option<String>,
    },
    /// List every country in the current data
    Countries,
    /// Refresh in the background and wait until the data changes
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
    },
}

/// A resolved query against the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Total(GlobalMetric),
    Country {
        name: String,
        stat: Option<CountryStat>,
    },
    Countries,
    Watch {
        poll_interval: Duration,
    },
}

/// Everything the binary needs to run, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub api_key: String,
    pub project_token: String,
    pub query: Query,
}

/// Parses a worldwide metric argument.
///
/// # Returns
/// * `Ok(GlobalMetric)` if the string names a metric
/// * `Err(CliError::InvalidMetric)` otherwise
pub fn parse_metric_arg(s: &str) -> Result<GlobalMetric, CliError> {
    GlobalMetric::from_str(s).ok_or_else(|| CliError::InvalidMetric(s.to_string()))
}

/// Parses a per-country statistic argument.
pub fn parse_stat_arg(s: &str) -> Result<CountryStat, CliError> {
    CountryStat::from_str(s).ok_or_else(|| CliError::InvalidStat(s.to_string()))
}

/// Log filter for a `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,covidstats=info",
        1 => "info,covidstats=debug",
        2 => "debug",
        _ => "trace",
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with credentials and a typed query
    /// * `Err(CliError)` if a credential is missing or an argument is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let query = match &cli.command {
            Command::Total { metric } => Query::Total(parse_metric_arg(metric)?),
            Command::Country { name, stat } => Query::Country {
                name: name.join(" "),
                stat: stat.as_deref().map(parse_stat_arg).transpose()?,
            },
            Command::Countries => Query::Countries,
            Command::Watch { poll_secs: 0 } => return Err(CliError::InvalidPollInterval),
            Command::Watch { poll_secs } => Query::Watch {
                poll_interval: Duration::from_secs(*poll_secs),
            },
        };

        let api_key = cli
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(CliError::MissingCredential("API key (--api-key or PARSEHUB_API_KEY)"))?;
        let project_token = cli
            .project_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(CliError::MissingCredential(
                "project token (--project-token or PARSEHUB_PROJECT_TOKEN)",
            ))?;

        Ok(StartupConfig {
            api_key,
            project_token,
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["covidstats", "--api-key", "key", "--project-token", "token"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_parse_metric_arg_aliases() {
        assert_eq!(parse_metric_arg("cases").unwrap(), GlobalMetric::Cases);
        assert_eq!(parse_metric_arg("Deaths").unwrap(), GlobalMetric::Deaths);
        assert_eq!(parse_metric_arg("recoveries").unwrap(), GlobalMetric::Recovered);
    }

    #[test]
    fn test_parse_metric_arg_invalid() {
        let err = parse_metric_arg("vaccinations").unwrap_err();
        assert!(err.to_string().contains("Invalid metric"));
        assert!(err.to_string().contains("vaccinations"));
    }

    #[test]
    fn test_parse_stat_arg() {
        assert_eq!(parse_stat_arg("population").unwrap(), CountryStat::Population);
        assert!(parse_stat_arg("gdp").is_err());
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(0), "warn,covidstats=info");
        assert_eq!(log_filter(2), "debug");
        assert_eq!(log_filter(9), "trace");
    }

    #[test]
    fn test_cli_parse_total() {
        let cli = parse(&["total", "cases"]);
        assert_eq!(
            cli.command,
            Command::Total {
                metric: "cases".to_string()
            }
        );
    }

    #[test]
    fn test_cli_parse_verbose_after_subcommand() {
        let cli = parse(&["countries", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_startup_config_total() {
        let config = StartupConfig::from_cli(&parse(&["total", "deaths"])).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.project_token, "token");
        assert_eq!(config.query, Query::Total(GlobalMetric::Deaths));
    }

    #[test]
    fn test_startup_config_country_joins_words() {
        let config =
            StartupConfig::from_cli(&parse(&["country", "south", "korea", "--stat", "deaths"]))
                .unwrap();
        assert_eq!(
            config.query,
            Query::Country {
                name: "south korea".to_string(),
                stat: Some(CountryStat::Deaths),
            }
        );
    }

    #[test]
    fn test_startup_config_country_without_stat() {
        let config = StartupConfig::from_cli(&parse(&["country", "India"])).unwrap();
        assert_eq!(
            config.query,
            Query::Country {
                name: "India".to_string(),
                stat: None,
            }
        );
    }

    #[test]
    fn test_startup_config_watch_interval() {
        let config = StartupConfig::from_cli(&parse(&["watch", "--poll-secs", "2"])).unwrap();
        assert_eq!(
            config.query,
            Query::Watch {
                poll_interval: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_startup_config_rejects_zero_interval() {
        let result = StartupConfig::from_cli(&parse(&["watch", "--poll-secs", "0"]));
        assert!(matches!(result, Err(CliError::InvalidPollInterval)));
    }

    #[test]
    fn test_startup_config_invalid_metric() {
        let result = StartupConfig::from_cli(&parse(&["total", "bogus"]));
        assert!(matches!(result, Err(CliError::InvalidMetric(_))));
    }

    #[test]
    fn test_startup_config_empty_api_key_is_missing() {
        let cli = Cli::parse_from([
            "covidstats",
            "--api-key",
            "",
            "--project-token",
            "token",
            "countries",
        ]);
        let result = StartupConfig::from_cli(&cli);
        assert!(matches!(result, Err(CliError::MissingCredential(_))));
    }
}
