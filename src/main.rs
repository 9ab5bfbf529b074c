//! covidstats - Query cached COVID-19 statistics
//!
//! Loads the latest ParseHub run once, answers a single query against it, and
//! optionally waits in the background for the next run to publish new data.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use covidstats::cli::{log_filter, Cli, Query, StartupConfig};
use covidstats::{
    CountryLookup, CountryStat, GlobalMetric, ParseHubClient, RefreshConfig, StatLookup,
    StatsCache, NOT_FOUND,
};

/// How often `watch` checks whether the refresh has finished
const WATCH_TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> ExitCode {
    // Credentials may live in a .env file next to the binary
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(cli.verbose).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StartupConfig::from_cli(cli)?;

    let mut refresh = RefreshConfig::default();
    if let Query::Watch { poll_interval } = config.query {
        refresh.poll_interval = poll_interval;
    }

    let client = ParseHubClient::new(config.api_key, config.project_token);
    let cache = StatsCache::connect(client, refresh).await?;

    match config.query {
        Query::Total(metric) => println!("{}", cache.worldwide(metric)),
        Query::Country {
            name,
            stat: Some(stat),
        } => print_country_stat(&name, stat, cache.lookup_country_stat(&name, stat)),
        Query::Country { name, stat: None } => print_country(cache.fetch_country(&name)),
        Query::Countries => {
            for name in cache.list_country_names() {
                println!("{name}");
            }
        }
        Query::Watch { .. } => watch(&cache).await,
    }

    Ok(())
}

fn print_country(lookup: CountryLookup) {
    match lookup {
        CountryLookup::Found(record) => {
            println!("{}", record.name);
            for (key, value) in &record.fields {
                println!("  {key}: {value}");
            }
        }
        CountryLookup::NotFound => println!("{NOT_FOUND}"),
    }
}

/// Prints the value, or the not-found marker with the reason on stderr
fn print_country_stat(name: &str, stat: CountryStat, lookup: StatLookup) {
    match &lookup {
        StatLookup::Value(_) => {}
        StatLookup::UnknownCountry => eprintln!("No country named '{name}'"),
        StatLookup::MissingField => eprintln!("No {} recorded for '{name}'", stat.key()),
    }
    println!("{}", lookup.or_not_found());
}

/// Starts a refresh and blocks until it installs new data or Ctrl-C
async fn watch(cache: &StatsCache) {
    let loaded_at = cache.fetched_at();
    cache.refresh_async();
    println!("Data is being updated. This may take a moment!");

    let mut ticker = tokio::time::interval(WATCH_TICK);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !cache.is_refreshing() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                cache.cancel_refresh();
                println!("Stopped waiting; keeping data from {loaded_at}");
                return;
            }
        }
    }

    if cache.fetched_at() > loaded_at {
        println!("Data updated at {}", cache.fetched_at());
        for metric in GlobalMetric::all() {
            println!("{} {}", metric.display_name(), cache.worldwide(*metric));
        }
    }
}
