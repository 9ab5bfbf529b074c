//! covidstats Library
//!
//! A cached, self-refreshing view of the COVID-19 statistics a ParseHub
//! project scrapes. Construct a [`StatsCache`], query it synchronously, and
//! call [`StatsCache::refresh_async`] to pick up the next scraper run.

pub mod cache;
pub mod cli;
pub mod data;
pub mod refresh;

pub use cache::{CountryLookup, StatLookup, StatsCache, NOT_FOUND};
pub use data::{
    CountryRecord, CountryStat, FetchError, GlobalMetric, ParseHubClient, Snapshot, StatsSource,
    Total,
};
pub use refresh::{RefreshConfig, RefreshOutcome};
