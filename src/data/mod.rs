//! Core data models for the COVID-19 statistics cache
//!
//! This module contains the parsed statistics document (`Snapshot`), the
//! typed metric helpers used by callers, and the `StatsSource` seam through
//! which snapshots are fetched.

pub mod parsehub;

pub use parsehub::ParseHubClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur when fetching a statistics snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed or returned a non-success status
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Response body is not a statistics document
    #[error("Failed to parse statistics document: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Anything that can produce a fresh statistics snapshot.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetches the most recent complete statistics document.
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

/// A single worldwide aggregate, e.g. `{"name": "Deaths:", "value": "3,000"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total {
    /// Upstream display name, including its trailing colon
    pub name: String,
    /// Value as scraped (formatted, not numeric)
    pub value: String,
}

/// Statistics for one country
///
/// Only `name` is guaranteed; every other field is carried through as
/// supplied by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// Country display name
    pub name: String,
    /// Remaining string fields (`total_cases`, `total_deaths`, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl CountryRecord {
    /// Returns the raw value of a field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns the value for a known per-country statistic.
    pub fn stat(&self, stat: CountryStat) -> Option<&str> {
        self.field(stat.key())
    }
}

/// One complete statistics document as published by the scraper
///
/// Equality is structural: two snapshots are equal when every total and
/// every country record matches, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Worldwide aggregates
    #[serde(rename = "total")]
    pub totals: Vec<Total>,
    /// Per-country records in source order
    #[serde(rename = "country")]
    pub countries: Vec<CountryRecord>,
}

impl Snapshot {
    /// Looks up a worldwide total by its exact upstream display name.
    pub fn global_total(&self, metric_name: &str) -> Option<&str> {
        self.totals
            .iter()
            .find(|total| total.name == metric_name)
            .map(|total| total.value.as_str())
    }

    /// Looks up a country by name, ignoring case.
    pub fn country(&self, country_name: &str) -> Option<&CountryRecord> {
        let wanted = country_name.to_lowercase();
        self.countries
            .iter()
            .find(|record| record.name.to_lowercase() == wanted)
    }

    /// Lower-cased country names in source order.
    pub fn country_names(&self) -> Vec<String> {
        self.countries
            .iter()
            .map(|record| record.name.to_lowercase())
            .collect()
    }
}

/// Worldwide metrics published in the `total` section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalMetric {
    /// Confirmed cases
    Cases,
    /// Deaths
    Deaths,
    /// Recoveries
    Recovered,
}

impl GlobalMetric {
    /// Returns all metric variants.
    pub fn all() -> &'static [GlobalMetric] {
        &[GlobalMetric::Cases, GlobalMetric::Deaths, GlobalMetric::Recovered]
    }

    /// The exact display string the scraper uses for this metric.
    pub fn display_name(&self) -> &'static str {
        match self {
            GlobalMetric::Cases => "Coronavirus Cases:",
            GlobalMetric::Deaths => "Deaths:",
            GlobalMetric::Recovered => "Recovered:",
        }
    }

    /// Parses a metric name from user input.
    ///
    /// Accepts singular and plural spellings; returns `None` otherwise.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<GlobalMetric> {
        match s.to_lowercase().trim() {
            "case" | "cases" => Some(GlobalMetric::Cases),
            "death" | "deaths" => Some(GlobalMetric::Deaths),
            "recovered" | "recovery" | "recoveries" => Some(GlobalMetric::Recovered),
            _ => None,
        }
    }
}

/// Per-country statistics with a well-known field name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryStat {
    /// Confirmed cases (`total_cases`)
    Cases,
    /// Deaths (`total_deaths`)
    Deaths,
    /// Recoveries (`total_recoveries`)
    Recoveries,
    /// Population (`total_population`)
    Population,
}

impl CountryStat {
    /// Returns all statistic variants.
    pub fn all() -> &'static [CountryStat] {
        &[
            CountryStat::Cases,
            CountryStat::Deaths,
            CountryStat::Recoveries,
            CountryStat::Population,
        ]
    }

    /// Field name in a `CountryRecord`.
    pub fn key(&self) -> &'static str {
        match self {
            CountryStat::Cases => "total_cases",
            CountryStat::Deaths => "total_deaths",
            CountryStat::Recoveries => "total_recoveries",
            CountryStat::Population => "total_population",
        }
    }

    /// Parses a statistic name from user input.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<CountryStat> {
        match s.to_lowercase().trim() {
            "case" | "cases" => Some(CountryStat::Cases),
            "death" | "deaths" => Some(CountryStat::Deaths),
            "recovery" | "recoveries" | "recovered" => Some(CountryStat::Recoveries),
            "population" => Some(CountryStat::Population),
            _ => None,
        }
    }
}
