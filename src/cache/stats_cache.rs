//! The statistics cache and its lookups

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::data::{
    CountryRecord, CountryStat, FetchError, GlobalMetric, ParseHubClient, Snapshot, StatsSource,
};
use crate::refresh::{RefreshConfig, RefreshOutcome, RefreshTask};

/// Returned by the string-valued lookups when nothing matches.
///
/// This marks "not found"; it is not a statistic of zero.
pub const NOT_FOUND: &str = "0";

/// The current snapshot together with when it was fetched
#[derive(Debug)]
pub(crate) struct CachedSnapshot {
    pub(crate) snapshot: Arc<Snapshot>,
    pub(crate) fetched_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            fetched_at: Utc::now(),
        }
    }
}

/// Result of a country lookup at the string boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryLookup {
    /// The full record of the matching country
    Found(CountryRecord),
    /// No country by that name; displays as [`NOT_FOUND`]
    NotFound,
}

impl CountryLookup {
    /// Whether a country matched
    pub fn is_found(&self) -> bool {
        matches!(self, CountryLookup::Found(_))
    }

    /// The matching record, if any
    pub fn into_option(self) -> Option<CountryRecord> {
        match self {
            CountryLookup::Found(record) => Some(record),
            CountryLookup::NotFound => None,
        }
    }
}

/// Result of asking for one statistic of one country
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatLookup {
    /// The statistic's value as scraped
    Value(String),
    /// No country by that name
    UnknownCountry,
    /// The country exists but its record has no such field
    MissingField,
}

impl StatLookup {
    /// The value, or [`NOT_FOUND`] for either kind of miss
    pub fn or_not_found(self) -> String {
        match self {
            StatLookup::Value(value) => value,
            StatLookup::UnknownCountry | StatLookup::MissingField => NOT_FOUND.to_string(),
        }
    }
}

impl From<Option<CountryRecord>> for CountryLookup {
    fn from(record: Option<CountryRecord>) -> Self {
        record.map_or(CountryLookup::NotFound, CountryLookup::Found)
    }
}

impl fmt::Display for CountryLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountryLookup::Found(record) => {
                let json = serde_json::to_string(record).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
            CountryLookup::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

/// Cached view of the COVID-19 statistics feed
///
/// Holds one immutable `Snapshot` at a time. Lookups never block and always
/// see a complete snapshot. [`StatsCache::refresh_async`] polls the source in
/// the background and swaps in the first snapshot that differs from the one
/// current when polling started.
///
/// Clones share the same snapshot and refresh task. Dropping the last clone
/// stops any refresh still in progress.
#[derive(Clone)]
pub struct StatsCache {
    /// Where snapshots come from
    source: Arc<dyn StatsSource>,
    /// Current snapshot, replaced as a whole
    current: Arc<ArcSwap<CachedSnapshot>>,
    /// The active refresh task, if one was started
    refresh_task: Arc<Mutex<Option<RefreshTask>>>,
    /// Timing of refresh polling
    config: RefreshConfig,
    /// Runtime the cache was built on; refresh tasks are spawned here
    runtime: Handle,
}

impl StatsCache {
    /// Builds a cache for a ParseHub project with default refresh timing
    ///
    /// # Arguments
    /// * `api_key` - ParseHub account API key
    /// * `project_token` - Token of the project that scrapes the statistics
    ///
    /// # Returns
    /// * `Ok(StatsCache)` - Cache holding the latest run's data
    /// * `Err(FetchError)` - If the initial fetch fails
    pub async fn from_credentials(
        api_key: impl Into<String>,
        project_token: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = ParseHubClient::new(api_key, project_token);
        Self::connect(client, RefreshConfig::default()).await
    }

    /// Builds a cache over any statistics source
    ///
    /// Performs one fetch before returning; no cache is produced if it fails.
    pub async fn connect(
        source: impl StatsSource + 'static,
        config: RefreshConfig,
    ) -> Result<Self, FetchError> {
        Self::connect_shared(Arc::new(source), config).await
    }

    /// Like [`StatsCache::connect`], for a source the caller keeps a handle to
    ///
    /// Refreshes later run on the runtime this is awaited on.
    pub async fn connect_shared(
        source: Arc<dyn StatsSource>,
        config: RefreshConfig,
    ) -> Result<Self, FetchError> {
        let snapshot = source.fetch().await?;
        info!(
            totals = snapshot.totals.len(),
            countries = snapshot.countries.len(),
            "statistics loaded"
        );

        Ok(Self {
            source,
            current: Arc::new(ArcSwap::from_pointee(CachedSnapshot::new(snapshot))),
            refresh_task: Arc::new(Mutex::new(None)),
            config,
            runtime: Handle::current(),
        })
    }

    /// Returns the current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.load().snapshot)
    }

    /// When the current snapshot was fetched
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.current.load().fetched_at
    }

    /// Looks up a worldwide total by its exact upstream display name
    /// (e.g. `"Coronavirus Cases:"`).
    pub fn global_total(&self, metric_name: &str) -> Option<String> {
        self.current
            .load()
            .snapshot
            .global_total(metric_name)
            .map(str::to_string)
    }

    /// Looks up a worldwide total, returning [`NOT_FOUND`] on a miss
    pub fn fetch_global_total(&self, metric_name: &str) -> String {
        self.global_total(metric_name)
            .unwrap_or_else(|| NOT_FOUND.to_string())
    }

    /// Worldwide value of a known metric, or [`NOT_FOUND`]
    pub fn worldwide(&self, metric: GlobalMetric) -> String {
        self.fetch_global_total(metric.display_name())
    }

    /// Looks up a country by name, ignoring case
    pub fn country(&self, country_name: &str) -> Option<CountryRecord> {
        self.current.load().snapshot.country(country_name).cloned()
    }

    /// Looks up a country by name, ignoring case
    pub fn fetch_country(&self, country_name: &str) -> CountryLookup {
        self.country(country_name).into()
    }

    /// One statistic for a country.
    ///
    /// `None` if the country is unknown or the record lacks the field.
    pub fn country_stat(&self, country_name: &str, stat: CountryStat) -> Option<String> {
        match self.lookup_country_stat(country_name, stat) {
            StatLookup::Value(value) => Some(value),
            StatLookup::UnknownCountry | StatLookup::MissingField => None,
        }
    }

    /// One statistic for a country, telling an unknown country apart from a
    /// record without that field
    pub fn lookup_country_stat(&self, country_name: &str, stat: CountryStat) -> StatLookup {
        let current = self.current.load();
        match current.snapshot.country(country_name) {
            None => StatLookup::UnknownCountry,
            Some(record) => record
                .stat(stat)
                .map_or(StatLookup::MissingField, |value| {
                    StatLookup::Value(value.to_string())
                }),
        }
    }

    /// All country names, lower-cased, in source order
    pub fn list_country_names(&self) -> Vec<String> {
        self.current.load().snapshot.country_names()
    }

    /// Starts polling for new data in the background
    ///
    /// Returns immediately and may be called from any thread. If a refresh is
    /// already active the request joins it rather than starting a second
    /// loop; a cancelled refresh does not count as active.
    pub fn refresh_async(&self) -> RefreshOutcome {
        let mut slot = self.refresh_slot();

        if slot.as_ref().is_some_and(RefreshTask::is_running) {
            debug!("refresh already running");
            return RefreshOutcome::AlreadyRunning;
        }

        *slot = Some(RefreshTask::spawn(
            &self.runtime,
            Arc::clone(&self.source),
            Arc::clone(&self.current),
            self.config.clone(),
        ));
        info!("refresh started");
        RefreshOutcome::Started
    }

    /// Whether a refresh task is still polling
    pub fn is_refreshing(&self) -> bool {
        self.refresh_slot()
            .as_ref()
            .is_some_and(RefreshTask::is_running)
    }

    /// Stops the active refresh, keeping the current snapshot.
    ///
    /// Returns `false` if no refresh was running.
    pub fn cancel_refresh(&self) -> bool {
        let cancelled = self.refresh_slot().as_ref().is_some_and(RefreshTask::cancel);
        if cancelled {
            info!("refresh cancelled");
        }
        cancelled
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<RefreshTask>> {
        self.refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for StatsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("StatsCache")
            .field("countries", &current.snapshot.countries.len())
            .field("fetched_at", &current.fetched_at)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct FixedSource(Snapshot);

    #[async_trait]
    impl StatsSource for FixedSource {
        async fn fetch(&self) -> Result<Snapshot, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn india_snapshot() -> Snapshot {
        serde_json::from_str(
            r#"{
                "total": [{"name": "Coronavirus Cases:", "value": "1000"}],
                "country": [{"name": "India", "total_cases": "500"}]
            }"#,
        )
        .unwrap()
    }

    async fn india_cache() -> StatsCache {
        StatsCache::connect(FixedSource(india_snapshot()), RefreshConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_global_total_found_and_sentinel() {
        let cache = india_cache().await;

        assert_eq!(cache.fetch_global_total("Coronavirus Cases:"), "1000");
        assert_eq!(cache.fetch_global_total("Deaths:"), NOT_FOUND);
        assert_eq!(cache.global_total("Deaths:"), None);
    }

    #[tokio::test]
    async fn test_worldwide_uses_display_names() {
        let cache = india_cache().await;

        assert_eq!(cache.worldwide(GlobalMetric::Cases), "1000");
        assert_eq!(cache.worldwide(GlobalMetric::Recovered), "0");
    }

    #[tokio::test]
    async fn test_fetch_country_found() {
        let cache = india_cache().await;

        let expected = CountryRecord {
            name: "India".to_string(),
            fields: BTreeMap::from([("total_cases".to_string(), "500".to_string())]),
        };
        assert_eq!(cache.fetch_country("india"), CountryLookup::Found(expected));
        assert_eq!(cache.fetch_country("INDIA"), cache.fetch_country("india"));
    }

    #[tokio::test]
    async fn test_fetch_country_not_found_displays_sentinel() {
        let cache = india_cache().await;

        let lookup = cache.fetch_country("atlantis");
        assert_eq!(lookup, CountryLookup::NotFound);
        assert!(!lookup.is_found());
        assert_eq!(lookup.to_string(), "0");
        assert!(lookup.into_option().is_none());
    }

    #[tokio::test]
    async fn test_found_country_displays_as_json() {
        let cache = india_cache().await;

        let rendered = cache.fetch_country("India").to_string();
        assert_eq!(rendered, r#"{"name":"India","total_cases":"500"}"#);
    }

    #[tokio::test]
    async fn test_country_stat() {
        let cache = india_cache().await;

        assert_eq!(
            cache.country_stat("india", CountryStat::Cases),
            Some("500".to_string())
        );
        assert_eq!(cache.country_stat("india", CountryStat::Deaths), None);
        assert_eq!(cache.country_stat("atlantis", CountryStat::Cases), None);
    }

    #[tokio::test]
    async fn test_lookup_country_stat_distinguishes_misses() {
        let cache = india_cache().await;

        assert_eq!(
            cache.lookup_country_stat("INDIA", CountryStat::Cases),
            StatLookup::Value("500".to_string())
        );
        assert_eq!(
            cache.lookup_country_stat("india", CountryStat::Population),
            StatLookup::MissingField
        );
        assert_eq!(
            cache.lookup_country_stat("atlantis", CountryStat::Cases),
            StatLookup::UnknownCountry
        );
        assert_eq!(StatLookup::MissingField.or_not_found(), NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_country_names() {
        let cache = india_cache().await;
        assert_eq!(cache.list_country_names(), vec!["india".to_string()]);
    }

    #[tokio::test]
    async fn test_lookups_are_idempotent() {
        let cache = india_cache().await;

        let first = cache.fetch_global_total("Coronavirus Cases:");
        let second = cache.fetch_global_total("Coronavirus Cases:");
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&cache.snapshot(), &cache.snapshot()));
    }

    #[tokio::test]
    async fn test_not_refreshing_before_first_request() {
        let cache = india_cache().await;

        assert!(!cache.is_refreshing());
        assert!(!cache.cancel_refresh());
    }

    #[tokio::test]
    async fn test_fetched_at_is_recorded() {
        let before = Utc::now();
        let cache = india_cache().await;
        let after = Utc::now();

        assert!(cache.fetched_at() >= before);
        assert!(cache.fetched_at() <= after);
    }

    #[tokio::test]
    async fn test_debug_reports_country_count() {
        let cache = india_cache().await;
        let debug = format!("{:?}", cache);
        assert!(debug.contains("countries: 1"));
    }
}
