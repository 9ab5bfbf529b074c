//! In-memory statistics cache
//!
//! This module provides `StatsCache`, which holds exactly one current
//! `Snapshot` of the remote statistics feed. Lookups read whichever snapshot
//! is current without locking; a background refresh replaces it wholesale
//! when the feed publishes different data.

mod stats_cache;

pub(crate) use stats_cache::CachedSnapshot;
pub use stats_cache::{CountryLookup, StatLookup, StatsCache, NOT_FOUND};
