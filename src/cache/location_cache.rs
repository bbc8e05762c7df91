use crate::error::WindDataError;
use crate::types::aggregate::{AggregateKind, AggregateResult};
use log::{debug, info};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::future::Future;

/// Whether [`LocationCache::ensure`] served the slot from memory or fetched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Reused,
    Refetched,
}

/// The result of a full remote fetch for one location.
#[derive(Debug, Clone)]
pub struct FetchedLocation {
    pub location_id: String,
    pub frame: DataFrame,
}

/// The time series currently held for a `(latitude, longitude)` input, plus aggregates
/// derived from it at the current height.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub location_id: String,
    pub latitude: f64,
    pub longitude: f64,
    frame: DataFrame,
    aggregates: HashMap<AggregateKind, AggregateResult>,
}

impl CacheEntry {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }
}

#[derive(Debug, Clone, Default)]
enum CacheSlot {
    #[default]
    Empty,
    Loaded(CacheEntry),
}

/// Single-slot cache of the most recently fetched location.
///
/// Keys are the raw `(latitude, longitude)` the caller passed, compared exactly; two
/// inputs that resolve to the same grid point are still different keys. A location
/// change replaces the whole entry. A height change only drops derived aggregates.
///
/// Not synchronised: callers sharing a cache across tasks must serialise access.
#[derive(Debug, Clone, Default)]
pub struct LocationCache {
    slot: CacheSlot,
    height: Option<u32>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match &self.slot {
            CacheSlot::Loaded(entry) => Some(entry),
            CacheSlot::Empty => None,
        }
    }

    pub fn frame(&self) -> Option<&DataFrame> {
        self.entry().map(CacheEntry::frame)
    }

    pub(crate) fn frame_mut(&mut self) -> Option<&mut DataFrame> {
        match &mut self.slot {
            CacheSlot::Loaded(entry) => Some(&mut entry.frame),
            CacheSlot::Empty => None,
        }
    }

    /// The height the current aggregates were computed for.
    pub fn height(&self) -> Option<u32> {
        self.height
    }

    fn holds(&self, latitude: f64, longitude: f64) -> bool {
        matches!(
            &self.slot,
            CacheSlot::Loaded(entry)
                if entry.latitude == latitude
                    && entry.longitude == longitude
                    && entry.frame.height() > 0
        )
    }

    /// Makes sure the slot holds data for `(latitude, longitude)`, calling `fetch` only
    /// when it does not.
    ///
    /// The previous entry is dropped before fetching, so a failed or empty fetch leaves
    /// the cache empty rather than stale.
    pub async fn ensure<F, Fut>(
        &mut self,
        latitude: f64,
        longitude: f64,
        fetch: F,
    ) -> Result<Freshness, WindDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedLocation, WindDataError>>,
    {
        if self.holds(latitude, longitude) {
            debug!("Reusing cached time series for ({latitude}, {longitude})");
            return Ok(Freshness::Reused);
        }

        self.slot = CacheSlot::Empty;
        let FetchedLocation { location_id, frame } = fetch().await?;
        if frame.height() == 0 {
            return Err(WindDataError::DataUnavailable(format!(
                "no rows for location {location_id} ({latitude}, {longitude})"
            )));
        }
        info!(
            "Cached {} rows for location {location_id} ({latitude}, {longitude})",
            frame.height()
        );
        self.slot = CacheSlot::Loaded(CacheEntry {
            location_id,
            latitude,
            longitude,
            frame,
            aggregates: HashMap::new(),
        });
        Ok(Freshness::Refetched)
    }

    /// Records `height` as current, clearing derived aggregates if it changed. Returns
    /// whether anything was invalidated.
    pub fn on_height_change(&mut self, height: u32) -> bool {
        if self.height == Some(height) {
            return false;
        }
        let previous = self.height.replace(height);
        if let CacheSlot::Loaded(entry) = &mut self.slot {
            entry.aggregates.clear();
        }
        if previous.is_some() {
            info!("Height changed from {previous:?} to {height}m, cleared aggregates");
        }
        true
    }

    pub fn aggregate(&self, kind: AggregateKind) -> Option<&AggregateResult> {
        self.entry().and_then(|entry| entry.aggregates.get(&kind))
    }

    /// Remembers `result` for the loaded entry. Ignored when the slot is empty.
    pub fn store_aggregate(&mut self, result: AggregateResult) {
        if let CacheSlot::Loaded(entry) = &mut self.slot {
            entry.aggregates.insert(result.kind(), result);
        }
    }

    pub fn clear(&mut self) {
        self.slot = CacheSlot::Empty;
        self.height = None;
    }
}
