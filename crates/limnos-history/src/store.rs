//! Historical store - bounded snapshot rings keyed by buoy

use std::collections::vec_deque::Iter;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use limnos_core::{BuoyId, Parameter, RetentionPolicy, Timestamp};

use crate::Snapshot;

/// Shared empty ring for unknown buoys
static EMPTY: VecDeque<Snapshot> = VecDeque::new();

/// Largest up-front allocation per ring; rings grow past it on demand
const INITIAL_RING_CAPACITY: usize = 64;

/// Borrowed, read-only view of one buoy's history, oldest first.
/// May exclude the newest snapshot (see [`HistoryView::without_latest`]).
#[derive(Clone, Copy, Debug)]
pub struct HistoryView<'a> {
    ring: &'a VecDeque<Snapshot>,
    end: usize,
}

impl<'a> HistoryView<'a> {
    fn new(ring: &'a VecDeque<Snapshot>) -> Self {
        HistoryView {
            ring,
            end: ring.len(),
        }
    }

    /// An empty view
    pub fn empty() -> HistoryView<'static> {
        HistoryView::new(&EMPTY)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn iter(&self) -> Iter<'a, Snapshot> {
        self.ring.range(..self.end)
    }

    pub fn latest(&self) -> Option<&'a Snapshot> {
        self.end.checked_sub(1).and_then(|i| self.ring.get(i))
    }

    /// The same view minus its newest snapshot
    pub fn without_latest(&self) -> HistoryView<'a> {
        HistoryView {
            ring: self.ring,
            end: self.end.saturating_sub(1),
        }
    }

    /// The newest `n` snapshots (fewer if the view is shorter), oldest first
    pub fn recent(&self, n: usize) -> Iter<'a, Snapshot> {
        let start = self.end - n.min(self.end);
        self.ring.range(start..self.end)
    }

    /// Finite values of `parameter` from the newest `n` snapshots, oldest first.
    /// Snapshots lacking the parameter are skipped.
    pub fn values(&self, parameter: Parameter, n: usize) -> Vec<f64> {
        self.recent(n)
            .filter_map(|s| s.value(parameter))
            .filter(|v| v.is_finite())
            .collect()
    }
}

/// Per-buoy bounded history
#[derive(Debug)]
pub struct HistoricalStore {
    rings: HashMap<BuoyId, VecDeque<Snapshot>>,
    policy: RetentionPolicy,
    evicted: u64,
}

impl HistoricalStore {
    /// Create a store; a zero snapshot cap is raised to 1
    pub fn new(policy: RetentionPolicy) -> Self {
        HistoricalStore {
            rings: HashMap::new(),
            policy: RetentionPolicy {
                max_snapshots: policy.max_snapshots.max(1),
                ..policy
            },
            evicted: 0,
        }
    }

    /// Store that keeps at most `max_snapshots` per buoy, with no age bound
    pub fn with_capacity(max_snapshots: usize) -> Self {
        Self::new(RetentionPolicy {
            max_snapshots,
            max_age: None,
        })
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Replace the retention policy and trim every ring to it immediately
    pub fn set_policy(&mut self, policy: RetentionPolicy) {
        self.policy = RetentionPolicy {
            max_snapshots: policy.max_snapshots.max(1),
            ..policy
        };
        let cap = self.policy.max_snapshots;
        let max_age = self.policy.max_age;
        let mut evicted = 0;
        for ring in self.rings.values_mut() {
            while ring.len() > cap {
                ring.pop_front();
                evicted += 1;
            }
            let newest = ring.back().map(|s| s.timestamp);
            if let Some(cutoff) = newest.zip(max_age).and_then(|(t, age)| cutoff(t, age)) {
                while ring.front().is_some_and(|s| s.timestamp < cutoff) {
                    ring.pop_front();
                    evicted += 1;
                }
            }
        }
        self.evicted += evicted;
    }

    /// Append a snapshot, evicting the oldest entries past the retention bounds.
    /// Callers append in time order; the store never re-sorts.
    pub fn append(&mut self, buoy: BuoyId, snapshot: Snapshot) {
        let cap = self.policy.max_snapshots;
        let ring = self
            .rings
            .entry(buoy)
            .or_insert_with(|| VecDeque::with_capacity(cap.min(INITIAL_RING_CAPACITY)));

        let newest = snapshot.timestamp;
        ring.push_back(snapshot);

        let mut evicted = 0;
        while ring.len() > cap {
            ring.pop_front();
            evicted += 1;
        }

        if let Some(cutoff) = self.policy.max_age.and_then(|age| cutoff(newest, age)) {
            while ring.front().is_some_and(|s| s.timestamp < cutoff) {
                ring.pop_front();
                evicted += 1;
            }
        }

        self.evicted += evicted;
    }

    /// Full view of a buoy's history; empty for unknown buoys
    pub fn view(&self, buoy: BuoyId) -> HistoryView<'_> {
        match self.rings.get(&buoy) {
            Some(ring) => HistoryView::new(ring),
            None => HistoryView::new(&EMPTY),
        }
    }

    /// The newest `n` snapshots, oldest first
    pub fn recent(&self, buoy: BuoyId, n: usize) -> Iter<'_, Snapshot> {
        self.view(buoy).recent(n)
    }

    /// Snapshots no older than `window` before the newest one, oldest first
    pub fn since(&self, buoy: BuoyId, window: Duration) -> Iter<'_, Snapshot> {
        let ring = self.rings.get(&buoy).unwrap_or(&EMPTY);
        let Some(newest) = ring.back() else {
            return ring.range(..);
        };
        match cutoff(newest.timestamp, window) {
            Some(cutoff) => {
                let start = ring.partition_point(|s| s.timestamp < cutoff);
                ring.range(start..)
            }
            None => ring.range(..),
        }
    }

    pub fn len(&self, buoy: BuoyId) -> usize {
        self.rings.get(&buoy).map_or(0, VecDeque::len)
    }

    /// Drop a buoy's history entirely
    pub fn forget(&mut self, buoy: BuoyId) -> bool {
        self.rings.remove(&buoy).is_some()
    }

    /// Keep only buoys matching `keep`
    pub fn retain_buoys(&mut self, keep: impl Fn(BuoyId) -> bool) {
        self.rings.retain(|id, _| keep(*id));
    }

    pub fn buoy_count(&self) -> usize {
        self.rings.len()
    }

    pub fn total_snapshots(&self) -> usize {
        self.rings.values().map(VecDeque::len).sum()
    }

    /// Snapshots evicted by retention since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

fn cutoff(newest: Timestamp, window: Duration) -> Option<Timestamp> {
    let window = chrono::Duration::from_std(window).ok()?;
    newest.checked_sub_signed(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use limnos_core::Readings;
    use proptest::prelude::*;

    fn snap(minute: i64, oxygen: f64) -> Snapshot {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Snapshot::new(
            base + chrono::Duration::minutes(minute),
            Readings::from([(Parameter::DissolvedOxygen, oxygen)]),
        )
    }

    #[test]
    fn test_unknown_buoy_is_empty() {
        let store = HistoricalStore::with_capacity(10);
        assert_eq!(store.recent(BuoyId::new(9), 5).count(), 0);
        assert_eq!(store.since(BuoyId::new(9), Duration::from_secs(60)).count(), 0);
        assert!(store.view(BuoyId::new(9)).is_empty());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut store = HistoricalStore::with_capacity(3);
        let buoy = BuoyId::new(1);
        for i in 0..5 {
            store.append(buoy, snap(i * 10, i as f64));
        }

        let values: Vec<f64> = store.view(buoy).values(Parameter::DissolvedOxygen, 10);
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(store.evicted(), 2);
    }

    #[test]
    fn test_recent_returns_newest_in_order() {
        let mut store = HistoricalStore::with_capacity(100);
        let buoy = BuoyId::new(1);
        for i in 0..10 {
            store.append(buoy, snap(i, i as f64));
        }

        let recent: Vec<f64> = store
            .recent(buoy, 3)
            .filter_map(|s| s.value(Parameter::DissolvedOxygen))
            .collect();
        assert_eq!(recent, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_since_window() {
        let mut store = HistoricalStore::with_capacity(100);
        let buoy = BuoyId::new(1);
        for i in 0..10 {
            store.append(buoy, snap(i * 10, i as f64));
        }

        // Newest at minute 90; 30 minutes back keeps 60, 70, 80, 90
        assert_eq!(store.since(buoy, Duration::from_secs(30 * 60)).count(), 4);
        assert_eq!(store.since(buoy, Duration::MAX).count(), 10);
    }

    #[test]
    fn test_age_retention() {
        let mut store = HistoricalStore::new(RetentionPolicy {
            max_snapshots: 100,
            max_age: Some(Duration::from_secs(3600)),
        });
        let buoy = BuoyId::new(2);
        for i in 0..10 {
            store.append(buoy, snap(i * 30, i as f64));
        }

        // Newest at 270 min; cutoff 210 min keeps 210, 240, 270
        assert_eq!(store.len(buoy), 3);
    }

    #[test]
    fn test_set_policy_trims() {
        let mut store = HistoricalStore::with_capacity(100);
        let buoy = BuoyId::new(5);
        for i in 0..20 {
            store.append(buoy, snap(i, i as f64));
        }
        store.set_policy(RetentionPolicy {
            max_snapshots: 5,
            max_age: None,
        });
        assert_eq!(store.len(buoy), 5);
        assert_eq!(store.evicted(), 15);
        assert_eq!(store.policy().max_snapshots, 5);
    }

    #[test]
    fn test_without_latest() {
        let mut store = HistoricalStore::with_capacity(10);
        let buoy = BuoyId::new(3);
        store.append(buoy, snap(0, 1.0));
        store.append(buoy, snap(1, 2.0));

        let view = store.view(buoy);
        let prior = view.without_latest();
        assert_eq!(prior.len(), 1);
        assert_eq!(prior.latest().and_then(|s| s.value(Parameter::DissolvedOxygen)), Some(1.0));
        assert!(prior.without_latest().without_latest().is_empty());
    }

    #[test]
    fn test_forget_and_retain() {
        let mut store = HistoricalStore::with_capacity(10);
        for id in 0..4 {
            store.append(BuoyId::new(id), snap(0, 1.0));
        }
        assert!(store.forget(BuoyId::new(0)));
        store.retain_buoys(|id| id.0 % 2 == 1);
        assert_eq!(store.buoy_count(), 2);
        assert_eq!(store.total_snapshots(), 2);
    }

    proptest! {
        #[test]
        fn prop_length_is_min_of_appends_and_cap(cap in 1usize..50, appends in 0usize..200) {
            let mut store = HistoricalStore::with_capacity(cap);
            let buoy = BuoyId::new(1);
            for i in 0..appends {
                store.append(buoy, snap(i as i64, i as f64));
            }

            prop_assert_eq!(store.len(buoy), appends.min(cap));

            // Retained items are the newest `cap`
            let retained = store.view(buoy).values(Parameter::DissolvedOxygen, usize::MAX);
            let expected: Vec<f64> = (appends.saturating_sub(cap)..appends).map(|i| i as f64).collect();
            prop_assert_eq!(retained, expected);
        }
    }
}
