//! Bounded, time-ordered event histories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::behavior::types::{
    BehaviorSnapshot, ClickSample, KeystrokeSample, PointerSample, ScrollSample, Timestamped,
};

/// Default bound on the number of entries per history
pub const DEFAULT_MAX_HISTORY_LEN: usize = 10_000;

/// A deque of timestamped samples, appended at the back and pruned from the front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHistory<T> {
    entries: VecDeque<T>,
    max_len: usize,
}

impl<T: Timestamped> Default for EventHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_LEN)
    }
}

impl<T: Timestamped> EventHistory<T> {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append a sample, dropping the oldest when full
    pub fn push(&mut self, sample: T) {
        self.entries.push_back(sample);
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
    }

    /// Drop entries with `timestamp <= cutoff` from the front.
    ///
    /// Stops at the first entry newer than the cutoff, so an out-of-order
    /// sample can keep older ones alive until it expires itself.
    pub fn prune_through(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.timestamp() <= cutoff)
        {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Entries strictly newer than `since`, in insertion order
    pub fn newer_than(&self, since: DateTime<Utc>) -> impl Iterator<Item = &T> {
        self.entries.iter().filter(move |entry| entry.timestamp() > since)
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(Timestamped::timestamp).min()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(Timestamped::timestamp).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len.max(1);
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
    }
}

impl<T: Timestamped + Clone> EventHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// The four independent histories owned by the behavior extractor
#[derive(Debug, Clone, Default)]
pub struct BehaviorHistories {
    pub pointer: EventHistory<PointerSample>,
    pub scroll: EventHistory<ScrollSample>,
    pub clicks: EventHistory<ClickSample>,
    pub keystrokes: EventHistory<KeystrokeSample>,
}

impl BehaviorHistories {
    pub fn new(max_len: usize) -> Self {
        Self {
            pointer: EventHistory::new(max_len),
            scroll: EventHistory::new(max_len),
            clicks: EventHistory::new(max_len),
            keystrokes: EventHistory::new(max_len),
        }
    }

    /// Drop every entry with `timestamp <= cutoff`; returns how many were removed
    pub fn prune_through(&mut self, cutoff: DateTime<Utc>) -> usize {
        self.pointer.prune_through(cutoff)
            + self.scroll.prune_through(cutoff)
            + self.clicks.prune_through(cutoff)
            + self.keystrokes.prune_through(cutoff)
    }

    /// Earliest retained timestamp across all four histories
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        [
            self.pointer.earliest(),
            self.scroll.earliest(),
            self.clicks.earliest(),
            self.keystrokes.earliest(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn total_len(&self) -> usize {
        self.pointer.len() + self.scroll.len() + self.clicks.len() + self.keystrokes.len()
    }

    pub fn set_max_len(&mut self, max_len: usize) {
        self.pointer.set_max_len(max_len);
        self.scroll.set_max_len(max_len);
        self.clicks.set_max_len(max_len);
        self.keystrokes.set_max_len(max_len);
    }

    pub fn clear(&mut self) {
        self.pointer.clear();
        self.scroll.clear();
        self.clicks.clear();
        self.keystrokes.clear();
    }

    pub fn snapshot(&self) -> BehaviorSnapshot {
        BehaviorSnapshot {
            pointer: self.pointer.to_vec(),
            scroll: self.scroll.to_vec(),
            clicks: self.clicks.to_vec(),
            keystrokes: self.keystrokes.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::types::ScrollSample;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn sample(offset_ms: i64) -> ScrollSample {
        ScrollSample {
            y: offset_ms as f64,
            timestamp: t0() + Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn test_push_respects_bound() {
        let mut history = EventHistory::new(3);
        for i in 0..5 {
            history.push(sample(i * 10));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.earliest(), Some(t0() + Duration::milliseconds(20)));
    }

    #[test]
    fn test_prune_through_cutoff() {
        let mut history = EventHistory::default();
        for i in 0..5 {
            history.push(sample(i * 1_000));
        }

        let removed = history.prune_through(t0() + Duration::milliseconds(2_000));
        assert_eq!(removed, 3);
        assert_eq!(history.len(), 2);
        assert_eq!(history.earliest(), Some(t0() + Duration::milliseconds(3_000)));
    }

    #[test]
    fn test_newer_than_is_exclusive() {
        let mut history = EventHistory::default();
        for i in 0..4 {
            history.push(sample(i * 1_000));
        }
        let recent: Vec<_> = history.newer_than(t0() + Duration::milliseconds(1_000)).collect();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_empty_history() {
        let history: EventHistory<ScrollSample> = EventHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.earliest(), None);
        assert_eq!(history.latest(), None);
    }
}
