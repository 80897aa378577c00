//! Ordered index over live log indices, with per-entry shadow slots.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::command::LogIndex;
use crate::state::QueueState;

/// Ordered map of every log index still contributing to queue state
/// (unassigned or checked out), each entry optionally carrying the
/// shadow copy captured by the enqueue that produced it.
///
/// When an entry later becomes the smallest live index, its shadow (if
/// present) is the snapshot published with the release cursor. Keys are
/// appended in strictly increasing order; a non-monotonic append is a
/// host bug (the consensus layer guarantees log order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Ord + serde::Deserialize<'de>"
))]
pub struct LiveIndex<C> {
    entries: BTreeMap<LogIndex, Option<Box<QueueState<C>>>>,
}

impl<C> LiveIndex<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert `idx` with its optional shadow. `idx` must exceed every
    /// previously appended key.
    pub fn append(&mut self, idx: LogIndex, shadow: Option<Box<QueueState<C>>>) {
        debug_assert!(
            self.entries.last_key_value().is_none_or(|(last, _)| *last < idx),
            "log index {idx} not monotonic"
        );
        self.entries.insert(idx, shadow);
    }

    pub fn delete(&mut self, idx: LogIndex) {
        self.entries.remove(&idx);
    }

    /// Minimum live key and its stored shadow.
    pub fn smallest(&self) -> Option<(LogIndex, Option<&QueueState<C>>)> {
        self.entries
            .first_key_value()
            .map(|(idx, shadow)| (*idx, shadow.as_deref()))
    }

    /// Least key strictly greater than `idx`.
    pub fn next_key_after(&self, idx: LogIndex) -> Option<LogIndex> {
        self.entries
            .range((Bound::Excluded(idx), Bound::Unbounded))
            .next()
            .map(|(next, _)| *next)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, idx: LogIndex) -> bool {
        self.entries.contains_key(&idx)
    }

    pub fn keys(&self) -> impl Iterator<Item = LogIndex> + '_ {
        self.entries.keys().copied()
    }

    /// Transform every stored shadow. Test support.
    pub fn map_shadows<F>(&mut self, mut f: F)
    where
        F: FnMut(Option<Box<QueueState<C>>>) -> Option<Box<QueueState<C>>>,
    {
        for slot in self.entries.values_mut() {
            let shadow = slot.take();
            *slot = f(shadow);
        }
    }
}

impl<C> Default for LiveIndex<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QueueName;
    use crate::config::MachineConfig;

    fn index_with(keys: &[u64]) -> LiveIndex<u32> {
        let mut index = LiveIndex::new();
        for key in keys {
            index.append(LogIndex::new(*key), None);
        }
        index
    }

    fn shadow() -> Box<QueueState<u32>> {
        let (state, _) = QueueState::init(
            QueueName::new("shadow").expect("name"),
            MachineConfig::default(),
        );
        Box::new(state)
    }

    #[test]
    fn smallest_tracks_deletions() {
        let mut index = index_with(&[3, 7, 9]);
        assert_eq!(index.smallest().map(|(idx, _)| idx), Some(LogIndex::new(3)));

        index.delete(LogIndex::new(3));
        assert_eq!(index.smallest().map(|(idx, _)| idx), Some(LogIndex::new(7)));
        assert_eq!(index.len(), 2);

        index.delete(LogIndex::new(7));
        index.delete(LogIndex::new(9));
        assert!(index.is_empty());
        assert!(index.smallest().is_none());
    }

    #[test]
    fn next_key_after_skips_gaps() {
        let index = index_with(&[2, 5, 11]);
        assert_eq!(index.next_key_after(LogIndex::new(2)), Some(LogIndex::new(5)));
        assert_eq!(index.next_key_after(LogIndex::new(3)), Some(LogIndex::new(5)));
        assert_eq!(index.next_key_after(LogIndex::new(11)), None);
    }

    #[test]
    fn shadow_slot_travels_with_its_entry() {
        let mut index: LiveIndex<u32> = LiveIndex::new();
        index.append(LogIndex::new(1), None);
        index.append(LogIndex::new(2), Some(shadow()));

        let (_, slot) = index.smallest().expect("non-empty");
        assert!(slot.is_none());

        index.delete(LogIndex::new(1));
        let (idx, slot) = index.smallest().expect("non-empty");
        assert_eq!(idx, LogIndex::new(2));
        assert!(slot.is_some());
    }

    #[test]
    fn map_shadows_visits_every_slot() {
        let mut index: LiveIndex<u32> = LiveIndex::new();
        index.append(LogIndex::new(1), Some(shadow()));
        index.append(LogIndex::new(2), None);
        index.append(LogIndex::new(3), Some(shadow()));

        index.map_shadows(|_| None);
        assert!(index.keys().count() == 3);
        assert!(index.smallest().expect("non-empty").1.is_none());
    }
}
