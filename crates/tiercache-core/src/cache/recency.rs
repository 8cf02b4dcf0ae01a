//! Recency-ordered index used to pick eviction victims.
//!
//! Every insert or touch stamps the key with the next value of a monotonic
//! counter. A `BTreeMap` keyed by that stamp gives least- to most-recently
//! used iteration, and a `HashMap` from key to `(stamp, value)` gives direct
//! lookup. Stamps are unique, so there are no ties.

use std::collections::{BTreeMap, HashMap};

/// Map from id to value that remembers access order.
#[derive(Debug)]
pub struct RecencyIndex<V> {
    /// Access stamp -> id, oldest first.
    order: BTreeMap<u64, String>,
    /// Id -> (access stamp, value).
    slots: HashMap<String, (u64, V)>,
    next_stamp: u64,
}

impl<V> Default for RecencyIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RecencyIndex<V> {
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            slots: HashMap::new(),
            next_stamp: 0,
        }
    }

    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Look up `id` and mark it most recently used.
    pub fn get(&mut self, id: &str) -> Option<&mut V> {
        let new_stamp = self.next_stamp;
        let (stamp, _) = self.slots.get(id)?;
        let old_stamp = *stamp;

        self.next_stamp += 1;
        if let Some(key) = self.order.remove(&old_stamp) {
            self.order.insert(new_stamp, key);
        }

        let slot = self.slots.get_mut(id)?;
        slot.0 = new_stamp;
        Some(&mut slot.1)
    }

    /// Look up `id` without changing its position.
    pub fn peek(&self, id: &str) -> Option<&V> {
        self.slots.get(id).map(|(_, value)| value)
    }

    /// Mutable lookup without changing its position.
    pub fn peek_mut(&mut self, id: &str) -> Option<&mut V> {
        self.slots.get_mut(id).map(|(_, value)| value)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Insert `value` as the most recently used item.
    ///
    /// Returns the previous value if `id` was already present.
    pub fn add(&mut self, id: impl Into<String>, value: V) -> Option<V> {
        let id = id.into();
        let stamp = self.stamp();
        self.order.insert(stamp, id.clone());

        let previous = self.slots.insert(id, (stamp, value));
        previous.map(|(old_stamp, old_value)| {
            self.order.remove(&old_stamp);
            old_value
        })
    }

    /// Remove `id`, returning its value.
    pub fn remove(&mut self, id: &str) -> Option<V> {
        let (stamp, value) = self.slots.remove(id)?;
        self.order.remove(&stamp);
        Some(value)
    }

    /// Least recently used item for which `predicate` holds.
    ///
    /// Neither removes the item nor changes the order.
    pub fn oldest_matching<F>(&self, mut predicate: F) -> Option<(&str, &V)>
    where
        F: FnMut(&V) -> bool,
    {
        self.order.values().find_map(|id| {
            let (_, value) = self.slots.get(id)?;
            if predicate(value) {
                Some((id.as_str(), value))
            } else {
                None
            }
        })
    }

    /// Items from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.order
            .values()
            .filter_map(|id| self.slots.get(id).map(|(_, value)| (id.as_str(), value)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
