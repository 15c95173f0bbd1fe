//! # Topic Router
//!
//! Two indices per session:
//!
//! | Index    | Key                              | Lookup                        |
//! |----------|----------------------------------|-------------------------------|
//! | exact    | full topic                       | one hash probe                |
//! | prefixes | literal text before the `*`      | one probe per prefix of topic |
//!
//! A prefix registration keyed `k` matches every topic that starts with `k`,
//! including `k` itself. Lookup probes every char-boundary prefix of the
//! incoming topic against the ordered index, longest first, so a matching
//! key can never be masked by a non-matching one that sorts between it and
//! the topic.
//!
//! Empty buckets are removed, never left behind.

use std::collections::{BTreeMap, HashMap};

/// Routes topics to registrations of type `R`.
#[derive(Debug, Clone)]
pub struct TopicRouter<R> {
    exact: HashMap<String, Vec<R>>,
    prefixes: BTreeMap<String, Vec<R>>,
}

impl<R> Default for TopicRouter<R> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            prefixes: BTreeMap::new(),
        }
    }
}

impl<R> TopicRouter<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration under `key`, in the prefix index when `prefix` is set.
    pub fn insert(&mut self, key: String, prefix: bool, registration: R) {
        let bucket = if prefix {
            self.prefixes.entry(key).or_default()
        } else {
            self.exact.entry(key).or_default()
        };
        bucket.push(registration);
    }

    /// Removes the registrations under `key` that satisfy `predicate` and
    /// prunes the bucket if it ends up empty. Returns how many were removed.
    pub fn remove_where(
        &mut self,
        key: &str,
        prefix: bool,
        mut predicate: impl FnMut(&R) -> bool,
    ) -> usize {
        let (removed, now_empty) = {
            let bucket = if prefix {
                self.prefixes.get_mut(key)
            } else {
                self.exact.get_mut(key)
            };
            let Some(bucket) = bucket else {
                return 0;
            };
            let before = bucket.len();
            bucket.retain(|r| !predicate(r));
            (before - bucket.len(), bucket.is_empty())
        };

        if now_empty {
            if prefix {
                self.prefixes.remove(key);
            } else {
                self.exact.remove(key);
            }
        }
        removed
    }

    /// Number of distinct keys in both indices.
    pub fn key_count(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Prefix keys in ascending order.
    pub fn prefix_keys(&self) -> impl Iterator<Item = &str> {
        self.prefixes.keys().map(String::as_str)
    }

    /// Empties both indices and returns every registration they held.
    pub fn drain(&mut self) -> Vec<R> {
        let exact = std::mem::take(&mut self.exact);
        let prefixes = std::mem::take(&mut self.prefixes);
        exact
            .into_values()
            .chain(prefixes.into_values())
            .flatten()
            .collect()
    }
}

impl<R: Clone> TopicRouter<R> {
    /// Registrations matching `topic`: exact ones first, then prefix ones
    /// from the longest key to the shortest.
    pub fn matches(&self, topic: &str) -> Vec<R> {
        let mut matched: Vec<R> = self.exact.get(topic).cloned().unwrap_or_default();
        if self.prefixes.is_empty() {
            return matched;
        }

        let boundaries = topic
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(topic.len()));
        let mut cuts: Vec<usize> = boundaries.collect();
        cuts.reverse();

        for cut in cuts {
            if let Some(bucket) = self.prefixes.get(&topic[..cut]) {
                matched.extend(bucket.iter().cloned());
            }
        }
        matched
    }
}
