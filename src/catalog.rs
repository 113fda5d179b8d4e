// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! In-memory snapshot of one resource collection.
//!
//! A catalog is rebuilt wholesale from a fresh fetch and never patched
//! incrementally, except for dropping an entry that was just deleted.

use crate::error::ConsoleResult;
use crate::resource::{Remote, ResourceKind};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<R> {
    pub key: String,
    pub label: String,
    pub resource: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog<K: ResourceKind> {
    entries: Vec<Entry<K::Resource>>,
}

impl<K: ResourceKind> Default for Catalog<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: ResourceKind> Catalog<K> {
    /// Fetches the full collection. On failure nothing is built, so the
    /// caller keeps whatever snapshot it already shows.
    pub fn load<R: Remote<K>>(remote: &mut R) -> ConsoleResult<Self> {
        let resources = remote.list(None)?;
        let catalog = Self::from_resources(resources);
        info!(kind = K::SINGULAR, count = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Orders by label (ties broken by key). Remote keys are expected to be
    /// unique; a repeated key keeps its first occurrence.
    pub fn from_resources(resources: Vec<K::Resource>) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(resources.len());
        for resource in resources {
            let key = K::key(&resource);
            if !seen.insert(key.clone()) {
                warn!(kind = K::SINGULAR, key = %key, "duplicate key in collection, keeping first");
                continue;
            }
            entries.push(Entry {
                label: K::label(&resource),
                key,
                resource,
            });
        }
        entries.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry<K::Resource>] {
        &self.entries
    }

    /// `(key, label)` pairs in display order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.label.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&K::Resource> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.resource)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.entries.iter().any(|entry| entry.label == label)
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry<K::Resource>> {
        let idx = self.position(key)?;
        Some(self.entries.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, Rules};
    use serde_json::json;

    fn rule(id: &str, name: &str) -> Rule {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    #[test]
    fn labels_are_sorted_by_name() {
        let catalog = Catalog::<Rules>::from_resources(vec![
            rule("B", "Night Mode"),
            rule("C", "Away"),
            rule("A", "Kitchen Light Rule"),
        ]);

        let labels: Vec<_> = catalog.labels().map(|(_, label)| label).collect();
        assert_eq!(labels, vec!["Away", "Kitchen Light Rule", "Night Mode"]);
        assert!(labels.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(catalog.get("A").map(|r| r.name.as_str()), Some("Kitchen Light Rule"));
        assert_eq!(catalog.position("B"), Some(2));
    }

    #[test]
    fn equal_labels_order_by_key() {
        let catalog =
            Catalog::<Rules>::from_resources(vec![rule("z", "Same"), rule("a", "Same")]);
        let keys: Vec<_> = catalog.labels().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }

    #[test]
    fn duplicate_keys_keep_first_occurrence() {
        let catalog =
            Catalog::<Rules>::from_resources(vec![rule("A", "First"), rule("A", "Second")]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("A").unwrap().name, "First");
    }

    #[test]
    fn empty_collection_is_not_an_error() {
        let catalog = Catalog::<Rules>::from_resources(Vec::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.labels().count(), 0);
    }

    #[test]
    fn remove_drops_entry() {
        let mut catalog =
            Catalog::<Rules>::from_resources(vec![rule("A", "One"), rule("B", "Two")]);
        let removed = catalog.remove("A").unwrap();
        assert_eq!(removed.label, "One");
        assert!(catalog.get("A").is_none());
        assert!(catalog.remove("A").is_none());
    }
}
