//! Read-side lookup index over a finished graph.
//!
//! Rebuilt wholesale alongside every graph; never patched in place.

use std::collections::HashMap;

use serde::Serialize;

use crate::graph::model::{Node, NodeKind};
use crate::graph::names::normalize_name;

/// Kind order used when several nodes share a name in [`LookupIndex::name_to_id`].
const NAME_PRIORITY: [NodeKind; 5] = [
    NodeKind::CalculatedField,
    NodeKind::Field,
    NodeKind::Parameter,
    NodeKind::Worksheet,
    NodeKind::Dashboard,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip)]
    key: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupIndex {
    pub id_to_name: HashMap<String, String>,
    pub id_to_type: HashMap<String, NodeKind>,
    pub id_to_datasource: HashMap<String, String>,
    /// Normalized name → id. On a shared name the kind order is
    /// calculation, field, parameter, worksheet, dashboard.
    pub name_to_id: HashMap<String, String>,
    /// Sorted by normalized name, then id.
    pub search_entries: Vec<SearchEntry>,
}

impl LookupIndex {
    #[must_use]
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut index = Self::default();

        for node in nodes {
            index.id_to_name.insert(node.id.clone(), node.name.clone());
            index.id_to_type.insert(node.id.clone(), node.kind);
            if let Some(ds) = &node.datasource {
                index.id_to_datasource.insert(node.id.clone(), ds.clone());
            }
            index.search_entries.push(SearchEntry {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: node.kind,
                key: normalize_name(&node.name),
            });
        }

        for kind in NAME_PRIORITY {
            for node in nodes.iter().filter(|n| n.kind == kind) {
                let key = normalize_name(&node.name);
                if !key.is_empty() {
                    index.name_to_id.entry(key).or_insert_with(|| node.id.clone());
                }
            }
        }

        index
            .search_entries
            .sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.id.cmp(&b.id)));
        index
    }

    #[must_use]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.id_to_name.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.id_to_type.get(id).copied()
    }

    #[must_use]
    pub fn datasource_of(&self, id: &str) -> Option<&str> {
        self.id_to_datasource.get(id).map(String::as_str)
    }

    /// Resolve a canonical id, or failing that a (normalized) name.
    #[must_use]
    pub fn resolve(&self, id_or_name: &str) -> Option<&str> {
        if let Some((id, _)) = self.id_to_name.get_key_value(id_or_name) {
            return Some(id);
        }
        self.name_to_id
            .get(&normalize_name(id_or_name))
            .map(String::as_str)
    }

    /// Case-insensitive substring search over names. Prefix matches come
    /// first; both groups keep the sorted entry order.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&SearchEntry> {
        let needle = normalize_name(query);
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let (mut prefix, rest): (Vec<&SearchEntry>, Vec<&SearchEntry>) = self
            .search_entries
            .iter()
            .filter(|entry| entry.key.contains(&needle))
            .partition(|entry| entry.key.starts_with(&needle));

        prefix.extend(rest);
        prefix.truncate(limit);
        prefix
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}
