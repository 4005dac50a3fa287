//! Caption-based name index, partitioned by node kind.
//!
//! Formulas and worksheet markup refer to other entities by caption, not by
//! id, so references are resolved through this index. Keys are normalized:
//! one bracket layer stripped, whitespace collapsed, lowercased.

use std::collections::HashMap;

use twbgraph_core::parser::strip_brackets;

use crate::graph::model::NodeKind;

/// Normalize a name for cross-referencing.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    strip_brackets(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized name → node ids, one map per [`NodeKind`].
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    partitions: HashMap<NodeKind, HashMap<String, Vec<String>>>,
}

impl NameIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `name` in the `kind` partition. Empty names are
    /// ignored; an id is listed at most once per key.
    pub fn insert(&mut self, kind: NodeKind, name: &str, id: &str) {
        let key = normalize_name(name);
        if key.is_empty() {
            return;
        }
        let ids = self
            .partitions
            .entry(kind)
            .or_default()
            .entry(key)
            .or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    /// Ids registered under `name` for `kind`, in insertion order.
    #[must_use]
    pub fn candidates(&self, kind: NodeKind, name: &str) -> &[String] {
        self.partitions
            .get(&kind)
            .and_then(|names| names.get(&normalize_name(name)))
            .map_or(&[], Vec::as_slice)
    }

    /// Resolve `name` by walking `priority` in order.
    ///
    /// The first kind with at least one candidate passing `accept` wins.
    /// Within that kind, the first candidate satisfying `prefer` is returned,
    /// else the first accepted candidate.
    pub fn resolve(
        &self,
        name: &str,
        priority: &[NodeKind],
        accept: impl Fn(&str) -> bool,
        prefer: impl Fn(&str) -> bool,
    ) -> Option<(&str, NodeKind)> {
        for &kind in priority {
            let mut accepted = self
                .candidates(kind, name)
                .iter()
                .map(String::as_str)
                .filter(|id| accept(id))
                .peekable();
            let Some(&first) = accepted.peek() else {
                continue;
            };
            let chosen = accepted.find(|id| prefer(id)).unwrap_or(first);
            return Some((chosen, kind));
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC_FIRST: [NodeKind; 2] = [NodeKind::CalculatedField, NodeKind::Field];

    #[test]
    fn normalization_is_case_space_and_bracket_insensitive() {
        assert_eq!(normalize_name("[ Order   Date ]"), "order date");
        assert_eq!(normalize_name("PROFIT"), "profit");
        assert_eq!(normalize_name("[]"), "");
    }

    #[test]
    fn partitions_keep_kinds_apart() {
        let mut index = NameIndex::new();
        index.insert(NodeKind::Field, "Profit", "Profit");
        index.insert(NodeKind::CalculatedField, "Profit", "Calculation_1");

        assert_eq!(index.candidates(NodeKind::Field, "profit"), ["Profit"]);
        assert_eq!(
            index.candidates(NodeKind::CalculatedField, "[Profit]"),
            ["Calculation_1"]
        );
        assert!(index.candidates(NodeKind::Worksheet, "Profit").is_empty());
    }

    #[test]
    fn resolve_follows_kind_priority() {
        let mut index = NameIndex::new();
        index.insert(NodeKind::Field, "Profit", "Profit");
        index.insert(NodeKind::CalculatedField, "Profit", "Calculation_1");

        let hit = index.resolve("Profit", &CALC_FIRST, |_| true, |_| false);
        assert_eq!(hit, Some(("Calculation_1", NodeKind::CalculatedField)));
    }

    #[test]
    fn rejected_candidates_fall_through_to_next_kind() {
        let mut index = NameIndex::new();
        index.insert(NodeKind::Field, "Profit", "Profit");
        index.insert(NodeKind::CalculatedField, "Profit", "Calculation_1");

        let hit = index.resolve("Profit", &CALC_FIRST, |id| id != "Calculation_1", |_| false);
        assert_eq!(hit, Some(("Profit", NodeKind::Field)));
    }

    #[test]
    fn preferred_candidate_beats_build_order() {
        let mut index = NameIndex::new();
        index.insert(NodeKind::Field, "Sales", "a");
        index.insert(NodeKind::Field, "Sales", "b");
        index.insert(NodeKind::Field, "sales", "b");

        assert_eq!(index.candidates(NodeKind::Field, "Sales").len(), 2);
        let hit = index.resolve("Sales", &[NodeKind::Field], |_| true, |id| id == "b");
        assert_eq!(hit, Some(("b", NodeKind::Field)));
        let hit = index.resolve("Sales", &[NodeKind::Field], |_| true, |_| false);
        assert_eq!(hit, Some(("a", NodeKind::Field)));
    }

    #[test]
    fn empty_names_are_not_indexed() {
        let mut index = NameIndex::new();
        index.insert(NodeKind::Field, "  ", "x");
        assert!(index.is_empty());
    }
}
