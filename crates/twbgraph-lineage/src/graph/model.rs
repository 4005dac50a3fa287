//! Canonical lineage graph: typed nodes and relation-labelled edges.
//!
//! Edges point from a dependency to its dependent:
//!
//! | Relation   | Source                 | Target          |
//! |------------|------------------------|-----------------|
//! | `FEEDS`    | field or calculation   | calculation     |
//! | `PARAM_OF` | parameter              | calculation     |
//! | `USED_IN`  | field or calculation   | worksheet       |
//! | `ON`       | worksheet              | dashboard       |
//!
//! The JSON shape (`type`, `rawName`, `isLOD`, ...) is the wire format shared
//! with rendering and export collaborators.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use twbgraph_core::model::References;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Field,
    CalculatedField,
    Worksheet,
    Dashboard,
    Parameter,
}

impl NodeKind {
    pub const ALL: [Self; 5] = [
        Self::Field,
        Self::CalculatedField,
        Self::Worksheet,
        Self::Dashboard,
        Self::Parameter,
    ];

    /// Prefix used for synthesized ids, e.g. `field:total`.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::CalculatedField => "calc",
            Self::Worksheet => "worksheet",
            Self::Dashboard => "dashboard",
            Self::Parameter => "param",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Field => "Field",
            Self::CalculatedField => "CalculatedField",
            Self::Worksheet => "Worksheet",
            Self::Dashboard => "Dashboard",
            Self::Parameter => "Parameter",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Feeds,
    ParamOf,
    UsedIn,
    On,
}

impl Relation {
    pub const ALL: [Self; 4] = [Self::Feeds, Self::ParamOf, Self::UsedIn, Self::On];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feeds => "FEEDS",
            Self::ParamOf => "PARAM_OF",
            Self::UsedIn => "USED_IN",
            Self::On => "ON",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph node. Domain fields are not mutated once the builder returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub name: String,
    /// Internal identifier as written in the workbook.
    #[serde(default)]
    pub raw_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<References>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(rename = "isLOD", default, skip_serializing_if = "is_false")]
    pub is_lod: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_table_calc: bool,
    /// Worksheets this field or calculation appears on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_in_worksheets: Vec<String>,
    /// Dashboards this worksheet is placed on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_in_dashboards: Vec<String>,
    /// Calculations whose formulas reference this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl Node {
    /// A bare node with no optional attributes.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            raw_name: String::new(),
            datasource: None,
            datatype: None,
            role: None,
            references: None,
            formula: None,
            is_lod: false,
            is_table_calc: false,
            used_in_worksheets: Vec::new(),
            used_in_dashboards: Vec::new(),
            referenced_by: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    pub rel: Relation,
}

impl Edge {
    /// Build an edge with its derived id.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, rel: Relation) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: derive_edge_id(&source, &target, rel),
            source,
            target,
            rel,
        }
    }

    /// The `(source, target, rel)` identity triple.
    #[must_use]
    pub fn key(&self) -> (&str, &str, Relation) {
        (&self.source, &self.target, self.rel)
    }
}

/// `"{source}->{target}:{REL}"`.
#[must_use]
pub fn derive_edge_id(source: &str, target: &str, rel: Relation) -> String {
    format!("{source}->{target}:{rel}")
}

/// A `{nodes, edges}` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Parse an externally supplied payload. The result is not yet
    /// normalized; run it through [`crate::graph::normalize::normalize_graph`].
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not graph-shaped.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    #[must_use]
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
