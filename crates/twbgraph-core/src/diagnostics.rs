//! Non-fatal data-quality warnings.
//!
//! A workbook can be structurally valid and still contain duplicate ids,
//! references to fields that do not exist, or circular calculations. None of
//! these abort a load. Each one is logged through `tracing` at `warn` level
//! and recorded in a [`Diagnostics`] collector so callers can surface them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Category of a data-quality warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The input exceeds the soft size threshold but is still processed.
    LargeInput,
    /// An internal id collided and a synthesized id was assigned instead.
    DuplicateId,
    /// A node without a usable id was dropped.
    MissingNodeId,
    /// A node whose id was already taken was dropped.
    DuplicateNode,
    /// An edge pointing at a node that does not exist was dropped.
    DanglingEdge,
    /// An edge repeating an earlier `(source, target, rel)` triple was dropped.
    DuplicateEdge,
    /// An edge id collided and was suffixed.
    DuplicateEdgeId,
    /// A formula or worksheet named something no node matches.
    UnresolvedReference,
    /// A circular dependency exists in the lineage graph.
    CycleDetected,
}

impl WarningKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LargeInput => "large_input",
            Self::DuplicateId => "duplicate_id",
            Self::MissingNodeId => "missing_node_id",
            Self::DuplicateNode => "duplicate_node",
            Self::DanglingEdge => "dangling_edge",
            Self::DuplicateEdge => "duplicate_edge",
            Self::DuplicateEdgeId => "duplicate_edge_id",
            Self::UnresolvedReference => "unresolved_reference",
            Self::CycleDetected => "cycle_detected",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Collector for warnings raised during one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it as a `tracing` event.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = kind.as_str(), "{message}");
        self.warnings.push(Warning { kind, message });
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    #[must_use]
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Append every warning from `other`, preserving order.
    pub fn extend(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }
}
