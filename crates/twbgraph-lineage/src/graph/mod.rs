//! Lineage graph construction and repair.
//!
//! ## Pipeline
//!
//! ```text
//! WorkbookMetadata
//!        ↓  build::build_graph()
//! BuiltGraph { graph, lookup, cycles, content_hash }
//!        ↓  normalize::normalize_graph()
//! Graph (unique ids, no dangling edges)
//!        ↓  cycles::find_cycles()          diagnostics only
//! ```
//!
//! Externally supplied payloads enter at the normalizer via
//! [`Graph::from_json`].

pub mod build;
pub mod classify;
pub mod cycles;
pub mod ids;
pub mod lookup;
pub mod model;
pub mod names;
pub mod normalize;

pub use build::{BuiltGraph, build_graph};
pub use cycles::find_cycles;
pub use lookup::LookupIndex;
pub use model::{Edge, Graph, Node, NodeKind, Relation};
pub use normalize::{NormalizeReport, normalize_graph};
