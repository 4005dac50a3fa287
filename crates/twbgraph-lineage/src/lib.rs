#![forbid(unsafe_code)]
//! twbgraph-lineage library.
//!
//! Turns parsed workbook metadata into a canonical lineage graph and offers
//! the traversal primitives interactive views are built on.
//!
//! ```text
//! WorkbookMetadata ──graph::build──▶ Graph ──graph::normalize──▶ Graph
//!                                                  │
//!                        traverse::{neighborhood, rank}, stats
//! ```
//!
//! [`session::WorkbookSession`] wires the whole pipeline together for one
//! loaded workbook.

pub mod graph;
pub mod session;
pub mod stats;
pub mod traverse;

pub use graph::{BuiltGraph, Edge, Graph, LookupIndex, Node, NodeKind, Relation, build_graph};
pub use session::WorkbookSession;
pub use stats::GraphStats;
