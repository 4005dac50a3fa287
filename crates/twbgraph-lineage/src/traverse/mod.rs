//! Bounded traversal primitives used by interactive views.

pub mod neighborhood;
pub mod rank;

pub use neighborhood::{Expansion, LineageGraph, NeighborhoodEngine};
pub use rank::{Ranking, rank_from_root_tiers, rank_from_roots, rank_from_selection};
