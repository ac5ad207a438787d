//! This module contains the batched-graph containers and the membership-matrix machinery.
//!
//! It includes the boolean `Membership` matrix with its padding-trimming support,
//! the `GraphBatch` flat-tensor container with its packing and validation logic,
//! and the per-molecule aggregation used to derive total-charge labels.

mod aggregate;
mod graph;
mod membership;

pub use aggregate::total_per_molecule;
pub use graph::{GraphBatch, batch_molecules};
pub use membership::{Membership, Trimmed};
