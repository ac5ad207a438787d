//! This module contains the graph network that produces the per-atom
//! electronegativity and hardness consumed by the charge solver.
//!
//! No automatic differentiation framework is involved: `GraphNetwork::forward`
//! caches every intermediate and `GraphNetwork::backward` applies the chain
//! rule by hand, stage by stage, mirroring the forward computation in reverse.

mod dense;
mod graph_net;

pub use dense::Dense;
pub use graph_net::{ForwardCache, GnParams, GraphNetwork, HARDNESS_FLOOR};
