//! This module contains the gradient-descent loop and its supporting pieces.
//!
//! It includes the `Adam` optimizer with per-tensor moment buffers, the
//! regression metrics reported at evaluation time, and the `Trainer` context
//! object that owns the network and optimizer for the duration of one run.

mod metrics;
mod optimizer;
mod trainer;

pub use metrics::{mean_squared_error, r_squared};
pub use optimizer::{Adam, AdamConfig};
pub use trainer::Trainer;
