//! This module contains the charge-equilibration solver.
//!
//! It includes the closed-form per-molecule solution with its hand-derived
//! reverse-mode gradient, and the batched driver that applies the solver to
//! every molecule of a trimmed membership matrix.

mod batched;
mod closed_form;

pub use batched::{equilibrate_batch, equilibrate_batch_vjp};
pub use closed_form::{equilibrate, equilibrate_vjp};
