pub mod batch;
pub mod config;
pub mod error;
pub mod net;
pub mod solver;
pub mod train;
pub mod types;

pub use batch::{GraphBatch, Membership, Trimmed, batch_molecules, total_per_molecule};
pub use config::{Activation, Hyperparameters};
pub use error::QeqNetError;
pub use net::GraphNetwork;
pub use train::Trainer;
pub use types::{EvaluationReport, Molecule};

use std::sync::OnceLock;

static DEFAULT_HYPERPARAMETERS: OnceLock<Hyperparameters> = OnceLock::new();

/// Returns the built-in default hyperparameters.
///
/// The defaults are embedded in the binary at compile time and parsed once on
/// first access; subsequent calls return the cached instance.
pub fn get_default_hyperparameters() -> &'static Hyperparameters {
    DEFAULT_HYPERPARAMETERS.get_or_init(|| {
        const DEFAULT_TOML: &str = include_str!("../resources/default.toml");
        Hyperparameters::load_from_str(DEFAULT_TOML)
            .expect("Failed to parse embedded default hyperparameters. This is a library bug.")
    })
}
