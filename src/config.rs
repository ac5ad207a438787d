//! This module provides the training hyperparameters and utilities for loading them from TOML files.
//!
//! It defines the `NetworkConfig` and `TrainingConfig` structs that together form the
//! `Hyperparameters` for one training run, along with the `Activation` nonlinearity selector
//! used by the graph network. A default set of hyperparameters is embedded in the crate and
//! exposed through `crate::get_default_hyperparameters`.

use super::error::QeqNetError;
use serde::Deserialize;
use std::path::Path;

/// Negative-branch slope of the leaky rectifier.
const LEAKY_SLOPE: f64 = 0.2;

/// The elementwise nonlinearity applied inside the graph network.
///
/// The same activation is used by the shared message-passing update and by the
/// hidden layer of each readout head. It is selected by name in the TOML
/// hyperparameter file (`"sigmoid"`, `"leaky_relu"`, `"relu"`, `"tanh"`).
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Logistic sigmoid, `1 / (1 + e^-z)`.
    Sigmoid,
    /// Rectifier with a small negative-branch slope.
    LeakyRelu,
    /// Plain rectifier, `max(z, 0)`.
    Relu,
    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    /// Applies the nonlinearity to a single pre-activation value.
    #[inline]
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            Activation::LeakyRelu => {
                if z >= 0.0 {
                    z
                } else {
                    LEAKY_SLOPE * z
                }
            }
            Activation::Relu => z.max(0.0),
            Activation::Tanh => z.tanh(),
        }
    }

    /// Derivative with respect to the pre-activation value `z`.
    #[inline]
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let y = 1.0 / (1.0 + (-z).exp());
                y * (1.0 - y)
            }
            Activation::LeakyRelu => {
                if z >= 0.0 {
                    1.0
                } else {
                    LEAKY_SLOPE
                }
            }
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => {
                let y = z.tanh();
                1.0 - y * y
            }
        }
    }
}

/// Architecture of the graph network.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Size of the atom-species vocabulary consumed by the one-hot embedding.
    pub species: usize,
    /// Width of the per-atom hidden representation.
    pub node_dim: usize,
    /// Number of message-passing rounds applied by the shared update.
    pub message_rounds: usize,
    /// Hidden width of the shared message-passing update.
    pub update_units: usize,
    /// Hidden width of each readout head stack.
    pub head_units: usize,
    /// Nonlinearity used by the update and the head hidden layers.
    pub activation: Activation,
}

/// Settings of the gradient-descent loop.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Number of passes over the training split.
    pub epochs: usize,
    /// Atom rows per packed batch; molecules are packed until this capacity
    /// and the remainder of each batch is padding.
    pub batch_atoms: usize,
    /// Fraction of molecules held out for evaluation.
    pub test_fraction: f64,
    /// Seed for weight initialization and the train/test shuffle.
    pub seed: u64,
}

/// The full set of hyperparameters for one training run.
///
/// Loaded from a TOML file with a `[network]` and a `[training]` table. The
/// embedded defaults are a 32-wide node state refined for 5 rounds with
/// sigmoid units, trained with Adam at 1e-3 for 20 epochs over 256-atom
/// batches.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Hyperparameters {
    /// Graph network architecture.
    pub network: NetworkConfig,
    /// Optimization and data-split settings.
    pub training: TrainingConfig,
}

impl Hyperparameters {
    /// Loads hyperparameters from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the TOML file containing the hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns a `QeqNetError::IoError` if the file cannot be read, or a
    /// `QeqNetError::DeserializationError` if the TOML content is invalid or
    /// structurally incomplete.
    pub fn load_from_file(path: &Path) -> Result<Self, QeqNetError> {
        let content = std::fs::read_to_string(path).map_err(|io_error| QeqNetError::IoError {
            path: path.to_path_buf(),
            source: io_error,
        })?;

        Self::load_from_str(&content)
    }

    /// Parses hyperparameters from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `QeqNetError::DeserializationError` if the TOML content is
    /// invalid or structurally incomplete.
    ///
    /// # Examples
    ///
    /// ```
    /// use qeqnet::Hyperparameters;
    ///
    /// let toml_data = r#"
    /// [network]
    /// species = 8
    /// node_dim = 16
    /// message_rounds = 3
    /// update_units = 32
    /// head_units = 32
    /// activation = "leaky_relu"
    ///
    /// [training]
    /// learning_rate = 1e-3
    /// epochs = 10
    /// batch_atoms = 64
    /// test_fraction = 0.2
    /// seed = 7
    /// "#;
    ///
    /// let params = Hyperparameters::load_from_str(toml_data).unwrap();
    /// assert_eq!(params.network.node_dim, 16);
    /// ```
    pub fn load_from_str(toml_str: &str) -> Result<Self, QeqNetError> {
        toml::from_str(toml_str).map_err(QeqNetError::from)
    }
}
