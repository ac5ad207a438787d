//! This module defines the core data types exchanged between the batching layer,
//! the graph network and the training loop.
//!
//! A `Molecule` is the pre-featurized unit of input: species indices, a bond list
//! and reference per-atom charges. An `EvaluationReport` is the held-out summary
//! produced at the end of a run.

/// A single pre-featurized molecule.
///
/// Atom species are already mapped to a compact vocabulary index (the mapping
/// from chemical elements to indices is the caller's concern). Bonds are
/// undirected pairs of atom indices local to the molecule. Reference charges
/// are the regression targets, one per atom; their sum is the molecule's total
/// charge and becomes the conservation constraint during the solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    /// Species vocabulary index of each atom.
    pub atom_types: Vec<usize>,
    /// Undirected bonds as pairs of local atom indices.
    pub bonds: Vec<(usize, usize)>,
    /// Reference partial charge of each atom.
    pub charges: Vec<f64>,
}

impl Molecule {
    /// Number of atoms in the molecule.
    pub fn atom_count(&self) -> usize {
        self.atom_types.len()
    }

    /// The molecule's net charge, i.e. the sum of its reference charges.
    pub fn total_charge(&self) -> f64 {
        self.charges.iter().sum()
    }
}

/// The result of evaluating a trained network on a held-out split.
///
/// Ground-truth and predicted charges are concatenated across all evaluation
/// batches in the trimmed row order, so `y_true[i]` and `y_pred[i]` always
/// refer to the same atom.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Reference charges of every retained atom, concatenated across batches.
    pub y_true: Vec<f64>,
    /// Predicted charges, aligned with `y_true`.
    pub y_pred: Vec<f64>,
    /// Global mean squared error over the concatenated arrays.
    pub mse: f64,
    /// Coefficient of determination over the concatenated arrays.
    pub r_squared: f64,
    /// Number of trainable parameters in the network.
    pub parameter_count: usize,
}
