use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all fallible operations in the `qeqnet` library.
///
/// This enum covers every failure mode of the training core, from configuration
/// I/O to precondition violations inside the charge solver. It implements
/// `std::error::Error`, allowing it to be composed with other error types in
/// application code.
///
/// Numerical faults and shape mismatches are precondition violations: they are
/// reported before any arithmetic is performed and are not retried anywhere,
/// since re-running an algebraic fault on identical inputs cannot succeed.
#[derive(Error, Debug)]
pub enum QeqNetError {
    /// A hardness value at or below zero reached the charge solver.
    ///
    /// The closed-form solution divides by each atom's hardness, so a
    /// non-positive value would produce a division fault or a sign-flipped
    /// energy. The index refers to the solver's input ordering.
    #[error("Non-positive hardness {value:.3e} for atom {index}: charge equilibration requires s > 0")]
    NonPositiveHardness {
        /// Position of the offending atom in the solver input.
        index: usize,
        /// The hardness value that failed the check.
        value: f64,
    },

    /// Two containers that must describe the same atoms, bonds or molecules
    /// disagree about how many there are.
    ///
    /// Raised before any arithmetic so that misaligned inputs can never
    /// silently produce wrong charges.
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Which pair of containers disagreed.
        context: String,
        /// The length implied by the reference container.
        expected: usize,
        /// The length actually found.
        found: usize,
    },

    /// An atom row of the membership matrix belongs to zero or multiple
    /// molecules after padding removal.
    ///
    /// Membership must partition the retained atoms; anything else makes the
    /// per-molecule scatter ambiguous.
    #[error("Atom row {row} belongs to {count} molecules after trimming; membership must assign exactly one")]
    BrokenPartition {
        /// The trimmed-layout row that violated the invariant.
        row: usize,
        /// How many molecule columns claimed the row.
        count: usize,
    },

    /// A validation error indicating that the input slice of atoms was empty.
    /// At least one atom is required to perform a calculation.
    #[error("Input validation failed: at least one atom is required for a calculation")]
    NoAtoms,

    /// A batch was constructed from no molecules, or from molecules that
    /// contain no atoms between them.
    #[error("Input validation failed: a batch must contain at least one molecule with atoms")]
    EmptyBatch,

    /// An I/O error that occurred while attempting to read a hyperparameter file.
    #[error("I/O error at path '{path}': {source}")]
    IoError {
        /// The path of the file that caused the I/O error.
        path: PathBuf,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// An error that occurred while parsing a hyperparameter file, typically
    /// indicating invalid TOML or a structural mismatch with the expected
    /// `Hyperparameters` format.
    #[error("Failed to deserialize TOML hyperparameters: {0}")]
    DeserializationError(#[from] toml::de::Error),
}
