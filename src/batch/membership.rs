//! Boolean membership matrices and their padding-trimming machinery.
//!
//! A batch stores all atoms of all molecules as one flat sequence of rows; the
//! membership matrix is the sole record of which row belongs to which molecule.
//! Padding rows and padding molecule columns are entirely false and are removed
//! by `Membership::trim` before any per-molecule computation. The `Trimmed`
//! view keeps the original indices of every retained row and column so that
//! flat arrays can be gathered into the trimmed layout and gradients scattered
//! back out without the two layouts ever drifting apart.

use crate::error::QeqNetError;

/// A dense boolean assignment matrix.
///
/// Rows are atoms (or bonds), columns are molecules; entry `(i, j)` is true iff
/// row `i` belongs to molecule `j`. After trimming, atom membership must be a
/// partition: every retained row true in exactly one retained column.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    entries: Vec<bool>,
    rows: usize,
    cols: usize,
}

impl Membership {
    /// Creates an all-false matrix with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Membership {
            entries: vec![false; rows * cols],
            rows,
            cols,
        }
    }

    /// Builds a matrix by evaluating `f` at every `(row, col)` position.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut matrix = Membership::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                matrix.set(row, col, f(row, col));
            }
        }
        matrix
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Reads entry `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < self.rows && col < self.cols);
        self.entries[row * self.cols + col]
    }

    /// Writes entry `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        debug_assert!(row < self.rows && col < self.cols);
        self.entries[row * self.cols + col] = value;
    }

    fn row_is_occupied(&self, row: usize) -> bool {
        (0..self.cols).any(|col| self.get(row, col))
    }

    fn col_is_occupied(&self, col: usize) -> bool {
        (0..self.rows).any(|row| self.get(row, col))
    }

    /// Removes padding: every all-false row and every all-false column.
    ///
    /// The returned view records which original rows and columns survived, so
    /// row-aligned flat arrays can be moved between the full and the trimmed
    /// layout consistently. Trimming is a pure function of the matrix; running
    /// it twice yields identical results.
    pub fn trim(&self) -> Trimmed {
        let kept_rows: Vec<usize> = (0..self.rows).filter(|&r| self.row_is_occupied(r)).collect();
        let kept_cols: Vec<usize> = (0..self.cols).filter(|&c| self.col_is_occupied(c)).collect();

        let matrix = Membership::from_fn(kept_rows.len(), kept_cols.len(), |r, c| {
            self.get(kept_rows[r], kept_cols[c])
        });

        Trimmed {
            matrix,
            kept_rows,
            kept_cols,
            source_rows: self.rows,
        }
    }
}

/// A membership matrix with padding rows and columns removed.
///
/// Produced by `Membership::trim`. All per-molecule computation happens in this
/// layout; `gather` and `scatter_to_full` translate row-aligned arrays between
/// the original full-batch layout and the trimmed one.
#[derive(Debug, Clone, PartialEq)]
pub struct Trimmed {
    matrix: Membership,
    kept_rows: Vec<usize>,
    kept_cols: Vec<usize>,
    source_rows: usize,
}

impl Trimmed {
    /// The trimmed matrix itself.
    pub fn matrix(&self) -> &Membership {
        &self.matrix
    }

    /// Original row indices of the retained atoms, in trimmed order.
    pub fn kept_rows(&self) -> &[usize] {
        &self.kept_rows
    }

    /// Original column indices of the retained molecules, in trimmed order.
    pub fn kept_cols(&self) -> &[usize] {
        &self.kept_cols
    }

    /// Number of retained atom rows.
    pub fn atom_count(&self) -> usize {
        self.kept_rows.len()
    }

    /// Number of retained molecule columns.
    pub fn molecule_count(&self) -> usize {
        self.kept_cols.len()
    }

    /// Checks that every retained row belongs to exactly one retained column.
    ///
    /// # Errors
    ///
    /// Returns `QeqNetError::BrokenPartition` naming the first offending row.
    pub fn validate_partition(&self) -> Result<(), QeqNetError> {
        for row in 0..self.matrix.rows() {
            let count = (0..self.matrix.cols())
                .filter(|&col| self.matrix.get(row, col))
                .count();
            if count != 1 {
                return Err(QeqNetError::BrokenPartition { row, count });
            }
        }
        Ok(())
    }

    /// Trimmed-local row indices belonging to molecule column `col`.
    pub fn column_rows(&self, col: usize) -> Vec<usize> {
        (0..self.matrix.rows())
            .filter(|&row| self.matrix.get(row, col))
            .collect()
    }

    /// Selects the retained rows of a full-batch flat array.
    ///
    /// # Errors
    ///
    /// Returns `QeqNetError::ShapeMismatch` if `full` does not have one entry
    /// per row of the untrimmed matrix.
    pub fn gather(&self, full: &[f64]) -> Result<Vec<f64>, QeqNetError> {
        if full.len() != self.source_rows {
            return Err(QeqNetError::ShapeMismatch {
                context: "gather into trimmed layout".to_string(),
                expected: self.source_rows,
                found: full.len(),
            });
        }
        Ok(self.kept_rows.iter().map(|&row| full[row]).collect())
    }

    /// Expands a trimmed-layout array back to the full-batch layout.
    ///
    /// Padding rows receive zero, which is the correct gradient contribution
    /// for atoms that never took part in the computation.
    ///
    /// # Errors
    ///
    /// Returns `QeqNetError::ShapeMismatch` if `trimmed` does not have one
    /// entry per retained row.
    pub fn scatter_to_full(&self, trimmed: &[f64]) -> Result<Vec<f64>, QeqNetError> {
        if trimmed.len() != self.kept_rows.len() {
            return Err(QeqNetError::ShapeMismatch {
                context: "scatter into full layout".to_string(),
                expected: self.kept_rows.len(),
                found: trimmed.len(),
            });
        }
        let mut full = vec![0.0; self.source_rows];
        for (local, &row) in self.kept_rows.iter().enumerate() {
            full[row] = trimmed[local];
        }
        Ok(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_molecule_matrix() -> Membership {
        // Rows 0,1 -> molecule 0; row 2 -> molecule 1; row 3 padding.
        // Column 2 is a padding molecule.
        Membership::from_fn(4, 3, |row, col| {
            matches!((row, col), (0, 0) | (1, 0) | (2, 1))
        })
    }

    #[test]
    fn test_trim_drops_padding() {
        let trimmed = two_molecule_matrix().trim();
        assert_eq!(trimmed.atom_count(), 3);
        assert_eq!(trimmed.molecule_count(), 2);
        assert_eq!(trimmed.kept_rows(), &[0, 1, 2]);
        assert_eq!(trimmed.kept_cols(), &[0, 1]);
        trimmed.validate_partition().unwrap();
    }

    #[test]
    fn test_trim_is_idempotent() {
        let first = two_molecule_matrix().trim();
        let second = first.matrix().trim();
        assert_eq!(first.matrix(), second.matrix());
    }

    #[test]
    fn test_gather_scatter_round_trip() {
        let trimmed = two_molecule_matrix().trim();
        let gathered = trimmed.gather(&[1.0, 2.0, 3.0, 99.0]).unwrap();
        assert_eq!(gathered, vec![1.0, 2.0, 3.0]);

        let full = trimmed.scatter_to_full(&gathered).unwrap();
        assert_eq!(full, vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_gather_rejects_wrong_length() {
        let trimmed = two_molecule_matrix().trim();
        assert!(matches!(
            trimmed.gather(&[1.0, 2.0]),
            Err(QeqNetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_partition_violation_detected() {
        let mut matrix = two_molecule_matrix();
        matrix.set(0, 1, true); // row 0 now claims both molecules
        let trimmed = matrix.trim();
        assert!(matches!(
            trimmed.validate_partition(),
            Err(QeqNetError::BrokenPartition { row: 0, count: 2 })
        ));
    }
}
