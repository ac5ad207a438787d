//! Flat-tensor batching of molecules.
//!
//! A `GraphBatch` lays the atoms of many molecules out as one flat row
//! sequence, with molecule boundaries recorded only in the boolean membership
//! matrices. Batches are padded to a fixed atom-row count so that every batch
//! of a run has the same shape; padding rows are all-false in the membership
//! matrix and removed again by trimming before any per-molecule computation.

use super::membership::Membership;
use crate::error::QeqNetError;
use crate::types::Molecule;
use faer::Mat;

/// A batch of molecules in flat layout.
///
/// All per-atom containers are aligned: row `i` of `atom_types`, `adjacency`,
/// `atom_in_mol` and `ref_charges` describe the same atom. Bonds use global
/// (batch-level) atom indices and are mirrored into the dense symmetric
/// adjacency consumed by the graph network.
#[derive(Debug, Clone)]
pub struct GraphBatch {
    /// Species vocabulary index of each atom row (padding rows hold 0).
    pub atom_types: Vec<usize>,
    /// Undirected bonds as pairs of global atom-row indices.
    pub bonds: Vec<(usize, usize)>,
    /// Dense symmetric 0/1 adjacency over the atom rows.
    pub adjacency: Mat<f64>,
    /// Atom-to-molecule assignment; all-false rows and columns are padding.
    pub atom_in_mol: Membership,
    /// Bond-to-molecule assignment, aligned with `bonds`.
    pub bond_in_mol: Membership,
    /// Reference partial charge of each atom row (padding rows hold 0).
    pub ref_charges: Vec<f64>,
}

impl GraphBatch {
    /// Packs molecules into one batch with `atom_rows` atom rows.
    ///
    /// Molecules are laid out back to back; the remaining rows (and none of
    /// the molecule columns) are padding. If the molecules need more rows than
    /// requested, the batch grows to fit them exactly.
    ///
    /// # Errors
    ///
    /// Returns `QeqNetError::EmptyBatch` if `molecules` is empty,
    /// `QeqNetError::NoAtoms` if any molecule has no atoms, and
    /// `QeqNetError::ShapeMismatch` if a molecule's charges or bonds disagree
    /// with its atom count.
    pub fn pack(molecules: &[Molecule], atom_rows: usize) -> Result<Self, QeqNetError> {
        if molecules.is_empty() {
            return Err(QeqNetError::EmptyBatch);
        }

        let total_atoms: usize = molecules.iter().map(Molecule::atom_count).sum();
        if total_atoms == 0 {
            return Err(QeqNetError::EmptyBatch);
        }
        let rows = atom_rows.max(total_atoms);
        let total_bonds: usize = molecules.iter().map(|m| m.bonds.len()).sum();

        let mut atom_types = vec![0usize; rows];
        let mut ref_charges = vec![0.0; rows];
        let mut bonds = Vec::with_capacity(total_bonds);
        let mut adjacency = Mat::zeros(rows, rows);
        let mut atom_in_mol = Membership::new(rows, molecules.len());
        let mut bond_in_mol = Membership::new(total_bonds, molecules.len());

        let mut offset = 0;
        for (idx, molecule) in molecules.iter().enumerate() {
            let n = molecule.atom_count();
            if n == 0 {
                return Err(QeqNetError::NoAtoms);
            }
            if molecule.charges.len() != n {
                return Err(QeqNetError::ShapeMismatch {
                    context: format!("reference charges of molecule {}", idx),
                    expected: n,
                    found: molecule.charges.len(),
                });
            }

            for (local, &species) in molecule.atom_types.iter().enumerate() {
                atom_types[offset + local] = species;
                ref_charges[offset + local] = molecule.charges[local];
                atom_in_mol.set(offset + local, idx, true);
            }

            for &(u, v) in &molecule.bonds {
                if u >= n || v >= n {
                    return Err(QeqNetError::ShapeMismatch {
                        context: format!("bond endpoints of molecule {}", idx),
                        expected: n,
                        found: u.max(v) + 1,
                    });
                }
                let (gu, gv) = (offset + u, offset + v);
                bond_in_mol.set(bonds.len(), idx, true);
                bonds.push((gu, gv));
                adjacency[(gu, gv)] = 1.0;
                adjacency[(gv, gu)] = 1.0;
            }

            offset += n;
        }

        Ok(GraphBatch {
            atom_types,
            bonds,
            adjacency,
            atom_in_mol,
            bond_in_mol,
            ref_charges,
        })
    }

    /// Number of atom rows, padding included.
    pub fn atom_rows(&self) -> usize {
        self.atom_types.len()
    }

    /// Number of molecule columns, padding included.
    pub fn molecule_cols(&self) -> usize {
        self.atom_in_mol.cols()
    }

    /// Fail-fast consistency check of every container in the batch.
    ///
    /// Verifies that all per-atom containers agree on the row count, that the
    /// two membership matrices agree on the molecule count, that every bond
    /// lies inside the molecule it is assigned to, and that the trimmed atom
    /// membership is a partition.
    pub fn validate(&self) -> Result<(), QeqNetError> {
        let rows = self.atom_types.len();

        if self.ref_charges.len() != rows {
            return Err(QeqNetError::ShapeMismatch {
                context: "reference charges".to_string(),
                expected: rows,
                found: self.ref_charges.len(),
            });
        }
        if self.adjacency.nrows() != rows || self.adjacency.ncols() != rows {
            return Err(QeqNetError::ShapeMismatch {
                context: "adjacency matrix".to_string(),
                expected: rows,
                found: self.adjacency.nrows().max(self.adjacency.ncols()),
            });
        }
        if self.atom_in_mol.rows() != rows {
            return Err(QeqNetError::ShapeMismatch {
                context: "atom membership rows".to_string(),
                expected: rows,
                found: self.atom_in_mol.rows(),
            });
        }
        if self.bond_in_mol.rows() != self.bonds.len() {
            return Err(QeqNetError::ShapeMismatch {
                context: "bond membership rows".to_string(),
                expected: self.bonds.len(),
                found: self.bond_in_mol.rows(),
            });
        }
        if self.bond_in_mol.cols() != self.atom_in_mol.cols() {
            return Err(QeqNetError::ShapeMismatch {
                context: "membership molecule columns".to_string(),
                expected: self.atom_in_mol.cols(),
                found: self.bond_in_mol.cols(),
            });
        }

        for (k, &(u, v)) in self.bonds.iter().enumerate() {
            if u >= rows || v >= rows {
                return Err(QeqNetError::ShapeMismatch {
                    context: format!("bond {} endpoints", k),
                    expected: rows,
                    found: u.max(v) + 1,
                });
            }
            for col in 0..self.bond_in_mol.cols() {
                if self.bond_in_mol.get(k, col)
                    && !(self.atom_in_mol.get(u, col) && self.atom_in_mol.get(v, col))
                {
                    return Err(QeqNetError::ShapeMismatch {
                        context: format!("bond {} crosses molecule {}", k, col),
                        expected: col,
                        found: col,
                    });
                }
            }
        }

        self.atom_in_mol.trim().validate_partition()
    }
}

/// Splits a molecule list into packed batches of at most `batch_atoms` rows.
///
/// Molecules are taken in order and a batch is closed once the next molecule
/// would exceed the capacity; every batch is then padded to exactly
/// `batch_atoms` rows (a single molecule larger than the capacity gets a batch
/// of its own size). The padding is what exercises the trimming path on every
/// forward pass.
///
/// # Errors
///
/// Propagates packing errors; an empty molecule list yields
/// `QeqNetError::EmptyBatch`.
pub fn batch_molecules(
    molecules: &[Molecule],
    batch_atoms: usize,
) -> Result<Vec<GraphBatch>, QeqNetError> {
    if molecules.is_empty() {
        return Err(QeqNetError::EmptyBatch);
    }

    let mut batches = Vec::new();
    let mut current: Vec<Molecule> = Vec::new();
    let mut current_atoms = 0;

    for molecule in molecules {
        let n = molecule.atom_count();
        if !current.is_empty() && current_atoms + n > batch_atoms {
            batches.push(GraphBatch::pack(&current, batch_atoms)?);
            current.clear();
            current_atoms = 0;
        }
        current.push(molecule.clone());
        current_atoms += n;
    }
    if !current.is_empty() {
        batches.push(GraphBatch::pack(&current, batch_atoms)?);
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Molecule {
        Molecule {
            atom_types: vec![3, 0, 0],
            bonds: vec![(0, 1), (0, 2)],
            charges: vec![-0.8, 0.4, 0.4],
        }
    }

    fn diatomic() -> Molecule {
        Molecule {
            atom_types: vec![1, 3],
            bonds: vec![(0, 1)],
            charges: vec![0.2, -0.2],
        }
    }

    #[test]
    fn test_pack_layout() {
        let batch = GraphBatch::pack(&[water(), diatomic()], 8).unwrap();
        batch.validate().unwrap();

        assert_eq!(batch.atom_rows(), 8);
        assert_eq!(batch.molecule_cols(), 2);
        assert_eq!(batch.bonds, vec![(0, 1), (0, 2), (3, 4)]);
        assert_eq!(batch.adjacency[(0, 1)], 1.0);
        assert_eq!(batch.adjacency[(4, 3)], 1.0);
        assert_eq!(batch.adjacency[(2, 3)], 0.0);

        // Padding rows are false everywhere.
        for row in 5..8 {
            assert!(!batch.atom_in_mol.get(row, 0));
            assert!(!batch.atom_in_mol.get(row, 1));
        }
    }

    #[test]
    fn test_pack_grows_for_oversized_molecule() {
        let batch = GraphBatch::pack(&[water()], 2).unwrap();
        assert_eq!(batch.atom_rows(), 3);
    }

    #[test]
    fn test_batching_respects_capacity() {
        let molecules = vec![water(), diatomic(), water(), water()];
        let batches = batch_molecules(&molecules, 6).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].molecule_cols(), 2);
        assert_eq!(batches[1].molecule_cols(), 2);
        for batch in &batches {
            batch.validate().unwrap();
            assert_eq!(batch.atom_rows(), 6);
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            GraphBatch::pack(&[], 4),
            Err(QeqNetError::EmptyBatch)
        ));
        assert!(matches!(
            batch_molecules(&[], 4),
            Err(QeqNetError::EmptyBatch)
        ));
    }

    #[test]
    fn test_bond_out_of_range_rejected() {
        let broken = Molecule {
            atom_types: vec![0, 1],
            bonds: vec![(0, 5)],
            charges: vec![0.0, 0.0],
        };
        assert!(matches!(
            GraphBatch::pack(&[broken], 4),
            Err(QeqNetError::ShapeMismatch { .. })
        ));
    }
}
