//! Per-molecule aggregation of flat per-atom arrays.

use super::membership::Membership;
use crate::error::QeqNetError;

/// Sums a flat per-atom array into one total per molecule.
///
/// The membership matrix is trimmed with the same policy as the batched solver
/// (all-false rows and columns removed), so molecule indices produced here line
/// up with the molecule iteration order of `solver::equilibrate_batch` within
/// the same batch. The reduction treats the boolean matrix as 0/1 weights:
/// `total[idx] = Σ_i membership[i, idx] · value[i]`.
///
/// This is how each molecule's ground-truth total charge is recovered from the
/// reference per-atom charges; the result is a label, not a prediction, and no
/// gradient flows through it.
///
/// # Errors
///
/// Returns `QeqNetError::ShapeMismatch` if `values` does not have one entry per
/// membership row.
pub fn total_per_molecule(
    values: &[f64],
    membership: &Membership,
) -> Result<Vec<f64>, QeqNetError> {
    if values.len() != membership.rows() {
        return Err(QeqNetError::ShapeMismatch {
            context: "per-molecule aggregation".to_string(),
            expected: membership.rows(),
            found: values.len(),
        });
    }

    let trimmed = membership.trim();
    let kept = trimmed.gather(values)?;
    let matrix = trimmed.matrix();

    let mut totals = vec![0.0; matrix.cols()];
    for (idx, total) in totals.iter_mut().enumerate() {
        for (row, value) in kept.iter().enumerate() {
            let weight = if matrix.get(row, idx) { 1.0 } else { 0.0 };
            *total += weight * value;
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_ignore_padding() {
        // Same assignment as the documented example, plus a padding row and a
        // padding molecule column; both must vanish from the result.
        let membership = Membership::from_fn(4, 3, |row, col| {
            matches!((row, col), (0, 0) | (1, 0) | (2, 1))
        });
        let totals = total_per_molecule(&[2.0, 3.0, 4.0, 7.0], &membership).unwrap();
        assert_eq!(totals, vec![5.0, 4.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let membership = Membership::from_fn(2, 1, |_, _| true);
        assert!(matches!(
            total_per_molecule(&[1.0], &membership),
            Err(QeqNetError::ShapeMismatch { .. })
        ));
    }
}
