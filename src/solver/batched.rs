//! Batched charge equilibration over a trimmed membership matrix.
//!
//! Each molecule column selects a disjoint subset of the trimmed atom rows, so
//! the per-molecule solves are independent and their scatter targets never
//! overlap. The solves are fanned out with rayon and the results written back
//! sequentially; molecule order cannot affect the outcome.

use super::closed_form::{equilibrate, equilibrate_vjp};
use crate::batch::Trimmed;
use crate::error::QeqNetError;
use rayon::prelude::*;

fn check_lengths(
    trimmed: &Trimmed,
    per_atom: &[(&str, usize)],
    per_molecule: &[(&str, usize)],
) -> Result<(), QeqNetError> {
    for &(context, found) in per_atom {
        if found != trimmed.atom_count() {
            return Err(QeqNetError::ShapeMismatch {
                context: context.to_string(),
                expected: trimmed.atom_count(),
                found,
            });
        }
    }
    for &(context, found) in per_molecule {
        if found != trimmed.molecule_count() {
            return Err(QeqNetError::ShapeMismatch {
                context: context.to_string(),
                expected: trimmed.molecule_count(),
                found,
            });
        }
    }
    Ok(())
}

/// Reports a solver fault at the trimmed-row index instead of the
/// molecule-local one.
fn relocate_fault(error: QeqNetError, rows: &[usize]) -> QeqNetError {
    match error {
        QeqNetError::NonPositiveHardness { index, value } => {
            QeqNetError::NonPositiveHardness {
                index: rows[index],
                value,
            }
        }
        other => other,
    }
}

/// Solves every molecule of a batch and scatters the charges back into the
/// trimmed row layout.
///
/// For each retained molecule column the corresponding `electronegativity`,
/// `hardness` rows are extracted, the closed-form solver is invoked with that
/// molecule's entry of `totals`, and the result is written to exactly the rows
/// that were extracted. The output has one charge per retained atom; a batch
/// whose trimming removed everything yields an empty vector.
///
/// Calling this function twice on the same inputs produces identical output —
/// it has no state and mutates nothing.
///
/// # Errors
///
/// Returns `QeqNetError::ShapeMismatch` if the inputs disagree with the
/// trimmed dimensions, or a solver error (with the atom index relocated to the
/// trimmed layout) if a precondition fails.
pub fn equilibrate_batch(
    electronegativity: &[f64],
    hardness: &[f64],
    totals: &[f64],
    trimmed: &Trimmed,
) -> Result<Vec<f64>, QeqNetError> {
    check_lengths(
        trimmed,
        &[
            ("batched electronegativity", electronegativity.len()),
            ("batched hardness", hardness.len()),
        ],
        &[("batched total charges", totals.len())],
    )?;

    let solved: Vec<(Vec<usize>, Vec<f64>)> = (0..trimmed.molecule_count())
        .into_par_iter()
        .map(|idx| {
            let rows = trimmed.column_rows(idx);
            let e: Vec<f64> = rows.iter().map(|&r| electronegativity[r]).collect();
            let s: Vec<f64> = rows.iter().map(|&r| hardness[r]).collect();
            let charges =
                equilibrate(&e, &s, totals[idx]).map_err(|err| relocate_fault(err, &rows))?;
            Ok((rows, charges))
        })
        .collect::<Result<_, QeqNetError>>()?;

    let mut output = vec![0.0; trimmed.atom_count()];
    for (rows, charges) in solved {
        for (&row, &charge) in rows.iter().zip(&charges) {
            output[row] = charge;
        }
    }
    Ok(output)
}

/// Reverse-mode counterpart of `equilibrate_batch`.
///
/// Mirrors the forward iteration: for each molecule the upstream gradient and
/// forward results are gathered, the closed-form VJP runs on the subset, and
/// the `(de, ds)` contributions are scattered to the same disjoint rows.
///
/// # Errors
///
/// Same conditions as `equilibrate_batch`.
pub fn equilibrate_batch_vjp(
    hardness: &[f64],
    charges: &[f64],
    upstream: &[f64],
    trimmed: &Trimmed,
) -> Result<(Vec<f64>, Vec<f64>), QeqNetError> {
    check_lengths(
        trimmed,
        &[
            ("batched hardness", hardness.len()),
            ("batched charges", charges.len()),
            ("batched upstream gradient", upstream.len()),
        ],
        &[],
    )?;

    let solved: Vec<(Vec<usize>, Vec<f64>, Vec<f64>)> = (0..trimmed.molecule_count())
        .into_par_iter()
        .map(|idx| {
            let rows = trimmed.column_rows(idx);
            let s: Vec<f64> = rows.iter().map(|&r| hardness[r]).collect();
            let q: Vec<f64> = rows.iter().map(|&r| charges[r]).collect();
            let g: Vec<f64> = rows.iter().map(|&r| upstream[r]).collect();
            let (de, ds) =
                equilibrate_vjp(&s, &q, &g).map_err(|err| relocate_fault(err, &rows))?;
            Ok((rows, de, ds))
        })
        .collect::<Result<_, QeqNetError>>()?;

    let mut d_electronegativity = vec![0.0; trimmed.atom_count()];
    let mut d_hardness = vec![0.0; trimmed.atom_count()];
    for (rows, de, ds) in solved {
        for ((&row, &de_val), &ds_val) in rows.iter().zip(&de).zip(&ds) {
            d_electronegativity[row] = de_val;
            d_hardness[row] = ds_val;
        }
    }
    Ok((d_electronegativity, d_hardness))
}
