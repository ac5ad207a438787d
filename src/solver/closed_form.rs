//! Closed-form charge equilibration for a single molecule.
//!
//! Charges minimize the quadratic energy `U(q) = Σ_i [e_i q_i + ½ s_i q_i²]`
//! subject to the conservation constraint `Σ_i q_i = Q`. A single Lagrange
//! multiplier shared by all atoms gives the exact minimizer in one step:
//!
//! ```text
//! λ   = (Q + Σ_j e_j / s_j) / (Σ_j 1 / s_j)
//! q_i = (λ - e_i) / s_i
//! ```
//!
//! The solver sits inside a trained network's forward pass, so its gradient is
//! needed as well. Because no automatic differentiation is available, the
//! reverse-mode gradient is derived from the closed form and implemented as an
//! explicit vector-Jacobian product in `equilibrate_vjp`.

use crate::error::QeqNetError;

/// Solves the constrained charge-equilibration problem for one molecule.
///
/// # Arguments
///
/// * `electronegativity` - Per-atom electronegativity `e`, one entry per atom.
/// * `hardness` - Per-atom hardness `s`; every entry must be strictly positive.
/// * `total_charge` - The molecule's net charge `Q`.
///
/// # Returns
///
/// The per-atom charges `q`, in input order. Their sum equals `total_charge`
/// up to floating-point rounding; a single-atom molecule receives exactly `Q`.
///
/// # Errors
///
/// Returns `QeqNetError::NoAtoms` for an empty molecule and
/// `QeqNetError::NonPositiveHardness` if any hardness entry is at or below
/// zero. The check runs before any division so a fault can never occur.
///
/// # Examples
///
/// ```
/// use qeqnet::solver::equilibrate;
///
/// // Uniform hardness distributes the charge evenly.
/// let q = equilibrate(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0], 3.0).unwrap();
/// assert!(q.iter().all(|&qi| (qi - 1.0).abs() < 1e-12));
/// ```
pub fn equilibrate(
    electronegativity: &[f64],
    hardness: &[f64],
    total_charge: f64,
) -> Result<Vec<f64>, QeqNetError> {
    let n = electronegativity.len();
    if n == 0 {
        return Err(QeqNetError::NoAtoms);
    }
    if hardness.len() != n {
        return Err(QeqNetError::ShapeMismatch {
            context: "charge solver inputs".to_string(),
            expected: n,
            found: hardness.len(),
        });
    }
    for (index, &value) in hardness.iter().enumerate() {
        if value <= 0.0 {
            return Err(QeqNetError::NonPositiveHardness { index, value });
        }
    }

    let softness: Vec<f64> = hardness.iter().map(|&s| 1.0 / s).collect();
    let softness_sum: f64 = softness.iter().sum();
    let weighted_sum: f64 = electronegativity
        .iter()
        .zip(&softness)
        .map(|(&e, &inv)| e * inv)
        .sum();

    let lambda = (total_charge + weighted_sum) / softness_sum;

    Ok(electronegativity
        .iter()
        .zip(&softness)
        .map(|(&e, &inv)| (lambda - e) * inv)
        .collect())
}

/// Reverse-mode gradient of `equilibrate` with respect to `e` and `s`.
///
/// With `b = Σ_j 1/s_j` and `w = Σ_i upstream_i / s_i`, differentiating the
/// closed form gives
///
/// ```text
/// ∂L/∂e_k = (w / b - upstream_k) / s_k
/// ∂L/∂s_k = q_k · ∂L/∂e_k
/// ```
///
/// which only needs the hardness and the charges already computed by the
/// forward pass. For a single-atom molecule both gradients vanish, matching
/// the fact that the constraint alone fixes `q_0 = Q`.
///
/// # Arguments
///
/// * `hardness` - The hardness vector passed to the forward solve.
/// * `charges` - The charges returned by the forward solve.
/// * `upstream` - The loss gradient with respect to each charge.
///
/// # Returns
///
/// `(d_electronegativity, d_hardness)`, aligned with the forward inputs.
///
/// # Errors
///
/// Returns `QeqNetError::ShapeMismatch` if the three slices disagree in
/// length, and `QeqNetError::NonPositiveHardness` under the same precondition
/// as the forward solve.
pub fn equilibrate_vjp(
    hardness: &[f64],
    charges: &[f64],
    upstream: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), QeqNetError> {
    let n = hardness.len();
    if n == 0 {
        return Err(QeqNetError::NoAtoms);
    }
    if charges.len() != n || upstream.len() != n {
        return Err(QeqNetError::ShapeMismatch {
            context: "charge solver gradient inputs".to_string(),
            expected: n,
            found: charges.len().min(upstream.len()),
        });
    }
    for (index, &value) in hardness.iter().enumerate() {
        if value <= 0.0 {
            return Err(QeqNetError::NonPositiveHardness { index, value });
        }
    }

    let softness: Vec<f64> = hardness.iter().map(|&s| 1.0 / s).collect();
    let softness_sum: f64 = softness.iter().sum();
    let weighted_upstream: f64 = upstream
        .iter()
        .zip(&softness)
        .map(|(&g, &inv)| g * inv)
        .sum();
    let shared = weighted_upstream / softness_sum;

    let d_electronegativity: Vec<f64> = upstream
        .iter()
        .zip(&softness)
        .map(|(&g, &inv)| (shared - g) * inv)
        .collect();
    let d_hardness: Vec<f64> = charges
        .iter()
        .zip(&d_electronegativity)
        .map(|(&q, &de)| q * de)
        .collect();

    Ok((d_electronegativity, d_hardness))
}
