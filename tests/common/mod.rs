#![allow(dead_code)]

use qeqnet::Membership;
use qeqnet::solver::equilibrate;

pub struct SolverCase<'a> {
    pub name: &'a str,
    pub electronegativity: Vec<f64>,
    pub hardness: Vec<f64>,
    pub total_charge: f64,
    pub expected: Vec<(usize, f64)>,
}

/// Runs a group of closed-form solver cases, printing a results table and
/// asserting that every charge matches its expectation and that every
/// molecule conserves its total charge.
pub fn run_solver_group(group_name: &str, cases: Vec<SolverCase>, tolerance: f64) {
    println!("\nRunning Group Test: {}", group_name);
    println!("{:-<72}", "");
    println!(
        "{:<16} | {:<10} | {:<12} | {:<12}",
        "Molecule", "Atom Idx", "Expected", "Calculated"
    );

    for case in cases {
        let charges = equilibrate(
            &case.electronegativity,
            &case.hardness,
            case.total_charge,
        )
        .expect("Solver failed");

        let sum: f64 = charges.iter().sum();
        assert!(
            (sum - case.total_charge).abs() < 1e-10,
            "{}: charges sum to {} instead of {}",
            case.name,
            sum,
            case.total_charge
        );

        for (index, expected_q) in &case.expected {
            let calculated_q = charges[*index];
            let error = (calculated_q - expected_q).abs();

            println!(
                "{:<16} | {:<10} | {:<12.6} | {:<12.6} (Err: {:.2e})",
                case.name, index, expected_q, calculated_q, error
            );

            assert!(
                error <= tolerance,
                "{}: atom {} error {:.3e} exceeds tolerance {:.3e}",
                case.name,
                index,
                error,
                tolerance
            );
        }
    }

    println!("{:-<72}\n", "");
}

/// Builds a membership matrix from the listed true entries.
pub fn membership(rows: usize, cols: usize, truthy: &[(usize, usize)]) -> Membership {
    let mut matrix = Membership::new(rows, cols);
    for &(row, col) in truthy {
        matrix.set(row, col, true);
    }
    matrix
}

pub fn assert_all_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "index {}: {} vs {} (tolerance {})",
            i,
            a,
            e,
            tolerance
        );
    }
}
