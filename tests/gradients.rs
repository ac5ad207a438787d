//! Finite-difference verification of the hand-derived gradients.
//!
//! Every backward formula in the crate is checked here against central
//! differences through the genuine forward path, from the closed-form solver
//! VJP up to the full network-solver-loss chain.

mod common;

use common::membership;
use qeqnet::solver::{equilibrate, equilibrate_batch, equilibrate_batch_vjp, equilibrate_vjp};
use qeqnet::{GraphBatch, Hyperparameters, Molecule, Trainer};

const STEP: f64 = 1e-5;
const TOLERANCE: f64 = 1e-6;

fn assert_gradient(numeric: f64, analytic: f64, what: &str) {
    let scale = numeric.abs().max(1.0);
    assert!(
        (numeric - analytic).abs() <= TOLERANCE * scale,
        "{}: numeric {:.9e} vs analytic {:.9e}",
        what,
        numeric,
        analytic
    );
}

#[test]
fn test_solver_vjp_matches_finite_differences() {
    let e = vec![0.3, -0.7, 1.1];
    let s = vec![1.2, 0.8, 2.0];
    let total = 0.5;
    let upstream = [1.0, -2.0, 0.5];

    let loss = |e: &[f64], s: &[f64]| -> f64 {
        let q = equilibrate(e, s, total).unwrap();
        q.iter().zip(&upstream).map(|(&qi, &ci)| qi * ci).sum()
    };

    let q = equilibrate(&e, &s, total).unwrap();
    let (de, ds) = equilibrate_vjp(&s, &q, &upstream).unwrap();

    for k in 0..e.len() {
        let mut e_up = e.clone();
        let mut e_down = e.clone();
        e_up[k] += STEP;
        e_down[k] -= STEP;
        let numeric = (loss(&e_up, &s) - loss(&e_down, &s)) / (2.0 * STEP);
        assert_gradient(numeric, de[k], &format!("de[{}]", k));

        let mut s_up = s.clone();
        let mut s_down = s.clone();
        s_up[k] += STEP;
        s_down[k] -= STEP;
        let numeric = (loss(&e, &s_up) - loss(&e, &s_down)) / (2.0 * STEP);
        assert_gradient(numeric, ds[k], &format!("ds[{}]", k));
    }
}

#[test]
fn test_batched_vjp_matches_finite_differences() {
    // Two interleaved molecules plus a padding row, so the gather/scatter
    // alignment is part of what the differences check.
    let matrix = membership(6, 2, &[(0, 0), (1, 1), (2, 0), (3, 1), (4, 0)]);
    let trimmed = matrix.trim();

    let e = vec![0.2, -0.1, 0.7, 0.3, -0.4];
    let s = vec![1.0, 2.0, 0.5, 1.5, 3.0];
    let totals = [0.5, -1.0];
    let upstream = [0.4, -1.0, 0.9, 0.1, -0.6];

    let loss = |e: &[f64], s: &[f64]| -> f64 {
        let q = equilibrate_batch(e, s, &totals, &trimmed).unwrap();
        q.iter().zip(&upstream).map(|(&qi, &ci)| qi * ci).sum()
    };

    let q = equilibrate_batch(&e, &s, &totals, &trimmed).unwrap();
    let (de, ds) = equilibrate_batch_vjp(&s, &q, &upstream, &trimmed).unwrap();

    for k in 0..e.len() {
        let mut e_up = e.clone();
        let mut e_down = e.clone();
        e_up[k] += STEP;
        e_down[k] -= STEP;
        let numeric = (loss(&e_up, &s) - loss(&e_down, &s)) / (2.0 * STEP);
        assert_gradient(numeric, de[k], &format!("batched de[{}]", k));

        let mut s_up = s.clone();
        let mut s_down = s.clone();
        s_up[k] += STEP;
        s_down[k] -= STEP;
        let numeric = (loss(&e, &s_up) - loss(&e, &s_down)) / (2.0 * STEP);
        assert_gradient(numeric, ds[k], &format!("batched ds[{}]", k));
    }
}

fn gradient_check_setup() -> (Trainer, GraphBatch) {
    // Smooth activations only: finite differences through a kink would lie.
    let config = Hyperparameters::load_from_str(
        r#"
        [network]
        species = 4
        node_dim = 5
        message_rounds = 3
        update_units = 6
        head_units = 6
        activation = "tanh"

        [training]
        learning_rate = 1e-3
        epochs = 1
        batch_atoms = 8
        test_fraction = 0.0
        seed = 97
        "#,
    )
    .unwrap();

    let molecules = vec![
        Molecule {
            atom_types: vec![0, 1, 1],
            bonds: vec![(0, 1), (0, 2)],
            charges: vec![-0.6, 0.3, 0.3],
        },
        Molecule {
            atom_types: vec![2, 3],
            bonds: vec![(0, 1)],
            charges: vec![0.45, -0.45],
        },
    ];
    let batch = GraphBatch::pack(&molecules, 8).unwrap();

    (Trainer::new(&config), batch)
}

#[test]
fn test_network_gradients_match_finite_differences() {
    let (mut trainer, batch) = gradient_check_setup();
    let (_, grads) = trainer.loss_and_gradients(&batch).unwrap();

    // One representative scalar from every tensor of the chain.
    type Probe = (
        &'static str,
        fn(&mut qeqnet::net::GnParams) -> &mut f64,
        fn(&qeqnet::net::GnParams) -> f64,
    );
    let probes: Vec<Probe> = vec![
        (
            "embed.weight[1,2]",
            |p| &mut p.embed.weight[(1, 2)],
            |g| g.embed.weight[(1, 2)],
        ),
        (
            "update_hidden.weight[3,4]",
            |p| &mut p.update_hidden.weight[(3, 4)],
            |g| g.update_hidden.weight[(3, 4)],
        ),
        (
            "update_hidden.bias[0]",
            |p| &mut p.update_hidden.bias[0],
            |g| g.update_hidden.bias[0],
        ),
        (
            "update_out.weight[2,1]",
            |p| &mut p.update_out.weight[(2, 1)],
            |g| g.update_out.weight[(2, 1)],
        ),
        (
            "head_e0.weight[0,3]",
            |p| &mut p.head_e0.weight[(0, 3)],
            |g| g.head_e0.weight[(0, 3)],
        ),
        (
            "head_e1.bias[0]",
            |p| &mut p.head_e1.bias[0],
            |g| g.head_e1.bias[0],
        ),
        (
            "head_s0.weight[4,2]",
            |p| &mut p.head_s0.weight[(4, 2)],
            |g| g.head_s0.weight[(4, 2)],
        ),
        (
            "head_s1.weight[5,0]",
            |p| &mut p.head_s1.weight[(5, 0)],
            |g| g.head_s1.weight[(5, 0)],
        ),
    ];

    for (name, select_mut, select) in probes {
        let analytic = select(&grads);

        let original = *select_mut(trainer.network_mut().params_mut());
        *select_mut(trainer.network_mut().params_mut()) = original + STEP;
        let (loss_up, _) = trainer.loss_and_gradients(&batch).unwrap();
        *select_mut(trainer.network_mut().params_mut()) = original - STEP;
        let (loss_down, _) = trainer.loss_and_gradients(&batch).unwrap();
        *select_mut(trainer.network_mut().params_mut()) = original;

        let numeric = (loss_up - loss_down) / (2.0 * STEP);
        assert_gradient(numeric, analytic, name);
    }
}
