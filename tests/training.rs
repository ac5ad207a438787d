mod common;

use qeqnet::solver::equilibrate_batch;
use qeqnet::{
    GraphBatch, Hyperparameters, Molecule, Trainer, batch_molecules, total_per_molecule,
};

fn tiny_hyperparameters() -> Hyperparameters {
    Hyperparameters::load_from_str(
        r#"
        [network]
        species = 4
        node_dim = 8
        message_rounds = 3
        update_units = 12
        head_units = 12
        activation = "sigmoid"

        [training]
        learning_rate = 5e-3
        epochs = 40
        batch_atoms = 16
        test_fraction = 0.2
        seed = 2666
        "#,
    )
    .unwrap()
}

fn water_like() -> Molecule {
    Molecule {
        atom_types: vec![3, 0, 0],
        bonds: vec![(0, 1), (0, 2)],
        charges: vec![-0.8, 0.4, 0.4],
    }
}

fn methane_like() -> Molecule {
    Molecule {
        atom_types: vec![1, 0, 0, 0, 0],
        bonds: vec![(0, 1), (0, 2), (0, 3), (0, 4)],
        charges: vec![-0.4, 0.1, 0.1, 0.1, 0.1],
    }
}

fn synthetic_dataset() -> Vec<Molecule> {
    let mut molecules = Vec::new();
    for _ in 0..8 {
        molecules.push(water_like());
        molecules.push(methane_like());
    }
    molecules
}

#[test]
fn test_end_to_end_batched_scenario() {
    // Two molecules: A with 2 atoms (e = [0.5, 0.5], s = [1, 1], Q = 1) and
    // B with 3 atoms (e = 0, s = 1, Q = 0). Expected charges follow directly
    // from the closed form.
    let molecule_a = Molecule {
        atom_types: vec![0, 0],
        bonds: vec![(0, 1)],
        charges: vec![0.7, 0.3],
    };
    let molecule_b = Molecule {
        atom_types: vec![1, 1, 1],
        bonds: vec![(0, 1), (1, 2)],
        charges: vec![0.2, -0.1, -0.1],
    };
    let batch = GraphBatch::pack(&[molecule_a, molecule_b], 8).unwrap();
    batch.validate().unwrap();

    let totals = total_per_molecule(&batch.ref_charges, &batch.atom_in_mol).unwrap();
    common::assert_all_close(&totals, &[1.0, 0.0], 1e-12);

    let trimmed = batch.atom_in_mol.trim();
    let e = [0.5, 0.5, 0.0, 0.0, 0.0];
    let s = [1.0, 1.0, 1.0, 1.0, 1.0];
    let q = equilibrate_batch(&e, &s, &totals, &trimmed).unwrap();

    common::assert_all_close(&q, &[0.5, 0.5, 0.0, 0.0, 0.0], 1e-12);
}

#[test]
fn test_training_reduces_loss() {
    let config = tiny_hyperparameters();
    let batches = batch_molecules(&synthetic_dataset(), config.training.batch_atoms).unwrap();

    let mut trainer = Trainer::new(&config);
    let mut losses = Vec::new();
    for _ in 0..config.training.epochs {
        let loss = trainer.train_epoch(&batches).unwrap();
        assert!(loss.is_finite(), "loss must stay finite");
        losses.push(loss);
    }

    let first = losses[0];
    let last = *losses.last().unwrap();
    assert!(
        last < first,
        "training should reduce the loss: first {:.6e}, last {:.6e}",
        first,
        last
    );
}

#[test]
fn test_training_is_deterministic() {
    let config = tiny_hyperparameters();
    let batches = batch_molecules(&synthetic_dataset(), config.training.batch_atoms).unwrap();

    let mut first = Trainer::new(&config);
    let mut second = Trainer::new(&config);
    for _ in 0..3 {
        let loss_a = first.train_epoch(&batches).unwrap();
        let loss_b = second.train_epoch(&batches).unwrap();
        assert_eq!(loss_a, loss_b, "same seed must give the same trajectory");
    }
}

#[test]
fn test_evaluation_report_is_consistent() {
    let config = tiny_hyperparameters();
    let dataset = synthetic_dataset();
    let batches = batch_molecules(&dataset, config.training.batch_atoms).unwrap();

    let mut trainer = Trainer::new(&config);
    for _ in 0..5 {
        trainer.train_epoch(&batches).unwrap();
    }

    let report = trainer.evaluate(&batches).unwrap();
    let total_atoms: usize = dataset.iter().map(Molecule::atom_count).sum();

    assert_eq!(report.y_true.len(), total_atoms);
    assert_eq!(report.y_pred.len(), total_atoms);
    assert!(report.mse.is_finite());
    assert!(report.r_squared <= 1.0 + 1e-12);
    assert_eq!(
        report.parameter_count,
        trainer.network().parameter_count()
    );

    // Conservation survives the whole pipeline: within each evaluation batch
    // the predicted charges sum to the reference total.
    let predicted_sum: f64 = report.y_pred.iter().sum();
    let reference_sum: f64 = report.y_true.iter().sum();
    assert!(
        (predicted_sum - reference_sum).abs() < 1e-8,
        "predicted {} vs reference {}",
        predicted_sum,
        reference_sum
    );
}

#[test]
fn test_parameter_count_formula() {
    let config = tiny_hyperparameters();
    let trainer = Trainer::new(&config);

    let v = 4;
    let d = 8;
    let u = 12;
    let h = 12;
    let expected = (v * d + d)              // embedding
        + (2 * d * u + u) + (u * d + d)     // shared update
        + 2 * ((d * h + h) + (h + 1));      // two readout heads
    assert_eq!(trainer.network().parameter_count(), expected);
}
