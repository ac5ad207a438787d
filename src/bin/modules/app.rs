use super::cli::Cli;
use super::error::CliError;
use super::io::{self, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use qeqnet::{Hyperparameters, Molecule, Trainer, batch_molecules, get_default_hyperparameters};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub fn run(args: Cli) -> Result<(), CliError> {
    let mut config = if let Some(config_path) = &args.training.config {
        Hyperparameters::load_from_file(config_path)?
    } else {
        get_default_hyperparameters().clone()
    };
    if let Some(epochs) = args.training.epochs {
        config.training.epochs = epochs;
    }
    if let Some(seed) = args.training.seed {
        config.training.seed = seed;
    }
    if let Some(learning_rate) = args.training.learning_rate {
        config.training.learning_rate = learning_rate;
    }

    let molecules = io::read_dataset(&args.input)?;
    let source_name = if args.input == "-" {
        "stdin".to_string()
    } else {
        args.input.clone()
    };
    if molecules.is_empty() {
        return Err(CliError::DatasetParse {
            source_name,
            details: "dataset contains no molecules".to_string(),
        });
    }

    let (train_molecules, test_molecules) = split_dataset(molecules, &config);
    log::info!(
        "loaded {} molecules: {} train, {} test",
        train_molecules.len() + test_molecules.len(),
        train_molecules.len(),
        test_molecules.len()
    );

    let train_batches = batch_molecules(&train_molecules, config.training.batch_atoms)?;
    let test_batches = if test_molecules.is_empty() {
        log::warn!("dataset too small for a held-out split; evaluating on the training set");
        train_batches.clone()
    } else {
        batch_molecules(&test_molecules, config.training.batch_atoms)?
    };

    let mut trainer = Trainer::new(&config);

    let pb = ProgressBar::new(config.training.epochs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] epoch {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    let mut losses = Vec::with_capacity(config.training.epochs);
    for epoch in 0..config.training.epochs {
        let loss = trainer.train_epoch(&train_batches)?;
        log::info!("epoch {} mean loss {:.6e}", epoch, loss);
        pb.set_message(format!("loss {:.3e}", loss));
        pb.inc(1);
        losses.push(loss);
    }
    pb.finish_and_clear();

    let report = trainer.evaluate(&test_batches)?;

    let summary = RunSummary {
        source_name: &source_name,
        molecule_count: train_molecules.len() + test_molecules.len(),
        train_molecules: train_molecules.len(),
        test_molecules: test_molecules.len(),
        epochs: config.training.epochs,
        losses: &losses,
        report: &report,
    };

    let writer = io::get_writer(&args.output.output)?;
    io::write_results(writer, &summary, &args.output.format, args.output.precision)?;

    Ok(())
}

/// Seeded shuffle followed by a held-out split.
///
/// The test fraction is taken from the front of the shuffled order.
fn split_dataset(
    mut molecules: Vec<Molecule>,
    config: &Hyperparameters,
) -> (Vec<Molecule>, Vec<Molecule>) {
    let mut rng = StdRng::seed_from_u64(config.training.seed);
    molecules.shuffle(&mut rng);

    let mut test_count =
        (config.training.test_fraction * molecules.len() as f64).floor() as usize;
    // Never hold out the whole dataset.
    if test_count >= molecules.len() {
        test_count = molecules.len() - 1;
    }

    let train = molecules.split_off(test_count);
    (train, molecules)
}
