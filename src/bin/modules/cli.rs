use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

const ABOUT: &str =
    "A command-line tool for training a graph network to predict per-atom partial charges with a charge-equilibration readout.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser)]
#[command(
    version,
    about = ABOUT,
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input dataset in JSON format.
    ///
    /// Use '-' to read from standard input. The file holds an array of
    /// molecules, each with an "atoms" list (element symbols or atomic
    /// numbers), a "bonds" list of atom-index pairs, and a "charges" list of
    /// reference partial charges aligned with the atoms.
    #[arg(value_name = "INPUT")]
    pub input: String,

    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub training: TrainingOptions,
}

/// Options for controlling the output format and destination.
#[derive(Args)]
#[command(next_help_heading = "Output Options")]
pub struct OutputOptions {
    /// Output file path.
    ///
    /// If not specified, results are written to standard output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for the results.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Number of decimal places to display for floating-point values.
    #[arg(short, long, default_value_t = 6)]
    pub precision: usize,
}

/// Options for controlling the training run.
#[derive(Args)]
#[command(next_help_heading = "Training Options")]
pub struct TrainingOptions {
    /// Custom hyperparameters file in TOML format.
    ///
    /// If not specified, built-in default hyperparameters are used.
    #[arg(short = 'P', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the number of training epochs.
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Override the shuffle and initialization seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the Adam learning rate.
    #[arg(long)]
    pub learning_rate: Option<f64>,
}

/// Output format for the run results.
#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed tables with the run summary and per-atom predictions.
    Pretty,
    /// Comma-separated values with columns: index, reference, predicted.
    Csv,
    /// JSON object containing the summary and both charge arrays.
    Json,
}
