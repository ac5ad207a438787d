use super::cli::OutputFormat;
use super::error::CliError;
use prettytable::*;
use qeqnet::{EvaluationReport, Molecule};
use serde::Deserialize;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// One molecule as it appears in the JSON dataset.
#[derive(Deserialize)]
struct MoleculeRecord {
    atoms: Vec<ElementKey>,
    #[serde(default)]
    bonds: Vec<(usize, usize)>,
    charges: Vec<f64>,
}

/// Dataset element keys may be symbols ("C") or atomic numbers (6).
#[derive(Deserialize)]
#[serde(untagged)]
enum ElementKey {
    Number(u8),
    Symbol(String),
}

/// Summary data threaded from the training run into the writers.
pub struct RunSummary<'a> {
    pub source_name: &'a str,
    pub molecule_count: usize,
    pub train_molecules: usize,
    pub test_molecules: usize,
    pub epochs: usize,
    pub losses: &'a [f64],
    pub report: &'a EvaluationReport,
}

pub fn read_dataset(input_spec: &str) -> Result<Vec<Molecule>, CliError> {
    let reader: Box<dyn BufRead> = if input_spec == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(input_spec).map_err(|e| CliError::Io {
            path: PathBuf::from(input_spec),
            source: e,
        })?;
        Box::new(BufReader::new(file))
    };

    let records: Vec<MoleculeRecord> =
        serde_json::from_reader(reader).map_err(|e| CliError::DatasetParse {
            source_name: input_spec.to_string(),
            details: e.to_string(),
        })?;

    let mut molecules = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if record.charges.len() != record.atoms.len() {
            return Err(CliError::DatasetParse {
                source_name: input_spec.to_string(),
                details: format!(
                    "Molecule {}: {} atoms but {} charges",
                    index,
                    record.atoms.len(),
                    record.charges.len()
                ),
            });
        }

        let mut atom_types = Vec::with_capacity(record.atoms.len());
        for key in &record.atoms {
            let atomic_number = match key {
                ElementKey::Number(z) => *z,
                ElementKey::Symbol(symbol) => symbol_to_atomic_number(symbol).ok_or_else(|| {
                    CliError::DatasetParse {
                        source_name: input_spec.to_string(),
                        details: format!("Molecule {}: unknown element '{}'", index, symbol),
                    }
                })?,
            };
            let species = species_index(atomic_number).ok_or_else(|| CliError::DatasetParse {
                source_name: input_spec.to_string(),
                details: format!(
                    "Molecule {}: element {} is outside the supported set (H, C, N, O, F, P, S, Cl)",
                    index, atomic_number
                ),
            })?;
            atom_types.push(species);
        }

        for &(u, v) in &record.bonds {
            if u >= atom_types.len() || v >= atom_types.len() {
                return Err(CliError::DatasetParse {
                    source_name: input_spec.to_string(),
                    details: format!("Molecule {}: bond ({}, {}) out of range", index, u, v),
                });
            }
        }

        molecules.push(Molecule {
            atom_types,
            bonds: record.bonds,
            charges: record.charges,
        });
    }

    Ok(molecules)
}

/// Maps an atomic number onto the species vocabulary of the default network.
fn species_index(atomic_number: u8) -> Option<usize> {
    match atomic_number {
        1 => Some(0),   // H
        6 => Some(1),   // C
        7 => Some(2),   // N
        8 => Some(3),   // O
        9 => Some(4),   // F
        15 => Some(5),  // P
        16 => Some(6),  // S
        17 => Some(7),  // Cl
        _ => None,
    }
}

fn symbol_to_atomic_number(symbol: &str) -> Option<u8> {
    match symbol.to_uppercase().as_str() {
        "H" => Some(1),
        "C" => Some(6),
        "N" => Some(7),
        "O" => Some(8),
        "F" => Some(9),
        "P" => Some(15),
        "S" => Some(16),
        "CL" => Some(17),
        _ => None,
    }
}

pub fn get_writer(output_path: &Option<PathBuf>) -> Result<Box<dyn Write>, CliError> {
    match output_path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| CliError::Io {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

pub fn write_results(
    mut writer: Box<dyn Write>,
    summary: &RunSummary,
    format: &OutputFormat,
    precision: usize,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Pretty => write_pretty_tables(&mut writer, summary, precision),
        OutputFormat::Csv => write_csv(&mut writer, summary, precision),
        OutputFormat::Json => write_json(&mut writer, summary, precision),
    }
}

fn write_pretty_tables(
    writer: &mut dyn Write,
    summary: &RunSummary,
    precision: usize,
) -> Result<(), CliError> {
    let box_format = format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '╭', '╮'),
        )
        .separators(
            &[format::LinePosition::Title],
            format::LineSeparator::new('═', '╪', '╞', '╡'),
        )
        .separators(
            &[format::LinePosition::Intern],
            format::LineSeparator::new('─', '┼', '├', '┤'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build();

    let no_intern_format = format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '╭', '╮'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build();

    let report = summary.report;
    let final_loss = summary.losses.last().copied().unwrap_or(f64::NAN);

    let mut title_table = Table::new();
    title_table.set_format(box_format);
    title_table.add_row(row![bc->"Qeqnet Partial-Charge Training Results"]);
    title_table.print(writer)?;
    writeln!(writer)?;

    let mut summary_table = Table::new();
    summary_table.set_format(no_intern_format);
    summary_table.add_row(row![b->"Source File:", summary.source_name]);
    summary_table.add_row(row![b->"Molecules:", format!(
        "{} ({} train / {} test)",
        summary.molecule_count, summary.train_molecules, summary.test_molecules
    )]);
    summary_table.add_row(row![b->"Epochs:", summary.epochs]);
    summary_table.add_row(row![b->"Final Train Loss:", format!("{:.prec$e}", final_loss, prec = precision)]);
    summary_table.add_row(row![b->"Test MSE:", format!("{:.prec$e}", report.mse, prec = precision)]);
    summary_table.add_row(row![b->"Test R²:", format!("{:.prec$}", report.r_squared, prec = precision)]);
    summary_table.add_row(row![b->"Parameters:", report.parameter_count]);
    summary_table.print(writer)?;
    writeln!(writer)?;

    let mut data_table = Table::new();
    data_table.set_format(box_format);
    data_table.set_titles(
        row![bc->"Atom", bc->"Reference (e)", bc->"Predicted (e)", bc->"Abs Error (e)"],
    );
    for (i, (&reference, &predicted)) in report.y_true.iter().zip(&report.y_pred).enumerate() {
        data_table.add_row(row![
            r->i,
            r->format!("{:.prec$}", reference, prec = precision),
            r->format!("{:.prec$}", predicted, prec = precision),
            r->format!("{:.prec$}", (reference - predicted).abs(), prec = precision)
        ]);
    }
    data_table.print(writer)?;

    Ok(())
}

fn write_csv(
    writer: &mut dyn Write,
    summary: &RunSummary,
    precision: usize,
) -> Result<(), CliError> {
    let report = summary.report;
    writeln!(writer, "index,reference,predicted")?;
    for (i, (&reference, &predicted)) in report.y_true.iter().zip(&report.y_pred).enumerate() {
        writeln!(
            writer,
            "{},{:.*},{:.*}",
            i, precision, reference, precision, predicted
        )?;
    }
    Ok(())
}

fn write_json(
    writer: &mut dyn Write,
    summary: &RunSummary,
    precision: usize,
) -> Result<(), CliError> {
    let report = summary.report;
    writeln!(writer, "{{")?;
    writeln!(writer, "  \"source\": \"{}\",", summary.source_name)?;
    writeln!(writer, "  \"molecules\": {},", summary.molecule_count)?;
    writeln!(writer, "  \"epochs\": {},", summary.epochs)?;
    writeln!(writer, "  \"parameters\": {},", report.parameter_count)?;
    writeln!(writer, "  \"mse\": {:.*},", precision, report.mse)?;
    writeln!(writer, "  \"r_squared\": {:.*},", precision, report.r_squared)?;

    writeln!(writer, "  \"y_true\": [")?;
    for (i, &value) in report.y_true.iter().enumerate() {
        let comma = if i < report.y_true.len() - 1 { "," } else { "" };
        writeln!(writer, "    {:.*}{}", precision, value, comma)?;
    }
    writeln!(writer, "  ],")?;

    writeln!(writer, "  \"y_pred\": [")?;
    for (i, &value) in report.y_pred.iter().enumerate() {
        let comma = if i < report.y_pred.len() - 1 { "," } else { "" };
        writeln!(writer, "    {:.*}{}", precision, value, comma)?;
    }
    writeln!(writer, "  ]")?;
    writeln!(writer, "}}")?;
    Ok(())
}
