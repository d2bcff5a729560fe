use super::cli::OutputFormat;
use super::error::CliError;
use eeq::elements::{atomic_number_to_symbol, symbol_to_atomic_number_ignore_case};
use eeq::math::constants::{BOHR_TO_ANGSTROM, HARTREE_TO_EV};
use eeq::{Atom, EeqOutput, Lattice, Structure};
use prettytable::*;
use serde::Serialize;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// A structure as read from an XYZ file: the atoms and lattice in angstroms, plus the comment.
pub struct XyzInput {
    pub atoms: Vec<Atom>,
    pub lattice: Option<Lattice>,
    pub periodic: [bool; 3],
    pub comment: String,
}

impl XyzInput {
    /// Converts to a [`Structure`] in Bohr.
    pub fn to_structure(&self, charge: f64) -> Structure {
        let to_bohr = |v: [f64; 3]| v.map(|x| x / BOHR_TO_ANGSTROM);
        let structure = Structure::molecule(
            self.atoms.iter().map(|a| a.atomic_number).collect(),
            self.atoms.iter().map(|a| to_bohr(a.position)).collect(),
            charge,
        );
        match self.lattice {
            Some(lattice) => structure.with_lattice(lattice.map(to_bohr), self.periodic),
            None => structure,
        }
    }
}

pub fn read_xyz(input_spec: &str) -> Result<XyzInput, CliError> {
    let reader: Box<dyn BufRead> = if input_spec == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(input_spec).map_err(|e| CliError::Io {
            path: PathBuf::from(input_spec),
            source: e,
        })?;
        Box::new(BufReader::new(file))
    };

    let parse_error = |details: String| CliError::XyzParse {
        source_name: input_spec.to_string(),
        details,
    };

    let mut lines = reader.lines();

    let num_atoms_line = lines
        .next()
        .ok_or_else(|| parse_error("Missing number of atoms line".to_string()))??;
    let num_atoms: usize = num_atoms_line
        .trim()
        .parse()
        .map_err(|_| parse_error(format!("Invalid number of atoms: {}", num_atoms_line)))?;

    let comment = lines
        .next()
        .ok_or_else(|| parse_error("Missing comment line".to_string()))??;

    let mut atoms = Vec::with_capacity(num_atoms);
    for (i, line) in lines.enumerate() {
        if i >= num_atoms {
            break;
        }
        let line = line.map_err(|e| parse_error(format!("Error reading line {}: {}", i + 3, e)))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(parse_error(format!(
                "Line {}: expected at least 4 fields, got {}",
                i + 3,
                parts.len()
            )));
        }
        let atomic_number = parse_element(parts[0])
            .ok_or_else(|| parse_error(format!("Unknown element: {}", parts[0])))?;
        let mut position = [0.0; 3];
        for (c, axis) in ["x", "y", "z"].iter().enumerate() {
            position[c] = parts[c + 1].parse().map_err(|_| {
                parse_error(format!("Invalid {} coordinate: {}", axis, parts[c + 1]))
            })?;
        }
        atoms.push(Atom {
            atomic_number,
            position,
        });
    }

    if atoms.len() != num_atoms {
        return Err(parse_error(format!(
            "Expected {} atoms, found {}",
            num_atoms,
            atoms.len()
        )));
    }

    let lattice = match extended_xyz_value(&comment, "Lattice") {
        Some(value) => Some(parse_lattice(value).map_err(parse_error)?),
        None => None,
    };
    let periodic = match (lattice, extended_xyz_value(&comment, "pbc")) {
        (None, _) => [false; 3],
        (Some(_), None) => [true; 3],
        (Some(_), Some(value)) => parse_pbc(value).map_err(parse_error)?,
    };

    Ok(XyzInput {
        atoms,
        lattice,
        periodic,
        comment,
    })
}

fn parse_element(token: &str) -> Option<u8> {
    match token.parse::<u8>() {
        Ok(z) if (1..=118).contains(&z) => Some(z),
        Ok(_) => None,
        Err(_) => symbol_to_atomic_number_ignore_case(token),
    }
}

/// Finds `key="value"` (or `key=value`) in an extended-XYZ comment line.
fn extended_xyz_value<'a>(comment: &'a str, key: &str) -> Option<&'a str> {
    let lower = comment.to_ascii_lowercase();
    let needle = format!("{}=", key.to_ascii_lowercase());
    let mut search = 0;
    while let Some(offset) = lower[search..].find(&needle) {
        let start = search + offset;
        let at_boundary = start == 0 || lower.as_bytes()[start - 1].is_ascii_whitespace();
        let rest = &comment[start + needle.len()..];
        if at_boundary {
            return if let Some(quoted) = rest.strip_prefix('"') {
                quoted.find('"').map(|end| &quoted[..end])
            } else {
                Some(rest.split_whitespace().next().unwrap_or(""))
            };
        }
        search = start + needle.len();
    }
    None
}

fn parse_lattice(value: &str) -> Result<Lattice, String> {
    let numbers: Vec<f64> = value
        .split_whitespace()
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("Invalid lattice specification: {}", value))?;
    if numbers.len() != 9 {
        return Err(format!(
            "Lattice needs 9 components, got {}",
            numbers.len()
        ));
    }
    let mut lattice = [[0.0; 3]; 3];
    for (i, row) in lattice.iter_mut().enumerate() {
        row.copy_from_slice(&numbers[3 * i..3 * i + 3]);
    }
    Ok(lattice)
}

fn parse_pbc(value: &str) -> Result<[bool; 3], String> {
    let flags: Vec<bool> = value
        .split_whitespace()
        .map(|s| match s.to_ascii_uppercase().as_str() {
            "T" | "TRUE" | "1" => Ok(true),
            "F" | "FALSE" | "0" => Ok(false),
            _ => Err(format!("Invalid pbc flag: {}", s)),
        })
        .collect::<Result<_, _>>()?;
    flags
        .try_into()
        .map_err(|_| format!("pbc needs 3 flags: {}", value))
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
    input: &XyzInput,
    result: &EeqOutput,
    format: OutputFormat,
    precision: usize,
    source_name: &str,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Pretty => write_pretty_table(&mut writer, input, result, precision, source_name),
        OutputFormat::Xyz => write_xyz_charged(&mut writer, input, result, precision),
        OutputFormat::Csv => write_csv(&mut writer, input, result, precision),
        OutputFormat::Json => write_json(&mut writer, input, result),
    }?;
    writer.flush()?;
    Ok(())
}

fn symbol(atomic_number: u8) -> &'static str {
    atomic_number_to_symbol(atomic_number).unwrap_or("??")
}

fn write_pretty_table(
    writer: &mut dyn Write,
    input: &XyzInput,
    result: &EeqOutput,
    precision: usize,
    source_name: &str,
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
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build();

    let mut title_table = Table::new();
    title_table.set_format(box_format);
    title_table.add_row(row![bc->"EEQ Charge Results"]);
    title_table.print(writer)?;
    writeln!(writer)?;

    let mut summary_table = Table::new();
    summary_table.set_format(box_format);
    summary_table.add_row(row![b->"Source File:", source_name]);
    summary_table.add_row(row![b->"Total Atoms:", input.atoms.len()]);
    summary_table.add_row(row![b->"Periodic:", format!("{:?}", input.periodic)]);
    summary_table.add_row(row![
        b->"Total Charge:",
        format!("{:.prec$} e", result.total_charge(), prec = precision)
    ]);
    if let Some(energy) = result.energy() {
        summary_table.add_row(row![
            b->"Electrostatic Energy:",
            format!(
                "{:.prec$} Eh ({:.prec$} eV)",
                energy,
                energy * HARTREE_TO_EV,
                prec = precision
            )
        ]);
    }
    summary_table.print(writer)?;
    writeln!(writer)?;

    let mut data_table = Table::new();
    data_table.set_format(box_format);
    let mut titles = row![bc->"Index", bc->"Element", bc->"X (Å)", bc->"Y (Å)", bc->"Z (Å)", bc->"Charge (e)"];
    if result.energies.is_some() {
        titles.add_cell(cell!(bc->"Energy (Eh)"));
    }
    data_table.set_titles(titles);

    for (i, (atom, &charge)) in input.atoms.iter().zip(&result.charges).enumerate() {
        let mut row = row![
            r->i,
            l->symbol(atom.atomic_number),
            r->format!("{:.prec$}", atom.position[0], prec = precision),
            r->format!("{:.prec$}", atom.position[1], prec = precision),
            r->format!("{:.prec$}", atom.position[2], prec = precision),
            r->format!("{:.prec$}", charge, prec = precision)
        ];
        if let Some(energies) = &result.energies {
            row.add_cell(cell!(r->format!("{:.prec$}", energies[i], prec = precision)));
        }
        data_table.add_row(row);
    }
    data_table.print(writer)?;

    if let Some(gradient) = &result.gradient {
        writeln!(writer)?;
        let mut gradient_table = Table::new();
        gradient_table.set_format(box_format);
        gradient_table.set_titles(
            row![bc->"Index", bc->"Element", bc->"dE/dX (Eh/a0)", bc->"dE/dY (Eh/a0)", bc->"dE/dZ (Eh/a0)"],
        );
        for (i, (atom, g)) in input.atoms.iter().zip(gradient).enumerate() {
            gradient_table.add_row(row![
                r->i,
                l->symbol(atom.atomic_number),
                r->format!("{:.prec$e}", g[0], prec = precision),
                r->format!("{:.prec$e}", g[1], prec = precision),
                r->format!("{:.prec$e}", g[2], prec = precision)
            ]);
        }
        gradient_table.print(writer)?;
    }

    if let (Some(sigma), true) = (&result.sigma, input.lattice.is_some()) {
        writeln!(writer)?;
        let mut sigma_table = Table::new();
        sigma_table.set_format(box_format);
        sigma_table.set_titles(row![bc->"Strain Derivative (Eh)", bc->"x", bc->"y", bc->"z"]);
        for (label, row_values) in ["x", "y", "z"].iter().zip(sigma) {
            sigma_table.add_row(row![
                b->label,
                r->format!("{:.prec$e}", row_values[0], prec = precision),
                r->format!("{:.prec$e}", row_values[1], prec = precision),
                r->format!("{:.prec$e}", row_values[2], prec = precision)
            ]);
        }
        sigma_table.print(writer)?;
    }

    Ok(())
}

fn write_xyz_charged(
    writer: &mut dyn Write,
    input: &XyzInput,
    result: &EeqOutput,
    precision: usize,
) -> Result<(), CliError> {
    writeln!(writer, "{}", input.atoms.len())?;
    match result.energy() {
        Some(energy) => writeln!(
            writer,
            "{} | EEQ charges | energy: {:.*}",
            input.comment.trim(),
            precision,
            energy
        )?,
        None => writeln!(writer, "{} | EEQ charges", input.comment.trim())?,
    }
    for (atom, &charge) in input.atoms.iter().zip(&result.charges) {
        writeln!(
            writer,
            "{} {:.*} {:.*} {:.*} {:.*}",
            symbol(atom.atomic_number),
            precision,
            atom.position[0],
            precision,
            atom.position[1],
            precision,
            atom.position[2],
            precision,
            charge
        )?;
    }
    Ok(())
}

fn write_csv(
    writer: &mut dyn Write,
    input: &XyzInput,
    result: &EeqOutput,
    precision: usize,
) -> Result<(), CliError> {
    let mut header = String::from("index,element,x,y,z,charge");
    if result.energies.is_some() {
        header.push_str(",energy");
    }
    if result.gradient.is_some() {
        header.push_str(",grad_x,grad_y,grad_z");
    }
    writeln!(writer, "{}", header)?;

    for (i, (atom, &charge)) in input.atoms.iter().zip(&result.charges).enumerate() {
        write!(
            writer,
            "{},{},{:.*},{:.*},{:.*},{:.*}",
            i,
            symbol(atom.atomic_number),
            precision,
            atom.position[0],
            precision,
            atom.position[1],
            precision,
            atom.position[2],
            precision,
            charge
        )?;
        if let Some(energies) = &result.energies {
            write!(writer, ",{:.*}", precision, energies[i])?;
        }
        if let Some(gradient) = &result.gradient {
            let g = gradient[i];
            write!(writer, ",{:.*e},{:.*e},{:.*e}", precision, g[0], precision, g[1], precision, g[2])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonAtom<'a> {
    index: usize,
    element: &'a str,
    position: [f64; 3],
    charge: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gradient: Option<[f64; 3]>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    atoms: Vec<JsonAtom<'a>>,
    total_charge: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    lattice: Option<Lattice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sigma: Option<[[f64; 3]; 3]>,
}

fn write_json(writer: &mut dyn Write, input: &XyzInput, result: &EeqOutput) -> Result<(), CliError> {
    let atoms = input
        .atoms
        .iter()
        .zip(&result.charges)
        .enumerate()
        .map(|(i, (atom, &charge))| JsonAtom {
            index: i,
            element: symbol(atom.atomic_number),
            position: atom.position,
            charge,
            energy: result.energies.as_ref().map(|e| e[i]),
            gradient: result.gradient.as_ref().map(|g| g[i]),
        })
        .collect();

    let report = JsonReport {
        atoms,
        total_charge: result.total_charge(),
        lattice: input.lattice,
        energy: result.energy(),
        sigma: result.sigma,
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
