use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

const AUTHORS: &str = "Tony Kan, Ted Yu";
const ABOUT: &str = "A command-line tool for calculating electronegativity-equilibration (EEQ) partial charges of molecules and periodic solids.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(author = AUTHORS, version, about = ABOUT, help_template = HELP_TEMPLATE)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input file containing the structure in XYZ format, coordinates in angstroms.
    ///
    /// Use '-' to read from standard input. An extended-XYZ comment line carrying
    /// `Lattice="ax ay az bx by bz cx cy cz"` makes the structure periodic; `pbc="T T F"` restricts
    /// the periodic directions.
    #[arg(value_name = "INPUT")]
    pub input: String,

    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub calculation: CalculationOptions,

    #[command(flatten)]
    pub model: ModelOptions,

    #[command(flatten)]
    pub runtime: RuntimeOptions,
}

/// Options for controlling the output format and destination.
#[derive(Args, Debug)]
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

/// Options for controlling what is calculated.
#[derive(Args, Debug)]
#[command(next_help_heading = "Calculation Options")]
pub struct CalculationOptions {
    /// Species parameters file in TOML format.
    #[arg(short = 'P', long, value_name = "FILE")]
    pub params: PathBuf,

    /// Total charge of the system.
    #[arg(short = 'q', long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub total_charge: f64,

    /// Also report per-atom electrostatic energies.
    #[arg(long)]
    pub energy: bool,

    /// Also report the energy gradient and, for periodic structures, the strain derivative.
    #[arg(long)]
    pub gradient: bool,
}

/// Options for the coordination number and the Ewald sum.
#[derive(Args, Debug)]
#[command(next_help_heading = "Model Options")]
pub struct ModelOptions {
    /// Neighbor counting function of the coordination number.
    #[arg(long, value_enum, default_value_t = CountingKind::Erf)]
    pub counting: CountingKind,

    /// Steepness of the counting function. Defaults to 7.5 for erf and 16 for exp.
    #[arg(long)]
    pub steepness: Option<f64>,

    /// Real-space cutoff of the coordination number in Bohr.
    #[arg(long, default_value_t = eeq::ncoord::DEFAULT_CUTOFF)]
    pub cn_cutoff: f64,

    /// Smooth upper bound on the coordination numbers.
    #[arg(long)]
    pub cn_max: Option<f64>,

    /// Ewald splitting parameter in inverse Bohr. Chosen per structure when omitted.
    #[arg(long)]
    pub ewald_alpha: Option<f64>,
}

/// Options for logging and parallelism.
#[derive(Args, Debug)]
#[command(next_help_heading = "Runtime Options")]
pub struct RuntimeOptions {
    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output.
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of threads for parallel computation. Defaults to the number of logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,
}

/// Output format for the calculation results.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed tables with positions, charges and requested properties.
    Pretty,
    /// XYZ format with charges appended to each atom line.
    Xyz,
    /// Comma-separated values, one row per atom.
    Csv,
    /// JSON object with atoms and system totals.
    Json,
}

/// Neighbor counting function selectable on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CountingKind {
    /// Error-function counting.
    Erf,
    /// Fermi-type exponential counting.
    Exp,
}
