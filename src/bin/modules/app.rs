use super::cli::{Cli, CountingKind};
use super::error::CliError;
use super::io;
use super::logging;
use eeq::{CountingFunction, EeqModel, Parameters, Request, SolverOptions};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

pub fn run(args: Cli) -> Result<(), CliError> {
    logging::setup_logging(
        args.runtime.verbose,
        args.runtime.quiet,
        args.runtime.log_file.as_deref(),
    )?;

    if let Some(num_threads) = args.runtime.threads {
        info!("Setting Rayon global thread pool to {} threads.", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()?;
    }

    let params = Parameters::load_from_file(&args.calculation.params)?;
    debug!(species = params.elements.len(), "loaded species parameters");

    let counting = match (args.model.counting, args.model.steepness) {
        (CountingKind::Erf, None) => CountingFunction::erf(),
        (CountingKind::Erf, Some(steepness)) => CountingFunction::Erf { steepness },
        (CountingKind::Exp, None) => CountingFunction::exp(),
        (CountingKind::Exp, Some(steepness)) => CountingFunction::Exp { steepness },
    };
    let options = SolverOptions {
        counting,
        cutoff: args.model.cn_cutoff,
        cn_max: args.model.cn_max,
        ewald_alpha: args.model.ewald_alpha,
    };
    let model = EeqModel::with_options(&params, options);

    let input = io::read_xyz(&args.input)?;
    let structure = input.to_structure(args.calculation.total_charge);
    info!(
        atoms = structure.len(),
        periodic = structure.is_periodic(),
        "read input structure"
    );

    let source_name = if args.input == "-" {
        "stdin".to_string()
    } else {
        args.input.clone()
    };

    let request = Request {
        energy: args.calculation.energy || args.calculation.gradient,
        gradient: args.calculation.gradient,
        response: false,
    };

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Calculating partial charges...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = model.evaluate(&structure, &request);

    pb.finish_and_clear();
    let result = result?;

    let writer = io::get_writer(&args.output.output)?;
    io::write_results(
        writer,
        &input,
        &result,
        args.output.format,
        args.output.precision,
        &source_name,
    )?;

    Ok(())
}
