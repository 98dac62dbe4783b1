use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gridflow::{
    load_network, run, save_report, write_report, Alg, CalculationOptions, DenseLU,
    LinearSolver, SparseLU, Step,
};
use std::path::PathBuf;

/// Steady-state power flow.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Power Flow
    #[clap(name = "pf")]
    PowerFlow(PfArgs),
}

#[derive(Args)]
struct PfArgs {
    /// The input file (JSON network)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file. Results go to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// AC power flow algorithm.
    #[arg(long, value_enum, default_value_t = Alg::NR)]
    pub alg: Alg,

    /// Termination tolerance.
    #[arg(long)]
    pub tol: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long)]
    pub max_it: Option<usize>,

    /// Gauss-Seidel iterations to run before the selected algorithm.
    #[arg(long, default_value_t = 0)]
    pub gs_iterations: usize,

    /// Check final voltages against a band of this many percent around
    /// nominal.
    #[arg(long)]
    pub vlim: Option<f64>,

    /// Factor the Newton step with the sparse LU solver.
    #[arg(long, default_value_t = false)]
    pub sparse: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let Commands::PowerFlow(args) = &cli.command;

    let grid = load_network(&args.input)?.into_grid()?;

    let mut builder = CalculationOptions::builder();
    if let Some(tol) = args.tol {
        builder.accuracy(tol);
    }
    if let Some(max_it) = args.max_it {
        builder.iterations_count(max_it);
    }
    if let Some(vlim) = args.vlim {
        builder
            .use_voltage_constraint(true)
            .voltage_constraint_percentage(vlim);
    }
    let options = builder.build()?;

    let mut steps = Vec::new();
    if args.gs_iterations > 0 {
        let warm = CalculationOptions {
            iterations_count: args.gs_iterations,
            use_voltage_constraint: false,
            ..options.clone()
        };
        steps.push(Step::new(Alg::GS, warm));
    }
    steps.push(Step::new(args.alg, options));

    let solver: Box<dyn LinearSolver> = if args.sparse {
        Box::<SparseLU>::default()
    } else {
        Box::new(DenseLU)
    };

    let solution = run(grid, &steps, solver.as_ref())?;

    match &args.output {
        Some(out_path) => save_report(out_path, &solution)?,
        None => write_report(std::io::stdout().lock(), &solution)?,
    }

    if !solution.success() {
        return Err(anyhow::anyhow!("power flow did not succeed"));
    }
    Ok(())
}
