use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use scfaflux_core::configuration::{Configuration, Solver};
use scfaflux_core::pipeline::{ConditionSummary, Pipeline};
use scfaflux_core::project::CONFIG_FILE;

#[derive(Parser)]
#[command(name = "scfaflux")]
#[command(about = "Host flux balance analysis under short-chain fatty acid dosing", long_about = None)]
struct Cli {
    /// Project root holding data/, results/ and outputs/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Configuration file, defaults to data/inputs/project_config.yml under the root
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Linear programming solver
    #[arg(long, global = true, value_enum, default_value_t = SolverArg::Clarabel)]
    solver: SolverArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the dose table and write its canonical copy
    PrepareInputs,
    /// Simulate every dose condition against the host model
    RunSimulation {
        /// Parse the model file even when a fresh cache exists
        #[arg(long)]
        no_cache: bool,
    },
    /// Render the figures from the merged results table
    Figures,
    /// Write the publication tables from the merged results table
    Tables,
    /// Run every stage in order
    RunAll {
        /// Parse the model file even when a fresh cache exists
        #[arg(long)]
        no_cache: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverArg {
    Clarabel,
    Microlp,
}

impl From<SolverArg> for Solver {
    fn from(value: SolverArg) -> Self {
        match value {
            SolverArg::Clarabel => Solver::Clarabel,
            SolverArg::Microlp => Solver::MicroLp,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    Configuration::set_solver(cli.solver.into());

    let config = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE));
    let pipeline = Pipeline::open(cli.root.clone(), config.clone())
        .with_context(|| format!("opening project with configuration {}", config.display()))?;

    match cli.command {
        Commands::PrepareInputs => {
            let doses = pipeline.prepare_inputs()?;
            println!(
                "Validated {} conditions, wrote {}",
                doses.len(),
                pipeline.paths.canonical_inputs().display()
            );
        }
        Commands::RunSimulation { no_cache } => {
            let summary = pipeline.with_cache(!no_cache).run_simulation()?;
            print_summary(&summary);
        }
        Commands::Figures => {
            for path in pipeline.make_figures()? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Tables => {
            for path in pipeline.make_tables()? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::RunAll { no_cache } => {
            let summary = pipeline.with_cache(!no_cache).run_all()?;
            print_summary(&summary);
        }
    }

    Ok(())
}

fn print_summary(summary: &[ConditionSummary]) {
    println!("{:<12} {:>14} {:>12}", "condition", "objective", "change (%)");
    for row in summary {
        println!(
            "{:<12} {:>14} {:>12}",
            row.condition,
            format_value(row.objective_value),
            format_value(row.objective_pct_change)
        );
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "infeasible".to_string(),
    }
}
