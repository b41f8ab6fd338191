//! Command-line front end: optimizes one design and reports the outcome.

mod monitor;
mod report;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use topoptx::{DesignSpec, JobError, JobRegistry, RegistryConfig};
use tracing::info;

use monitor::follow;
use report::render_report;

#[derive(Parser)]
#[command(name = "topoptx")]
#[command(about = "Optimize the material layout of a 2-D structure", long_about = None)]
struct Args {
    /// Design file in JSON
    design: PathBuf,

    /// Registry configuration in JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the solver iteration budget
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Override the convergence tolerance
    #[arg(long)]
    tolerance: Option<f64>,

    /// Delay between polls when no new iteration is available
    #[arg(long, default_value = "50")]
    poll_interval_ms: u64,

    /// Print the final result as JSON instead of a report
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RegistryConfig::from_path(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(max_iterations) = args.max_iterations {
        config.solver.max_iterations = max_iterations;
    }
    if let Some(tolerance) = args.tolerance {
        config.solver.tolerance = tolerance;
    }

    let spec: DesignSpec = serde_json::from_str(&fs::read_to_string(&args.design)?)?;
    let registry = JobRegistry::new(config);

    let id = match registry.start(spec.clone()) {
        Ok(id) => id,
        Err(JobError::Invalid(errors)) => {
            for message in errors.messages() {
                eprintln!("error: {message}");
            }
            return Err(JobError::Invalid(errors).into());
        }
        Err(err) => return Err(err.into()),
    };
    info!(job_id = %id, design = %args.design.display(), "optimizing");

    let result = follow(
        &registry,
        &id,
        Duration::from_millis(args.poll_interval_ms),
        |progress| {
            eprintln!(
                "iteration {:>4}  compliance {:.6}  volume {:.3}",
                progress.iteration, progress.objective, progress.volume
            );
        },
    )?;
    registry.end(&id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result.as_ref())?);
    } else {
        println!("{}", render_report(&spec, &result));
    }

    Ok(())
}
