use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;

use cruise_mpc::{report, CruiseConfig, Mode, ReportRenderer, ResultExtractor, SolveStatus};

/// Cruise-control MPC: solve the horizon, log the trajectories and plot them.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration; omitted fields keep the default scenario.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Single full-horizon solve or receding-horizon closed loop.
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Directory for the CSV log, the plot and the result artifact.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Closed-loop steps in receding mode.
    #[arg(long)]
    steps: Option<usize>,

    /// Skip rendering the plot.
    #[arg(long)]
    no_plot: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("logger init failed: {e}");
    }

    match run(&cli) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SolveStatus> {
    let mut config = match &cli.config {
        Some(path) => CruiseConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CruiseConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(steps) = cli.steps {
        config.closed_loop.steps = steps;
    }
    if let Some(dir) = &cli.out {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let output = &mut config.output;
        output.artifact_dir.get_or_insert_with(|| dir.clone());
        output.csv.get_or_insert_with(|| dir.join("cruise_control.csv"));
        output.plot.get_or_insert_with(|| dir.join("cruise_control.svg"));
    }
    if cli.no_plot {
        config.output.plot = None;
    }

    let mut problem = config.build_problem()?;

    match config.mode {
        Mode::Full => {
            println!("Solving MPC problem...");
            let status = problem.solve();
            if !status.is_success() {
                println!("MPC failed to solve. Status: {status}");
                return Ok(status);
            }
            println!("Solution complete.");

            let result = ResultExtractor::for_problem(&problem).extract(&problem);
            if result.degraded {
                warn!("Reference trajectory is a flat set point approximation");
            }
            if let (Some(v), Some(p)) = (result.state.last(), result.control.last()) {
                println!("t = {:.2}: velocity = {v:.3}, pedal = {p:.3}", problem.grid().tf());
            }

            if let Some(path) = &config.output.csv {
                report::write_csv(&result, path)?;
                info!("trajectories written to {}", path.display());
            }
            if let Some(path) = &config.output.plot {
                if let Err(e) = ReportRenderer::default().render(&result, path) {
                    warn!("could not render plot: {e:#}");
                }
            }
            Ok(status)
        }
        Mode::Receding => {
            println!(
                "Running receding-horizon loop for {} steps...",
                config.closed_loop.steps
            );
            let trace = config.closed_loop().run(&mut problem)?;
            if !trace.status.is_success() {
                println!("MPC failed to solve. Status: {}", trace.status);
                return Ok(trace.status);
            }
            if let (Some(t), Some(v), Some(p)) =
                (trace.time.last(), trace.state.last(), trace.control.last())
            {
                println!("t = {t:.2}: velocity = {v:.3}, pedal = {p:.3}");
            }

            if let Some(path) = &config.output.csv {
                report::write_trace_csv(&trace, path)?;
                info!("closed-loop trace written to {}", path.display());
            }
            if let Some(path) = &config.output.plot {
                let renderer =
                    ReportRenderer::new("Receding-Horizon MPC - Cruise Control (closed loop)");
                if let Err(e) = renderer.render_trace(&trace, path) {
                    warn!("could not render plot: {e:#}");
                }
            }
            Ok(trace.status)
        }
    }
}
