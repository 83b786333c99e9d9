use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use crate::config::Settings;
use crate::models::{Problem, Solution};
use crate::optimizer::{Optimizer, SearchConfig};
use crate::optimizer::placement::grid_placements;
use crate::scoring::{evaluate, ScoreMode};
use crate::submit::{Server, Submitter};

mod config;
mod error;
mod geometry;
mod loader;
mod logging;
mod models;
mod optimizer;
mod scoring;
mod submit;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// More output per occurrence
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Silence logs and progress
  #[arg(short, long, global = true)]
  quiet: bool,

  #[command(flatten)]
  settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
  /// Runs the random + local search optimizer on the given problems (all when none given)
  Optimize {
    ids: Vec<u32>,
    /// Name results and submissions are filed under
    #[arg(long, default_value = "brute")]
    target: String,
    #[arg(long, default_value_t = 30.0)]
    random_secs: f64,
    #[arg(long, default_value_t = 150.0)]
    optimize_secs: f64,
    #[arg(long, default_value_t = 60.0)]
    report_secs: f64,
    /// Largest offset of a jitter move along each axis
    #[arg(long, default_value_t = 5.0)]
    jitter: f64,
    #[arg(long, value_enum, default_value_t = ScoreMode::Auto)]
    mode: ScoreMode,
    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
  },
  /// Submits the row-by-row grid placement for the given problems
  Starter {
    ids: Vec<u32>,
  },
  /// Checks and scores a solution file
  Score {
    id: u32,
    solution: PathBuf,
    #[arg(long, value_enum, default_value_t = ScoreMode::Auto)]
    mode: ScoreMode,
    /// Replace the file's volumes with the optimal ones before scoring
    #[arg(long)]
    optimize_volumes: bool,
  },
}

fn main() -> Result<(), anyhow::Error> {
  dotenvy::dotenv().ok();
  let cli: Cli = Cli::parse();
  logging::setup_logging(cli.verbose, cli.quiet);

  let problems_dir = cli.settings.problems_dir()?;

  match &cli.command {
    Commands::Optimize { ids, target, random_secs, optimize_secs, report_secs, jitter, mode, seed } => {
      let config = SearchConfig {
        random_time: Duration::try_from_secs_f64(*random_secs)?,
        optimize_time: Duration::try_from_secs_f64(*optimize_secs)?,
        report_interval: Duration::try_from_secs_f64(*report_secs)?,
        jitter: *jitter,
        mode: *mode,
      };
      let problems = loader::load_problems(&problems_dir, ids)?;
      let server = server(&cli.settings)?;
      let submitter = Submitter::spawn(target.as_str(), cli.settings.results_dir()?, server.clone());

      for problem in problems {
        let seed_solution = server.as_ref().and_then(|server| best_global_solution(server, problem.clone()));
        let rng = match seed {
          Some(seed) => StdRng::seed_from_u64(*seed ^ u64::from(problem.id)),
          None => StdRng::from_entropy(),
        };

        let mut optimizer = Optimizer::new(problem.clone(), config.clone(), rng, &submitter)
          .with_progress(progress(cli.quiet));
        let outcome = optimizer.run(seed_solution);

        info!(
          problem = problem.id,
          score = outcome.score,
          random_iterations = outcome.random_iterations,
          optimize_iterations = outcome.optimize_iterations,
          muted = outcome.best.volumes.iter().filter(|&&v| v == 0.0).count(),
          "Finished"
        );
      }

      submitter.finish();
    }
    Commands::Starter { ids } => {
      let problems = loader::load_problems(&problems_dir, ids)?;
      let submitter = Submitter::spawn("starter", cli.settings.results_dir()?, server(&cli.settings)?);

      for problem in problems {
        let solution = Solution::new(problem.clone(), grid_placements(&problem));
        if !solution.is_valid() {
          warn!(problem = problem.id, "Grid placement does not fit on the stage");
          continue;
        }
        submitter.submit(&solution);
      }

      submitter.finish();
    }
    Commands::Score { id, solution, mode, optimize_volumes } => {
      let problem = Arc::new(loader::load_problem(&problems_dir.join(format!("{}.json", id)))?);
      let solution = loader::load_solution(problem, solution)?;

      if !solution.is_valid() {
        println!("Problem {}: invalid solution", id);
        return Ok(());
      }

      let evaluation = evaluate(&solution, *mode, *optimize_volumes);
      println!("Problem {}: score {} ({:?})", id, evaluation.score, mode.resolve(*id));
      if let Some(volumes) = evaluation.volumes {
        println!("Optimal volumes: {:?}", volumes);
      }
    }
  }

  Ok(())
}

fn server(settings: &Settings) -> anyhow::Result<Option<Server>> {
  settings.server()
    .map(|server| Server::new(server, settings.source_archive.as_deref()))
    .transpose()
    .map_err(Into::into)
}

fn best_global_solution(server: &Server, problem: Arc<Problem>) -> Option<Solution> {
  info!(problem = problem.id, "Retrieving best global solution");
  match server.best_solution(problem.clone()) {
    Ok(Some(solution)) => Some(solution),
    Ok(None) => {
      info!(problem = problem.id, "No best global solution found");
      None
    }
    Err(e) => {
      warn!(problem = problem.id, "Failed to retrieve best global solution: {}", e);
      None
    }
  }
}

fn progress(quiet: bool) -> ProgressBar {
  if quiet {
    return ProgressBar::hidden();
  }

  let bar = ProgressBar::new_spinner();
  if let Ok(style) = ProgressStyle::with_template("{spinner} {prefix} {pos} iterations {msg} [{elapsed}]") {
    bar.set_style(style);
  }
  bar.enable_steady_tick(Duration::from_millis(200));
  bar
}
