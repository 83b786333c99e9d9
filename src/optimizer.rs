use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use indicatif::ProgressBar;
use rand::Rng;
use tracing::{debug, info, warn};
use crate::models::{Dimension, Problem, Solution};
use crate::scoring::ScoreMode;

pub mod moves;
pub mod placement;

use moves::Move;
use placement::{grid_placements, random_placements};

/// Receives the best solution found so far. Must not block the search for long.
pub trait Reporter {
  fn report(&self, solution: &Solution, score: i64);
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
  pub random_time: Duration,
  pub optimize_time: Duration,
  pub report_interval: Duration,
  /// Largest per axis offset of a jitter move.
  pub jitter: Dimension,
  pub mode: ScoreMode,
}

impl Default for SearchConfig {
  fn default() -> Self {
    SearchConfig {
      random_time: Duration::from_secs(30),
      optimize_time: Duration::from_secs(150),
      report_interval: Duration::from_secs(60),
      jitter: 5.0,
      mode: ScoreMode::Auto,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Initializing,
  RandomSearch,
  LocalSearch,
  Done,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::Initializing => "initializing",
      Phase::RandomSearch => "random search",
      Phase::LocalSearch => "local search",
      Phase::Done => "done",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
  pub best: Solution,
  pub score: i64,
  pub random_iterations: usize,
  pub optimize_iterations: usize,
}

struct Best {
  solution: Solution,
  /// `None` until a valid solution has been seen.
  score: Option<i64>,
}

impl Best {
  /// Strict improvements only, so the first solution to reach a score keeps it.
  fn offer(&mut self, solution: Solution, score: i64) -> bool {
    if self.score.map_or(true, |best| score > best) {
      self.solution = solution;
      self.score = Some(score);
      true
    } else {
      false
    }
  }
}

/// Two phase stochastic search: independent random placements first, then hill climbing
/// from the best one with single [`Move`]s. Both phases are bounded by wall clock time.
pub struct Optimizer<'a, R, P> {
  problem: Arc<Problem>,
  config: SearchConfig,
  rng: R,
  reporter: &'a P,
  progress: ProgressBar,
  phase: Phase,
}

impl<'a, R: Rng, P: Reporter> Optimizer<'a, R, P> {
  pub fn new(problem: Arc<Problem>, config: SearchConfig, rng: R, reporter: &'a P) -> Self {
    Optimizer {
      problem,
      config,
      rng,
      reporter,
      progress: ProgressBar::hidden(),
      phase: Phase::Initializing,
    }
  }

  pub fn with_progress(mut self, progress: ProgressBar) -> Self {
    self.progress = progress;
    self
  }

  /// `seed` is a previously recorded solution; it is scored like any other candidate.
  pub fn run(&mut self, seed: Option<Solution>) -> SearchOutcome {
    self.enter(Phase::Initializing);
    let mut best = self.initialize(seed);

    self.enter(Phase::RandomSearch);
    let random_iterations = self.random_search(&mut best);
    self.report(&best);
    info!(problem = self.problem.id, iterations = random_iterations, "Generated random solutions");

    self.enter(Phase::LocalSearch);
    let optimize_iterations = self.local_search(&mut best);
    info!(problem = self.problem.id, iterations = optimize_iterations, "Ran optimization iterations");

    self.enter(Phase::Done);
    self.report(&best);
    self.progress.finish_and_clear();

    SearchOutcome {
      score: best.score.unwrap_or_default(),
      best: best.solution,
      random_iterations,
      optimize_iterations,
    }
  }

  fn enter(&mut self, phase: Phase) {
    debug!(problem = self.problem.id, %phase, "Entering phase");
    self.phase = phase;
    self.progress.set_prefix(format!("[Problem {}] {}", self.problem.id, phase));
  }

  /// Scores `solution` in place, committing its optimal volumes. `None` when invalid.
  fn evaluate(&self, solution: &mut Solution) -> Option<i64> {
    solution.is_valid().then(|| solution.score(self.config.mode, true))
  }

  fn initialize(&mut self, seed: Option<Solution>) -> Best {
    if let Some(mut seed) = seed {
      match self.evaluate(&mut seed) {
        Some(0) => info!(problem = self.problem.id, "Seed solution scores zero, starting over"),
        Some(score) => {
          info!(problem = self.problem.id, score, "Starting from seed solution");
          let best = Best { solution: seed, score: Some(score) };
          self.report(&best);
          return best;
        }
        None => warn!(problem = self.problem.id, "Seed solution is invalid, ignoring it"),
      }
    }

    info!(problem = self.problem.id, "Generating initial random solution");
    let placements = random_placements(&self.problem, &mut self.rng).unwrap_or_else(|| {
      warn!(problem = self.problem.id, "Random placement failed, falling back to the grid");
      grid_placements(&self.problem)
    });

    let mut solution = Solution::new(self.problem.clone(), placements);
    let score = self.evaluate(&mut solution);
    if score.is_none() {
      warn!(problem = self.problem.id, "Initial solution is invalid");
    }

    let best = Best { solution, score };
    self.report(&best);
    best
  }

  fn random_search(&mut self, best: &mut Best) -> usize {
    info!(problem = self.problem.id, seconds = self.config.random_time.as_secs_f64(), "Finding best random solution");

    let started = Instant::now();
    let mut iterations = 0;

    while started.elapsed() < self.config.random_time {
      iterations += 1;
      self.progress.inc(1);

      let Some(placements) = random_placements(&self.problem, &mut self.rng) else { break };
      let mut candidate = Solution::new(self.problem.clone(), placements);

      if let Some(score) = self.evaluate(&mut candidate) {
        if best.offer(candidate, score) {
          self.improved(score);
        }
      }
    }

    iterations
  }

  fn local_search(&mut self, best: &mut Best) -> usize {
    info!(
      problem = self.problem.id,
      seconds = self.config.optimize_time.as_secs_f64(),
      report_every = self.config.report_interval.as_secs_f64(),
      "Optimizing"
    );

    let musicians = self.problem.musician_count();
    let stage = &self.problem.stage;
    if musicians == 0 || stage.width < 0.0 || stage.height < 0.0 {
      debug!(problem = self.problem.id, musicians, "Nothing to move, skipping local search");
      return 0;
    }

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut iterations = 0;

    while started.elapsed() < self.config.optimize_time {
      iterations += 1;
      self.progress.inc(1);

      let change = Move::random(&mut self.rng, &self.problem.stage, musicians, self.config.jitter);
      let mut candidate = best.solution.clone();
      change.apply(&mut candidate.placements);

      if let Some(score) = self.evaluate(&mut candidate) {
        if best.offer(candidate, score) {
          self.improved(score);
        }
      }

      if last_report.elapsed() >= self.config.report_interval {
        self.report(best);
        last_report = Instant::now();
      }
    }

    iterations
  }

  fn improved(&self, score: i64) {
    debug!(problem = self.problem.id, score, phase = %self.phase, "New best");
    self.progress.set_message(format!("best {}", score));
  }

  fn report(&self, best: &Best) {
    if let Some(score) = best.score {
      self.reporter.report(&best.solution, score);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use super::*;
  use crate::models::{Attendee, Instrument, Position, Rect};
  use crate::models::tests::{example_problem, example_solution};

  #[derive(Default)]
  struct Recorder {
    scores: RefCell<Vec<i64>>,
  }

  impl Reporter for Recorder {
    fn report(&self, solution: &Solution, score: i64) {
      assert!(solution.is_valid());
      self.scores.borrow_mut().push(score);
    }
  }

  fn config(random_ms: u64, optimize_ms: u64) -> SearchConfig {
    SearchConfig {
      random_time: Duration::from_millis(random_ms),
      optimize_time: Duration::from_millis(optimize_ms),
      report_interval: Duration::from_millis(20),
      ..SearchConfig::default()
    }
  }

  #[test]
  fn run_without_budget_keeps_initial_solution() {
    let recorder = Recorder::default();
    let mut optimizer = Optimizer::new(example_problem(1, vec![]), config(0, 0), StdRng::seed_from_u64(1), &recorder);

    let outcome = optimizer.run(None);

    assert_eq!(optimizer.phase, Phase::Done);
    assert!(outcome.best.is_valid());
    assert_eq!(outcome.random_iterations, 0);
    assert_eq!(outcome.optimize_iterations, 0);
    assert_eq!(recorder.scores.borrow().as_slice(), &[outcome.score; 3]);
  }

  #[test]
  fn search_never_gets_worse() {
    let problem = example_problem(1, vec![]);
    let recorder = Recorder::default();
    let mut optimizer = Optimizer::new(problem.clone(), config(30, 100), StdRng::seed_from_u64(2), &recorder);

    let outcome = optimizer.run(None);

    let mut rescored = outcome.best.clone();
    assert!(rescored.is_valid());
    assert_eq!(rescored.score(ScoreMode::Auto, true), outcome.score);
    assert!(outcome.random_iterations > 0);
    assert!(outcome.optimize_iterations > 0);

    let scores = recorder.scores.borrow();
    assert!(scores.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", scores);
    assert_eq!(scores.last(), Some(&outcome.score));
  }

  #[test]
  fn seed_solution_is_kept_when_nothing_beats_it() {
    let problem = example_problem(1, vec![]);
    let seed = example_solution(problem.clone());
    let recorder = Recorder::default();
    let mut optimizer = Optimizer::new(problem, config(0, 0), StdRng::seed_from_u64(3), &recorder);

    let outcome = optimizer.run(Some(seed.clone()));

    let mut expected = seed.clone();
    assert_eq!(outcome.best.placements, seed.placements);
    assert_eq!(outcome.score, expected.score(ScoreMode::Auto, true));
    assert_eq!(outcome.best.volumes, expected.volumes);
  }

  #[test]
  fn invalid_seed_is_ignored() {
    let problem = example_problem(1, vec![]);
    let seed = Solution::new(problem.clone(), vec![Position::new(600.0, 50.0)]);
    let recorder = Recorder::default();
    let mut optimizer = Optimizer::new(problem, config(0, 0), StdRng::seed_from_u64(4), &recorder);

    let outcome = optimizer.run(Some(seed));

    assert!(outcome.best.is_valid());
    assert_eq!(outcome.best.placements.len(), 3);
  }

  #[test]
  fn stage_smaller_than_margin_skips_local_search() {
    let problem = Arc::new(Problem::new(
      7,
      Rect::new(Position::default(), 100.0, 100.0),
      Rect::new(Position::new(40.0, 40.0), 15.0, 15.0),
      vec![Instrument(0)],
      vec![Attendee { position: Position::new(10.0, 10.0), tastes: vec![100.0] }],
      vec![],
    ));
    let recorder = Recorder::default();
    let mut optimizer = Optimizer::new(problem, config(10, 50), StdRng::seed_from_u64(5), &recorder);

    let outcome = optimizer.run(None);

    assert_eq!(optimizer.phase, Phase::Done);
    assert_eq!(outcome.optimize_iterations, 0);
    assert!(!outcome.best.is_valid());
    assert!(recorder.scores.borrow().is_empty());
  }

  #[test]
  fn offer_requires_strict_improvement() {
    let problem = example_problem(1, vec![]);
    let first = example_solution(problem.clone());
    let mut second = first.clone();
    second.placements[0] = Position::new(700.0, 20.0);

    let mut best = Best { solution: first.clone(), score: None };
    assert!(best.offer(first.clone(), 10));
    assert!(!best.offer(second.clone(), 10));
    assert_eq!(best.solution.placements, first.placements);
    assert!(best.offer(second.clone(), 11));
    assert_eq!(best.solution.placements, second.placements);
  }

  #[test]
  fn phase_names() {
    assert_eq!(Phase::RandomSearch.to_string(), "random search");
    assert_eq!(Phase::Done.to_string(), "done");
  }
}
