//! Validity and scoring of a [`Solution`].
//!
//! Scores are sums of individually ceiled terms, so the total does not depend on how the
//! attendees are split across worker threads or in which order the partial results arrive.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::panic;
use std::sync::OnceLock;
use clap::ValueEnum;
use crate::geometry::blocks;
use crate::models::{Attendee, Dimension, MusicianId, Position, Problem, Solution};

/// Radius each musician occupies when blocking another musician's sound.
pub const MUSICIAN_RADIUS: Dimension = 5.0;
pub const MIN_SEPARATION_SQUARED: Dimension = 100.0;
pub const MAX_VOLUME: f64 = 10.0;
/// Problems up to and including this id are scored with the lightning rules.
pub const LIGHTNING_CUTOFF: u32 = 55;

const IMPACT_SCALE: f64 = 1_000_000.0;
const MIN_ATTENDEES_PER_WORKER: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ScoreMode {
  #[default]
  Auto,
  /// No pillars, no closeness bonus.
  Lightning,
  Full,
}

impl ScoreMode {
  pub fn resolve(self, problem_id: u32) -> ScoreMode {
    match self {
      ScoreMode::Auto if problem_id <= LIGHTNING_CUTOFF => ScoreMode::Lightning,
      ScoreMode::Auto => ScoreMode::Full,
      other => other,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
  pub score: i64,
  /// Score maximizing volumes, present only when they were asked for.
  pub volumes: Option<Vec<f64>>,
}

impl Solution {
  pub fn is_valid(&self) -> bool {
    let problem = &self.problem;

    if problem.musician_count() != self.placements.len()
      || problem.musician_count() != self.volumes.len() {
      return false;
    }

    if !self.placements.iter().all(|p| problem.stage.contains(p)) {
      return false;
    }

    for (i, a) in self.placements.iter().enumerate() {
      if self.placements[i + 1..].iter().any(|b| a.distance_squared(b) < MIN_SEPARATION_SQUARED) {
        return false;
      }
    }

    self.volumes.iter().all(|v| (0.0..=MAX_VOLUME).contains(v))
  }

  /// Scores the solution. With `optimize_volumes` the stored volumes are replaced by the
  /// optimal ones before the score is returned.
  ///
  /// The solution must be valid; see [`Solution::is_valid`].
  pub fn score(&mut self, mode: ScoreMode, optimize_volumes: bool) -> i64 {
    let evaluation = evaluate(self, mode, optimize_volumes);
    if let Some(volumes) = evaluation.volumes {
      self.volumes = volumes;
    }
    evaluation.score
  }
}

/// Pure scoring. Nothing in `solution` is modified; optimal volumes are handed back instead.
pub fn evaluate(solution: &Solution, mode: ScoreMode, optimize_volumes: bool) -> Evaluation {
  let chunk = chunk_size(solution.problem.attendees.len());
  evaluate_in_chunks(solution, mode, optimize_volumes, chunk)
}

fn workers() -> usize {
  static WORKERS: OnceLock<usize> = OnceLock::new();
  *WORKERS.get_or_init(|| {
    std::thread::available_parallelism()
      .map(NonZeroUsize::get)
      .unwrap_or(1)
  })
}

fn chunk_size(attendees: usize) -> usize {
  let workers = workers();
  ((attendees + workers - 1) / workers).max(MIN_ATTENDEES_PER_WORKER)
}

fn evaluate_in_chunks(solution: &Solution, mode: ScoreMode, optimize_volumes: bool, chunk: usize) -> Evaluation {
  let scorer = Scorer::new(&solution.problem, &solution.placements, mode);
  let attendees = solution.problem.attendees.len();

  if !optimize_volumes {
    let volumes = &solution.volumes;
    let score = in_partitions(attendees, chunk, |range| scorer.fixed_volume_score(range, volumes))
      .into_iter()
      .sum();
    return Evaluation { score, volumes: None };
  }

  let mut per_musician: Vec<Vec<f64>> = vec![Vec::new(); solution.placements.len()];
  for partial in in_partitions(attendees, chunk, |range| scorer.unweighted_contributions(range)) {
    for (all, part) in per_musician.iter_mut().zip(partial) {
      all.extend(part);
    }
  }

  let mut score = 0i64;
  let volumes: Vec<f64> = per_musician.iter()
    .map(|contributions| {
      if contributions.iter().sum::<f64>() <= 0.0 {
        0.0
      } else {
        score += contributions.iter().map(|c| (MAX_VOLUME * c).ceil() as i64).sum::<i64>();
        MAX_VOLUME
      }
    })
    .collect();

  Evaluation { score, volumes: Some(volumes) }
}

/// Runs `work` over contiguous ranges of `0..len` on scoped threads, returning the
/// partial results in range order.
fn in_partitions<T, F>(len: usize, chunk: usize, work: F) -> Vec<T>
where
  T: Send,
  F: Fn(Range<usize>) -> T + Sync,
{
  let chunk = chunk.max(1);
  let ranges: Vec<Range<usize>> = (0..len).step_by(chunk)
    .map(|start| start..(start + chunk).min(len))
    .collect();

  if ranges.len() <= 1 {
    return ranges.into_iter().map(&work).collect();
  }

  let work = &work;
  crossbeam::scope(|scope| {
    let handles: Vec<_> = ranges.into_iter()
      .map(|range| scope.spawn(move |_| work(range)))
      .collect();

    handles.into_iter()
      .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
      .collect()
  }).unwrap_or_else(|payload| panic::resume_unwind(payload))
}

struct Scorer<'a> {
  problem: &'a Problem,
  placements: &'a [Position],
  mode: ScoreMode,
  closeness: Vec<f64>,
}

impl<'a> Scorer<'a> {
  fn new(problem: &'a Problem, placements: &'a [Position], mode: ScoreMode) -> Self {
    let mode = mode.resolve(problem.id);
    let closeness = match mode {
      ScoreMode::Full => closeness_factors(problem, placements),
      _ => Vec::new(),
    };

    Scorer { problem, placements, mode, closeness }
  }

  /// Scaled taste over squared distance, ceiled, or `None` when the attendee does not care
  /// about this musician or cannot hear them.
  fn impact(&self, attendee: &Attendee, musician: usize) -> Option<f64> {
    let taste = attendee.taste(self.problem.musicians[musician]);
    if taste == 0.0 {
      return None;
    }

    let placement = &self.placements[musician];
    let blocked_by_musician = self.placements.iter()
      .enumerate()
      .any(|(other, center)| other != musician && blocks(placement, &attendee.position, center, MUSICIAN_RADIUS));
    if blocked_by_musician {
      return None;
    }

    if self.mode == ScoreMode::Full {
      let blocked_by_pillar = self.problem.pillars.iter()
        .any(|pillar| blocks(placement, &attendee.position, &pillar.center, pillar.radius));
      if blocked_by_pillar {
        return None;
      }
    }

    let distance = attendee.position.distance_squared(placement);
    Some((IMPACT_SCALE * taste / distance).ceil())
  }

  fn fixed_volume_score(&self, attendees: Range<usize>, volumes: &[f64]) -> i64 {
    let mut total = 0i64;
    for attendee in &self.problem.attendees[attendees] {
      for musician in 0..self.placements.len() {
        let Some(impact) = self.impact(attendee, musician) else { continue };
        let volume = volumes[musician];
        let contribution = match self.mode {
          ScoreMode::Full => volume * self.closeness[musician] * impact,
          _ => volume * impact,
        };
        total += contribution.ceil() as i64;
      }
    }
    total
  }

  /// Per musician contributions at unit volume.
  fn unweighted_contributions(&self, attendees: Range<usize>) -> Vec<Vec<f64>> {
    let mut contributions = vec![Vec::new(); self.placements.len()];
    for attendee in &self.problem.attendees[attendees] {
      for (musician, scores) in contributions.iter_mut().enumerate() {
        let Some(impact) = self.impact(attendee, musician) else { continue };
        scores.push(match self.mode {
          ScoreMode::Full => self.closeness[musician] * impact,
          _ => impact,
        });
      }
    }
    contributions
  }
}

fn closeness_factors(problem: &Problem, placements: &[Position]) -> Vec<f64> {
  (0..placements.len())
    .map(|i| {
      1.0 + problem.section_of(MusicianId(i)).iter()
        .filter(|other| other.0 != i)
        .map(|other| 1.0 / placements[i].distance(&placements[other.0]))
        .sum::<f64>()
    })
    .collect()
}
