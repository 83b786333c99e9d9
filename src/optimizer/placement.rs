use rand::Rng;
use rand::seq::SliceRandom;
use crate::models::{Dimension, Position, Problem, Rect};
use crate::scoring::MIN_SEPARATION_SQUARED;

/// Lattice spacing matching the minimum distance between musicians.
pub const PITCH: Dimension = 10.0;

const MAX_SAMPLE_ATTEMPTS: usize = 10_000;

/// Fills the stage row by row from the bottom left corner. Only valid while the musicians fit.
pub fn grid_placements(problem: &Problem) -> Vec<Position> {
  let stage = &problem.stage;
  let mut next = stage.bottom_left;

  (0..problem.musician_count())
    .map(|_| {
      let placement = next;
      next.x += PITCH;
      if !stage.contains(&next) {
        next.x = stage.bottom_left.x;
        next.y += PITCH;
      }
      placement
    })
    .collect()
}

/// Random feasible placement: the stage edges first, topped up with uniform samples, then
/// shuffled so edge spots land on arbitrary musicians.
///
/// `None` when the stage cannot hold every musician within the sampling budget.
pub fn random_placements<R: Rng>(problem: &Problem, rng: &mut R) -> Option<Vec<Position>> {
  let stage = &problem.stage;
  let needed = problem.musician_count();
  if stage.width < 0.0 || stage.height < 0.0 {
    return None;
  }

  let mut candidates = perimeter(stage);

  while candidates.len() < needed {
    let point = (0..MAX_SAMPLE_ATTEMPTS)
      .map(|_| Position::new(
        rng.gen_range(stage.bottom_left.x..=stage.right()),
        rng.gen_range(stage.bottom_left.y..=stage.top()),
      ))
      .find(|point| !too_close(&candidates, point))?;
    candidates.push(point);
  }

  candidates.shuffle(rng);
  candidates.truncate(needed);
  Some(candidates)
}

pub fn too_close(placements: &[Position], candidate: &Position) -> bool {
  placements.iter().any(|p| candidate.distance_squared(p) < MIN_SEPARATION_SQUARED)
}

fn perimeter(stage: &Rect) -> Vec<Position> {
  let mut spots = Vec::new();
  let mut walk = |start: Position, step: Position| {
    let mut next = start;
    while stage.contains(&next) {
      if !too_close(&spots, &next) {
        spots.push(next);
      }
      next.x += step.x;
      next.y += step.y;
    }
  };

  let left = stage.bottom_left.x;
  let bottom = stage.bottom_left.y;

  walk(Position::new(left, bottom), Position::new(PITCH, 0.0));
  walk(Position::new(left, stage.top()), Position::new(PITCH, 0.0));
  walk(Position::new(left, bottom), Position::new(0.0, PITCH));
  walk(Position::new(stage.right(), bottom), Position::new(0.0, PITCH));

  spots
}
