use rand::Rng;
use crate::models::{Dimension, MusicianId, Position, Rect};

/// A single perturbation of a placement list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Move {
  Swap(MusicianId, MusicianId),
  Jitter { musician: MusicianId, dx: Dimension, dy: Dimension },
  Relocate { musician: MusicianId, to: Position },
}

impl Move {
  /// Picks one of the three kinds uniformly. `musicians` must be non-zero.
  pub fn random<R: Rng>(rng: &mut R, stage: &Rect, musicians: usize, jitter: Dimension) -> Move {
    let pick = |rng: &mut R| MusicianId(rng.gen_range(0..musicians));

    match rng.gen_range(0..3) {
      0 => {
        let a = pick(rng);
        let b = pick(rng);
        Move::Swap(a, b)
      }
      1 => {
        let musician = pick(rng);
        let (dx, dy) = if jitter > 0.0 {
          (rng.gen_range(-jitter..jitter), rng.gen_range(-jitter..jitter))
        } else {
          (0.0, 0.0)
        };
        Move::Jitter { musician, dx, dy }
      }
      _ => {
        let musician = pick(rng);
        let to = Position::new(
          rng.gen_range(stage.bottom_left.x..=stage.right()),
          rng.gen_range(stage.bottom_left.y..=stage.top()),
        );
        Move::Relocate { musician, to }
      }
    }
  }

  pub fn apply(&self, placements: &mut [Position]) {
    match *self {
      Move::Swap(a, b) => placements.swap(a.0, b.0),
      Move::Jitter { musician, dx, dy } => {
        let placement = &mut placements[musician.0];
        placement.x += dx;
        placement.y += dy;
      }
      Move::Relocate { musician, to } => placements[musician.0] = to,
    }
  }
}
