use crate::models::{Dimension, Position};

/// Whether the open segment `from`→`to` cuts through the circle at `center`.
///
/// Solves `|from + t·(to - from) - center|² = radius²` for `t`. Tangency (a zero discriminant)
/// and roots landing exactly on an endpoint do not block.
#[inline]
pub fn blocks(from: &Position, to: &Position, center: &Position, radius: Dimension) -> bool {
  let ax = from.x - center.x;
  let ay = from.y - center.y;
  let bx = to.x - center.x;
  let by = to.y - center.y;

  let dx = bx - ax;
  let dy = by - ay;

  let a = dx * dx + dy * dy;
  let b = 2.0 * (ax * dx + ay * dy);
  let c = ax * ax + ay * ay - radius * radius;

  let disc = b * b - 4.0 * a * c;
  if disc <= 0.0 {
    return false;
  }

  let disc_sqrt = disc.sqrt();
  let t1 = (-b + disc_sqrt) / (2.0 * a);
  let t2 = (-b - disc_sqrt) / (2.0 * a);

  (0.0 < t1 && t1 < 1.0) || (0.0 < t2 && t2 < 1.0)
}
