use std::sync::Arc;
use multimap::MultiMap;
use serde::{Serialize, Deserialize};

pub type Dimension = f64;

/// Inset applied to every side of the raw stage so musicians keep their distance from the edge.
pub const STAGE_MARGIN: Dimension = 10.0;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Instrument(pub usize);

#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub struct MusicianId(pub usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct Position {
  pub x: Dimension,
  pub y: Dimension,
}

impl Position {
  pub fn new(x: Dimension, y: Dimension) -> Self {
    Position { x, y }
  }

  pub fn distance_squared(&self, other: &Position) -> Dimension {
    let del_x = other.x - self.x;
    let del_y = other.y - self.y;
    del_x * del_x + del_y * del_y
  }

  pub fn distance(&self, other: &Position) -> Dimension {
    self.distance_squared(other).sqrt()
  }
}

/// Axis aligned rectangle anchored at its bottom left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
  pub bottom_left: Position,
  pub width: Dimension,
  pub height: Dimension,
}

impl Rect {
  pub fn new(bottom_left: Position, width: Dimension, height: Dimension) -> Self {
    Rect { bottom_left, width, height }
  }

  pub fn right(&self) -> Dimension {
    self.bottom_left.x + self.width
  }

  pub fn top(&self) -> Dimension {
    self.bottom_left.y + self.height
  }

  /// Inclusive on all four edges.
  pub fn contains(&self, pos: &Position) -> bool {
    (self.bottom_left.x..=self.right()).contains(&pos.x)
      && (self.bottom_left.y..=self.top()).contains(&pos.y)
  }

  pub fn shrink(&self, margin: Dimension) -> Rect {
    Rect {
      bottom_left: Position::new(self.bottom_left.x + margin, self.bottom_left.y + margin),
      width: self.width - 2.0 * margin,
      height: self.height - 2.0 * margin,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Attendee {
  #[serde(flatten)]
  pub position: Position,
  pub tastes: Vec<f64>
}

impl Attendee {
  pub fn taste(&self, instrument: Instrument) -> f64 {
    self.tastes[instrument.0]
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pillar {
  pub center: Position,
  pub radius: Dimension,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PillarSpec {
  pub center: [Dimension; 2],
  pub radius: Dimension,
}

/// Problem as it is laid out on disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProblemSpec {
  pub room_height: Dimension,
  pub room_width: Dimension,
  pub stage_height: Dimension,
  pub stage_width: Dimension,
  pub stage_bottom_left: [Dimension; 2],
  pub musicians: Vec<Instrument>,
  pub attendees: Vec<Attendee>,
  #[serde(default)]
  pub pillars: Vec<PillarSpec>,
}

/// Immutable contest instance. `stage` is already inset by [`STAGE_MARGIN`].
#[derive(Debug)]
pub struct Problem {
  pub id: u32,
  pub room: Rect,
  pub stage: Rect,
  pub musicians: Vec<Instrument>,
  pub attendees: Vec<Attendee>,
  pub pillars: Vec<Pillar>,
  sections: MultiMap<Instrument, MusicianId>,
}

impl Problem {
  /// `raw_stage` is the stage as published; the margin is applied here and only here.
  pub fn new(
    id: u32,
    room: Rect,
    raw_stage: Rect,
    musicians: Vec<Instrument>,
    attendees: Vec<Attendee>,
    pillars: Vec<Pillar>,
  ) -> Self {
    let sections = musicians.iter()
      .copied()
      .enumerate()
      .map(|(idx, inst)| (inst, MusicianId(idx)))
      .collect();

    Problem {
      id,
      room,
      stage: raw_stage.shrink(STAGE_MARGIN),
      musicians,
      attendees,
      pillars,
      sections,
    }
  }

  pub fn from_spec(id: u32, spec: ProblemSpec) -> Self {
    let room = Rect::new(Position::default(), spec.room_width, spec.room_height);
    let stage = Rect::new(
      Position::new(spec.stage_bottom_left[0], spec.stage_bottom_left[1]),
      spec.stage_width,
      spec.stage_height,
    );
    let pillars = spec.pillars.into_iter()
      .map(|p| Pillar { center: Position::new(p.center[0], p.center[1]), radius: p.radius })
      .collect();

    Problem::new(id, room, stage, spec.musicians, spec.attendees, pillars)
  }

  pub fn musician_count(&self) -> usize {
    self.musicians.len()
  }

  pub fn instrument(&self, musician: MusicianId) -> Instrument {
    self.musicians[musician.0]
  }

  /// Every musician playing the same instrument as `musician`, itself included.
  pub fn section_of(&self, musician: MusicianId) -> &[MusicianId] {
    self.sections.get_vec(&self.instrument(musician))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }
}

/// Placement and volume per musician slot, bound to a shared [`Problem`].
#[derive(Debug, Clone)]
pub struct Solution {
  pub problem: Arc<Problem>,
  pub placements: Vec<Position>,
  pub volumes: Vec<f64>,
}

impl Solution {
  /// Every volume starts at 1.0.
  pub fn new(problem: Arc<Problem>, placements: Vec<Position>) -> Self {
    let volumes = vec![1.0; placements.len()];
    Solution { problem, placements, volumes }
  }

  pub fn with_volumes(problem: Arc<Problem>, placements: Vec<Position>, volumes: Vec<f64>) -> Self {
    Solution { problem, placements, volumes }
  }

  pub fn from_file(problem: Arc<Problem>, file: SolutionFile) -> Self {
    match file.volumes {
      Some(volumes) => Solution::with_volumes(problem, file.placements, volumes),
      None => Solution::new(problem, file.placements),
    }
  }

  pub fn to_file(&self) -> SolutionFile {
    SolutionFile {
      placements: self.placements.clone(),
      volumes: Some(self.volumes.clone()),
    }
  }
}

/// Wire shape of a solution. A missing `volumes` key means every volume is 1.0.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SolutionFile {
  pub placements: Vec<Position>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub volumes: Option<Vec<f64>>,
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  const PROBLEM_JSON: &str = r#"{
    "room_width": 2000.0,
    "room_height": 5000.0,
    "stage_width": 1000.0,
    "stage_height": 200.0,
    "stage_bottom_left": [500.0, 0.0],
    "musicians": [0, 1, 0],
    "attendees": [
      { "x": 100.0, "y": 500.0, "tastes": [1000.0, -1000.0] },
      { "x": 200.0, "y": 1000.0, "tastes": [200.0, 200.0] },
      { "x": 1100.0, "y": 800.0, "tastes": [800.0, 1500.0] }
    ],
    "pillars": []
  }"#;

  pub(crate) fn example_problem(id: u32, pillars: Vec<Pillar>) -> Arc<Problem> {
    let attendees = vec![
      Attendee { position: Position::new(100.0, 500.0), tastes: vec![1000.0, -1000.0] },
      Attendee { position: Position::new(200.0, 1000.0), tastes: vec![200.0, 200.0] },
      Attendee { position: Position::new(1100.0, 800.0), tastes: vec![800.0, 1500.0] },
    ];

    Arc::new(Problem::new(
      id,
      Rect::new(Position::default(), 2000.0, 5000.0),
      Rect::new(Position::new(500.0, 0.0), 1000.0, 200.0),
      vec![Instrument(0), Instrument(1), Instrument(0)],
      attendees,
      pillars,
    ))
  }

  pub(crate) fn example_solution(problem: Arc<Problem>) -> Solution {
    Solution::new(problem, vec![
      Position::new(590.0, 10.0),
      Position::new(1100.0, 100.0),
      Position::new(1100.0, 150.0),
    ])
  }

  #[test]
  fn parse_problem() {
    let spec: ProblemSpec = serde_json::from_str(PROBLEM_JSON).unwrap();

    assert_eq!(spec.room_width, 2000.0);
    assert_eq!(spec.room_height, 5000.0);
    assert_eq!(spec.stage_width, 1000.0);
    assert_eq!(spec.attendees.len(), 3);
    assert_eq!(spec.attendees[0].position, Position::new(100.0, 500.0));
    assert_eq!(spec.musicians, vec![Instrument(0), Instrument(1), Instrument(0)]);
  }

  #[test]
  fn missing_pillars_means_none() {
    let json = r#"{
      "room_width": 100.0, "room_height": 100.0,
      "stage_width": 50.0, "stage_height": 50.0, "stage_bottom_left": [0.0, 0.0],
      "musicians": [0], "attendees": []
    }"#;
    let spec: ProblemSpec = serde_json::from_str(json).unwrap();
    assert!(spec.pillars.is_empty());
  }

  #[test]
  fn stage_is_inset_once() {
    let spec: ProblemSpec = serde_json::from_str(PROBLEM_JSON).unwrap();
    let problem = Problem::from_spec(1, spec);

    assert_eq!(problem.stage, Rect::new(Position::new(510.0, 10.0), 980.0, 180.0));
    assert_eq!(problem.room, Rect::new(Position::new(0.0, 0.0), 2000.0, 5000.0));
  }

  #[test]
  fn containment_is_inclusive() {
    let stage = Rect::new(Position::new(510.0, 10.0), 980.0, 180.0);

    assert!(stage.contains(&Position::new(510.0, 10.0)));
    assert!(stage.contains(&Position::new(1490.0, 190.0)));
    assert!(!stage.contains(&Position::new(509.9, 10.0)));
    assert!(!stage.contains(&Position::new(1490.0, 190.1)));
  }

  #[test]
  fn sections_group_same_instrument() {
    let problem = example_problem(1, vec![]);

    assert_eq!(problem.section_of(MusicianId(0)), &[MusicianId(0), MusicianId(2)]);
    assert_eq!(problem.section_of(MusicianId(1)), &[MusicianId(1)]);
  }

  #[test]
  fn solution_file_without_volumes_defaults_to_one() {
    let problem = example_problem(1, vec![]);
    let solution = example_solution(problem.clone());

    let json = serde_json::to_string(&SolutionFile { placements: solution.placements.clone(), volumes: None }).unwrap();
    assert_eq!(json, r#"{"placements":[{"x":590.0,"y":10.0},{"x":1100.0,"y":100.0},{"x":1100.0,"y":150.0}]}"#);

    let decoded = Solution::from_file(problem, serde_json::from_str(&json).unwrap());
    assert_eq!(decoded.placements, solution.placements);
    assert_eq!(decoded.volumes, vec![1.0, 1.0, 1.0]);
  }

  #[test]
  fn solution_file_keeps_explicit_volumes() {
    let problem = example_problem(1, vec![]);
    let mut solution = example_solution(problem.clone());
    solution.volumes = vec![0.0, 10.0, 3.25];

    let json = serde_json::to_string(&solution.to_file()).unwrap();
    let decoded = Solution::from_file(problem, serde_json::from_str(&json).unwrap());

    assert_eq!(decoded.placements, solution.placements);
    assert_eq!(decoded.volumes, vec![0.0, 10.0, 3.25]);
  }
}
