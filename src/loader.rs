use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::error::{Error, Result};
use crate::models::{Problem, ProblemSpec, Solution, SolutionFile};

/// `42.json` is problem 42.
pub fn problem_id(path: &Path) -> Result<u32> {
  path.file_stem()
    .and_then(|stem| stem.to_str())
    .and_then(|stem| stem.parse().ok())
    .ok_or_else(|| Error::ProblemId(path.to_path_buf()))
}

pub fn load_problem(path: &Path) -> Result<Problem> {
  let id = problem_id(path)?;
  let json = fs::read_to_string(path).map_err(Error::io(path))?;
  let spec: ProblemSpec = serde_json::from_str(&json).map_err(Error::json(path))?;
  let problem = Problem::from_spec(id, spec);
  debug!(
    problem = id,
    room = ?(problem.room.width, problem.room.height),
    musicians = problem.musician_count(),
    attendees = problem.attendees.len(),
    pillars = problem.pillars.len(),
    "Loaded problem"
  );
  Ok(problem)
}

pub fn load_solution(problem: Arc<Problem>, path: &Path) -> Result<Solution> {
  let json = fs::read_to_string(path).map_err(Error::io(path))?;
  let file: SolutionFile = serde_json::from_str(&json).map_err(Error::json(path))?;
  Ok(Solution::from_file(problem, file))
}

/// Problem files to work on, sorted by id. Every `*.json` in `dir` when `ids` is empty;
/// requested ids without a file are skipped.
pub fn problem_paths(dir: &Path, ids: &[u32]) -> Result<Vec<(u32, PathBuf)>> {
  let mut paths = Vec::new();

  if ids.is_empty() {
    for entry in fs::read_dir(dir).map_err(Error::io(dir))? {
      let path = entry.map_err(Error::io(dir))?.path();
      if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
        match problem_id(&path) {
          Ok(id) => paths.push((id, path)),
          Err(e) => warn!("Skipping {}", e),
        }
      }
    }
  } else {
    for &id in ids {
      let path = dir.join(format!("{}.json", id));
      if path.is_file() {
        paths.push((id, path));
      } else {
        warn!(problem = id, path = %path.display(), "Problem file does not exist, skipping");
      }
    }
  }

  paths.sort_by_key(|(id, _)| *id);
  paths.dedup_by_key(|(id, _)| *id);
  info!(count = paths.len(), ids = ?paths.iter().map(|(id, _)| *id).collect::<Vec<_>>(), "Problems to solve");
  Ok(paths)
}

pub fn load_problems(dir: &Path, ids: &[u32]) -> Result<Vec<Arc<Problem>>> {
  problem_paths(dir, ids)?
    .into_iter()
    .map(|(_, path)| load_problem(&path).map(Arc::new))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Position;

  const PROBLEM_JSON: &str = r#"{
    "room_width": 2000.0, "room_height": 5000.0,
    "stage_width": 1000.0, "stage_height": 200.0, "stage_bottom_left": [500.0, 0.0],
    "musicians": [0, 1, 0],
    "attendees": [{ "x": 100.0, "y": 500.0, "tastes": [1000.0, -1000.0] }],
    "pillars": [{ "center": [345.0, 255.0], "radius": 4.0 }]
  }"#;

  fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn id_comes_from_file_stem() {
    assert_eq!(problem_id(Path::new("problems/42.json")).unwrap(), 42);
    assert!(matches!(problem_id(Path::new("problems/example.json")), Err(Error::ProblemId(_))));
  }

  #[test]
  fn loads_problem_with_inset_stage() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "56.json", PROBLEM_JSON);

    let problem = load_problem(&path).unwrap();

    assert_eq!(problem.id, 56);
    assert_eq!(problem.stage.bottom_left, Position::new(510.0, 10.0));
    assert_eq!(problem.pillars.len(), 1);
    assert_eq!(problem.pillars[0].center, Position::new(345.0, 255.0));
  }

  #[test]
  fn malformed_problem_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "3.json", "{ not json");

    assert!(matches!(load_problem(&path), Err(Error::Json { path: p, .. }) if p == path));
  }

  #[test]
  fn lists_every_problem_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "10.json", PROBLEM_JSON);
    write(dir.path(), "2.json", PROBLEM_JSON);
    write(dir.path(), "notes.txt", "");
    write(dir.path(), "draft.json", PROBLEM_JSON);

    let ids: Vec<u32> = problem_paths(dir.path(), &[]).unwrap().into_iter().map(|(id, _)| id).collect();

    assert_eq!(ids, vec![2, 10]);
  }

  #[test]
  fn skips_missing_requested_ids() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "5.json", PROBLEM_JSON);

    let problems = load_problems(dir.path(), &[7, 5, 5]).unwrap();

    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].id, 5);
  }

  #[test]
  fn loads_solution_against_problem() {
    let dir = tempfile::tempdir().unwrap();
    let problem = Arc::new(load_problem(&write(dir.path(), "1.json", PROBLEM_JSON)).unwrap());
    let path = write(dir.path(), "solution.json", r#"{"placements":[{"x":590,"y":10},{"x":1100,"y":100},{"x":1100,"y":150}]}"#);

    let solution = load_solution(problem, &path).unwrap();

    assert!(solution.is_valid());
    assert_eq!(solution.volumes, vec![1.0, 1.0, 1.0]);
  }
}
