use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam::channel::{self, Sender};
use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart::{Form, Part}};
use serde::Deserialize;
use tracing::{debug, info, warn};
use crate::config::ServerSettings;
use crate::error::{Error, Result};
use crate::models::{Problem, Solution, SolutionFile};
use crate::optimizer::Reporter;
use crate::scoring::ScoreMode;

/// A zip archive with no entries: just the end of central directory record.
pub const EMPTY_ARCHIVE: [u8; 22] = [
  0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

#[derive(Debug, Clone)]
pub struct Submission {
  pub problem_id: u32,
  pub score: i64,
  pub solution: SolutionFile,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
  pub new_best: bool,
  pub best_score: i64,
}

/// Client for the team leaderboard.
#[derive(Clone)]
pub struct Server {
  client: Client,
  settings: ServerSettings,
  /// Sent with every submission; the server rejects submissions without one.
  source_archive: Arc<Vec<u8>>,
}

impl Server {
  pub fn new(settings: ServerSettings, source_archive: Option<&Path>) -> Result<Self> {
    let source_archive = source_archive
      .map(|path| fs::read(path).map_err(Error::io(path)))
      .transpose()?
      .unwrap_or_else(|| EMPTY_ARCHIVE.to_vec());

    Ok(Server {
      client: Client::builder().build()?,
      settings,
      source_archive: Arc::new(source_archive),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.settings.url, path)
  }

  fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
    self.client.get(self.url(path))
      .basic_auth(&self.settings.username, self.settings.password.as_ref())
  }

  /// Best score per problem across every submitter.
  pub fn scores(&self) -> Result<HashMap<u32, i64>> {
    let response = self.get("/scores").send()?;
    check(&response)?;
    Ok(response.json()?)
  }

  /// Latest best solution recorded for `problem`, if any.
  pub fn best_solution(&self, problem: Arc<Problem>) -> Result<Option<Solution>> {
    let response = self.get(&format!("/problems/{}/solution", problem.id)).send()?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    check(&response)?;

    let file: SolutionFile = response.json()?;
    Ok(Some(Solution::from_file(problem, file)))
  }

  pub fn submit(&self, target: &str, submission: &Submission) -> Result<SubmitResponse> {
    let json = serde_json::to_string(&submission.solution).map_err(Error::Encode)?;

    let archive = Part::bytes(self.source_archive.to_vec())
      .file_name("source.zip")
      .mime_str("application/zip")?;

    let form = Form::new()
      .text("problemId", submission.problem_id.to_string())
      .text("score", submission.score.to_string())
      .text("target", target.to_string())
      .part("solutionFile", Part::text(json).file_name("solution.json").mime_str("application/json")?)
      .part("sourceArchive", archive);

    let response = self.client.post(self.url("/submit"))
      .basic_auth(&self.settings.username, self.settings.password.as_ref())
      .multipart(form)
      .send()?;
    check(&response)?;
    Ok(response.json()?)
  }
}

fn check(response: &reqwest::blocking::Response) -> Result<()> {
  if response.status().is_success() {
    Ok(())
  } else {
    Err(Error::Server { status: response.status(), url: response.url().to_string() })
  }
}

/// Log line for a strict improvement over `scores`, `None` otherwise.
pub fn improvement(scores: &HashMap<u32, i64>, problem_id: u32, score: i64, label: &str) -> Option<String> {
  match scores.get(&problem_id) {
    Some(&best) if best >= score => None,
    Some(&best) => Some(format!("[Problem {}] Found new best {} score: {} -> {}", problem_id, label, best, score)),
    None => Some(format!("[Problem {}] Found new best {} score: {}", problem_id, label, score)),
  }
}

/// Owns the score tables. Lives on the submission worker thread.
struct Sink {
  target: String,
  results_dir: PathBuf,
  server: Option<Server>,
  local: HashMap<u32, i64>,
  global: HashMap<u32, i64>,
}

impl Sink {
  fn new(target: String, results_dir: PathBuf, server: Option<Server>) -> Self {
    let global = match &server {
      Some(server) => {
        info!("Loading global scores");
        server.scores().unwrap_or_else(|e| {
          warn!("Something went wrong while retrieving the global scores: {}", e);
          HashMap::new()
        })
      }
      None => HashMap::new(),
    };

    let mut ids: Vec<_> = global.iter().collect();
    ids.sort();
    for (id, score) in ids {
      debug!(problem = id, score, "Best global score");
    }

    Sink { target, results_dir, server, local: HashMap::new(), global }
  }

  fn output_path(&self, problem_id: u32) -> PathBuf {
    self.results_dir.join(&self.target).join(format!("{}.json", problem_id))
  }

  fn handle(&mut self, submission: Submission) -> Result<()> {
    if let Some(message) = improvement(&self.local, submission.problem_id, submission.score, "local") {
      let path = self.output_path(submission.problem_id);
      if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(Error::io(dir))?;
      }
      let json = serde_json::to_vec(&submission.solution).map_err(Error::Encode)?;
      fs::write(&path, json).map_err(Error::io(&path))?;

      info!("{}", message);
      self.local.insert(submission.problem_id, submission.score);
    }

    let Some(server) = &self.server else { return Ok(()) };

    if let Some(message) = improvement(&self.global, submission.problem_id, submission.score, "global") {
      match server.submit(&self.target, &submission) {
        Ok(response) => {
          if response.new_best {
            info!("{}", message);
          }
          self.global.insert(submission.problem_id, response.best_score);
        }
        Err(e) => warn!(
          problem = submission.problem_id,
          "Something went wrong while submitting new global best: {}", e
        ),
      }
    }

    Ok(())
  }
}

/// Fire and forget [`Reporter`]: submissions are queued to a worker thread that writes
/// local improvements to disk and forwards global improvements to the server.
/// Dropping it drains the queue.
pub struct Submitter {
  sender: Option<Sender<Submission>>,
  worker: Option<JoinHandle<()>>,
}

impl Submitter {
  pub fn spawn(target: impl Into<String>, results_dir: PathBuf, server: Option<Server>) -> Self {
    let target = target.into();
    let (sender, receiver) = channel::unbounded::<Submission>();

    let worker = thread::spawn(move || {
      let mut sink = Sink::new(target, results_dir, server);
      for submission in receiver {
        if let Err(e) = sink.handle(submission) {
          warn!("Failed to record submission: {}", e);
        }
      }
    });

    Submitter { sender: Some(sender), worker: Some(worker) }
  }

  pub fn submit(&self, solution: &Solution) {
    if !solution.is_valid() {
      return;
    }
    let mut solution = solution.clone();
    let score = solution.score(ScoreMode::Auto, true);
    self.report(&solution, score);
  }

  /// Waits until every queued submission has been handled.
  pub fn finish(mut self) {
    self.shutdown();
  }

  fn shutdown(&mut self) {
    drop(self.sender.take());
    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        warn!("Submission worker panicked");
      }
    }
  }
}

impl Reporter for Submitter {
  fn report(&self, solution: &Solution, score: i64) {
    if score < 0 || !solution.is_valid() {
      return;
    }

    let submission = Submission { problem_id: solution.problem.id, score, solution: solution.to_file() };
    if let Some(sender) = &self.sender {
      if sender.send(submission).is_err() {
        warn!(problem = solution.problem.id, "Submission worker is gone, dropping submission");
      }
    }
  }
}

impl Drop for Submitter {
  fn drop(&mut self) {
    self.shutdown();
  }
}
