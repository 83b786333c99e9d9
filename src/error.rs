use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error on '{path}': {source}", path = path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to parse '{path}': {source}", path = path.display())]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("'{}' is not named after a numeric problem id", .0.display())]
  ProblemId(PathBuf),

  #[error("No problems directory found above '{}'", .0.display())]
  NoProblemsDir(PathBuf),

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Server answered {status} for {url}")]
  Server { status: reqwest::StatusCode, url: String },

  #[error("Failed to encode solution: {0}")]
  Encode(#[source] serde_json::Error),
}

impl Error {
  pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.into();
    move |source| Error::Io { path, source }
  }

  pub fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Error {
    let path = path.into();
    move |source| Error::Json { path, source }
  }
}
