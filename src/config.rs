use std::path::{Path, PathBuf};
use clap::Args;
use crate::error::{Error, Result};

/// Settings shared by every command. Each can come from the environment (or `.env`).
#[derive(Args, Debug, Clone)]
pub struct Settings {
  /// Directory holding `<id>.json` problem files. Defaults to the nearest `problems/` above the cwd
  #[arg(long, env = "PROBLEMS_DIR", global = true)]
  pub problems_dir: Option<PathBuf>,

  /// Directory solutions are written to, one subdirectory per target
  #[arg(long, env = "RESULTS_DIR", global = true)]
  pub results_dir: Option<PathBuf>,

  /// Leaderboard server; submissions stay local when unset
  #[arg(long, env = "SERVER_URL", global = true)]
  pub server_url: Option<String>,

  #[arg(long, env = "SUBMITTER_USERNAME", default_value = "submitter", global = true)]
  pub username: String,

  #[arg(long, env = "SUBMITTER_PASSWORD", hide_env_values = true, global = true)]
  pub password: Option<String>,

  /// Archive attached to every server submission; an empty zip when unset
  #[arg(long, env = "SOURCE_ARCHIVE", global = true)]
  pub source_archive: Option<PathBuf>,
}

impl Settings {
  pub fn problems_dir(&self) -> Result<PathBuf> {
    match &self.problems_dir {
      Some(dir) => Ok(dir.clone()),
      None => {
        let cwd = std::env::current_dir().map_err(Error::io("."))?;
        find_problems_dir(&cwd)
      }
    }
  }

  /// Falls back to `results/` next to the problems directory.
  pub fn results_dir(&self) -> Result<PathBuf> {
    match &self.results_dir {
      Some(dir) => Ok(dir.clone()),
      None => {
        let problems = self.problems_dir()?;
        let root = problems.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(root.join("results"))
      }
    }
  }

  pub fn server(&self) -> Option<ServerSettings> {
    self.server_url.as_ref()
      .filter(|url| !url.is_empty())
      .map(|url| ServerSettings {
        url: url.trim_end_matches('/').to_string(),
        username: self.username.clone(),
        password: self.password.clone(),
      })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
  pub url: String,
  pub username: String,
  pub password: Option<String>,
}

/// Walks up from `start` to the first directory containing `problems/`.
pub fn find_problems_dir(start: &Path) -> Result<PathBuf> {
  start.ancestors()
    .map(|dir| dir.join("problems"))
    .find(|dir| dir.is_dir())
    .ok_or_else(|| Error::NoProblemsDir(start.to_path_buf()))
}
