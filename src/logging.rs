use tracing_subscriber::{
  filter::LevelFilter,
  fmt,
  prelude::*,
};

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
  if quiet {
    return LevelFilter::OFF;
  }

  match verbosity {
    0 => LevelFilter::INFO,
    1 => LevelFilter::DEBUG,
    _ => LevelFilter::TRACE,
  }
}

pub fn setup_logging(verbosity: u8, quiet: bool) {
  let stderr_layer = fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .compact();

  tracing_subscriber::registry()
    .with(level_filter(verbosity, quiet))
    .with(stderr_layer)
    .init();
}
