//! HTTP server wiring for the gradebook result engine.
//!
//! Holds the runtime configuration shape and assembles the application
//! router: the JSON API nested under `/api`, wrapped in request tracing.

use std::{
  env,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use gradebook_core::{
  grading::{GradeBand, GradeTable},
  store::ResultStore,
};
use gradebook_engine::Engine;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  /// Required; there is no built-in grading scale.
  pub grade_bands: Vec<GradeBand>,
}

impl ServerConfig {
  /// Validate the configured bands into a lookup table.
  pub fn grade_table(&self) -> gradebook_core::Result<GradeTable> {
    GradeTable::new(self.grade_bands.clone())
  }

  /// `store_path` with a leading `~/` replaced by `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    expand_home(&self.store_path, env::var("HOME").ok().as_deref())
  }
}

fn expand_home(path: &Path, home: Option<&str>) -> PathBuf {
  if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/"))
    && let Some(home) = home
  {
    return Path::new(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router for `engine`.
pub fn app<S>(engine: Arc<Engine<S>>) -> Router
where
  S: ResultStore + 'static,
{
  Router::new()
    .nest("/api", gradebook_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
