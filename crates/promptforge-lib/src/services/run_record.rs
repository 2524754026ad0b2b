// Run Record Sink
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Persists each completed run as plain files:
//   <runs_dir>/<YYYYMMDD-HHMMSS>/recipe.path.txt
//   <runs_dir>/<YYYYMMDD-HHMMSS>/prompt.final.txt
//   <runs_dir>/<YYYYMMDD-HHMMSS>/response.raw.jsonl
// Runs finishing within the same second get a -1, -2, ... suffix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;

use crate::error::{WorkbenchError, WorkbenchResult};

pub const RECIPE_FILE: &str = "recipe.path.txt";
pub const PROMPT_FILE: &str = "prompt.final.txt";
pub const RESPONSE_FILE: &str = "response.raw.jsonl";

/// Destination for completed runs
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Persist a run and return where it was written
    async fn save_run(
        &self,
        recipe: &str,
        final_prompt: &str,
        response: &str,
    ) -> WorkbenchResult<PathBuf>;
}

/// Writes runs into timestamped directories
#[derive(Debug, Clone)]
pub struct RunRecorder {
    runs_dir: PathBuf,
}

impl RunRecorder {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Create a fresh directory for `stamp`, never reusing an existing one
    async fn create_run_dir(&self, stamp: &str) -> WorkbenchResult<PathBuf> {
        tokio::fs::create_dir_all(&self.runs_dir)
            .await
            .map_err(|e| record_err(&self.runs_dir, e))?;

        let mut attempt = 0;
        loop {
            let name = match attempt {
                0 => stamp.to_string(),
                n => format!("{}-{}", stamp, n),
            };
            let dir = self.runs_dir.join(name);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(record_err(&dir, e)),
            }
        }
    }
}

fn record_err(path: &Path, e: std::io::Error) -> WorkbenchError {
    WorkbenchError::RunRecord(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl RunSink for RunRecorder {
    async fn save_run(
        &self,
        recipe: &str,
        final_prompt: &str,
        response: &str,
    ) -> WorkbenchResult<PathBuf> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let dir = self.create_run_dir(&stamp).await?;

        let write = |name: &'static str, contents: String| {
            let path = dir.join(name);
            async move {
                tokio::fs::write(&path, contents)
                    .await
                    .map_err(|e| record_err(&path, e))
            }
        };

        write(RECIPE_FILE, recipe.to_string()).await?;
        write(PROMPT_FILE, final_prompt.to_string()).await?;
        write(RESPONSE_FILE, response.to_string()).await?;

        log::info!("Saved run record to {}", dir.display());
        Ok(dir)
    }
}
