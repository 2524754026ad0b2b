// Workbench configuration
// Loaded from TOML and/or environment variables (.env supported via dotenvy)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WorkbenchError, WorkbenchResult};

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "llama3:8b";
pub const DEFAULT_RECIPE_PATH: &str = "data/recipes/demo.yaml";
pub const DEFAULT_RUNS_DIR: &str = "runs";
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

const ENV_OLLAMA_URL: &str = "PROMPTFORGE_OLLAMA_URL";
const ENV_MODEL: &str = "PROMPTFORGE_MODEL";
const ENV_RECIPE: &str = "PROMPTFORGE_RECIPE";
const ENV_RUNS_DIR: &str = "PROMPTFORGE_RUNS_DIR";
const ENV_CONTEXT_RADIUS: &str = "PROMPTFORGE_CONTEXT_RADIUS";

/// Workbench configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Base URL of the Ollama server
    pub ollama_endpoint: String,
    /// Model used for streaming runs
    pub model: String,
    /// Recipe handed to the compose service
    pub recipe_path: String,
    /// Directory receiving run records
    pub runs_dir: PathBuf,
    /// Lines of context around a selection
    pub context_radius: usize,
    /// Optional transport timeout; none means the transport default
    pub request_timeout_secs: Option<u64>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            recipe_path: DEFAULT_RECIPE_PATH.to_string(),
            runs_dir: PathBuf::from(DEFAULT_RUNS_DIR),
            context_radius: DEFAULT_CONTEXT_RADIUS,
            request_timeout_secs: None,
        }
    }
}

impl WorkbenchConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> WorkbenchResult<Self> {
        toml::from_str(source).map_err(|e| WorkbenchError::Config(e.to_string()))
    }

    /// Defaults overlaid with `PROMPTFORGE_*` environment variables.
    ///
    /// A `.env` file is loaded first when present (project root, then current dir).
    pub fn from_env() -> WorkbenchResult<Self> {
        let _ = dotenvy::from_filename("../.env").or_else(|_| dotenvy::dotenv());
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup. Split out from `from_env` so tests
    /// don't have to touch process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> WorkbenchResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(endpoint) = non_empty(ENV_OLLAMA_URL) {
            self.ollama_endpoint = endpoint;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model = model;
        }
        if let Some(recipe) = non_empty(ENV_RECIPE) {
            self.recipe_path = recipe;
        }
        if let Some(runs_dir) = non_empty(ENV_RUNS_DIR) {
            self.runs_dir = PathBuf::from(runs_dir);
        }
        if let Some(radius) = non_empty(ENV_CONTEXT_RADIUS) {
            self.context_radius = radius.trim().parse().map_err(|_| {
                WorkbenchError::Config(format!("{} must be a non-negative integer: {}", ENV_CONTEXT_RADIUS, radius))
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WorkbenchConfig::default();
        assert_eq!(config.ollama_endpoint, "http://127.0.0.1:11434");
        assert_eq!(config.context_radius, 3);
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = WorkbenchConfig::from_toml_str(
            r#"
model = "phi3"
request_timeout_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(config.model, "phi3");
        assert_eq!(config.runs_dir, PathBuf::from("runs"));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = WorkbenchConfig::from_toml_str("context_radius = \"wide\"").unwrap_err();
        assert!(matches!(err, WorkbenchError::Config(_)));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PROMPTFORGE_OLLAMA_URL", "http://gpu-box:11434"),
            ("PROMPTFORGE_MODEL", "  "),
            ("PROMPTFORGE_CONTEXT_RADIUS", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = WorkbenchConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.ollama_endpoint, "http://gpu-box:11434");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.context_radius, 5);
    }

    #[test]
    fn test_apply_overrides_rejects_bad_radius() {
        let mut config = WorkbenchConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "PROMPTFORGE_CONTEXT_RADIUS").then(|| "-1".to_string())
        });
        assert!(result.is_err());
    }
}
