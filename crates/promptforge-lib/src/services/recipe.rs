// Recipe Composer
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Local compose service: renders YAML recipe fragments into a final prompt
// and hashes it so runs can be reproduced.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::models::prompt::ComposeResult;
use crate::models::recipe::{Fragment, Recipe};
use crate::services::composer::{ComposeService, USER_INPUT_PARAM};
use crate::utils::paths::{fragment_path, recipe_base_dir, resolve_against};

/// Compose service backed by recipe files on disk
#[derive(Debug, Clone)]
pub struct RecipeComposer {
    root: PathBuf,
}

impl RecipeComposer {
    /// Relative recipe identifiers are resolved against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ComposeService for RecipeComposer {
    async fn compose(
        &self,
        recipe: &str,
        inline_params: Map<String, Value>,
    ) -> WorkbenchResult<ComposeResult> {
        let recipe_path = resolve_against(&self.root, recipe);
        let recipe: Recipe = read_yaml(&recipe_path).await?.ok_or_else(|| {
            WorkbenchError::RecipeNotFound(recipe_path.display().to_string())
        })?;

        let params = merge_params(&recipe.params, inline_params);
        let base_dir = recipe_base_dir(&recipe_path);

        let mut blocks = Vec::with_capacity(recipe.fragments.len());
        for fragment_id in &recipe.fragments {
            let path = fragment_path(&base_dir, fragment_id);
            let fragment: Fragment = read_yaml(&path)
                .await?
                .ok_or_else(|| WorkbenchError::FragmentNotFound(path.display().to_string()))?;
            blocks.push(render_placeholders(&fragment.content, &params));
        }

        let user_input = params
            .get(USER_INPUT_PARAM)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let final_prompt = assemble_prompt(&blocks, user_input);
        let sha256 = hash_prompt(&final_prompt);

        log::info!(
            "Composed prompt from {} ({} fragments, sha256 {})",
            recipe_path.display(),
            blocks.len(),
            &sha256[..16]
        );

        Ok(ComposeResult {
            final_prompt,
            sha256,
            model: recipe.profile,
        })
    }
}

/// Read and parse a YAML file. A missing file is `None`.
async fn read_yaml<T: DeserializeOwned>(path: &Path) -> WorkbenchResult<Option<T>> {
    let source = match tokio::fs::read_to_string(path).await {
        Ok(source) => source,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_yaml::from_str(&source)
        .map_err(|e| WorkbenchError::InvalidRecipe(format!("{}: {}", path.display(), e)))?;
    Ok(Some(value))
}

/// Inline params override recipe params key by key
fn merge_params(recipe_params: &Value, inline: Map<String, Value>) -> Map<String, Value> {
    let mut merged = recipe_params.as_object().cloned().unwrap_or_default();
    merged.extend(inline);
    merged
}

/// Replace `{{key}}` placeholders. Strings are inserted raw, other values as JSON.
pub fn render_placeholders(template: &str, params: &Map<String, Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        let placeholder = format!("{{{{{}}}}}", key);
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&placeholder, &replacement);
    }
    out
}

/// Join fragment blocks and append the delimited user input
pub fn assemble_prompt(blocks: &[String], user_input: &str) -> String {
    format!(
        "{}\n---\nUSER_INPUT (verbatim):\n```text\n{}\n```",
        blocks.join("\n\n"),
        user_input
    )
}

/// Lowercase hex SHA-256 of the prompt text
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}
