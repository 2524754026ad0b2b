// Prompt Composer
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Order of operations is fixed:
// 1. Resolve the raw input from the selection state
// 2. Sanitize it
// 3. Hand the snapshot to the observer
// 4. Call the compose service
// The observer always runs before any network I/O.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::WorkbenchResult;
use crate::models::prompt::{ComposeResult, SanitizedSnapshot};
use crate::services::sanitizer::sanitize;
use crate::services::selection::{resolve_input, DEFAULT_CONTEXT_RADIUS};

/// Key under which the chosen user text is passed to the compose service
pub const USER_INPUT_PARAM: &str = "user_input";

/// External service that merges a recipe and parameters into a final prompt
#[async_trait]
pub trait ComposeService: Send + Sync {
    async fn compose(
        &self,
        recipe: &str,
        inline_params: Map<String, Value>,
    ) -> WorkbenchResult<ComposeResult>;
}

/// Everything the composer needs from the editor for one compose call
#[derive(Debug, Clone, Default)]
pub struct ComposeRequest {
    pub params: Map<String, Value>,
    pub recipe: String,
    pub full_text: String,
    pub send_selection_only: bool,
    pub selection: String,
    pub selection_start: Option<usize>,
    pub selection_end: Option<usize>,
    pub context_radius: Option<usize>,
}

impl ComposeRequest {
    pub fn new(recipe: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            full_text: full_text.into(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Send only the selection (plus context) instead of the whole document
    pub fn with_selection(
        mut self,
        selection: impl Into<String>,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Self {
        self.send_selection_only = true;
        self.selection = selection.into();
        self.selection_start = start;
        self.selection_end = end;
        self
    }

    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = Some(radius);
        self
    }

    /// Raw candidate input before sanitization
    pub fn raw_input(&self) -> String {
        resolve_input(
            self.send_selection_only,
            &self.selection,
            &self.full_text,
            self.selection_start,
            self.selection_end,
            self.context_radius.unwrap_or(DEFAULT_CONTEXT_RADIUS),
        )
    }
}

/// Sanitizes editor input and forwards it to a compose service
#[derive(Clone)]
pub struct PromptComposer {
    service: Arc<dyn ComposeService>,
}

impl PromptComposer {
    pub fn new(service: Arc<dyn ComposeService>) -> Self {
        Self { service }
    }

    /// Resolve and sanitize the request input without calling the service
    pub fn snapshot(request: &ComposeRequest) -> SanitizedSnapshot {
        let raw = request.raw_input();
        let result = sanitize(&raw);
        SanitizedSnapshot::new(result, raw)
    }

    /// Compose a prompt. `on_sanitized` receives the snapshot before the
    /// compose service is called. Service errors are returned unchanged.
    pub async fn compose<F>(
        &self,
        request: ComposeRequest,
        on_sanitized: F,
    ) -> WorkbenchResult<ComposeResult>
    where
        F: FnOnce(&SanitizedSnapshot),
    {
        let snapshot = Self::snapshot(&request);
        on_sanitized(&snapshot);

        // Over-limit input goes out untruncated; secrets are already masked.
        if snapshot.over_limit {
            log::warn!(
                "Composing with over-limit input ({} chars)",
                snapshot.raw.chars().count()
            );
        }
        let user_input = snapshot.sanitized;

        let ComposeRequest {
            mut params, recipe, ..
        } = request;
        params.insert(USER_INPUT_PARAM.to_string(), Value::String(user_input));

        log::debug!("Calling compose service for recipe {}", recipe);
        self.service.compose(&recipe, params).await
    }
}
