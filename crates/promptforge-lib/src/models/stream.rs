// Streaming session data models
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)

use serde::{Deserialize, Serialize};

/// Event carrying one chunk of model output
pub const CHUNK_EVENT: &str = "ollama:chunk";
/// Event signalling a normal end of stream
pub const END_EVENT: &str = "ollama:end";
/// Event signalling a stream failure
pub const ERROR_EVENT: &str = "ollama:error";

/// Arguments for starting a streaming chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamArgs {
    pub model: String,
    pub system_text: String,
    pub user_text: String,
}

impl StreamArgs {
    pub fn new(
        model: impl Into<String>,
        system_text: impl Into<String>,
        user_text: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system_text: system_text.into(),
            user_text: user_text.into(),
        }
    }
}

/// Lifecycle of a stream session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    #[default]
    Idle,
    Starting,
    Streaming,
    Ending,
    Erroring,
}

impl StreamPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, StreamPhase::Starting | StreamPhase::Streaming)
    }
}

/// How a session finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeKind {
    End,
    Error(String),
}

/// Terminal outcome of a run, as observed by the workbench session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamOutcome {
    Completed { response: String },
    Failed { message: String },
}
