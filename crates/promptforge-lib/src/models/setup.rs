// Backend setup status models
// Tolerates the different spellings used by backend and frontend for the same status

use serde::{Deserialize, Serialize};

/// Backend availability as reported by the setup probe
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupProbeStatus {
    Ready,
    ServerUnavailable,
    ModelMissing,
}

impl SetupProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupProbeStatus::Ready => "ready",
            SetupProbeStatus::ServerUnavailable => "server_unavailable",
            SetupProbeStatus::ModelMissing => "model_missing",
        }
    }
}

/// Probe result with user guidance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCheckOutcome {
    pub status: SetupProbeStatus,
    pub guidance: String,
}

impl SetupCheckOutcome {
    fn new(status: SetupProbeStatus, guidance: &'static str) -> Self {
        Self {
            status,
            guidance: guidance.to_string(),
        }
    }

    pub fn ready() -> Self {
        Self::new(SetupProbeStatus::Ready, "Ollama server is available.")
    }

    pub fn server_unavailable() -> Self {
        Self::new(
            SetupProbeStatus::ServerUnavailable,
            "Cannot connect to the Ollama server. Please start the service.",
        )
    }

    pub fn model_missing() -> Self {
        Self::new(
            SetupProbeStatus::ModelMissing,
            "Pull the model with Ollama and try again.",
        )
    }
}

/// Normalized status shown by the editor
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupStatus {
    Ok,
    Offline,
    MissingModel,
}

impl SetupStatus {
    /// Guidance used when the backend sends none
    pub fn default_guidance(&self) -> &'static str {
        match self {
            SetupStatus::Ok => "",
            SetupStatus::MissingModel => {
                "Required model is not available. Please install the recommended model and retry."
            }
            SetupStatus::Offline => "Ollama service is not reachable. Please start Ollama and retry.",
        }
    }

    /// Whether the editor should show the setup banner
    pub fn needs_attention(&self) -> bool {
        !matches!(self, SetupStatus::Ok)
    }
}

/// Status plus guidance text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupState {
    pub status: SetupStatus,
    pub guidance: String,
}

impl SetupState {
    pub fn offline() -> Self {
        Self {
            status: SetupStatus::Offline,
            guidance: SetupStatus::Offline.default_guidance().to_string(),
        }
    }
}

impl Default for SetupState {
    fn default() -> Self {
        Self {
            status: SetupStatus::Ok,
            guidance: String::new(),
        }
    }
}
