// Workbench Error Types
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)

use thiserror::Error;

/// Workbench Error
#[derive(Error, Debug)]
pub enum WorkbenchError {
    /// Recipe file could not be found
    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    /// Fragment referenced by a recipe could not be loaded
    #[error("Failed to read fragment: {0}")]
    FragmentNotFound(String),

    /// Recipe or fragment YAML is malformed
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// Model backend is not reachable
    #[error("Cannot connect to model backend: {0}")]
    ConnectionFailed(String),

    /// Request timed out at the transport layer
    #[error("Model backend response timeout")]
    Timeout,

    /// Backend answered with a non-success status
    #[error("Model backend error: {0}")]
    ApiError(String),

    /// A streamed line could not be decoded
    #[error("Stream parse error: {0}")]
    ParseError(String),

    /// Stream failed after it was started
    #[error("Stream failed: {0}")]
    StreamFailed(String),

    /// Registering or removing an event listener failed
    #[error("Event subscription error: {0}")]
    Subscription(String),

    /// Run record could not be persisted
    #[error("Failed to save run record: {0}")]
    RunRecord(String),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<reqwest::Error> for WorkbenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WorkbenchError::Timeout
        } else if err.is_connect() {
            WorkbenchError::ConnectionFailed(err.to_string())
        } else {
            WorkbenchError::ApiError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WorkbenchError {
    fn from(err: serde_json::Error) -> Self {
        WorkbenchError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for WorkbenchError {
    fn from(err: serde_yaml::Error) -> Self {
        WorkbenchError::InvalidRecipe(err.to_string())
    }
}

impl From<std::io::Error> for WorkbenchError {
    fn from(err: std::io::Error) -> Self {
        WorkbenchError::IoError(err.to_string())
    }
}

/// Result type for workbench operations
pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

/// Error codes for the frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbenchErrorCode {
    RecipeNotFound,
    FragmentNotFound,
    InvalidRecipe,
    ConnectionFailed,
    Timeout,
    ApiError,
    ParseError,
    StreamFailed,
    Subscription,
    RunRecord,
    Config,
    IoError,
}

impl WorkbenchErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkbenchErrorCode::RecipeNotFound => "COMPOSE_RECIPE_NOT_FOUND",
            WorkbenchErrorCode::FragmentNotFound => "COMPOSE_FRAGMENT_NOT_FOUND",
            WorkbenchErrorCode::InvalidRecipe => "COMPOSE_INVALID_RECIPE",
            WorkbenchErrorCode::ConnectionFailed => "BACKEND_CONNECTION_FAILED",
            WorkbenchErrorCode::Timeout => "BACKEND_TIMEOUT",
            WorkbenchErrorCode::ApiError => "BACKEND_API_ERROR",
            WorkbenchErrorCode::ParseError => "STREAM_PARSE_ERROR",
            WorkbenchErrorCode::StreamFailed => "STREAM_FAILED",
            WorkbenchErrorCode::Subscription => "STREAM_SUBSCRIPTION_ERROR",
            WorkbenchErrorCode::RunRecord => "RUN_RECORD_ERROR",
            WorkbenchErrorCode::Config => "INVALID_CONFIG",
            WorkbenchErrorCode::IoError => "IO_ERROR",
        }
    }
}

impl WorkbenchError {
    pub fn code(&self) -> WorkbenchErrorCode {
        match self {
            WorkbenchError::RecipeNotFound(_) => WorkbenchErrorCode::RecipeNotFound,
            WorkbenchError::FragmentNotFound(_) => WorkbenchErrorCode::FragmentNotFound,
            WorkbenchError::InvalidRecipe(_) => WorkbenchErrorCode::InvalidRecipe,
            WorkbenchError::ConnectionFailed(_) => WorkbenchErrorCode::ConnectionFailed,
            WorkbenchError::Timeout => WorkbenchErrorCode::Timeout,
            WorkbenchError::ApiError(_) => WorkbenchErrorCode::ApiError,
            WorkbenchError::ParseError(_) => WorkbenchErrorCode::ParseError,
            WorkbenchError::StreamFailed(_) => WorkbenchErrorCode::StreamFailed,
            WorkbenchError::Subscription(_) => WorkbenchErrorCode::Subscription,
            WorkbenchError::RunRecord(_) => WorkbenchErrorCode::RunRecord,
            WorkbenchError::Config(_) => WorkbenchErrorCode::Config,
            WorkbenchError::IoError(_) => WorkbenchErrorCode::IoError,
        }
    }

    /// Whether retrying the same request can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkbenchError::ConnectionFailed(_)
                | WorkbenchError::Timeout
                | WorkbenchError::ApiError(_)
                | WorkbenchError::StreamFailed(_)
        )
    }

    /// Convert to a user-facing message.
    /// Unreachable backends get actionable guidance instead of the transport error.
    pub fn to_user_message(&self) -> String {
        match self {
            WorkbenchError::ConnectionFailed(_) | WorkbenchError::Timeout => {
                "Ollama service is not reachable. Please start Ollama and retry.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<WorkbenchError> for String {
    fn from(err: WorkbenchError) -> Self {
        err.to_string()
    }
}
