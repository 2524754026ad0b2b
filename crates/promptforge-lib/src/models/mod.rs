// Data models
// Plain data shared by services and the host shell

pub mod config;
pub mod prompt;
pub mod recipe;
pub mod setup;
pub mod stream;

pub use config::WorkbenchConfig;
pub use prompt::{
    ComposeResult, DocumentBuffer, SanitizationResult, SanitizedSnapshot, SecretType,
    SelectionRange, USER_INPUT_SEPARATOR,
};
pub use recipe::{Fragment, Recipe};
pub use setup::{SetupCheckOutcome, SetupProbeStatus, SetupState, SetupStatus};
pub use stream::{
    FinalizeKind, StreamArgs, StreamOutcome, StreamPhase, CHUNK_EVENT, END_EVENT, ERROR_EVENT,
};
