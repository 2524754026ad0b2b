// PromptForge workbench core
//
// Turns an editor selection into a sanitized, reproducible prompt, streams the
// model's answer into a second pane, and gates the result behind a diff review.
// Windowing, file dialogs and workspace persistence live in the host shell.

pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{WorkbenchError, WorkbenchErrorCode, WorkbenchResult};
pub use models::{
    ComposeResult, DocumentBuffer, SanitizationResult, SanitizedSnapshot, SecretType,
    SetupState, SetupStatus, StreamArgs, StreamOutcome, WorkbenchConfig,
};
pub use services::{
    build_unified_diff, resolve_input, sanitize, DiffPreviewFlow, PromptComposer,
    StreamSessionController, WorkbenchSession,
};
