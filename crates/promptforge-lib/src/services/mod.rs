// Services
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)

pub mod composer;
pub mod diff;
pub mod recipe;
pub mod run_record;
pub mod sanitizer;
pub mod selection;
pub mod session;
pub mod setup_check;
pub mod stream;

pub use composer::{ComposeRequest, ComposeService, PromptComposer};
pub use diff::{build_unified_diff, DiffPreviewFlow, DiffPreviewHost};
pub use recipe::RecipeComposer;
pub use run_record::{RunRecorder, RunSink};
pub use sanitizer::{contains_danger_words, sanitize};
pub use selection::{format_selection_summary, resolve_input};
pub use session::{SessionServices, WorkbenchSession};
pub use setup_check::{check_ollama_setup, normalize_setup_status};
pub use stream::{
    EventEmitter, EventHub, EventSource, OllamaStreamTransport, StreamCallbacks,
    StreamSessionController, StreamTransport,
};
