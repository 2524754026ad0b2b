// Streaming Session Controller
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Drives one request/response exchange against a streaming backend:
// - At most one active session per controller
// - Chunks are appended in arrival order
// - Every terminal path (end, error, abort) goes through an idempotent finalize

pub mod events;
pub mod ollama;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::models::stream::{FinalizeKind, StreamArgs, StreamPhase, CHUNK_EVENT, END_EVENT, ERROR_EVENT};
use crate::utils::sync::lock_or_recover;

pub use events::{EventEmitter, EventHandler, EventHub, EventSource, Unlisten};
pub use ollama::{OllamaStreamTransport, StreamRegistry};

/// Backend that produces chunk/end/error events for a chat request
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Start a streaming request. Output arrives through events.
    async fn start_stream(&self, args: &StreamArgs) -> WorkbenchResult<()>;

    /// Ask the backend to stop the current stream
    async fn abort(&self) -> WorkbenchResult<()>;
}

type ChunkCallback = Arc<dyn Fn(&str) + Send + Sync>;
type EndCallback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callbacks invoked by the controller. Unset callbacks do nothing.
#[derive(Clone)]
pub struct StreamCallbacks {
    on_chunk: ChunkCallback,
    on_end: EndCallback,
    on_error: ErrorCallback,
}

impl Default for StreamCallbacks {
    fn default() -> Self {
        Self {
            on_chunk: Arc::new(|_: &str| {}),
            on_end: Arc::new(|| {}),
            on_error: Arc::new(|_: String| {}),
        }
    }
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_chunk(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_chunk = Arc::new(f);
        self
    }

    pub fn on_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_end = Arc::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }
}

/// Cumulative text of the current session. Cleared by the caller between sessions.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    buffer: Arc<Mutex<String>>,
}

impl StreamAccumulator {
    pub fn push(&self, chunk: &str) {
        lock_or_recover(&self.buffer).push_str(chunk);
    }

    pub fn text(&self) -> String {
        lock_or_recover(&self.buffer).clone()
    }

    pub fn clear(&self) {
        lock_or_recover(&self.buffer).clear();
    }

    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.buffer).is_empty()
    }
}

struct ControllerInner {
    transport: Arc<dyn StreamTransport>,
    events: Arc<dyn EventSource>,
    callbacks: StreamCallbacks,
    active: AtomicBool,
    phase: Mutex<StreamPhase>,
    listeners: Mutex<Vec<Unlisten>>,
    accumulator: StreamAccumulator,
    session_id: Mutex<Option<String>>,
}

impl ControllerInner {
    fn set_phase(&self, phase: StreamPhase) {
        *lock_or_recover(&self.phase) = phase;
    }

    fn append_chunk(&self, chunk: &str) {
        if !self.active.load(Ordering::SeqCst) {
            log::debug!("Dropping chunk received outside an active stream");
            return;
        }
        self.accumulator.push(chunk);
        (self.callbacks.on_chunk)(chunk);
    }

    fn finalize(&self, kind: FinalizeKind) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.set_phase(match kind {
            FinalizeKind::End => StreamPhase::Ending,
            FinalizeKind::Error(_) => StreamPhase::Erroring,
        });

        let listeners: Vec<Unlisten> = std::mem::take(&mut *lock_or_recover(&self.listeners));
        for mut listener in listeners {
            if let Err(e) = listener.unlisten() {
                log::warn!("Failed to remove stream listener: {}", e);
            }
        }

        let session_id = lock_or_recover(&self.session_id).take().unwrap_or_default();
        match kind {
            FinalizeKind::End => {
                log::info!("Stream {} ended", session_id);
                (self.callbacks.on_end)();
            }
            FinalizeKind::Error(message) => {
                log::warn!("Stream {} failed: {}", session_id, message);
                (self.callbacks.on_error)(message);
            }
        }
        self.set_phase(StreamPhase::Idle);
        true
    }
}

/// Streaming session controller
#[derive(Clone)]
pub struct StreamSessionController {
    inner: Arc<ControllerInner>,
}

impl StreamSessionController {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        events: Arc<dyn EventSource>,
        callbacks: StreamCallbacks,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                events,
                callbacks,
                active: AtomicBool::new(false),
                phase: Mutex::new(StreamPhase::Idle),
                listeners: Mutex::new(Vec::new()),
                accumulator: StreamAccumulator::default(),
                session_id: Mutex::new(None),
            }),
        }
    }

    /// Start a session. Ignored while another session is active.
    ///
    /// A transport failure finalizes the session as an error and is also returned.
    pub async fn start_stream(&self, args: StreamArgs) -> WorkbenchResult<()> {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            log::debug!("start_stream ignored: a stream is already active");
            return Ok(());
        }
        self.inner.set_phase(StreamPhase::Starting);

        let session_id = format!("stream_{}", uuid::Uuid::new_v4());
        log::info!("Starting stream {} (model: {})", session_id, args.model);
        *lock_or_recover(&self.inner.session_id) = Some(session_id);

        if let Err(e) = self.register_listeners() {
            self.inner.finalize(FinalizeKind::Error(e.to_string()));
            return Err(e);
        }
        self.inner.set_phase(StreamPhase::Streaming);

        if let Err(e) = self.inner.transport.start_stream(&args).await {
            self.inner.finalize(FinalizeKind::Error(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    fn register_listeners(&self) -> WorkbenchResult<()> {
        let weak = Arc::downgrade(&self.inner);

        let on_chunk: EventHandler = {
            let weak = weak.clone();
            Arc::new(move |payload: Value| {
                if let (Some(inner), Some(chunk)) = (weak.upgrade(), payload.as_str()) {
                    inner.append_chunk(chunk);
                }
            })
        };
        let on_end: EventHandler = {
            let weak = weak.clone();
            Arc::new(move |_: Value| with_inner(&weak, |inner| inner.finalize(FinalizeKind::End)))
        };
        let on_error: EventHandler = Arc::new(move |payload: Value| {
            with_inner(&weak, |inner| {
                inner.finalize(FinalizeKind::Error(describe_error_payload(&payload)))
            })
        });

        for (event, handler) in [
            (CHUNK_EVENT, on_chunk),
            (END_EVENT, on_end),
            (ERROR_EVENT, on_error),
        ] {
            let unlisten = self.inner.events.listen(event, handler).map_err(|e| {
                WorkbenchError::Subscription(format!("Failed to listen for {}: {}", event, e))
            })?;
            lock_or_recover(&self.inner.listeners).push(unlisten);
        }
        Ok(())
    }

    /// Append a chunk as if it had arrived from the backend
    pub fn append_chunk(&self, chunk: &str) {
        self.inner.append_chunk(chunk);
    }

    /// Abort the active session. Always finalizes as a normal end; an abort
    /// command failure is logged and returned after finalizing.
    pub async fn abort_stream(&self) -> WorkbenchResult<()> {
        if !self.is_streaming() {
            return Ok(());
        }
        let result = self.inner.transport.abort().await;
        if let Err(e) = &result {
            log::warn!("Abort command failed: {}", e);
        }
        self.inner.finalize(FinalizeKind::End);
        result
    }

    /// Finish the active session. Returns false if nothing was active.
    pub fn finalize(&self, kind: FinalizeKind) -> bool {
        self.inner.finalize(kind)
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> StreamPhase {
        *lock_or_recover(&self.inner.phase)
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.inner.accumulator
    }
}

fn with_inner(weak: &Weak<ControllerInner>, f: impl FnOnce(&ControllerInner) -> bool) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

/// Human-readable text for an error event payload
pub fn describe_error_payload(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(message) => message.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => payload.to_string(),
        },
        other => other.to_string(),
    }
}
