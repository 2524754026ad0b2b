// Ollama Streaming Transport
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// POSTs a chat request to Ollama with `stream: true` and turns the
// newline-delimited JSON reply into chunk/end/error events.
// Default endpoint: http://127.0.0.1:11434

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use super::events::EventEmitter;
use super::StreamTransport;
use crate::error::{WorkbenchError, WorkbenchResult};
use crate::models::config::WorkbenchConfig;
use crate::models::stream::{StreamArgs, CHUNK_EVENT, END_EVENT, ERROR_EVENT};

struct TrackedHandle {
    id: usize,
    handle: AbortHandle,
}

/// Tracks the single in-flight stream task
#[derive(Clone, Default)]
pub struct StreamRegistry {
    inner: Arc<Mutex<Option<TrackedHandle>>>,
    counter: Arc<AtomicUsize>,
}

impl StreamRegistry {
    /// Track a new task. Returns its id and the handle it replaced, if any.
    pub async fn register(&self, handle: AbortHandle) -> (usize, Option<AbortHandle>) {
        let mut guard = self.inner.lock().await;
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = guard.replace(TrackedHandle { id, handle });
        (id, previous.map(|tracked| tracked.handle))
    }

    pub async fn take(&self) -> Option<AbortHandle> {
        self.inner.lock().await.take().map(|tracked| tracked.handle)
    }

    /// Forget the tracked task only if it is still `id`
    pub async fn clear_if(&self, id: usize) {
        let mut guard = self.inner.lock().await;
        if guard.as_ref().map(|tracked| tracked.id) == Some(id) {
            guard.take();
        }
    }

    pub async fn is_tracking(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}

/// Emitter for one tracked task. Events are dropped once the task is no
/// longer the tracked one, so nothing leaks past an abort or a newer stream.
struct StreamSink {
    id: usize,
    registry: StreamRegistry,
    emitter: Arc<dyn EventEmitter>,
}

impl StreamSink {
    /// Emit while holding the registry lock. Returns false if the event was dropped.
    async fn emit(&self, event: &str, payload: Value) -> bool {
        let guard = self.registry.inner.lock().await;
        if guard.as_ref().map(|tracked| tracked.id) != Some(self.id) {
            log::debug!("Dropping {} from stale stream #{}", event, self.id);
            return false;
        }
        self.emitter.emit(event, payload);
        true
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<OllamaLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaLineMessage {
    #[serde(default)]
    content: String,
}

/// Event decoded from one stream line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OllamaEvent {
    Chunk(String),
    Done,
    Error(String),
}

/// Decode one JSON line. Accepts both `/api/generate` (`response`) and
/// `/api/chat` (`message.content`) shapes.
pub fn parse_ollama_jsonl_chunk(line: &str) -> Result<Vec<OllamaEvent>, serde_json::Error> {
    let parsed: OllamaStreamLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Ok(vec![OllamaEvent::Error(error)]);
    }

    let mut events = Vec::new();
    let text = parsed
        .response
        .or_else(|| parsed.message.map(|message| message.content))
        .unwrap_or_default();
    if !text.is_empty() {
        events.push(OllamaEvent::Chunk(text));
    }
    if parsed.done {
        events.push(OllamaEvent::Done);
    }
    Ok(events)
}

/// Ollama Streaming Transport
#[derive(Clone)]
pub struct OllamaStreamTransport {
    client: Client,
    endpoint: String,
    emitter: Arc<dyn EventEmitter>,
    registry: StreamRegistry,
}

impl OllamaStreamTransport {
    pub fn new(endpoint: impl Into<String>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self::with_client(Client::new(), endpoint, emitter)
    }

    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            emitter,
            registry: StreamRegistry::default(),
        }
    }

    /// Build from configuration, applying the request timeout when set
    pub fn from_config(config: &WorkbenchConfig, emitter: Arc<dyn EventEmitter>) -> WorkbenchResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| WorkbenchError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.ollama_endpoint.clone(), emitter))
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!("{}{}", base, path)
    }
}

#[async_trait]
impl StreamTransport for OllamaStreamTransport {
    async fn start_stream(&self, args: &StreamArgs) -> WorkbenchResult<()> {
        let request = OllamaChatRequest {
            model: args.model.clone(),
            stream: true,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: args.system_text.clone(),
                },
                OllamaMessage {
                    role: "user",
                    content: args.user_text.clone(),
                },
            ],
        };

        let (handle, registration) = AbortHandle::new_pair();
        let (stream_id, previous) = self.registry.register(handle).await;
        if let Some(previous) = previous {
            log::info!("Aborting previous stream before starting stream #{}", stream_id);
            previous.abort();
        }

        let client = self.client.clone();
        let url = self.api_url("/api/chat");
        let sink = StreamSink {
            id: stream_id,
            registry: self.registry.clone(),
            emitter: self.emitter.clone(),
        };
        let cleanup_registry = self.registry.clone();

        let task = async move {
            if let Err(e) = pump_stream(&client, &url, &request, &sink).await {
                log::warn!("Stream #{} failed: {}", stream_id, e);
                sink.emit(ERROR_EVENT, Value::String(e.to_string())).await;
            }
            sink.registry.clear_if(stream_id).await;
        };

        let abortable = Abortable::new(task, registration);
        tokio::spawn(async move {
            if abortable.await.is_err() {
                log::debug!("Stream #{} aborted", stream_id);
                cleanup_registry.clear_if(stream_id).await;
            }
        });

        Ok(())
    }

    /// Stop the tracked task. Succeeds when nothing is running.
    async fn abort(&self) -> WorkbenchResult<()> {
        match self.registry.take().await {
            Some(handle) => handle.abort(),
            None => log::debug!("Abort requested with no stream running"),
        }
        Ok(())
    }
}

/// Send the request and emit events until the stream is done
async fn pump_stream(
    client: &Client,
    url: &str,
    request: &OllamaChatRequest,
    sink: &StreamSink,
) -> WorkbenchResult<()> {
    let response = client.post(url).json(request).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(WorkbenchError::ApiError(format!(
            "Ollama API error ({}): {}",
            status, body
        )));
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(item) = stream.next().await {
        buffer.extend_from_slice(&item?);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if emit_line(&line, sink).await? {
                return Ok(());
            }
        }
    }

    if !buffer.is_empty() && emit_line(&buffer, sink).await? {
        return Ok(());
    }

    log::debug!("Stream closed without a done marker");
    sink.emit(END_EVENT, Value::Null).await;
    Ok(())
}

/// Emit the events for one raw line. Returns true once the stream is finished
/// or no longer tracked.
async fn emit_line(raw: &[u8], sink: &StreamSink) -> WorkbenchResult<bool> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(false);
    }

    for event in parse_ollama_jsonl_chunk(line)? {
        let (name, payload, terminal) = match event {
            OllamaEvent::Chunk(text) => (CHUNK_EVENT, Value::String(text), false),
            OllamaEvent::Done => (END_EVENT, Value::Null, true),
            OllamaEvent::Error(message) => (ERROR_EVENT, Value::String(message), true),
        };
        if !sink.emit(name, payload).await || terminal {
            return Ok(true);
        }
    }
    Ok(false)
}
