// Event subscription
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Named events with JSON payloads. The transport emits, the session controller listens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;

use crate::error::WorkbenchResult;
use crate::utils::sync::lock_or_recover;

/// Listener callback
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

type UnlistenFn = Box<dyn FnOnce() -> WorkbenchResult<()> + Send>;

/// Handle that removes a listener. Calling it more than once is a no-op.
pub struct Unlisten {
    inner: Option<UnlistenFn>,
}

impl Unlisten {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> WorkbenchResult<()> + Send + 'static,
    {
        Self {
            inner: Some(Box::new(f)),
        }
    }

    pub fn unlisten(&mut self) -> WorkbenchResult<()> {
        match self.inner.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlisten")
            .field("active", &self.inner.is_some())
            .finish()
    }
}

/// Something listeners can subscribe to
pub trait EventSource: Send + Sync {
    fn listen(&self, event: &str, handler: EventHandler) -> WorkbenchResult<Unlisten>;
}

/// Something events can be published to
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

#[derive(Default)]
struct HubInner {
    listeners: Mutex<HashMap<String, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
}

/// In-process event hub
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listeners currently registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        lock_or_recover(&self.inner.listeners)
            .get(event)
            .map_or(0, Vec::len)
    }

    fn remove(inner: &Weak<HubInner>, event: &str, id: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut listeners = lock_or_recover(&inner.listeners);
        if let Some(handlers) = listeners.get_mut(event) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                listeners.remove(event);
            }
        }
    }
}

impl EventSource for EventHub {
    fn listen(&self, event: &str, handler: EventHandler) -> WorkbenchResult<Unlisten> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock_or_recover(&self.inner.listeners)
            .entry(event.to_string())
            .or_default()
            .push((id, handler));

        let weak = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Ok(Unlisten::new(move || {
            EventHub::remove(&weak, &event, id);
            Ok(())
        }))
    }
}

impl EventEmitter for EventHub {
    /// Deliver to every listener in registration order. Handlers run without
    /// the hub lock held, so they may listen or unlisten.
    fn emit(&self, event: &str, payload: Value) {
        let handlers: Vec<EventHandler> = lock_or_recover(&self.inner.listeners)
            .get(event)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            log::debug!("No listeners for event {}", event);
            return;
        }
        for handler in handlers {
            handler(payload.clone());
        }
    }
}
