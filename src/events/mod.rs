//! events
//!
//! Process-wide publish/subscribe bus for loader, navigation and devtools
//! notifications.
//!
//! # Architecture
//!
//! There is exactly one bus per process, created lazily on first use and
//! reached through [`EventBus::global`]. Components take an
//! `Arc<EventBus>` at construction so tests can hand them a private bus
//! instead of the global one.
//!
//! Handlers subscribe to a single [`Topic`] or to every topic (the `*`
//! wildcard). Emission snapshots the handler lists before calling them, so
//! a handler may subscribe or unsubscribe without deadlocking the bus.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use tessera::events::{Event, EventBus, Topic};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! bus.on(Topic::DevtoolsActivated, move |event| {
//!     sink.lock().unwrap().push(event.topic());
//! });
//!
//! bus.emit(Event::DevtoolsActivated);
//! assert_eq!(seen.lock().unwrap().as_slice(), &[Topic::DevtoolsActivated]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::Serialize;

use crate::loader::LoaderLog;

/// Event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    LoadRequested,
    ModuleLoaded,
    LoadError,
    NewLog,
    DevtoolsActivated,
    DevtoolsDeactivated,
    NavigationRequested,
    NavigationCommitted,
    NavigationDenied,
}

impl Topic {
    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::LoadRequested => "module-loader:load-requested",
            Topic::ModuleLoaded => "module-loader:module-loaded",
            Topic::LoadError => "module-loader:load-error",
            Topic::NewLog => "module-loader:new-log",
            Topic::DevtoolsActivated => "devtools:activated",
            Topic::DevtoolsDeactivated => "devtools:deactivated",
            Topic::NavigationRequested => "navigation:requested",
            Topic::NavigationCommitted => "navigation:committed",
            Topic::NavigationDenied => "navigation:denied",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published on the bus. Payload shape is fixed per topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A module load is about to be issued.
    LoadRequested { specifier: String, url: String },
    /// A module finished loading.
    ModuleLoaded { specifier: String, load_time_ms: f64 },
    /// A module failed to load. `error` is the rendered failure.
    LoadError { specifier: String, error: String },
    /// A record was appended to the loader's retained log.
    NewLog(LoaderLog),
    DevtoolsActivated,
    DevtoolsDeactivated,
    /// A navigation entered the interceptor.
    NavigationRequested { from: String, to: String },
    /// A navigation was accepted and applied.
    NavigationCommitted { from: String, to: String },
    /// A navigation was rejected by middleware.
    NavigationDenied { from: String, to: String },
}

impl Event {
    /// The topic this event is published under.
    pub fn topic(&self) -> Topic {
        match self {
            Event::LoadRequested { .. } => Topic::LoadRequested,
            Event::ModuleLoaded { .. } => Topic::ModuleLoaded,
            Event::LoadError { .. } => Topic::LoadError,
            Event::NewLog(_) => Topic::NewLog,
            Event::DevtoolsActivated => Topic::DevtoolsActivated,
            Event::DevtoolsDeactivated => Topic::DevtoolsDeactivated,
            Event::NavigationRequested { .. } => Topic::NavigationRequested,
            Event::NavigationCommitted { .. } => Topic::NavigationCommitted,
            Event::NavigationDenied { .. } => Topic::NavigationDenied,
        }
    }
}

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Topic(Topic),
    All,
}

/// The event bus.
pub struct EventBus {
    handlers: Mutex<HashMap<Channel, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

static GLOBAL_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

impl EventBus {
    /// Create a private bus.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide bus, created on first call.
    ///
    /// Every call returns the same instance.
    pub fn global() -> Arc<EventBus> {
        GLOBAL_BUS.get_or_init(|| Arc::new(EventBus::new())).clone()
    }

    /// Subscribe to one topic.
    pub fn on<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Channel::Topic(topic), Arc::new(handler))
    }

    /// Subscribe to every topic.
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Channel::All, Arc::new(handler))
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<Channel, Vec<(SubscriptionId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers()
            .entry(channel)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every handler subscribed to `topic`.
    pub fn clear(&self, topic: Topic) {
        self.handlers().remove(&Channel::Topic(topic));
    }

    /// Number of handlers subscribed to `topic` (wildcards not counted).
    pub fn handler_count(&self, topic: Topic) -> usize {
        self.handlers()
            .get(&Channel::Topic(topic))
            .map_or(0, Vec::len)
    }

    /// Publish an event to topic handlers, then to wildcard handlers.
    pub fn emit(&self, event: Event) {
        let (topic_handlers, wildcard_handlers) = {
            let handlers = self.handlers();
            let snapshot = |channel: Channel| -> Vec<Handler> {
                handlers
                    .get(&channel)
                    .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                    .unwrap_or_default()
            };
            (
                snapshot(Channel::Topic(event.topic())),
                snapshot(Channel::All),
            )
        };

        for handler in topic_handlers.iter().chain(wildcard_handlers.iter()) {
            handler(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .handlers
            .lock()
            .map(|h| h.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("EventBus").field("handlers", &count).finish()
    }
}
