//! navigation::history
//!
//! The history primitives the interceptor wraps.
//!
//! In a browser these are `history.pushState`, `history.replaceState`,
//! `location.assign` and the `popstate` event. [`MemoryHistory`] is an
//! in-process stack with back/forward for tests and non-browser hosts.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use url::Url;

/// One history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub url: Url,
    pub state: Option<Value>,
}

impl HistoryEntry {
    pub fn new(url: Url) -> Self {
        Self { url, state: None }
    }
}

/// History mutation primitives.
pub trait History: Send + Sync {
    /// The entry currently displayed.
    fn current(&self) -> HistoryEntry;

    /// Add an entry and make it current.
    fn push_state(&self, state: Option<Value>, url: &Url);

    /// Replace the current entry.
    fn replace_state(&self, state: Option<Value>, url: &Url);

    /// Leave the page for `url` (full-page navigation).
    fn assign(&self, url: &Url);
}

/// In-memory history stack.
///
/// Clones share the same stack.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    inner: Arc<Mutex<MemoryHistoryInner>>,
}

#[derive(Debug)]
struct MemoryHistoryInner {
    entries: Vec<HistoryEntry>,
    index: usize,
    pushes: usize,
    replaces: usize,
    assigned: Vec<Url>,
}

impl MemoryHistory {
    /// A stack with a single entry at `initial`.
    pub fn new(initial: Url) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryHistoryInner {
                entries: vec![HistoryEntry::new(initial)],
                index: 0,
                pushes: 0,
                replaces: 0,
                assigned: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryHistoryInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Step back one entry, as the back button would.
    ///
    /// Returns the new current entry, or `None` at the start of the stack.
    /// The host reports the change to the navigator as a pop.
    pub fn back(&self) -> Option<HistoryEntry> {
        let mut inner = self.lock();
        if inner.index == 0 {
            return None;
        }
        inner.index -= 1;
        Some(inner.entries[inner.index].clone())
    }

    /// Step forward one entry.
    pub fn forward(&self) -> Option<HistoryEntry> {
        let mut inner = self.lock();
        if inner.index + 1 >= inner.entries.len() {
            return None;
        }
        inner.index += 1;
        Some(inner.entries[inner.index].clone())
    }

    /// Current path (`/a/b`).
    pub fn path(&self) -> String {
        self.current().url.path().to_string()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_count(&self) -> usize {
        self.lock().pushes
    }

    pub fn replace_count(&self) -> usize {
        self.lock().replaces
    }

    /// URLs handed to [`History::assign`].
    pub fn assigned(&self) -> Vec<Url> {
        self.lock().assigned.clone()
    }
}

impl History for MemoryHistory {
    fn current(&self) -> HistoryEntry {
        let inner = self.lock();
        inner.entries[inner.index].clone()
    }

    fn push_state(&self, state: Option<Value>, url: &Url) {
        let mut inner = self.lock();
        let next = inner.index + 1;
        inner.entries.truncate(next);
        inner.entries.push(HistoryEntry {
            url: url.clone(),
            state,
        });
        inner.index = next;
        inner.pushes += 1;
    }

    fn replace_state(&self, state: Option<Value>, url: &Url) {
        let mut inner = self.lock();
        let index = inner.index;
        inner.entries[index] = HistoryEntry {
            url: url.clone(),
            state,
        };
        inner.replaces += 1;
    }

    fn assign(&self, url: &Url) {
        self.lock().assigned.push(url.clone());
    }
}
