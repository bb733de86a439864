//! Hook bus: ordered, short-circuiting publish/subscribe dispatch.
//!
//! Subscribers register for explicit [`EventKind`]s. A dispatch walks the
//! subscribers of one kind in priority order (`First`, `Normal`, `Last`),
//! keeping registration order inside each class, until one of them returns
//! [`HookOutcome::Handled`].
//!
//! The registry lock is only held while taking a snapshot of the entries, so
//! subscribers are free to dispatch (or register) from inside a handler.
//! Errors and panics raised by a subscriber are logged and treated as
//! `Continue`; one failing capability never blocks the others.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::event::{Event, EventKind};

/// Priority class of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    First,
    Normal,
    Last,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// What a subscriber wants the bus to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Keep delivering to the remaining subscribers.
    Continue,
    /// Stop propagation of this broadcast.
    Handled,
}

impl HookOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Result returned by a subscriber. An `Err` is logged and treated as `Continue`.
pub type HookResult = anyhow::Result<HookOutcome>;

/// A capability listening on the hook bus.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Identity used for idempotent registration.
    fn name(&self) -> &str;

    /// Priority class. Default: `Normal`.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Handle one event of a kind this subscriber was registered for.
    async fn on_event(&self, event: &Event) -> HookResult;
}

#[derive(Clone)]
struct Entry {
    seq: u64,
    priority: Priority,
    subscriber: Arc<dyn Subscriber>,
}

/// The bus shared by every capability of the assistant.
#[derive(Default)]
pub struct HookBus {
    entries: RwLock<HashMap<EventKind, Vec<Entry>>>,
    next_seq: AtomicU64,
}

impl HookBus {
    /// Create a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for the given event kinds.
    ///
    /// Registering the same name again for a kind replaces the earlier entry
    /// in place, so its position within the priority class is kept.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>, events: &[EventKind]) {
        let name = subscriber.name().to_string();
        let priority = subscriber.priority();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.entries.write();
        for kind in events {
            let list = entries.entry(*kind).or_default();
            match list.iter_mut().find(|e| e.subscriber.name() == name) {
                Some(existing) => {
                    debug!("Replacing subscriber '{}' for {}", name, kind);
                    existing.priority = priority;
                    existing.subscriber = Arc::clone(&subscriber);
                }
                None => {
                    debug!("Registering subscriber '{}' for {} ({:?})", name, kind, priority);
                    list.push(Entry {
                        seq,
                        priority,
                        subscriber: Arc::clone(&subscriber),
                    });
                }
            }
            list.sort_by_key(|e| (e.priority, e.seq));
        }
    }

    /// Remove a subscriber from every event kind. Returns true if anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut removed = false;
        let mut entries = self.entries.write();
        for list in entries.values_mut() {
            let before = list.len();
            list.retain(|e| e.subscriber.name() != name);
            removed |= list.len() != before;
        }
        if removed {
            debug!("Unregistered subscriber '{}'", name);
        }
        removed
    }

    /// Subscriber names for a kind, in dispatch order.
    pub fn subscriber_names(&self, kind: EventKind) -> Vec<String> {
        self.entries
            .read()
            .get(&kind)
            .map(|list| list.iter().map(|e| e.subscriber.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Total number of (kind, subscriber) registrations.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Arc<dyn Subscriber>> {
        self.entries
            .read()
            .get(&kind)
            .map(|list| list.iter().map(|e| Arc::clone(&e.subscriber)).collect())
            .unwrap_or_default()
    }

    /// Broadcast an event.
    ///
    /// Returns `Handled` if a subscriber stopped propagation, `Continue` otherwise
    /// (including when nobody is registered for the kind).
    pub async fn dispatch(&self, event: &Event) -> HookOutcome {
        let subscribers = self.snapshot(event.kind);
        if subscribers.is_empty() {
            debug!("No subscribers for {}", event.kind);
            return HookOutcome::Continue;
        }

        for subscriber in subscribers {
            let result = AssertUnwindSafe(subscriber.on_event(event))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(HookOutcome::Handled)) => {
                    debug!("{} handled by '{}'", event.kind, subscriber.name());
                    return HookOutcome::Handled;
                }
                Ok(Ok(HookOutcome::Continue)) => {}
                Ok(Err(e)) => {
                    warn!(
                        "Subscriber '{}' failed on {}: {:#}",
                        subscriber.name(),
                        event.kind,
                        e
                    );
                }
                Err(panic) => {
                    error!(
                        "Subscriber '{}' panicked on {}: {}",
                        subscriber.name(),
                        event.kind,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        HookOutcome::Continue
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let summary: HashMap<&EventKind, Vec<&str>> = entries
            .iter()
            .map(|(kind, list)| (kind, list.iter().map(|e| e.subscriber.name()).collect()))
            .collect();
        f.debug_struct("HookBus").field("entries", &summary).finish()
    }
}
