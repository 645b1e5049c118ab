//! In-process change notification bus.
//!
//! Listeners are registered per [`ChangeTopic`] and run synchronously, in
//! registration order, on every `publish`. A panicking listener is logged and
//! skipped; the remaining listeners still run.

use armylist_types::ChangeTopic;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, trace};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Token identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: HashMap<ChangeTopic, Vec<(ListenerId, Listener)>>,
}

/// Publish/subscribe registry for change topics. Clones share listeners.
#[derive(Clone, Default)]
pub struct ChangeEmitter {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `topic`.
    pub fn subscribe<F>(&self, topic: ChangeTopic, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .topics
            .entry(topic)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Registers `listener` and returns a guard that unsubscribes on drop.
    pub fn subscribe_guarded<F>(&self, topic: ChangeTopic, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.subscribe(topic, listener);
        Subscription {
            emitter: self.clone(),
            topic,
            id,
        }
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, topic: ChangeTopic, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let Some(listeners) = registry.topics.get_mut(&topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            registry.topics.remove(&topic);
        }
        removed
    }

    /// Invokes every listener of `topic`.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// subscribe, unsubscribe or publish without deadlocking.
    pub fn publish(&self, topic: ChangeTopic) {
        let listeners: Vec<Listener> = self
            .lock()
            .topics
            .get(&topic)
            .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        trace!("Publishing {} to {} listeners", topic, listeners.len());

        for listener in listeners {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!("Change listener for {} panicked: {}", topic, msg);
            }
        }
    }

    /// Number of listeners registered for `topic`.
    pub fn listener_count(&self, topic: ChangeTopic) -> usize {
        self.lock().topics.get(&topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ChangeEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let counts: HashMap<_, _> = registry
            .topics
            .iter()
            .map(|(topic, ls)| (*topic, ls.len()))
            .collect();
        f.debug_struct("ChangeEmitter").field("listeners", &counts).finish()
    }
}

/// Unsubscribes its listener when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    emitter: ChangeEmitter,
    topic: ChangeTopic,
    id: ListenerId,
}

impl Subscription {
    pub fn topic(&self) -> ChangeTopic {
        self.topic
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.emitter.unsubscribe(self.topic, self.id);
    }
}
