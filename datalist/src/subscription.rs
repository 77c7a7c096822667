use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::DataListUpdate;

/// A collection that wants to hear about changes to a data list source.
pub trait UpdateListener: Send + Sync {
    fn on_update(&self, update: DataListUpdate);
}

impl<F> UpdateListener for F
where
    F: Fn(DataListUpdate) + Send + Sync,
{
    fn on_update(&self, update: DataListUpdate) {
        self(update)
    }
}

/// A registration handle returned by `subscribe`.
///
/// The listener stays registered for as long as this handle is alive. Dropping it (or calling
/// [`Subscription::unsubscribe`]) removes the listener.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(on_drop: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// A subscription that owns nothing. Useful for sources that never change.
    pub fn detached() -> Self {
        Self { on_drop: None }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_drop.is_some())
            .finish()
    }
}

struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Arc<dyn UpdateListener>)>,
}

/// The listener registry owned by a source.
///
/// Listeners are held strongly until their [`Subscription`] is dropped. Posting snapshots the
/// listener list first, so listeners may subscribe or unsubscribe from inside `on_update`.
#[derive(Clone)]
pub struct UpdateHub {
    registry: Arc<Mutex<Registry>>,
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateHub {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id = registry.next_id.wrapping_add(1);
            registry.listeners.push((id, listener));
            id
        };
        dtrace!(id, "UpdateHub::subscribe");

        let registry: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().listeners.retain(|(other, _)| *other != id);
                dtrace!(id, "UpdateHub::unsubscribe");
            }
        })
    }

    pub fn post(&self, update: DataListUpdate) {
        let listeners: Vec<Arc<dyn UpdateListener>> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.on_update(update);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for UpdateHub {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpdateHub")
            .field("listeners", &self.len())
            .finish()
    }
}
