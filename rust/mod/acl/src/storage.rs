use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Callback invoked with `(key, new_value)`; `None` means the key was removed.
pub type StorageListener = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// Handle returned by [`SessionStorage::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    key: String,
    listener: StorageListener,
}

/// String key/value storage shared by everything in the signed-in shell,
/// with per-key change listeners.
///
/// This is where the session lives (`user` → JSON). A login or logout from
/// another window writes here, and listeners registered by a
/// [`PermissionSession`](crate::lifecycle::PermissionSession) pick it up.
pub struct SessionStorage {
    values: RwLock<BTreeMap<String, String>>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    /// Store a value and notify listeners of `key`.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            values.insert(key.to_string(), value.clone());
        }
        self.notify(key, Some(&value));
    }

    /// Remove a value; listeners are notified only if it existed.
    pub fn remove(&self, key: &str) -> Option<String> {
        let old = {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            values.remove(key)
        };
        if old.is_some() {
            self.notify(key, None);
        }
        old
    }

    pub fn contains(&self, key: &str) -> bool {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.contains_key(key)
    }

    /// Register a listener for changes to `key`.
    pub fn subscribe<F>(&self, key: &str, listener: F) -> ListenerId
    where
        F: Fn(&str, Option<&str>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.push(ListenerEntry {
            id,
            key: key.to_string(),
            listener: Arc::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|e| e.id != id);
        listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        // Snapshot the matching callbacks so a listener may (un)subscribe.
        let matching: Vec<StorageListener> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            listeners
                .iter()
                .filter(|e| e.key == key)
                .map(|e| Arc::clone(&e.listener))
                .collect()
        };
        for listener in matching {
            listener(key, value);
        }
    }
}

impl Default for SessionStorage {
    fn default() -> Self {
        Self::new()
    }
}
