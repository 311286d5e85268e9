use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::value::HostId;

/// A table of host objects that are visible to script.
///
/// Proxies only carry a [`HostId`], so the host needs somewhere to keep the real object
/// alive until the engine reports the proxy collected (through [`super::HostObjects::remove`]).
/// Ids are handed out in increasing order and never reused.
pub struct KeepAlive<T> {
    inner: Mutex<KeepAliveInner<T>>,
}

struct KeepAliveInner<T> {
    next: i32,
    slots: HashMap<HostId, T>,
}

impl<T> KeepAlive<T> {
    pub fn new() -> KeepAlive<T> {
        KeepAlive {
            inner: Mutex::new(KeepAliveInner { next: 1, slots: HashMap::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<KeepAliveInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, obj: T) -> HostId {
        let mut inner = self.lock();
        let id = HostId(inner.next);
        // TODO: ids wrap after 2^31 inserts; reuse freed slots if a host ever gets there.
        inner.next = inner.next.wrapping_add(1);
        inner.slots.insert(id, obj);
        id
    }

    pub fn get(&self, id: HostId) -> Option<T> where T: Clone {
        self.lock().slots.get(&id).cloned()
    }

    pub fn with<F, R>(&self, id: HostId, f: F) -> Option<R> where F: FnOnce(&T) -> R {
        self.lock().slots.get(&id).map(f)
    }

    pub fn remove(&self, id: HostId) -> Option<T> {
        self.lock().slots.remove(&id)
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.lock().slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for KeepAlive<T> {
    fn default() -> KeepAlive<T> {
        KeepAlive::new()
    }
}
