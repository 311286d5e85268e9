use std::fmt;
use std::mem;
use std::sync::{Mutex, PoisonError, Weak};

pub type HandleId = u64;

/// A persistent handle to an engine object, held by the host.
///
/// The engine keeps the object alive for as long as the handle exists. Dropping the handle
/// can happen on any thread, so it only queues the release; the engine thread removes
/// the entry before it runs its next request. A handle that outlives its engine is inert.
pub struct ObjectHandle {
    engine: u64,
    id: HandleId,
    released: Weak<ReleaseQueue>,
}

impl ObjectHandle {
    pub(crate) fn new(engine: u64, id: HandleId, released: Weak<ReleaseQueue>) -> ObjectHandle {
        ObjectHandle { engine, id, released }
    }

    /// The id of the engine this object lives in.
    pub fn engine_id(&self) -> u64 {
        self.engine
    }

    pub fn id(&self) -> HandleId {
        self.id
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if let Some(queue) = self.released.upgrade() {
            queue.push(self.id);
        }
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &ObjectHandle) -> bool {
        self.engine == other.engine && self.id == other.id
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectHandle({}:{})", self.engine, self.id)
    }
}

/// Handle ids dropped by the host and not yet released by the engine thread.
#[derive(Default)]
pub struct ReleaseQueue {
    pending: Mutex<Vec<HandleId>>,
}

impl ReleaseQueue {
    pub fn push(&self, id: HandleId) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).push(id);
    }

    pub fn drain(&self) -> Vec<HandleId> {
        mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
