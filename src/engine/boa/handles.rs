use std::collections::HashMap;
use std::sync::Arc;

use boa_engine::JsObject;

use crate::engine::handle::{HandleId, ObjectHandle, ReleaseQueue};

/// Engine objects held by the host. A `JsObject` owned outside the heap is a GC root,
/// so an entry here keeps its object alive until the host drops the handle.
pub struct HandleTable {
    engine: u64,
    next: HandleId,
    objects: HashMap<HandleId, JsObject>,
    released: Arc<ReleaseQueue>,
}

impl HandleTable {
    pub fn new(engine: u64) -> HandleTable {
        HandleTable {
            engine,
            next: 1,
            objects: HashMap::new(),
            released: Arc::new(ReleaseQueue::default()),
        }
    }

    pub fn persist(&mut self, object: JsObject) -> ObjectHandle {
        let id = self.next;
        self.next += 1;
        self.objects.insert(id, object);
        ObjectHandle::new(self.engine, id, Arc::downgrade(&self.released))
    }

    /// `None` for handles of other engines.
    pub fn get(&self, handle: &ObjectHandle) -> Option<JsObject> {
        if handle.engine_id() != self.engine {
            return None;
        }
        self.get_id(handle.id())
    }

    pub fn get_id(&self, id: HandleId) -> Option<JsObject> {
        self.objects.get(&id).cloned()
    }

    /// Drops entries whose handles the host has dropped. Returns how many were released.
    pub fn collect_released(&mut self) -> usize {
        let ids = self.released.drain();
        let mut count = 0;
        for id in ids {
            if self.objects.remove(&id).is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}
