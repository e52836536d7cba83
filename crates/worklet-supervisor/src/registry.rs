//! Process-wide map enforcing at most one running worklet per logical
//! identifier.
//!
//! The registry is an explicit service object injected into every worklet
//! at creation, not a hidden singleton. Entries are non-owning: the
//! registry tracks the active instance without keeping it alive, so
//! dropping the last handle to a worklet still tears it down. The lock
//! guards only the map; native termination always happens outside the
//! lock, since termination itself comes back through [`Registry::remove`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::worklet::Worklet;

#[derive(Default)]
pub struct Registry {
    slots: Mutex<HashMap<String, Weak<Worklet>>>,
}

impl Registry {
    pub fn new() -> Arc<Registry> {
        Arc::new(Registry::default())
    }

    /// Installs `worklet` as the active instance for `id` and returns the
    /// evicted predecessor, if it is still alive. The caller terminates
    /// the predecessor after this returns.
    pub(crate) fn install(&self, id: &str, worklet: &Arc<Worklet>) -> Option<Arc<Worklet>> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .insert(id.to_string(), Arc::downgrade(worklet))
            .and_then(|previous| previous.upgrade())
    }

    /// Removes the mapping for `id`, but only while `worklet` is still the
    /// occupant. A worklet already evicted by a successor must not remove
    /// the successor's entry.
    pub(crate) fn remove(&self, id: &str, worklet: &Worklet) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(current) = slots.get(id) {
            if std::ptr::eq(current.as_ptr(), worklet as *const Worklet) {
                slots.remove(id);
            }
        }
    }

    /// The currently active worklet for `id`, if any.
    pub fn current(&self, id: &str) -> Option<Arc<Worklet>> {
        self.slots.lock().unwrap().get(id).and_then(Weak::upgrade)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
