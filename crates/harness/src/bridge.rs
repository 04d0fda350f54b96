use std::cell::RefCell;
use std::rc::Rc;

use taller_core::{CallbackId, Expedient, ExpedientId, SubscriptionHandle, Topic};
use taller_storage::{Backend, StorageError};
use taller_sync::{Bridge, BridgeError};

#[derive(Default)]
struct Calls {
    subscribes: usize,
    unsubscribes: usize,
    update_attempts: usize,
    updates: Vec<(ExpedientId, Expedient)>,
    deletes: usize,
    failing_updates: usize,
}

/// In-process bridge straight into a [`Backend`].
///
/// Records every call so tests can count outbound traffic, and can be told
/// to fail upcoming updates. Clones share the backend and the call log.
#[derive(Clone)]
pub struct LocalBridge {
    backend: Rc<RefCell<Backend>>,
    calls: Rc<RefCell<Calls>>,
}

impl LocalBridge {
    pub fn new(backend: Rc<RefCell<Backend>>) -> Self {
        Self {
            backend,
            calls: Rc::new(RefCell::new(Calls::default())),
        }
    }

    /// The next `count` update calls fail without reaching the backend.
    pub fn fail_next_updates(&self, count: usize) {
        self.calls.borrow_mut().failing_updates = count;
    }

    /// Updates that reached the backend, oldest first.
    pub fn updates(&self) -> Vec<(ExpedientId, Expedient)> {
        self.calls.borrow().updates.clone()
    }

    pub fn update_count(&self) -> usize {
        self.calls.borrow().updates.len()
    }

    /// Every update call, failed ones included.
    pub fn update_attempts(&self) -> usize {
        self.calls.borrow().update_attempts
    }

    pub fn subscribe_count(&self) -> usize {
        self.calls.borrow().subscribes
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.calls.borrow().unsubscribes
    }

    pub fn delete_count(&self) -> usize {
        self.calls.borrow().deletes
    }

    pub fn reset_counts(&self) {
        let failing = self.calls.borrow().failing_updates;
        *self.calls.borrow_mut() = Calls {
            failing_updates: failing,
            ..Calls::default()
        };
    }
}

fn rejected(e: StorageError) -> BridgeError {
    BridgeError::Rejected(e.to_string())
}

impl Bridge for LocalBridge {
    fn subscribe(&mut self, topic: &Topic, callback: CallbackId) -> Result<(), BridgeError> {
        self.calls.borrow_mut().subscribes += 1;
        self.backend
            .borrow_mut()
            .subscribe(topic.clone(), callback)
            .map(|_| ())
            .map_err(rejected)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), BridgeError> {
        self.calls.borrow_mut().unsubscribes += 1;
        self.backend.borrow_mut().unsubscribe(handle).map_err(rejected)
    }

    fn create_expedient(&mut self, expedient: &Expedient) -> Result<ExpedientId, BridgeError> {
        self.backend
            .borrow_mut()
            .create_expedient(expedient)
            .map_err(rejected)
    }

    fn update_expedient(&mut self, id: ExpedientId, expedient: &Expedient) -> Result<(), BridgeError> {
        {
            let mut calls = self.calls.borrow_mut();
            calls.update_attempts += 1;
            if calls.failing_updates > 0 {
                calls.failing_updates -= 1;
                return Err(BridgeError::Unavailable("injected failure".into()));
            }
            calls.updates.push((id, expedient.clone()));
        }
        self.backend
            .borrow_mut()
            .update_expedient(id, expedient)
            .map_err(rejected)
    }

    fn delete_expedient(&mut self, id: ExpedientId) -> Result<(), BridgeError> {
        self.calls.borrow_mut().deletes += 1;
        self.backend.borrow_mut().delete_expedient(id).map_err(rejected)
    }

    fn read_expedient(&mut self, id: ExpedientId) -> Result<Option<Expedient>, BridgeError> {
        self.backend.borrow().read_expedient(id).map_err(rejected)
    }
}
