use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, error};

use taller_core::{CallbackId, Inbound, SubscriptionHandle};

/// Releases a subscription handle on behalf of a hook that no longer exists.
pub type ReleaseFn = Box<dyn FnMut(SubscriptionHandle)>;

/// Messages waiting for a live hook.
#[derive(Debug, Default)]
pub struct Mail {
    /// Most recent push; older ones are superseded.
    pub latest: Option<Vec<u8>>,
    /// Registration replies in arrival order.
    pub registered: VecDeque<SubscriptionHandle>,
}

enum Slot {
    Live(Mail),
    /// The hook was torn down while `pending` registrations were in flight.
    /// Each one is released as soon as its reply lands.
    PendingTeardown { pending: usize, release: ReleaseFn },
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for a live hook.
    Routed,
    /// A late registration reply of a torn-down hook; its handle was released.
    Released,
    /// A push for a torn-down hook that still waits on registrations.
    Discarded,
    /// No callback with that id: a protocol violation.
    Unrouted,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    slots: BTreeMap<CallbackId, Slot>,
    violations: u64,
}

/// Maps callback ids to the hooks that own them.
///
/// One registry is shared by every hook of a window; it lives exactly as
/// long as its last clone. Single-threaded: clones share state through `Rc`.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Rc<RefCell<RegistryState>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> CallbackId {
        let mut inner = self.inner.borrow_mut();
        let id = CallbackId::from_raw(inner.next_id);
        inner.next_id += 1;
        inner.slots.insert(id, Slot::Live(Mail::default()));
        id
    }

    pub fn unregister(&self, callback: CallbackId) {
        self.inner.borrow_mut().slots.remove(&callback);
    }

    pub fn is_registered(&self, callback: CallbackId) -> bool {
        self.inner.borrow().slots.contains_key(&callback)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of messages that arrived for unknown callbacks.
    pub fn violations(&self) -> u64 {
        self.inner.borrow().violations
    }

    pub fn deliver(&self, message: Inbound) -> Delivery {
        let callback = message.callback();
        let slot = self.inner.borrow_mut().slots.remove(&callback);
        match slot {
            None => {
                self.inner.borrow_mut().violations += 1;
                error!(?callback, "inbound message for a callback that is not registered");
                Delivery::Unrouted
            }
            Some(Slot::Live(mut mail)) => {
                match message {
                    Inbound::Registered { handle, .. } => mail.registered.push_back(handle),
                    Inbound::Push { payload, .. } => mail.latest = Some(payload),
                }
                self.inner.borrow_mut().slots.insert(callback, Slot::Live(mail));
                Delivery::Routed
            }
            Some(Slot::PendingTeardown {
                mut pending,
                mut release,
            }) => {
                let delivery = match message {
                    Inbound::Registered { handle, .. } => {
                        debug!(?callback, ?handle, "releasing late registration");
                        // The registry is not borrowed here, so the release
                        // may call back into it.
                        release(handle);
                        pending = pending.saturating_sub(1);
                        Delivery::Released
                    }
                    Inbound::Push { .. } => Delivery::Discarded,
                };
                if pending > 0 {
                    self.inner
                        .borrow_mut()
                        .slots
                        .insert(callback, Slot::PendingTeardown { pending, release });
                }
                delivery
            }
        }
    }

    /// Takes everything queued for `callback`. Empty for unknown or torn-down callbacks.
    pub fn take_mail(&self, callback: CallbackId) -> Mail {
        match self.inner.borrow_mut().slots.get_mut(&callback) {
            Some(Slot::Live(mail)) => std::mem::take(mail),
            _ => Mail::default(),
        }
    }

    /// Hands `pending` in-flight registrations of a dead hook to the registry.
    /// With nothing pending the callback is simply unregistered.
    pub fn orphan(&self, callback: CallbackId, pending: usize, release: ReleaseFn) {
        let mut inner = self.inner.borrow_mut();
        if pending == 0 {
            inner.slots.remove(&callback);
        } else {
            inner
                .slots
                .insert(callback, Slot::PendingTeardown { pending, release });
        }
    }
}
