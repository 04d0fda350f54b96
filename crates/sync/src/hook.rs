use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use taller_core::{CallbackId, SubscriptionHandle, Topic, wire::decode_payload};

use crate::bridge::Bridge;
use crate::registry::CallbackRegistry;

/// Registration lifecycle of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// Nothing registered yet (deferred hooks start here).
    Idle,
    /// `pending` registrations are in flight. `previous` is the handle to
    /// release once the next one lands.
    Registering {
        previous: Option<SubscriptionHandle>,
        pending: usize,
    },
    Active(SubscriptionHandle),
    /// Torn down; nothing more will be registered.
    Released,
}

/// A push subscription to one topic, exposing the latest snapshot.
///
/// Changing the topic registers a fresh subscription first and releases the
/// old handle only when the new one is confirmed, so interest never lapses.
/// Pushes are consumed through [`poll`](Self::poll); only the most recent one
/// since the previous poll is kept.
pub struct SubscriptionHook<T, B>
where
    T: DeserializeOwned,
    B: Bridge + Clone + 'static,
{
    topic: Topic,
    callback: CallbackId,
    bridge: B,
    registry: CallbackRegistry,
    state: HookState,
    snapshot: Option<T>,
}

impl<T, B> SubscriptionHook<T, B>
where
    T: DeserializeOwned,
    B: Bridge + Clone + 'static,
{
    /// Opens the hook and starts registering immediately.
    pub fn open(topic: Topic, bridge: B, registry: CallbackRegistry) -> Self {
        let mut hook = Self::deferred(topic, bridge, registry);
        hook.register();
        hook
    }

    /// Creates the hook without registering; the first
    /// [`set_parameters`](Self::set_parameters) does.
    pub fn deferred(topic: Topic, bridge: B, registry: CallbackRegistry) -> Self {
        let callback = registry.register();
        Self {
            topic,
            callback,
            bridge,
            registry,
            state: HookState::Idle,
            snapshot: None,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    /// Latest pushed snapshot. `None` before the first push, or when the
    /// storage side reported the value as absent.
    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// Re-targets the hook. Setting the current topic again on a registered
    /// hook does nothing.
    pub fn set_parameters(&mut self, topic: Topic) {
        if self.state == HookState::Released {
            warn!(callback = ?self.callback, "parameters set on a released hook");
            return;
        }
        if topic == self.topic && self.state != HookState::Idle {
            return;
        }
        self.topic = topic;
        self.register();
    }

    /// Drains the mailbox: applies registration replies, then decodes the
    /// latest push. Returns true if the snapshot was replaced.
    pub fn poll(&mut self) -> bool {
        let mail = self.registry.take_mail(self.callback);
        for handle in mail.registered {
            self.on_registered(handle);
        }
        let Some(payload) = mail.latest else {
            return false;
        };
        match decode_payload::<T>(&payload) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                true
            }
            Err(e) => {
                warn!(callback = ?self.callback, "undecodable push ignored: {e}");
                false
            }
        }
    }

    /// Releases everything this hook holds. Registrations still in flight are
    /// handed to the registry, which releases them as their replies land.
    pub fn teardown(&mut self) {
        if self.state == HookState::Released {
            return;
        }
        for handle in self.registry.take_mail(self.callback).registered {
            self.on_registered(handle);
        }
        match self.state {
            HookState::Active(handle) => {
                self.release(handle);
                self.registry.unregister(self.callback);
            }
            HookState::Registering { previous, pending } => {
                if let Some(handle) = previous {
                    self.release(handle);
                }
                let mut bridge = self.bridge.clone();
                let callback = self.callback;
                self.registry.orphan(
                    callback,
                    pending,
                    Box::new(move |handle| {
                        if let Err(e) = bridge.unsubscribe(handle) {
                            warn!(?callback, ?handle, "late release failed: {e}");
                        }
                    }),
                );
                debug!(?callback, pending, "teardown deferred until registrations resolve");
            }
            HookState::Idle | HookState::Released => self.registry.unregister(self.callback),
        }
        self.state = HookState::Released;
    }

    fn register(&mut self) {
        if let Err(e) = self.bridge.subscribe(&self.topic, self.callback) {
            warn!(callback = ?self.callback, topic = ?self.topic, "subscribe failed: {e}");
            return;
        }
        let next = match self.state {
            HookState::Idle => HookState::Registering {
                previous: None,
                pending: 1,
            },
            HookState::Registering { previous, pending } => HookState::Registering {
                previous,
                pending: pending + 1,
            },
            HookState::Active(handle) => HookState::Registering {
                previous: Some(handle),
                pending: 1,
            },
            HookState::Released => HookState::Released,
        };
        self.state = next;
    }

    fn on_registered(&mut self, handle: SubscriptionHandle) {
        let next = match self.state {
            HookState::Registering { previous, pending } => {
                if let Some(old) = previous {
                    self.release(old);
                }
                if pending <= 1 {
                    debug!(callback = ?self.callback, ?handle, "subscription active");
                    HookState::Active(handle)
                } else {
                    HookState::Registering {
                        previous: Some(handle),
                        pending: pending - 1,
                    }
                }
            }
            HookState::Active(old) => {
                warn!(callback = ?self.callback, ?handle, "unexpected registration reply");
                self.release(old);
                HookState::Active(handle)
            }
            HookState::Idle | HookState::Released => {
                warn!(callback = ?self.callback, ?handle, "stray registration released");
                self.release(handle);
                self.state
            }
        };
        self.state = next;
    }

    fn release(&mut self, handle: SubscriptionHandle) {
        if let Err(e) = self.bridge.unsubscribe(handle) {
            warn!(callback = ?self.callback, ?handle, "release failed: {e}");
        }
    }
}

impl<T, B> Drop for SubscriptionHook<T, B>
where
    T: DeserializeOwned,
    B: Bridge + Clone + 'static,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use taller_core::{Expedient, ExpedientId, Inbound, SuggestionField, wire::encode_payload};

    use super::*;
    use crate::error::BridgeError;
    use crate::registry::Delivery;

    #[derive(Default)]
    struct Log {
        subscribed: Vec<(Topic, CallbackId)>,
        released: Vec<SubscriptionHandle>,
    }

    /// Records calls; replies are delivered by the test.
    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Log>>);

    impl Bridge for Recorder {
        fn subscribe(&mut self, topic: &Topic, callback: CallbackId) -> Result<(), BridgeError> {
            self.0.borrow_mut().subscribed.push((topic.clone(), callback));
            Ok(())
        }
        fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), BridgeError> {
            self.0.borrow_mut().released.push(handle);
            Ok(())
        }
        fn create_expedient(&mut self, _: &Expedient) -> Result<ExpedientId, BridgeError> {
            Err(BridgeError::Unavailable("not wired".into()))
        }
        fn update_expedient(&mut self, _: ExpedientId, _: &Expedient) -> Result<(), BridgeError> {
            Ok(())
        }
        fn delete_expedient(&mut self, _: ExpedientId) -> Result<(), BridgeError> {
            Ok(())
        }
        fn read_expedient(&mut self, _: ExpedientId) -> Result<Option<Expedient>, BridgeError> {
            Ok(None)
        }
    }

    fn topic(filter: &str) -> Topic {
        Topic::Suggestions {
            field: SuggestionField::Model,
            filter: filter.into(),
            limit: 8,
        }
    }

    fn h(raw: u64) -> SubscriptionHandle {
        SubscriptionHandle::from_raw(raw)
    }

    fn registered(callback: CallbackId, handle: SubscriptionHandle) -> Inbound {
        Inbound::Registered { callback, handle }
    }

    fn push(callback: CallbackId, values: &[&str]) -> Inbound {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        Inbound::Push {
            callback,
            payload: encode_payload(Some(&values)).unwrap(),
        }
    }

    #[test]
    fn reparameterizing_releases_old_handle_after_new_lands() {
        let bridge = Recorder::default();
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), bridge.clone(), registry.clone());
        let cb = hook.callback();

        registry.deliver(registered(cb, h(1)));
        hook.poll();
        assert_eq!(hook.state(), HookState::Active(h(1)));

        hook.set_parameters(topic("ab"));
        assert_eq!(bridge.0.borrow().subscribed.len(), 2);
        assert!(bridge.0.borrow().released.is_empty());

        registry.deliver(registered(cb, h(2)));
        hook.poll();
        assert_eq!(hook.state(), HookState::Active(h(2)));
        assert_eq!(bridge.0.borrow().released, vec![h(1)]);
    }

    #[test]
    fn same_parameters_do_not_resubscribe() {
        let bridge = Recorder::default();
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), bridge.clone(), registry);
        hook.set_parameters(topic("a"));
        assert_eq!(bridge.0.borrow().subscribed.len(), 1);
    }

    #[test]
    fn deferred_hook_waits_for_parameters() {
        let bridge = Recorder::default();
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::deferred(topic(""), bridge.clone(), registry);
        assert!(bridge.0.borrow().subscribed.is_empty());
        hook.set_parameters(topic(""));
        assert_eq!(bridge.0.borrow().subscribed.len(), 1);
    }

    #[test]
    fn latest_push_wins() {
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), Recorder::default(), registry.clone());
        let cb = hook.callback();
        registry.deliver(push(cb, &["one"]));
        registry.deliver(push(cb, &["two"]));
        assert!(hook.poll());
        assert_eq!(hook.snapshot(), Some(&vec!["two".to_string()]));
        assert!(!hook.poll());
    }

    #[test]
    fn undecodable_push_keeps_previous_snapshot() {
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), Recorder::default(), registry.clone());
        let cb = hook.callback();
        registry.deliver(push(cb, &["kept"]));
        hook.poll();
        registry.deliver(Inbound::Push {
            callback: cb,
            payload: vec![0xc1],
        });
        assert!(!hook.poll());
        assert_eq!(hook.snapshot(), Some(&vec!["kept".to_string()]));
    }

    #[test]
    fn teardown_during_registration_releases_on_arrival() {
        let bridge = Recorder::default();
        let registry = CallbackRegistry::new();
        let hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), bridge.clone(), registry.clone());
        let cb = hook.callback();
        drop(hook);
        assert!(bridge.0.borrow().released.is_empty());

        assert_eq!(registry.deliver(registered(cb, h(7))), Delivery::Released);
        assert_eq!(bridge.0.borrow().released, vec![h(7)]);
        assert!(registry.is_empty());
    }

    #[test]
    fn teardown_releases_active_handle() {
        let bridge = Recorder::default();
        let registry = CallbackRegistry::new();
        let mut hook: SubscriptionHook<Vec<String>, _> =
            SubscriptionHook::open(topic("a"), bridge.clone(), registry.clone());
        registry.deliver(registered(hook.callback(), h(3)));
        hook.poll();
        hook.teardown();
        assert_eq!(hook.state(), HookState::Released);
        assert_eq!(bridge.0.borrow().released, vec![h(3)]);
        assert!(registry.is_empty());

        hook.set_parameters(topic("b"));
        assert_eq!(bridge.0.borrow().subscribed.len(), 1);
    }
}
