use std::collections::BTreeMap;

use taller_core::{CallbackId, ExpedientId, Fingerprint, SubscriptionHandle, Topic};

#[derive(Debug, Clone)]
pub struct Subscription {
    pub topic: Topic,
    pub callback: CallbackId,
    /// Fingerprint of the last payload pushed, to skip unchanged list pushes.
    pub last_pushed: Option<Fingerprint>,
}

/// Live subscriptions, keyed by the handle given back to the subscriber.
#[derive(Debug, Default)]
pub struct Hub {
    next_handle: u64,
    subscriptions: BTreeMap<SubscriptionHandle, Subscription>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: Topic, callback: CallbackId) -> SubscriptionHandle {
        let handle = SubscriptionHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.subscriptions.insert(
            handle,
            Subscription {
                topic,
                callback,
                last_pushed: None,
            },
        );
        handle
    }

    pub fn release(&mut self, handle: SubscriptionHandle) -> Option<Subscription> {
        self.subscriptions.remove(&handle)
    }

    pub fn get(&self, handle: SubscriptionHandle) -> Option<&Subscription> {
        self.subscriptions.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SubscriptionHandle) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Handles whose snapshot may depend on `changed`: subscribers of that
    /// expedient plus every list-style subscription.
    pub fn affected_by(&self, changed: ExpedientId) -> Vec<SubscriptionHandle> {
        self.subscriptions
            .iter()
            .filter(|(_, sub)| match &sub.topic {
                Topic::Expedient(id) => *id == changed,
                Topic::Suggestions { .. } | Topic::ExpedientList { .. } => true,
            })
            .map(|(handle, _)| *handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taller_core::SuggestionField;

    #[test]
    fn handles_are_unique_and_releasable() {
        let mut hub = Hub::new();
        let a = hub.subscribe(Topic::Expedient(ExpedientId::Dynamic(0)), CallbackId::from_raw(1));
        let b = hub.subscribe(Topic::Expedient(ExpedientId::Dynamic(0)), CallbackId::from_raw(1));
        assert_ne!(a, b);
        assert_eq!(hub.len(), 2);
        assert!(hub.release(a).is_some());
        assert!(hub.release(a).is_none());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn affected_by_filters_other_expedients() {
        let mut hub = Hub::new();
        let mine = hub.subscribe(Topic::Expedient(ExpedientId::Dynamic(1)), CallbackId::from_raw(1));
        hub.subscribe(Topic::Expedient(ExpedientId::Ancient(1)), CallbackId::from_raw(2));
        let list = hub.subscribe(
            Topic::Suggestions {
                field: SuggestionField::User,
                filter: String::new(),
                limit: 5,
            },
            CallbackId::from_raw(3),
        );
        assert_eq!(hub.affected_by(ExpedientId::Dynamic(1)), vec![mine, list]);
    }
}
