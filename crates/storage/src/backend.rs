use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, instrument, warn};

use taller_core::{
    CallbackId, Expedient, ExpedientId, Fingerprint, IdSpace, Inbound, SubscriptionHandle,
    SuggestionField, TextFilter, Topic, wire::encode_payload,
};

use crate::error::StorageError;
use crate::hub::Hub;
use crate::sqlite::SqliteStore;
use crate::traits::Store;

/// The storage side of the invocation bridge.
///
/// Requests are answered synchronously; everything addressed to a callback
/// (registration replies and snapshot pushes) is queued in an outbox that the
/// transport drains and delivers later, in order.
pub struct Backend<S: Store = SqliteStore> {
    store: S,
    hub: Hub,
    outbox: VecDeque<Inbound>,
}

impl Backend<SqliteStore> {
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(SqliteStore::open_in_memory()?))
    }
}

impl<S: Store> Backend<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            hub: Hub::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscription_count(&self) -> usize {
        self.hub.len()
    }

    /// Registers interest in `topic`. Queues the registration reply followed
    /// by the current snapshot.
    #[instrument(skip(self))]
    pub fn subscribe(
        &mut self,
        topic: Topic,
        callback: CallbackId,
    ) -> Result<SubscriptionHandle, StorageError> {
        let handle = self.hub.subscribe(topic, callback);
        self.outbox.push_back(Inbound::Registered { callback, handle });
        self.push_snapshot(handle, true)?;
        debug!(?handle, "subscription registered");
        Ok(handle)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), StorageError> {
        match self.hub.release(handle) {
            Some(sub) => {
                debug!(?handle, callback = ?sub.callback, "subscription released");
                Ok(())
            }
            None => Err(StorageError::UnknownSubscription(handle.raw())),
        }
    }

    pub fn create_expedient(&mut self, expedient: &Expedient) -> Result<ExpedientId, StorageError> {
        let id = self.store.insert(IdSpace::Dynamic, expedient)?;
        info!(%id, "expedient created");
        self.notify(id)?;
        Ok(id)
    }

    /// Stores a legacy expedient in the ancient id space.
    pub fn import_ancient(&mut self, expedient: &Expedient) -> Result<ExpedientId, StorageError> {
        let id = self.store.insert(IdSpace::Ancient, expedient)?;
        info!(%id, "expedient imported");
        self.notify(id)?;
        Ok(id)
    }

    pub fn update_expedient(
        &mut self,
        id: ExpedientId,
        expedient: &Expedient,
    ) -> Result<(), StorageError> {
        self.store.put(id, expedient)?;
        debug!(%id, "expedient updated");
        self.notify(id)
    }

    /// Deleting an unknown expedient is a no-op.
    pub fn delete_expedient(&mut self, id: ExpedientId) -> Result<(), StorageError> {
        if self.store.remove(id)? {
            info!(%id, "expedient deleted");
            self.notify(id)?;
        } else {
            debug!(%id, "delete of missing expedient ignored");
        }
        Ok(())
    }

    pub fn read_expedient(&self, id: ExpedientId) -> Result<Option<Expedient>, StorageError> {
        self.store.get(id)
    }

    /// Distinct non-empty values of `field`, best filter matches first.
    pub fn suggestions(
        &self,
        field: SuggestionField,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        let filter = TextFilter::new(filter);
        let mut values = BTreeSet::new();
        for (_, expedient) in self.store.all()? {
            for value in field.values(&expedient) {
                if !value.trim().is_empty() {
                    values.insert(value.to_string());
                }
            }
        }
        let mut scored: Vec<(u32, String)> = values
            .into_iter()
            .map(|value| (filter.score(&value), value))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(scored.into_iter().take(limit).map(|(_, value)| value).collect())
    }

    /// Expedients matching `filter` on any text field, newest first.
    pub fn list(
        &self,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<(ExpedientId, Expedient)>, StorageError> {
        let filter = TextFilter::new(filter);
        Ok(self
            .store
            .all()?
            .into_iter()
            .filter(|(_, e)| {
                filter.is_empty()
                    || [&e.user, &e.model, &e.license_plate, &e.vin, &e.description]
                        .iter()
                        .any(|text| filter.score(text) > 0)
            })
            .take(limit)
            .collect())
    }

    pub fn drain_outbox(&mut self) -> Vec<Inbound> {
        self.outbox.drain(..).collect()
    }

    pub fn pop_outbox(&mut self) -> Option<Inbound> {
        self.outbox.pop_front()
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    fn notify(&mut self, changed: ExpedientId) -> Result<(), StorageError> {
        let affected = self.hub.affected_by(changed);
        let mut per_callback: BTreeMap<CallbackId, usize> = BTreeMap::new();
        for sub in affected.iter().filter_map(|handle| self.hub.get(*handle)) {
            *per_callback.entry(sub.callback).or_default() += 1;
        }
        // Handles ascend, so a callback that is switching subscriptions hears
        // its newest one last.
        for handle in affected {
            let Some(sub) = self.hub.get(handle) else {
                continue;
            };
            // Expedient subscribers always hear about writes, even unchanged
            // ones: the writer relies on that echo. A callback with several
            // subscriptions must hear all of them, or an older one would
            // have the last word.
            let force = matches!(sub.topic, Topic::Expedient(_))
                || per_callback.get(&sub.callback).is_some_and(|count| *count > 1);
            self.push_snapshot(handle, force)?;
        }
        Ok(())
    }

    fn push_snapshot(&mut self, handle: SubscriptionHandle, force: bool) -> Result<(), StorageError> {
        let Some(sub) = self.hub.get(handle) else {
            warn!(?handle, "snapshot requested for released subscription");
            return Ok(());
        };
        let (callback, topic) = (sub.callback, sub.topic.clone());
        let payload = self.snapshot(&topic)?;
        let fingerprint = Fingerprint::of(&payload)?;
        if let Some(sub) = self.hub.get_mut(handle) {
            if !force && sub.last_pushed == Some(fingerprint) {
                return Ok(());
            }
            sub.last_pushed = Some(fingerprint);
        }
        self.outbox.push_back(Inbound::Push { callback, payload });
        Ok(())
    }

    fn snapshot(&self, topic: &Topic) -> Result<Vec<u8>, StorageError> {
        Ok(match topic {
            Topic::Expedient(id) => encode_payload(self.store.get(*id)?.as_ref())?,
            Topic::Suggestions {
                field,
                filter,
                limit,
            } => encode_payload(Some(&self.suggestions(*field, filter, *limit)?))?,
            Topic::ExpedientList { filter, limit } => {
                encode_payload(Some(&self.list(filter, *limit)?))?
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taller_core::{UtcInstant, wire::decode_payload};

    fn expedient(user: &str, model: &str) -> Expedient {
        let mut e = Expedient::blank(UtcInstant::from_millis(0));
        e.user = user.into();
        e.model = model.into();
        e
    }

    fn pushes(backend: &mut Backend) -> Vec<(CallbackId, Vec<u8>)> {
        backend
            .drain_outbox()
            .into_iter()
            .filter_map(|msg| match msg {
                Inbound::Push { callback, payload } => Some((callback, payload)),
                Inbound::Registered { .. } => None,
            })
            .collect()
    }

    #[test]
    fn subscribe_replies_then_pushes_current_value() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let id = backend.create_expedient(&expedient("Joan", "Seat"))?;
        let callback = CallbackId::from_raw(7);
        let handle = backend.subscribe(Topic::Expedient(id), callback)?;

        let outbox = backend.drain_outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0], Inbound::Registered { callback, handle });
        match &outbox[1] {
            Inbound::Push { payload, .. } => {
                let snapshot: Option<Expedient> = decode_payload(payload)?;
                assert_eq!(snapshot.map(|e| e.user), Some("Joan".to_string()));
            }
            other => panic!("expected push, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn every_update_echoes_to_expedient_subscribers() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let id = backend.create_expedient(&expedient("Joan", "Seat"))?;
        backend.subscribe(Topic::Expedient(id), CallbackId::from_raw(1))?;
        backend.drain_outbox();

        let same = expedient("Joan", "Seat");
        backend.update_expedient(id, &same)?;
        backend.update_expedient(id, &same)?;
        assert_eq!(pushes(&mut backend).len(), 2);
        Ok(())
    }

    #[test]
    fn delete_pushes_absence() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let id = backend.create_expedient(&expedient("Joan", "Seat"))?;
        backend.subscribe(Topic::Expedient(id), CallbackId::from_raw(1))?;
        backend.drain_outbox();

        backend.delete_expedient(id)?;
        let pushed = pushes(&mut backend);
        assert_eq!(pushed.len(), 1);
        assert_eq!(decode_payload::<Expedient>(&pushed[0].1)?, None);

        backend.delete_expedient(id)?;
        assert!(pushes(&mut backend).is_empty());
        Ok(())
    }

    #[test]
    fn update_of_missing_expedient_fails() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let result = backend.update_expedient(ExpedientId::Dynamic(9), &expedient("x", "y"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn suggestion_pushes_skip_unchanged_lists() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let id = backend.create_expedient(&expedient("Joan", "Seat Ibiza"))?;
        backend.subscribe(
            Topic::Suggestions {
                field: SuggestionField::Model,
                filter: "seat".into(),
                limit: 5,
            },
            CallbackId::from_raw(2),
        )?;
        backend.drain_outbox();

        // User edits leave the model list unchanged.
        backend.update_expedient(id, &expedient("Joan Martí", "Seat Ibiza"))?;
        assert!(pushes(&mut backend).is_empty());

        backend.create_expedient(&expedient("Pere", "Seat Leon"))?;
        let pushed = pushes(&mut backend);
        assert_eq!(pushed.len(), 1);
        let list: Option<Vec<String>> = decode_payload(&pushed[0].1)?;
        assert_eq!(list, Some(vec!["Seat Ibiza".to_string(), "Seat Leon".to_string()]));
        Ok(())
    }

    #[test]
    fn switching_callback_hears_newest_subscription_last() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let id = backend.create_expedient(&expedient("Joan", ""))?;
        let cb = CallbackId::from_raw(4);
        let topic = |filter: &str| Topic::Suggestions {
            field: SuggestionField::User,
            filter: filter.into(),
            limit: 5,
        };
        backend.subscribe(topic("jo"), cb)?;
        backend.subscribe(topic("joan"), cb)?;
        backend.drain_outbox();

        // Only the older list changes, yet both are pushed, newest last.
        backend.update_expedient(id, &expedient("Joan Puig", ""))?;
        backend.create_expedient(&expedient("Jordi", ""))?;
        let pushed = pushes(&mut backend);
        let last: Option<Vec<String>> = decode_payload(&pushed[pushed.len() - 1].1)?;
        assert_eq!(last, Some(vec!["Joan Puig".to_string()]));
        assert!(pushed.iter().all(|(callback, _)| *callback == cb));
        Ok(())
    }

    #[test]
    fn suggestions_rank_and_limit() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        for user in ["Joana", "Joan", "Maria Joan", "Pere", ""] {
            backend.create_expedient(&expedient(user, ""))?;
        }
        assert_eq!(
            backend.suggestions(SuggestionField::User, "joan", 10)?,
            vec!["Joan", "Joana", "Maria Joan"]
        );
        assert_eq!(backend.suggestions(SuggestionField::User, "joan", 1)?, vec!["Joan"]);
        Ok(())
    }

    #[test]
    fn list_filters_and_limits() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        backend.create_expedient(&expedient("Joan", "Seat"))?;
        backend.create_expedient(&expedient("Pere", "Renault"))?;
        backend.import_ancient(&expedient("Anna", "Seat"))?;
        let seats = backend.list("seat", 10)?;
        assert_eq!(seats.len(), 2);
        assert!(seats.iter().any(|(id, _)| id.space() == IdSpace::Ancient));
        assert_eq!(backend.list("", 2)?.len(), 2);
        Ok(())
    }

    #[test]
    fn unsubscribe_unknown_handle_fails() -> Result<(), StorageError> {
        let mut backend = Backend::in_memory()?;
        let result = backend.unsubscribe(SubscriptionHandle::from_raw(3));
        assert!(matches!(result, Err(StorageError::UnknownSubscription(3))));
        Ok(())
    }
}
