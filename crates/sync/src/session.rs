use std::collections::BTreeMap;

use tracing::{debug, error, info, instrument, warn};

use taller_core::{
    Clock, CoreError, Expedient, ExpedientId, FieldPath, FieldValue, Order, SuggestionField,
    Topic, first_name,
};

use crate::bridge::Bridge;
use crate::caret::{CaretContainer, HistoryBinding};
use crate::config::SessionConfig;
use crate::error::{BridgeError, SyncError};
use crate::history::History;
use crate::hook::SubscriptionHook;
use crate::keys::{HistoryCommand, KeyBindings, KeyChord};
use crate::reconcile::{LocalOutcome, Reconciler, RemoteOutcome};
use crate::registry::CallbackRegistry;

/// Notifications for the tab hosting the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TitleChanged(String),
    /// The expedient is gone; the tab should close. Emitted once.
    Closed,
    /// An update failed even after retrying. Nothing was lost locally.
    BackendFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The field already held that value; nothing was sent.
    Unchanged,
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the first snapshot.
    Loading,
    Open,
    Closed,
}

struct SuggestionSlot<B: Bridge + Clone + 'static> {
    hook: SubscriptionHook<Vec<String>, B>,
    /// Text the hook was last parameterized with.
    filter: String,
    /// Field last typed into. `None` until the first edit.
    source: Option<FieldPath>,
}

impl<B: Bridge + Clone + 'static> SuggestionSlot<B> {
    /// What the edited field holds in `draft` right now.
    fn live_text(&self, draft: &Expedient) -> Option<String> {
        self.source?.read(draft).ok()?.as_text().map(str::to_string)
    }
}

/// The editor of one expedient.
///
/// Owns the draft. Every mutation goes through [`update`](Self::update) or
/// one of the order helpers, is recorded in the undo history, and is
/// reconciled against the pushed remote snapshot. Call [`poll`](Self::poll)
/// once per tick to consume pushes and re-evaluate derived state.
pub struct EditorSession<B: Bridge + Clone + 'static> {
    id: ExpedientId,
    bridge: B,
    config: SessionConfig,
    bindings: KeyBindings,
    clock: Box<dyn Clock>,
    remote: SubscriptionHook<Expedient, B>,
    reconciler: Reconciler<Expedient>,
    draft: Option<Expedient>,
    phase: Phase,
    title: String,
    suggestions: BTreeMap<SuggestionField, SuggestionSlot<B>>,
    history: History<Expedient>,
    carets: HistoryBinding,
    events: Vec<SessionEvent>,
    blocking_error: Option<BridgeError>,
}

impl<B: Bridge + Clone + 'static> EditorSession<B> {
    #[instrument(skip_all, fields(%id))]
    pub fn open(
        id: ExpedientId,
        bridge: B,
        registry: CallbackRegistry,
        clock: Box<dyn Clock>,
        config: SessionConfig,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let bindings = KeyBindings::from_config(&config)?;
        let remote = SubscriptionHook::open(Topic::Expedient(id), bridge.clone(), registry.clone());
        let suggestions = SuggestionField::ALL
            .into_iter()
            .map(|field| {
                let topic = Topic::Suggestions {
                    field,
                    filter: String::new(),
                    limit: config.suggestion_limit,
                };
                let hook = SubscriptionHook::deferred(topic, bridge.clone(), registry.clone());
                (
                    field,
                    SuggestionSlot {
                        hook,
                        filter: String::new(),
                        source: None,
                    },
                )
            })
            .collect();
        let history =
            History::new(config.history_capacity).with_coalescing(config.history_coalesce_ms);
        info!("editor session opened");
        Ok(Self {
            id,
            bridge,
            title: config.placeholder_title.clone(),
            config,
            bindings,
            clock,
            remote,
            reconciler: Reconciler::new(),
            draft: None,
            phase: Phase::Loading,
            suggestions,
            history,
            carets: HistoryBinding::new(),
            events: Vec::new(),
            blocking_error: None,
        })
    }

    pub fn id(&self) -> ExpedientId {
        self.id
    }

    pub fn draft(&self) -> Option<&Expedient> {
        self.draft.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// The last unrecoverable update failure, until dismissed.
    pub fn blocking_error(&self) -> Option<&BridgeError> {
        self.blocking_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.blocking_error = None;
    }

    pub fn history(&self) -> &History<Expedient> {
        &self.history
    }

    /// One reactive tick. Returns true if a remote snapshot was consumed.
    pub fn poll(&mut self) -> bool {
        if self.phase == Phase::Closed {
            return false;
        }

        let pushed = self.remote.poll();
        if pushed {
            self.on_remote();
        }

        for slot in self.suggestions.values_mut() {
            slot.hook.poll();
        }

        if self.phase == Phase::Open {
            self.evaluate();
        }
        pushed
    }

    /// Writes `value` into the field at `path`. Writing the value the field
    /// already holds changes nothing.
    pub fn update(
        &mut self,
        value: impl Into<FieldValue>,
        path: &FieldPath,
    ) -> Result<UpdateOutcome, SyncError> {
        let value = value.into();
        let current = self.loaded()?;
        if path.read(current)? == value {
            return Ok(UpdateOutcome::Unchanged);
        }
        let mut next = current.clone();
        path.write(&mut next, value)?;

        if let Some(slot) = path
            .suggestion_field()
            .and_then(|field| self.suggestions.get_mut(&field))
        {
            slot.source = Some(*path);
        }

        debug!(id = %self.id, %path, "field updated");
        self.commit(next)?;
        Ok(UpdateOutcome::Applied)
    }

    /// Appends a blank order and returns its index.
    pub fn create_order(&mut self) -> Result<usize, SyncError> {
        let mut next = self.loaded()?.clone();
        next.orders.push(Order::blank(self.clock.now()));
        let index = next.orders.len() - 1;
        self.commit(next)?;
        Ok(index)
    }

    /// Removes an order. Removing the last one leaves a single blank order.
    pub fn delete_order(&mut self, index: usize) -> Result<(), SyncError> {
        let mut next = self.loaded()?.clone();
        if index >= next.orders.len() {
            return Err(CoreError::OrderIndexOutOfRange {
                index,
                len: next.orders.len(),
            }
            .into());
        }
        next.orders.remove(index);
        next.ensure_orders(self.clock.now());
        self.commit(next)
    }

    /// Asks the backend to delete the expedient. The session closes when
    /// the deletion is pushed back, not here.
    pub fn delete_self(&mut self) -> Result<(), SyncError> {
        if self.phase == Phase::Closed {
            return Err(SyncError::Closed(self.id));
        }
        self.bridge.delete_expedient(self.id)?;
        info!(id = %self.id, "deletion requested");
        Ok(())
    }

    /// Autocomplete candidates for `field`, without the value the field
    /// holds now.
    pub fn suggestions(&self, field: SuggestionField) -> Vec<String> {
        let Some(slot) = self.suggestions.get(&field) else {
            return Vec::new();
        };
        let current = self
            .draft
            .as_ref()
            .and_then(|draft| slot.live_text(draft))
            .unwrap_or_else(|| slot.filter.clone());
        slot.hook
            .snapshot()
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|candidate| **candidate != current)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Steps back one edit. Returns false at the oldest instant.
    pub fn undo(&mut self) -> Result<bool, SyncError> {
        self.loaded()?;
        let Some(restore) = self.history.undo() else {
            return Ok(false);
        };
        self.commit(restore.data)?;
        if let Some(caret) = restore.caret {
            self.carets.restore(&caret);
        }
        Ok(true)
    }

    /// Re-applies an undone edit. Returns false at the newest instant.
    pub fn redo(&mut self) -> Result<bool, SyncError> {
        self.loaded()?;
        let Some(restore) = self.history.redo() else {
            return Ok(false);
        };
        self.commit(restore.data)?;
        if let Some(caret) = restore.caret {
            self.carets.restore(&caret);
        }
        Ok(true)
    }

    /// Runs the history command bound to `chord`. Inactive tabs ignore chords.
    pub fn handle_chord(&mut self, chord: &KeyChord, tab_active: bool) -> Result<bool, SyncError> {
        if !tab_active {
            return Ok(false);
        }
        match self.bindings.command_for(chord) {
            Some(HistoryCommand::Undo) => self.undo(),
            Some(HistoryCommand::Redo) => self.redo(),
            None => Ok(false),
        }
    }

    pub fn bind_history_container(&mut self, container: Box<dyn CaretContainer>) {
        self.carets.bind_container(container);
    }

    pub fn unbind_history_container(&mut self) {
        self.carets.unbind_container();
    }

    /// Notes where the caret is now; the next edit records it as its "before".
    pub fn record_caret(&mut self) {
        self.carets.record();
    }

    fn loaded(&self) -> Result<&Expedient, SyncError> {
        match (&self.phase, &self.draft) {
            (Phase::Closed, _) => Err(SyncError::Closed(self.id)),
            (_, Some(draft)) => Ok(draft),
            (_, None) => Err(SyncError::NotLoaded(self.id)),
        }
    }

    fn on_remote(&mut self) {
        let incoming = self.remote.snapshot().cloned();
        match self.reconciler.on_remote(incoming.as_ref(), self.draft.as_ref()) {
            Ok(RemoteOutcome::Deleted) => self.close(),
            Ok(RemoteOutcome::Echo) => debug!(id = %self.id, "echo acknowledged"),
            Ok(RemoteOutcome::Resend) => self.send(),
            Ok(RemoteOutcome::Overwrite) => {
                let Some(value) = incoming else {
                    return;
                };
                self.phase = Phase::Open;
                // A remote snapshot is its own instant, never folded into a
                // local edit.
                self.history.seal();
                if let Err(e) = self.commit(value) {
                    warn!(id = %self.id, "remote snapshot not applied: {e}");
                }
                self.history.seal();
            }
            Err(e) => warn!(id = %self.id, "remote snapshot not reconciled: {e}"),
        }
    }

    /// Re-derives time-dependent state. Changes flow out like any edit.
    fn evaluate(&mut self) {
        let Some(draft) = &self.draft else {
            return;
        };
        let now = self.clock.now();
        let mut next = draft.clone();
        let inserted = next.ensure_orders(now);
        let promoted = next.promote_awaiting(now);
        if !inserted && promoted == 0 {
            return;
        }
        debug!(id = %self.id, promoted, inserted, "derived state changed");
        if let Err(e) = self.commit(next) {
            warn!(id = %self.id, "derived change not applied: {e}");
        }
    }

    /// Replaces the draft and lets history, title and reconciler react.
    fn commit(&mut self, next: Expedient) -> Result<(), SyncError> {
        let caret_after = self.carets.current();
        self.history.observe(
            &next,
            self.carets.last(),
            caret_after.clone(),
            self.clock.now(),
        )?;
        self.carets.set_last(caret_after);

        self.draft = Some(next);
        self.refresh_title();
        self.sync_suggestions();

        match self.reconciler.on_local(self.draft.as_ref())? {
            LocalOutcome::Send => self.send(),
            LocalOutcome::Deferred => debug!(id = %self.id, "edit deferred until echo"),
            LocalOutcome::Ignored | LocalOutcome::Unchanged => {}
        }
        Ok(())
    }

    fn send(&mut self) {
        let Some(draft) = &self.draft else {
            return;
        };
        let attempts = 1 + self.config.update_retries;
        let mut failure = None;
        for attempt in 1..=attempts {
            match self.bridge.update_expedient(self.id, draft) {
                Ok(()) => return,
                Err(e) => {
                    warn!(id = %self.id, attempt, "update failed: {e}");
                    failure = Some(e);
                }
            }
        }
        if let Some(e) = failure {
            error!(id = %self.id, "update abandoned: {e}");
            self.reconciler.abandon_send();
            self.events.push(SessionEvent::BackendFailure(e.to_string()));
            self.blocking_error = Some(e);
        }
    }

    fn refresh_title(&mut self) {
        let Some(draft) = &self.draft else {
            return;
        };
        let title = derive_title(
            draft,
            &self.config.title_separator,
            &self.config.placeholder_title,
        );
        if title != self.title {
            self.title = title.clone();
            self.events.push(SessionEvent::TitleChanged(title));
        }
    }

    /// Keeps every typed-into suggestion list parameterized by its field's
    /// current text, whatever changed it.
    fn sync_suggestions(&mut self) {
        let Some(draft) = &self.draft else {
            return;
        };
        let limit = self.config.suggestion_limit;
        for (field, slot) in self.suggestions.iter_mut() {
            let Some(text) = slot.live_text(draft) else {
                continue;
            };
            if text == slot.filter {
                continue;
            }
            slot.hook.set_parameters(Topic::Suggestions {
                field: *field,
                filter: text.clone(),
                limit,
            });
            slot.filter = text;
        }
    }

    fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        info!(id = %self.id, "expedient gone, closing editor");
        self.phase = Phase::Closed;
        self.draft = None;
        self.history.clear();
        self.remote.teardown();
        for slot in self.suggestions.values_mut() {
            slot.hook.teardown();
        }
        self.events.push(SessionEvent::Closed);
    }
}

/// Tab title: the customer's first name followed by the titles of the open
/// orders, blanks skipped. `placeholder` when nothing is left.
pub fn derive_title(expedient: &Expedient, separator: &str, placeholder: &str) -> String {
    let parts: Vec<&str> = std::iter::once(first_name(&expedient.user))
        .chain(expedient.open_order_titles())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        placeholder.to_string()
    } else {
        parts.join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taller_core::{OrderState, UtcInstant};

    fn expedient(user: &str, orders: &[(&str, OrderState)]) -> Expedient {
        let mut e = Expedient::blank(UtcInstant::from_millis(0));
        e.user = user.into();
        e.orders = orders
            .iter()
            .map(|(title, state)| Order {
                title: (*title).into(),
                state: *state,
                ..Order::blank(UtcInstant::from_millis(0))
            })
            .collect();
        e
    }

    #[test]
    fn title_skips_done_and_blank_parts() {
        let e = expedient(
            "Joan Martí",
            &[("Frens", OrderState::Todo), ("", OrderState::Urgent), ("Oli", OrderState::Done)],
        );
        assert_eq!(derive_title(&e, "  -  ", "Nou Expedient"), "Joan  -  Frens");
    }

    #[test]
    fn empty_title_falls_back_to_placeholder() {
        let e = expedient("  ", &[("", OrderState::Todo)]);
        assert_eq!(derive_title(&e, "  -  ", "Nou Expedient"), "Nou Expedient");
    }

    #[test]
    fn orders_alone_make_a_title() {
        let e = expedient("", &[("Roda", OrderState::Awaiting), ("ITV", OrderState::InStore)]);
        assert_eq!(derive_title(&e, " / ", "x"), "Roda / ITV");
    }
}
