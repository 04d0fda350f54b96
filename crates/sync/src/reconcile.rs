use std::marker::PhantomData;

use serde::Serialize;
use tracing::debug;

use taller_core::{CoreError, Fingerprint};

/// What the owner must do after a remote snapshot was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The record is gone; close the editor.
    Deleted,
    /// Our own push came back and the draft has not moved since.
    Echo,
    /// Our own push came back but the draft moved on; push the current draft.
    Resend,
    /// External change or first snapshot; replace the draft with it.
    Overwrite,
}

/// What the owner must do after the local draft changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    /// No draft.
    Ignored,
    /// The draft already matches the last remote value.
    Unchanged,
    /// A push is in flight; its echo will pick the draft up.
    Deferred,
    /// Push the draft now. It is already recorded as in flight.
    Send,
}

/// Decides between echo and overwrite for one draft/remote pair.
///
/// Values are compared by fingerprint. At most one push is in flight at a
/// time; edits made meanwhile are folded into the push triggered by its echo.
#[derive(Debug)]
pub struct Reconciler<T: Serialize> {
    last_known_remote: Option<Fingerprint>,
    last_sent: Option<Fingerprint>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Serialize> Default for Reconciler<T> {
    fn default() -> Self {
        Self {
            last_known_remote: None,
            last_sent: None,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize> Reconciler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_remote(
        &mut self,
        incoming: Option<&T>,
        draft: Option<&T>,
    ) -> Result<RemoteOutcome, CoreError> {
        let remote = Fingerprint::of(&incoming)?;
        self.last_known_remote = Some(remote);

        if incoming.is_none() {
            self.last_sent = None;
            return Ok(RemoteOutcome::Deleted);
        }

        if self.last_sent == Some(remote) {
            self.last_sent = None;
            let current = Fingerprint::of(&draft)?;
            if draft.is_some() && current != remote {
                debug!(?remote, ?current, "echo behind the draft, resending");
                self.last_sent = Some(current);
                return Ok(RemoteOutcome::Resend);
            }
            return Ok(RemoteOutcome::Echo);
        }

        if self.last_sent.take().is_some() {
            debug!(?remote, "external change while a push was in flight");
        }
        Ok(RemoteOutcome::Overwrite)
    }

    pub fn on_local(&mut self, draft: Option<&T>) -> Result<LocalOutcome, CoreError> {
        if draft.is_none() {
            return Ok(LocalOutcome::Ignored);
        }
        let current = Fingerprint::of(&draft)?;
        if self.last_known_remote == Some(current) {
            return Ok(LocalOutcome::Unchanged);
        }
        if self.last_sent.is_some() {
            return Ok(LocalOutcome::Deferred);
        }
        self.last_sent = Some(current);
        Ok(LocalOutcome::Send)
    }

    /// Forgets the in-flight push after it failed for good, so the next
    /// edit is sent again.
    pub fn abandon_send(&mut self) {
        self.last_sent = None;
    }

    pub fn in_flight(&self) -> bool {
        self.last_sent.is_some()
    }

    pub fn last_known_remote(&self) -> Option<Fingerprint> {
        self.last_known_remote
    }
}
