use std::cell::RefCell;
use std::rc::Rc;

use taller_core::{Expedient, ExpedientId, UtcInstant};
use taller_storage::{Backend, SqliteStore, StorageError};
use taller_sync::{CallbackRegistry, Delivery, EditorSession, SessionConfig, SyncError};

use crate::bridge::LocalBridge;
use crate::fakes::ManualClock;

/// Start of every test desk's clock: 2024-01-01T00:00:00Z.
pub const EPOCH: i64 = 1_704_067_200_000;

/// Upper bound on pump/poll rounds in [`TestDesk::settle`].
const MAX_ROUNDS: usize = 64;

/// One window's worth of wiring: a backend, the registry every hook of the
/// window shares, a bridge into the backend and a manual clock.
///
/// Nothing reaches a hook until the test calls [`pump`](Self::pump), which
/// makes message interleavings explicit.
pub struct TestDesk {
    pub backend: Rc<RefCell<Backend>>,
    pub registry: CallbackRegistry,
    pub bridge: LocalBridge,
    pub clock: ManualClock,
}

impl TestDesk {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::with_backend(Backend::in_memory()?))
    }

    /// A desk over an on-disk database.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        Ok(Self::with_backend(Backend::new(SqliteStore::open(path)?)))
    }

    fn with_backend(backend: Backend) -> Self {
        let backend = Rc::new(RefCell::new(backend));
        Self {
            bridge: LocalBridge::new(backend.clone()),
            backend,
            registry: CallbackRegistry::new(),
            clock: ManualClock::new(UtcInstant::from_millis(EPOCH)),
        }
    }

    pub fn now(&self) -> UtcInstant {
        taller_core::Clock::now(&self.clock)
    }

    /// Writes an expedient directly into the backend, bypassing any session.
    pub fn seed(&self, expedient: &Expedient) -> Result<ExpedientId, StorageError> {
        self.backend.borrow_mut().create_expedient(expedient)
    }

    /// A write made by someone else (another window, another tab).
    pub fn external_update(&self, id: ExpedientId, expedient: &Expedient) -> Result<(), StorageError> {
        self.backend.borrow_mut().update_expedient(id, expedient)
    }

    pub fn external_delete(&self, id: ExpedientId) -> Result<(), StorageError> {
        self.backend.borrow_mut().delete_expedient(id)
    }

    pub fn stored(&self, id: ExpedientId) -> Result<Option<Expedient>, StorageError> {
        self.backend.borrow().read_expedient(id)
    }

    pub fn session(&self, id: ExpedientId) -> Result<EditorSession<LocalBridge>, SyncError> {
        self.session_with(id, SessionConfig::default())
    }

    pub fn session_with(
        &self,
        id: ExpedientId,
        config: SessionConfig,
    ) -> Result<EditorSession<LocalBridge>, SyncError> {
        EditorSession::open(
            id,
            self.bridge.clone(),
            self.registry.clone(),
            Box::new(self.clock.clone()),
            config,
        )
    }

    /// Delivers the oldest queued inbound message.
    pub fn pump_one(&self) -> Option<Delivery> {
        // The backend borrow must end before delivery: releasing a handle
        // calls back into it.
        let message = self.backend.borrow_mut().pop_outbox()?;
        Some(self.registry.deliver(message))
    }

    /// Delivers everything queued. Returns how many messages went out.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        while self.pump_one().is_some() {
            delivered += 1;
        }
        delivered
    }

    pub fn pending(&self) -> usize {
        self.backend.borrow().outbox_len()
    }

    /// Pumps and polls until nothing moves.
    pub fn settle(&self, session: &mut EditorSession<LocalBridge>) {
        self.settle_all(&mut [session]);
    }

    pub fn settle_all(&self, sessions: &mut [&mut EditorSession<LocalBridge>]) {
        for _ in 0..MAX_ROUNDS {
            let delivered = self.pump();
            let mut consumed = false;
            for session in sessions.iter_mut() {
                consumed |= session.poll();
            }
            if delivered == 0 && !consumed && self.pending() == 0 {
                return;
            }
        }
        tracing::warn!("desk did not settle after {MAX_ROUNDS} rounds");
    }
}
