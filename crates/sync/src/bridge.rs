use taller_core::{CallbackId, Expedient, ExpedientId, SubscriptionHandle, Topic};

use crate::error::BridgeError;

/// Outbound half of the invocation bridge to the storage collaborator.
///
/// `subscribe` only starts a registration: the handle comes back later as an
/// `Inbound::Registered` delivered through the [`CallbackRegistry`](crate::CallbackRegistry).
/// Snapshot pushes travel the same way.
pub trait Bridge {
    fn subscribe(&mut self, topic: &Topic, callback: CallbackId) -> Result<(), BridgeError>;

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), BridgeError>;

    fn create_expedient(&mut self, expedient: &Expedient) -> Result<ExpedientId, BridgeError>;

    fn update_expedient(&mut self, id: ExpedientId, expedient: &Expedient) -> Result<(), BridgeError>;

    fn delete_expedient(&mut self, id: ExpedientId) -> Result<(), BridgeError>;

    fn read_expedient(&mut self, id: ExpedientId) -> Result<Option<Expedient>, BridgeError>;
}
