use taller_core::{Expedient, ExpedientId, IdSpace};

use crate::error::StorageError;

/// Persistent home of expedients. Knows nothing about subscriptions.
pub trait Store {
    /// Stores a new expedient in `space` and returns its freshly allocated id.
    fn insert(&mut self, space: IdSpace, expedient: &Expedient) -> Result<ExpedientId, StorageError>;

    /// Overwrites an existing expedient. `NotFound` if the id is unknown.
    fn put(&mut self, id: ExpedientId, expedient: &Expedient) -> Result<(), StorageError>;

    /// Removes an expedient. Returns whether it existed.
    fn remove(&mut self, id: ExpedientId) -> Result<bool, StorageError>;

    fn get(&self, id: ExpedientId) -> Result<Option<Expedient>, StorageError>;

    /// Every stored expedient, newest first.
    fn all(&self) -> Result<Vec<(ExpedientId, Expedient)>, StorageError>;

    fn count(&self) -> Result<u64, StorageError>;
}
