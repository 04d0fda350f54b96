use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CoreError;
use crate::field_value::SuggestionField;
use crate::ids::{CallbackId, ExpedientId, SubscriptionHandle};

/// What a subscription is interested in, including its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    /// One expedient; snapshot type `Expedient`, `None` once deleted.
    Expedient(ExpedientId),
    /// Autocomplete candidates; snapshot type `Vec<String>`.
    Suggestions {
        field: SuggestionField,
        filter: String,
        limit: usize,
    },
    /// Filtered expedients, newest first; snapshot type `Vec<(ExpedientId, Expedient)>`.
    ExpedientList { filter: String, limit: usize },
}

/// Messages travelling from the storage side back to the UI side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A `subscribe` request finished and produced a handle.
    Registered {
        callback: CallbackId,
        handle: SubscriptionHandle,
    },
    /// A new snapshot for the subscription owned by `callback`.
    Push {
        callback: CallbackId,
        payload: Vec<u8>,
    },
}

impl Inbound {
    pub fn callback(&self) -> CallbackId {
        match self {
            Inbound::Registered { callback, .. } | Inbound::Push { callback, .. } => *callback,
        }
    }
}

/// Encode a snapshot for a push. `None` means "no such value".
pub fn encode_payload<T: Serialize>(snapshot: Option<&T>) -> Result<Vec<u8>, CoreError> {
    rmp_serde::to_vec(&snapshot).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<Option<T>, CoreError> {
    rmp_serde::from_slice(payload).map_err(|e| CoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expedient::Expedient;
    use crate::instant::UtcInstant;

    #[test]
    fn payload_carries_absence() -> Result<(), CoreError> {
        let bytes = encode_payload::<Expedient>(None)?;
        assert_eq!(decode_payload::<Expedient>(&bytes)?, None);
        Ok(())
    }

    #[test]
    fn payload_of_wrong_type_fails_to_decode() -> Result<(), CoreError> {
        let expedient = Expedient::blank(UtcInstant::from_millis(3));
        let bytes = encode_payload(Some(&expedient))?;
        assert!(decode_payload::<Vec<String>>(&bytes).is_err());
        assert_eq!(decode_payload::<Expedient>(&bytes)?, Some(expedient));
        Ok(())
    }

    #[test]
    fn inbound_exposes_its_callback() {
        let callback = CallbackId::from_raw(5);
        let registered = Inbound::Registered {
            callback,
            handle: SubscriptionHandle::from_raw(1),
        };
        let push = Inbound::Push {
            callback,
            payload: vec![],
        };
        assert_eq!(registered.callback(), callback);
        assert_eq!(push.callback(), callback);
    }
}
