use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// BLAKE3 digest of a value's MessagePack encoding.
///
/// Structs encode their fields in declaration order, so two structurally
/// equal values always produce the same fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, CoreError> {
        let mut hasher = blake3::Hasher::new();
        rmp_serde::encode::write(&mut hasher, value)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}{:02x}{:02x})", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}
