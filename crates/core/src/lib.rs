pub mod error;
pub mod expedient;
pub mod field_value;
pub mod filter;
pub mod fingerprint;
pub mod ids;
pub mod instant;
pub mod wire;

pub use error::CoreError;
pub use expedient::{Expedient, Order, OrderState, first_name};
pub use field_value::{ExpedientField, FieldPath, FieldValue, OrderField, SuggestionField};
pub use filter::TextFilter;
pub use fingerprint::Fingerprint;
pub use ids::*;
pub use instant::{Clock, SystemClock, UtcInstant};
pub use wire::{Inbound, Topic};
