pub mod bridge;
pub mod caret;
pub mod config;
pub mod error;
pub mod history;
pub mod hook;
pub mod keys;
pub mod reconcile;
pub mod registry;
pub mod session;

pub use bridge::Bridge;
pub use caret::{CaretContainer, CaretPosition, HistoryBinding};
pub use config::SessionConfig;
pub use error::{BridgeError, ConfigError, SyncError};
pub use history::{History, Restore};
pub use hook::{HookState, SubscriptionHook};
pub use keys::{HistoryCommand, KeyBindings, KeyChord};
pub use reconcile::{LocalOutcome, Reconciler, RemoteOutcome};
pub use registry::{CallbackRegistry, Delivery, Mail};
pub use session::{EditorSession, SessionEvent, UpdateOutcome, derive_title};
