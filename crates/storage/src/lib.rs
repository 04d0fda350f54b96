pub mod backend;
pub mod error;
pub mod hub;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use backend::Backend;
pub use error::StorageError;
pub use hub::{Hub, Subscription};
pub use sqlite::SqliteStore;
pub use traits::*;
